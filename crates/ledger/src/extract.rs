// Row extraction: sheet tables → RowFacts.
//
// Two row schemas exist. "Modernization" sheets carry luminaire codes,
// removed materials, observations, sync timestamps and soil types;
// "maintenance" sheets only carry OT, node and material pairs. Both are
// handled by one schema-aware `SheetLayout` so the downstream ledger never
// needs to know which schema produced a fact.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cell::{cell_at, Cell, SheetTable};
use crate::config::{EngineConfig, Markers};
use crate::error::LedgerError;
use crate::ledger::Slot;
use crate::model::{LuminaireReading, MaterialQty, RowFact, RowOrigin};
use crate::normalize::{format_number, is_marker, normalize_name};
use crate::timestamp::{parse_sync_time, SyncTime};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    Modernization,
    Maintenance,
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modernization => write!(f, "modernization"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

impl FromStr for Schema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "modernization" | "modernizacion" | "modernización" => Ok(Self::Modernization),
            "maintenance" | "mantenimiento" => Ok(Self::Maintenance),
            other => Err(format!(
                "unknown schema '{other}' (expected 'modernization' or 'maintenance')"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

/// Convert Excel column letters to a 0-based index (A = 0, Z = 25, AA = 26).
/// `None` for anything that is not letters or does not fit a `usize`.
pub fn column_index(letters: &str) -> Option<usize> {
    let letters = letters.trim();
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

fn material_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^MATERIAL\s+(\d+)$").expect("valid material regex"))
}

fn quantity_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^CANTIDAD\s+(?:DE\s+)?MATERIAL\s+(\d+)$").expect("valid quantity regex")
    })
}

fn removed_code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\d+\.CODIGO DE (LUMINARIA|BOMBILLA|FOTOCELDA) RETIRADA (N\d+)\.?$")
            .expect("valid removed code regex")
    })
}

fn removed_power_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\d+\.POTENCIA DE (LUMINARIA|BOMBILLA) RETIRADA (N\d+)\.\(W\)$")
            .expect("valid removed power regex")
    })
}

/// Normalize a power rating: `100`, `100.0`, `100 W` and `100w` all give `100`.
pub fn normalize_power(raw: &str) -> Option<String> {
    let upper = raw.trim().to_uppercase();
    let stripped = upper.trim_end_matches('W').trim();
    if stripped.is_empty() {
        return None;
    }
    match stripped.replace(',', ".").parse::<f64>() {
        Ok(n) if n.is_finite() => Some(format_number(n)),
        _ => Some(stripped.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialColumns {
    pub number: u32,
    pub material: usize,
    pub quantity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovedKind {
    Luminaire,
    Bulb,
    Photocell,
}

impl RemovedKind {
    fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "LUMINARIA" => Some(Self::Luminaire),
            "BOMBILLA" => Some(Self::Bulb),
            "FOTOCELDA" => Some(Self::Photocell),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Luminaire => "LUMINARIA",
            Self::Bulb => "BOMBILLA",
            Self::Photocell => "FOTOCELDA",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedCodeColumns {
    pub kind: RemovedKind,
    pub slot: String,
    pub code: usize,
    pub power: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModernizationLayout {
    pub ot: usize,
    pub pole: usize,
    pub n1_code: usize,
    pub n1_power: usize,
    pub n2_code: usize,
    pub n2_power: usize,
    pub aspect: usize,
    pub sync: usize,
    pub soil: Option<usize>,
    /// (column, material name) for the fixed removed-material range.
    pub removed_range: Vec<(usize, String)>,
    pub removed_codes: Vec<RemovedCodeColumns>,
    pub installed: Vec<MaterialColumns>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceLayout {
    pub ot: usize,
    pub node: usize,
    pub installed: Vec<MaterialColumns>,
}

/// Column layout of one sheet under one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetLayout {
    Modernization(ModernizationLayout),
    Maintenance(MaintenanceLayout),
}

/// Counters for one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub sheets_read: usize,
    pub sheets_skipped: usize,
    pub rows_read: usize,
    /// Rows dropped because they carry no OT id.
    pub rows_skipped: usize,
    /// Individual quantity/date fields neutralized to 0 / unparseable.
    pub coerced_fields: usize,
}

impl ExtractStats {
    pub fn add(&mut self, other: &ExtractStats) {
        self.sheets_read += other.sheets_read;
        self.sheets_skipped += other.sheets_skipped;
        self.rows_read += other.rows_read;
        self.rows_skipped += other.rows_skipped;
        self.coerced_fields += other.coerced_fields;
    }
}

fn require(table: &SheetTable, name: &str, missing: &mut Vec<String>) -> usize {
    match table.column(name) {
        Some(idx) => idx,
        None => {
            missing.push(name.to_string());
            usize::MAX
        }
    }
}

/// Discover `MATERIAL n` / `CANTIDAD MATERIAL n` pairs, matched by n.
fn material_pairs(table: &SheetTable) -> Vec<MaterialColumns> {
    let mut materials = Vec::new();
    let mut quantities = Vec::new();
    for (idx, header) in table.headers.iter().enumerate() {
        let header = header.trim();
        if let Some(caps) = material_pattern().captures(header) {
            if let Ok(n) = caps[1].parse::<u32>() {
                materials.push((n, idx));
            }
        } else if let Some(caps) = quantity_pattern().captures(header) {
            if let Ok(n) = caps[1].parse::<u32>() {
                quantities.push((n, idx));
            }
        }
    }

    let mut pairs: Vec<MaterialColumns> = materials
        .into_iter()
        .filter_map(|(number, material)| {
            quantities
                .iter()
                .find(|(q, _)| *q == number)
                .map(|(_, quantity)| MaterialColumns { number, material, quantity: *quantity })
        })
        .collect();
    pairs.sort_by_key(|p| p.number);
    pairs
}

impl SheetLayout {
    /// Resolve the columns a schema needs. Fails with `SchemaMismatch` when a
    /// mandatory column is absent.
    pub fn discover(schema: Schema, table: &SheetTable, config: &EngineConfig) -> Result<Self, LedgerError> {
        let mut missing = Vec::new();
        let layout = match schema {
            Schema::Modernization => {
                let cols = &config.modernization;
                let ot = require(table, &cols.ot, &mut missing);
                let pole = require(table, &cols.pole, &mut missing);
                let n1_code = require(table, &cols.n1_code, &mut missing);
                let n1_power = require(table, &cols.n1_power, &mut missing);
                let n2_code = require(table, &cols.n2_code, &mut missing);
                let n2_power = require(table, &cols.n2_power, &mut missing);
                let aspect = require(table, &cols.aspect, &mut missing);
                let sync = require(table, &cols.sync, &mut missing);
                if !missing.is_empty() {
                    return Err(LedgerError::SchemaMismatch {
                        sheet: table.name.clone(),
                        missing,
                    });
                }

                SheetLayout::Modernization(ModernizationLayout {
                    ot,
                    pole,
                    n1_code,
                    n1_power,
                    n2_code,
                    n2_power,
                    aspect,
                    sync,
                    soil: table.column(&cols.soil),
                    removed_range: removed_range_columns(table, config),
                    removed_codes: removed_code_columns(table),
                    installed: material_pairs(table),
                })
            }
            Schema::Maintenance => {
                let cols = &config.maintenance;
                let ot = require(table, &cols.ot, &mut missing);
                let node = require(table, &cols.node, &mut missing);
                if !missing.is_empty() {
                    return Err(LedgerError::SchemaMismatch {
                        sheet: table.name.clone(),
                        missing,
                    });
                }
                SheetLayout::Maintenance(MaintenanceLayout {
                    ot,
                    node,
                    installed: material_pairs(table),
                })
            }
        };
        Ok(layout)
    }

    pub fn schema(&self) -> Schema {
        match self {
            Self::Modernization(_) => Schema::Modernization,
            Self::Maintenance(_) => Schema::Maintenance,
        }
    }

    /// Extract one data row. Returns `None` for rows without an OT id.
    pub fn extract_row(
        &self,
        row: &[Cell],
        origin: RowOrigin,
        markers: &Markers,
        stats: &mut ExtractStats,
    ) -> Option<RowFact> {
        stats.rows_read += 1;
        let ot_col = match self {
            Self::Modernization(l) => l.ot,
            Self::Maintenance(l) => l.ot,
        };
        let Some(ot) = cell_at(row, ot_col).text() else {
            stats.rows_skipped += 1;
            return None;
        };

        let fact = match self {
            Self::Modernization(layout) => extract_modernization(layout, ot, row, markers, stats),
            Self::Maintenance(layout) => {
                let pole = cell_at(row, layout.node).text().unwrap_or_default();
                let mut fact = RowFact::new(ot, pole);
                fact.installed = installed_materials(&layout.installed, row, markers, stats);
                fact
            }
        };
        Some(RowFact { origin, ..fact })
    }
}

fn removed_range_columns(table: &SheetTable, config: &EngineConfig) -> Vec<(usize, String)> {
    let [start, end] = &config.modernization.removed_range;
    let (Some(start), Some(end)) = (column_index(start), column_index(end)) else {
        return Vec::new();
    };
    // The range is only meaningful when the sheet extends past its last column.
    if table.headers.len() <= end {
        return Vec::new();
    }
    (start..=end)
        .filter_map(|idx| {
            let header = &table.headers[idx];
            let name = header.split_once('.').map_or(header.as_str(), |(_, rest)| rest);
            let name = normalize_name(name);
            if name.is_empty() || is_marker(&name, &config.markers.material_blacklist) {
                None
            } else {
                Some((idx, name))
            }
        })
        .collect()
}

fn removed_code_columns(table: &SheetTable) -> Vec<RemovedCodeColumns> {
    let mut powers: Vec<(RemovedKind, String, usize)> = Vec::new();
    let mut codes: Vec<(RemovedKind, String, usize)> = Vec::new();
    for (idx, header) in table.headers.iter().enumerate() {
        let header = header.trim();
        if let Some(caps) = removed_code_pattern().captures(header) {
            if let Some(kind) = RemovedKind::parse(&caps[1]) {
                codes.push((kind, caps[2].to_uppercase(), idx));
            }
        } else if let Some(caps) = removed_power_pattern().captures(header) {
            if let Some(kind) = RemovedKind::parse(&caps[1]) {
                powers.push((kind, caps[2].to_uppercase(), idx));
            }
        }
    }

    codes
        .into_iter()
        .map(|(kind, slot, code)| {
            let power = powers
                .iter()
                .find(|(k, s, _)| *k == kind && *s == slot)
                .map(|(_, _, idx)| *idx);
            RemovedCodeColumns { kind, slot, code, power }
        })
        .collect()
}

fn installed_materials(
    pairs: &[MaterialColumns],
    row: &[Cell],
    markers: &Markers,
    stats: &mut ExtractStats,
) -> Vec<MaterialQty> {
    let mut out = Vec::new();
    for pair in pairs {
        let Some(material) = cell_at(row, pair.material).text() else {
            continue;
        };
        if is_marker(&material, &markers.material_blacklist) {
            continue;
        }
        let quantity = cell_at(row, pair.quantity).quantity();
        if quantity.neutralized {
            stats.coerced_fields += 1;
        }
        if quantity.value > 0.0 {
            out.push(MaterialQty {
                name: normalize_name(&material),
                quantity: quantity.value,
            });
        }
    }
    out
}

fn luminaire_reading(
    slot: Slot,
    code: &Cell,
    power: &Cell,
    markers: &Markers,
) -> Option<LuminaireReading> {
    let code = code.text()?;
    if is_marker(&code, &markers.code_null_markers) {
        return None;
    }
    let power = power
        .text()
        .filter(|p| !is_marker(p, &markers.code_null_markers))
        .and_then(|p| normalize_power(&p));
    Some(LuminaireReading {
        slot,
        code: normalize_name(&code),
        power,
    })
}

fn extract_modernization(
    layout: &ModernizationLayout,
    ot: String,
    row: &[Cell],
    markers: &Markers,
    stats: &mut ExtractStats,
) -> RowFact {
    let pole = cell_at(row, layout.pole).text().unwrap_or_default();
    let mut fact = RowFact::new(ot, pole);

    let sync_cell = cell_at(row, layout.sync);
    fact.sync = parse_sync_time(sync_cell);
    if fact.sync == SyncTime::Unparseable && !sync_cell.is_blank() {
        stats.coerced_fields += 1;
    }

    fact.soil = layout
        .soil
        .and_then(|col| cell_at(row, col).text())
        .map(|s| normalize_name(&s));
    fact.aspect = cell_at(row, layout.aspect).text();

    for (col, name) in &layout.removed_range {
        let quantity = cell_at(row, *col).quantity();
        if quantity.neutralized {
            stats.coerced_fields += 1;
        }
        if quantity.value > 0.0 {
            fact.removed.push(MaterialQty {
                name: name.clone(),
                quantity: quantity.value,
            });
        }
    }

    for columns in &layout.removed_codes {
        let Some(code) = cell_at(row, columns.code).text() else {
            continue;
        };
        if is_marker(&code, &markers.code_null_markers) {
            continue;
        }
        let name = match columns.kind {
            RemovedKind::Photocell => format!("FOTOCELDA RETIRADA {}", columns.slot),
            kind => {
                let power = columns
                    .power
                    .and_then(|col| cell_at(row, col).text())
                    .filter(|p| !is_marker(p, &markers.code_null_markers))
                    .and_then(|p| normalize_power(&p));
                match power {
                    Some(p) => format!("{} RETIRADA {} {p}W", kind.label(), columns.slot),
                    None => format!("{} RETIRADA {}", kind.label(), columns.slot),
                }
            }
        };
        fact.removed.push(MaterialQty { name, quantity: 1.0 });
    }

    fact.installed = installed_materials(&layout.installed, row, markers, stats);

    let readings = [
        (Slot::N1, layout.n1_code, layout.n1_power),
        (Slot::N2, layout.n2_code, layout.n2_power),
    ];
    for (slot, code_col, power_col) in readings {
        if let Some(reading) = luminaire_reading(slot, cell_at(row, code_col), cell_at(row, power_col), markers) {
            fact.luminaires.push(reading);
        }
    }

    fact
}

// ---------------------------------------------------------------------------
// Sheet extraction
// ---------------------------------------------------------------------------

/// Extract every row of one sheet. A schema mismatch is returned as an error
/// for the caller to log and skip; it never aborts the file.
pub fn extract_sheet(
    schema: Schema,
    table: &SheetTable,
    file: usize,
    sheet: usize,
    config: &EngineConfig,
    stats: &mut ExtractStats,
) -> Result<Vec<RowFact>, LedgerError> {
    let layout = match SheetLayout::discover(schema, table, config) {
        Ok(layout) => layout,
        Err(e) => {
            stats.sheets_skipped += 1;
            return Err(e);
        }
    };
    stats.sheets_read += 1;

    let facts = table
        .rows
        .iter()
        .enumerate()
        .filter_map(|(row_idx, row)| {
            let origin = RowOrigin { file, sheet, row: row_idx };
            layout.extract_row(row, origin, &config.markers, stats)
        })
        .collect();
    Ok(facts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
