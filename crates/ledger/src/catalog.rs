//! Labor-line catalog.
//!
//! A catalog is an ordered list of billable labor templates. Each template
//! carries a [`Rule`] that tells the labor engine which matcher evaluates it.
//! Catalogs written as TOML may state the rule explicitly; otherwise it is
//! inferred from the description keywords, which is also how catalogs loaded
//! from a bare description/unit table get their rules.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::measure::{height_band, perch_band, Band};
use crate::normalize::{has_keyword, match_form};

const BUILTIN_CATALOG: &str = include_str!("default_catalog.toml");

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Mounting rig used for luminaire work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rig {
    Truck,
    Basket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Soil {
    Hard,
    Soft,
}

/// Which material ledger a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Installed,
    Removed,
}

/// How a template's quantity is derived from a node's ledgers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    LuminaireInstall {
        rig: Rig,
    },
    LuminaireDismount {
        rig: Rig,
    },
    /// Always overwritten by the reconciler with installs + dismounts.
    LuminaireTransport,
    SoilRecovery {
        soil: Soil,
    },
    GroundingConnector,
    GroundingTransport,
    /// Sum of the node's materials whose name contains every `all_of`
    /// keyword, at least one `any_of` keyword (when given) and no `none_of`
    /// keyword, optionally restricted to names whose length falls in `band`.
    Material {
        side: Side,
        #[serde(default)]
        all_of: Vec<String>,
        #[serde(default)]
        any_of: Vec<String>,
        #[serde(default)]
        none_of: Vec<String>,
        #[serde(default)]
        band: Option<Band>,
    },
    /// Minimum of two co-occurring installed material counts.
    PairedMaterial {
        first: Vec<String>,
        second: Vec<String>,
    },
    /// One dressing per node whose installed perch count falls in `band`.
    PerchDressing {
        band: Band,
    },
    /// Never applies.
    Unmatched,
}

impl Rule {
    pub fn is_install(&self) -> bool {
        matches!(self, Self::LuminaireInstall { .. })
    }

    pub fn is_dismount(&self) -> bool {
        matches!(self, Self::LuminaireDismount { .. })
    }

    /// The serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LuminaireInstall { .. } => "luminaire_install",
            Self::LuminaireDismount { .. } => "luminaire_dismount",
            Self::LuminaireTransport => "luminaire_transport",
            Self::SoilRecovery { .. } => "soil_recovery",
            Self::GroundingConnector => "grounding_connector",
            Self::GroundingTransport => "grounding_transport",
            Self::Material { .. } => "material",
            Self::PairedMaterial { .. } => "paired_material",
            Self::PerchDressing { .. } => "perch_dressing",
            Self::Unmatched => "unmatched",
        }
    }
}

const POLE_TASKS: &[&str] = &["HINCADA", "APERTURA", "HUECO", "APLOMADA", "CONCRETADA"];
const POLE_MATERIALS: &[&str] = &["CONCRETO", "METALICO", "FIBRA", "MADERA"];

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Infer a rule from a template description. Checks run in a fixed order;
/// the first family whose keywords match wins.
pub fn infer_rule(description: &str) -> Rule {
    let text = match_form(description);
    let has = |kw: &str| has_keyword(&text, kw);
    let has_any = |kws: &[&str]| kws.iter().any(|kw| has_keyword(&text, kw));

    if has("TRANSPORTE") && has("LUMINARIA") {
        return Rule::LuminaireTransport;
    }
    if has("LUMINARIA") && has("INSTALACION") {
        let rig = if has("CANASTA") { Rig::Basket } else { Rig::Truck };
        return Rule::LuminaireInstall { rig };
    }
    if has("LUMINARIA") && has_any(&["DESMONTAJE", "RETIRO"]) {
        let rig = if has("CANASTA") { Rig::Basket } else { Rig::Truck };
        return Rule::LuminaireDismount { rig };
    }
    if has("RECUPERACION") {
        let soil = if has_any(&["DURA", "DURO"]) { Soil::Hard } else { Soil::Soft };
        return Rule::SoilRecovery { soil };
    }
    if has("CONECTOR") && has("TIERRA") {
        return Rule::GroundingConnector;
    }
    if has("TRANSPORTE") && has_any(&["VARILLA", "KIT"]) {
        return Rule::GroundingTransport;
    }
    if has("TRANSPORTE") && has("COLLARIN") && has("AISLADOR") {
        return Rule::PairedMaterial {
            first: words(&["COLLARIN"]),
            second: words(&["AISLADOR"]),
        };
    }
    if has("PERCHA") {
        return Rule::PerchDressing {
            band: perch_band(&text).unwrap_or(Band::at_least(1.0)),
        };
    }
    if has("POSTE") && has_any(POLE_TASKS) {
        let mut all_of = words(&["POSTE"]);
        all_of.extend(POLE_MATERIALS.iter().filter(|m| has(m)).map(|m| m.to_string()));
        return Rule::Material {
            side: Side::Installed,
            all_of,
            any_of: Vec::new(),
            none_of: Vec::new(),
            band: height_band(&text),
        };
    }
    if has("CABLE") {
        let side = if has_any(&["DESMONTAJE", "RETIRO"]) { Side::Removed } else { Side::Installed };
        return Rule::Material {
            side,
            all_of: words(&["CABLE"]),
            any_of: Vec::new(),
            none_of: Vec::new(),
            band: None,
        };
    }
    if has("EXCAVACION") {
        return Rule::Material {
            side: Side::Installed,
            all_of: words(&["EXCAVACION"]),
            any_of: Vec::new(),
            none_of: Vec::new(),
            band: None,
        };
    }
    if has("CAJA") {
        return Rule::Material {
            side: Side::Installed,
            all_of: words(&["CAJA"]),
            any_of: Vec::new(),
            none_of: Vec::new(),
            band: None,
        };
    }
    Rule::Unmatched
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Presentation grouping of labor lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Block {
    PoleWork,
    LuminaireInstall,
    Grounding,
    DismountTransport,
    CableWork,
    Other,
}

impl Block {
    pub const ALL: [Block; 6] = [
        Block::PoleWork,
        Block::LuminaireInstall,
        Block::Grounding,
        Block::DismountTransport,
        Block::CableWork,
        Block::Other,
    ];

    /// Classify a description by keyword.
    pub fn classify(description: &str) -> Self {
        let text = match_form(description);
        let has_any = |kws: &[&str]| kws.iter().any(|kw| has_keyword(&text, kw));
        if has_any(&["DESMONTAJE", "TRANSPORTE", "RETIRO"]) {
            Block::DismountTransport
        } else if has_any(&["TIERRA", "VARILLA", "CONECTOR"]) {
            Block::Grounding
        } else if has_any(&["POSTE", "HUECO", "EXCAVACION"]) {
            Block::PoleWork
        } else if has_any(&["LUMINARIA", "BRAZO"]) {
            Block::LuminaireInstall
        } else if has_any(&["CABLE"]) {
            Block::CableWork
        } else {
            Block::Other
        }
    }

    /// Section title used in the report.
    pub fn title(&self) -> &'static str {
        match self {
            Block::PoleWork => "OBRA CIVIL Y POSTES",
            Block::LuminaireInstall => "INSTALACION DE LUMINARIAS",
            Block::Grounding => "PUESTA A TIERRA",
            Block::DismountTransport => "DESMONTAJE Y TRANSPORTE",
            Block::CableWork => "REDES Y CABLEADO",
            Block::Other => "OTRAS ACTIVIDADES",
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ---------------------------------------------------------------------------
// Templates + catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaborTemplate {
    /// Position in the catalog; stable for one run.
    pub id: usize,
    pub description: String,
    pub unit: String,
    pub unit_price: f64,
    pub block: Block,
    pub rule: Rule,
}

/// Raw catalog entry as written in TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateEntry {
    pub description: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub block: Option<Block>,
    #[serde(default)]
    pub rule: Option<Rule>,
}

fn default_unit() -> String {
    "UND".to_string()
}

impl TemplateEntry {
    pub fn new(description: impl Into<String>, unit: impl Into<String>, unit_price: Option<f64>) -> Self {
        Self {
            description: description.into(),
            unit: unit.into(),
            unit_price,
            block: None,
            rule: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default, rename = "template")]
    templates: Vec<TemplateEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    templates: Vec<LaborTemplate>,
}

impl Catalog {
    /// The catalog embedded in this crate.
    pub fn builtin() -> Result<Self, LedgerError> {
        Self::from_toml(BUILTIN_CATALOG)
    }

    pub fn from_toml(input: &str) -> Result<Self, LedgerError> {
        let doc: CatalogDocument =
            toml::from_str(input).map_err(|e| LedgerError::CatalogParse(e.to_string()))?;
        Self::from_entries(doc.templates)
    }

    /// Build from raw entries, inferring missing rules and blocks.
    pub fn from_entries(entries: Vec<TemplateEntry>) -> Result<Self, LedgerError> {
        if entries.is_empty() {
            return Err(LedgerError::CatalogValidation("catalog has no templates".into()));
        }

        let mut seen = HashSet::new();
        let mut templates = Vec::with_capacity(entries.len());
        for (id, entry) in entries.into_iter().enumerate() {
            let description = entry.description.trim().to_string();
            if description.is_empty() {
                return Err(LedgerError::CatalogValidation(format!(
                    "template #{} has an empty description",
                    id + 1
                )));
            }
            if !seen.insert(match_form(&description)) {
                return Err(LedgerError::CatalogValidation(format!(
                    "duplicate template '{description}'"
                )));
            }
            let unit_price = entry.unit_price.unwrap_or(0.0);
            if !unit_price.is_finite() || unit_price < 0.0 {
                return Err(LedgerError::CatalogValidation(format!(
                    "template '{description}' has an invalid unit price"
                )));
            }

            let rule = entry.rule.unwrap_or_else(|| infer_rule(&description));
            let block = entry.block.unwrap_or_else(|| Block::classify(&description));
            let unit = match entry.unit.trim() {
                "" => default_unit(),
                unit => unit.to_uppercase(),
            };
            templates.push(LaborTemplate {
                id,
                description,
                unit,
                unit_price,
                block,
                rule,
            });
        }

        let unmatched = templates.iter().filter(|t| t.rule == Rule::Unmatched).count();
        if unmatched > 0 {
            log::debug!("{unmatched} catalog template(s) have no matching rule");
        }
        Ok(Self { templates })
    }

    pub fn templates(&self) -> &[LaborTemplate] {
        &self.templates
    }

    pub fn get(&self, id: usize) -> Option<&LaborTemplate> {
        self.templates.get(id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
