// Labor catalog loading from TOML or from a catalog workbook.

use std::path::Path;

use otledger_ledger::catalog::TemplateEntry;
use otledger_ledger::{Catalog, Cell};

use crate::error::IoError;
use crate::workbook::read_workbook;

pub const DESCRIPTION_HEADER: &str = "DESCRIPCION MANO DE OBRA";
pub const UNIT_HEADER: &str = "UNIDAD";
pub const PRICE_HEADER: &str = "VALOR UNITARIO";

/// Load a catalog, picking the reader from the file extension.
pub fn load_catalog(path: &Path) -> Result<Catalog, IoError> {
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

    if is_toml {
        let text = std::fs::read_to_string(path)
            .map_err(|e| IoError::Catalog(format!("{}: {e}", path.display())))?;
        Catalog::from_toml(&text).map_err(|e| IoError::Catalog(e.to_string()))
    } else {
        read_catalog_workbook(path)
    }
}

/// Read a catalog from the first sheet that carries the description and
/// unit columns. Rules and blocks are inferred from the descriptions.
pub fn read_catalog_workbook(path: &Path) -> Result<Catalog, IoError> {
    let tables = read_workbook(path)?;

    for table in &tables {
        let (Some(desc_col), Some(unit_col)) = (table.column(DESCRIPTION_HEADER), table.column(UNIT_HEADER)) else {
            log::debug!("catalog sheet '{}' lacks {DESCRIPTION_HEADER}/{UNIT_HEADER}", table.name);
            continue;
        };
        let price_col = table.column(PRICE_HEADER);

        let mut entries = Vec::new();
        for row in &table.rows {
            let cell = |col: usize| row.get(col).unwrap_or(&Cell::Empty);
            let Some(description) = cell(desc_col).text() else {
                continue;
            };
            let unit = cell(unit_col).text().unwrap_or_else(|| "UND".to_string());
            let unit_price = price_col.and_then(|col| match cell(col) {
                Cell::Number(n) if n.is_finite() => Some(*n),
                Cell::Text(s) => s.trim().replace(['$', ','], "").trim().parse().ok(),
                _ => None,
            });
            entries.push(TemplateEntry::new(description, unit, unit_price));
        }

        log::info!("{}: {} catalog template(s) from sheet '{}'", path.display(), entries.len(), table.name);
        return Catalog::from_entries(entries).map_err(|e| IoError::Catalog(e.to_string()));
    }

    Err(IoError::Catalog(format!(
        "{}: no sheet has '{DESCRIPTION_HEADER}' and '{UNIT_HEADER}' columns",
        path.display()
    )))
}
