use serde::Serialize;

use crate::catalog::Catalog;
use crate::cell::SheetTable;
use crate::config::EngineConfig;
use crate::error::LedgerError;
use crate::extract::{extract_sheet, ExtractStats, Schema};
use crate::labor::{LaborEngine, OtLabor};
use crate::model::Batch;
use crate::summary::BatchSummary;

/// One uploaded file. `sheets` holds the reader's error when the file could
/// not be opened, so the failure is accounted for like any other.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub sheets: Result<Vec<SheetTable>, String>,
}

impl Upload {
    pub fn new(name: impl Into<String>, sheets: Vec<SheetTable>) -> Self {
        Self {
            name: name.into(),
            sheets: Ok(sheets),
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheets: Err(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub batch: Batch,
    pub labor: Vec<OtLabor>,
    pub summary: BatchSummary,
}

impl BatchResult {
    /// True when at least one OT recorded a material or luminaire code.
    pub fn has_data(&self) -> bool {
        self.batch.orders().any(|order| !order.is_empty())
    }

    pub fn labor_for(&self, ot: &str) -> Option<&OtLabor> {
        self.labor.iter().find(|l| l.ot == ot)
    }
}

/// Fold every upload into its own batch, merge the batches, then run the
/// labor engine over every OT. A failing file is logged and skipped.
pub fn run(uploads: &[Upload], schema: Schema, config: &EngineConfig, catalog: &Catalog) -> BatchResult {
    let mut summary = BatchSummary::default();
    let mut batch = Batch::new();

    for (file_idx, upload) in uploads.iter().enumerate() {
        match fold_upload(upload, file_idx, schema, config) {
            Ok((file_batch, stats, rows_folded)) => {
                log::info!(
                    "{}: {} row(s) folded into {} OT(s) from {} sheet(s)",
                    upload.name,
                    rows_folded,
                    file_batch.len(),
                    stats.sheets_read
                );
                summary.record_file(&stats, rows_folded);
                batch.merge(&file_batch);
            }
            Err((e, stats)) => {
                log::warn!("skipping file: {e}");
                summary.record_failure(&stats);
            }
        }
    }
    batch.renumber_nodes();

    let engine = LaborEngine::new(catalog, &config.rules);
    let mut labor = Vec::with_capacity(batch.len());
    for order in batch.orders() {
        if order.is_empty() {
            log::info!("OT {}: no material or luminaire code recorded, no labor inferred", order.ot);
            continue;
        }
        labor.push(engine.evaluate(order));
    }
    summary.record_labor(batch.len(), &labor);

    BatchResult { batch, labor, summary }
}

fn fold_upload(
    upload: &Upload,
    file_idx: usize,
    schema: Schema,
    config: &EngineConfig,
) -> Result<(Batch, ExtractStats, usize), (LedgerError, ExtractStats)> {
    let sheets = upload.sheets.as_ref().map_err(|message| {
        let error = LedgerError::FileProcessing {
            file: upload.name.clone(),
            message: message.clone(),
        };
        (error, ExtractStats::default())
    })?;

    let mut stats = ExtractStats::default();
    let mut batch = Batch::new();
    let mut rows_folded = 0;
    for (sheet_idx, table) in sheets.iter().enumerate() {
        match extract_sheet(schema, table, file_idx, sheet_idx, config, &mut stats) {
            Ok(facts) => {
                for fact in &facts {
                    batch.fold(fact, &config.markers);
                }
                rows_folded += facts.len();
            }
            Err(e) => log::debug!("{}: {e}", upload.name),
        }
    }

    if stats.sheets_read == 0 {
        let error = LedgerError::FileProcessing {
            file: upload.name.clone(),
            message: format!("no sheet matches the {schema} layout"),
        };
        return Err((error, stats));
    }
    Ok((batch, stats, rows_folded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::model::NodeId;

    fn maintenance_sheet(rows: Vec<Vec<Cell>>) -> SheetTable {
        let mut table = SheetTable::new(
            "Hoja1",
            vec![
                "6.Nro.Orden Energis".into(),
                "5.Nodo".into(),
                "MATERIAL 1".into(),
                "CANTIDAD MATERIAL 1".into(),
            ],
        );
        table.rows = rows;
        table
    }

    #[test]
    fn failed_and_mismatched_files_are_counted_not_fatal() {
        let good = Upload::new(
            "good.xlsx",
            vec![maintenance_sheet(vec![vec![
                Cell::Text("OT1".into()),
                Cell::Number(4.0),
                Cell::Text("CABLE DUPLEX".into()),
                Cell::Number(30.0),
            ]])],
        );
        let broken = Upload::failed("broken.xlsx", "not a zip archive");
        let wrong = Upload::new("wrong.xlsx", vec![SheetTable::new("x", vec!["A".into()])]);

        let result = run(
            &[broken, good, wrong],
            Schema::Maintenance,
            &EngineConfig::default(),
            &Catalog::builtin().unwrap(),
        );
        assert_eq!(result.summary.files_processed, 1);
        assert_eq!(result.summary.files_failed, 2);
        assert_eq!(result.summary.rows_folded, 1);
        assert_eq!(result.summary.sheets_read, 1);
        assert_eq!(result.summary.sheets_skipped, 1);
        assert!(result.has_data());
        let labor = result.labor_for("OT1").unwrap();
        let descriptions: Vec<&str> = labor.lines.iter().map(|l| l.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec!["INSTALACION DE CONECTOR A PUESTA A TIERRA", "TENDIDO DE CABLE AEREO"]
        );
        assert_eq!(labor.lines[1].quantity, 30.0);
    }

    #[test]
    fn files_in_any_order_give_the_same_nodes() {
        let config = EngineConfig::default();
        let visit = |hour: u32, qty: f64| {
            let cols = &config.modernization;
            let mut headers: Vec<String> = [
                &cols.ot, &cols.pole, &cols.n1_code, &cols.n1_power, &cols.n2_code, &cols.n2_power, &cols.aspect,
                &cols.sync,
            ]
            .into_iter()
            .cloned()
            .collect();
            headers.extend(["MATERIAL 1".to_string(), "CANTIDAD MATERIAL 1".to_string()]);
            let mut table = SheetTable::new("Hoja1", headers);
            let mut row = vec![Cell::Empty; 8];
            row[0] = Cell::Text("OT1".into());
            row[1] = Cell::Number(42.0);
            row[7] = Cell::Text(format!("02/05/2024 {hour:02}:00:00"));
            row.extend([Cell::Text("CABLE DUPLEX".into()), Cell::Number(qty)]);
            table.rows = vec![row];
            Upload::new(format!("{hour}.xlsx"), vec![table])
        };
        let catalog = Catalog::builtin().unwrap();
        let forward = run(&[visit(10, 5.0), visit(8, 2.0)], Schema::Modernization, &config, &catalog);
        let backward = run(&[visit(8, 2.0), visit(10, 5.0)], Schema::Modernization, &config, &catalog);

        let (f, b) = (forward.batch.get("OT1").unwrap(), backward.batch.get("OT1").unwrap());
        assert_eq!(f.installed, b.installed);
        assert_eq!(f.installed.quantity("CABLE DUPLEX", &NodeId("42".into())), 2.0);
        assert_eq!(f.installed.quantity("CABLE DUPLEX", &NodeId("42_2".into())), 5.0);
    }

    #[test]
    fn empty_batch_has_no_data() {
        let result = run(&[], Schema::Modernization, &EngineConfig::default(), &Catalog::builtin().unwrap());
        assert!(!result.has_data());
        assert_eq!(result.summary, BatchSummary::default());
    }
}
