// `otledger process`: read uploads, run the engine, write the report.

use std::path::{Path, PathBuf};

use otledger_io::{read_upload, write_report};
use otledger_ledger::summary::BatchSummary;
use otledger_ledger::{run, Batch, OtLabor, Schema, Upload};
use serde::Serialize;

use crate::{load_catalog, load_config, CliError};

#[derive(Serialize)]
struct ProcessOutput<'a> {
    schema: Schema,
    output: &'a Path,
    has_data: bool,
    summary: &'a BatchSummary,
    work_orders: &'a Batch,
    labor: &'a [OtLabor],
}

pub fn cmd_process(
    files: &[PathBuf],
    schema: Schema,
    output: &Path,
    catalog: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<(), CliError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(CliError::usage(format!(
                "output directory {} does not exist",
                parent.display()
            )));
        }
    }

    let config = load_config(config)?;
    let catalog = load_catalog(catalog)?;
    tracing::debug!("catalog has {} template(s)", catalog.len());

    let uploads: Vec<Upload> = files.iter().map(|path| read_upload(path)).collect();
    let result = run(&uploads, schema, &config, &catalog);
    let summary = &result.summary;

    tracing::info!(
        files_processed = summary.files_processed,
        files_failed = summary.files_failed,
        sheets_skipped = summary.sheets_skipped,
        rows_folded = summary.rows_folded,
        rows_skipped = summary.rows_skipped,
        coerced_fields = summary.coerced_fields,
        work_orders = summary.work_orders,
        labor_lines = summary.labor_lines,
        "batch processed"
    );

    write_report(&result, output).map_err(|e| CliError::report(e.to_string()))?;

    if json {
        let out = ProcessOutput {
            schema,
            output,
            has_data: result.has_data(),
            summary,
            work_orders: &result.batch,
            labor: &result.labor,
        };
        let text = serde_json::to_string_pretty(&out).map_err(|e| CliError::report(e.to_string()))?;
        println!("{text}");
    }

    if !result.has_data() {
        return Err(CliError::no_data(format!(
            "no work order produced data; {} holds only the error sheet",
            output.display()
        ))
        .with_hint(format!("check that the files use the {schema} column layout")));
    }
    Ok(())
}
