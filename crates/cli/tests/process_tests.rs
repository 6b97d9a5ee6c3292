// Integration tests for `otledger process` and `otledger catalog`: exit codes,
// the --json stdout contract and the report workbook on disk.
//
// Run with: cargo test -p otledger-cli --test process_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use calamine::{open_workbook_auto, Reader};
use rust_xlsxwriter::Workbook;

fn otledger() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_otledger"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env("OTLEDGER_LOG", "warn");
    cmd.env_remove("OTLEDGER_CATALOG");
    cmd.env_remove("OTLEDGER_CONFIG");
    cmd
}

fn run(args: &[&str]) -> Output {
    otledger().args(args).output().expect("run otledger")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const MODERNIZATION_HEADERS: [&str; 10] = [
    "2.Nro de O.T.",
    "1.NODO DEL POSTE.",
    "2.CODIGO DE LUMINARIA INSTALADA N1.",
    "3.POTENCIA DE LUMINARIA INSTALADA (W)",
    "6.CODIGO DE LUMINARIA INSTALADA N2.",
    "7.POTENCIA DE LUMINARIA INSTALADA (W)",
    "1. Describa Aspectos que Considere se deben tener en cuenta.",
    "FECHA DE SINCRONIZACION",
    "MATERIAL 1",
    "CANTIDAD MATERIAL 1",
];

/// Survey workbook with one luminaire on a short arm at pole 12 of OT 5001.
fn write_survey(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in MODERNIZATION_HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    sheet.write_number(1, 0, 5001.0).unwrap();
    sheet.write_number(1, 1, 12.0).unwrap();
    sheet.write_string(1, 2, "LX-1").unwrap();
    sheet.write_number(1, 3, 70.0).unwrap();
    sheet.write_string(1, 6, "NINGUNO").unwrap();
    sheet.write_string(1, 7, "02/05/2024 09:15:00 a. m.").unwrap();
    sheet.write_string(1, 8, "BRAZO 1.5 M").unwrap();
    sheet.write_number(1, 9, 1.0).unwrap();
    workbook.save(path).unwrap();
}

fn write_unrelated(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "NOMBRE").unwrap();
    sheet.write_string(1, 0, "ALGO").unwrap();
    workbook.save(path).unwrap();
}

fn path_str(path: &PathBuf) -> &str {
    path.to_str().unwrap()
}

fn line_quantity(labor: &serde_json::Value, description: &str) -> Option<f64> {
    labor["lines"]
        .as_array()?
        .iter()
        .find(|l| l["description"] == description)
        .and_then(|l| l["quantity"].as_f64())
}

// ===========================================================================
// otledger process
// ===========================================================================

#[test]
fn process_writes_report_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ronda1.xlsx");
    let output = dir.path().join("reporte.xlsx");
    write_survey(&input);

    let out = run(&["process", path_str(&input), "--mode", "modernization", "-o", path_str(&output), "--json"]);
    assert!(out.status.success(), "exit code: {:?}\nstderr: {}", out.status, stderr(&out));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let val: serde_json::Value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be one JSON value: {e}\n{stdout}"));
    assert_eq!(val["schema"], "modernization");
    assert_eq!(val["has_data"], true);
    assert_eq!(val["summary"]["files_processed"], 1);
    assert_eq!(val["summary"]["files_failed"], 0);

    let labor = &val["labor"][0];
    assert_eq!(labor["ot"], "5001");
    assert_eq!(line_quantity(labor, "INSTALACION DE LUMINARIA CON CAMIONETA Y ESCALERA"), Some(1.0));
    assert_eq!(line_quantity(labor, "INSTALACION DE LUMINARIA CON CARRO CANASTA"), None);
    assert_eq!(line_quantity(labor, "TRANSPORTE DE LUMINARIA"), Some(1.0));

    let mut report = open_workbook_auto(&output).unwrap();
    assert_eq!(report.sheet_names(), vec!["OT_5001".to_string()]);
}

#[test]
fn unreadable_files_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.xlsx");
    let broken = dir.path().join("broken.xlsx");
    let output = dir.path().join("reporte.xlsx");
    write_survey(&good);
    std::fs::write(&broken, b"not a workbook").unwrap();

    let out = run(&[
        "process",
        path_str(&broken),
        path_str(&good),
        "--mode",
        "modernization",
        "-o",
        path_str(&output),
        "--json",
    ]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let val: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(val["summary"]["files_processed"], 1);
    assert_eq!(val["summary"]["files_failed"], 1);
}

#[test]
fn no_data_writes_error_sheet_and_exits_6() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("otro.xlsx");
    let output = dir.path().join("reporte.xlsx");
    write_unrelated(&input);

    let out = run(&["process", path_str(&input), "--mode", "maintenance", "-o", path_str(&output)]);
    assert_eq!(out.status.code(), Some(6), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("error sheet"));

    let mut report = open_workbook_auto(&output).unwrap();
    assert_eq!(report.sheet_names(), vec!["Errores".to_string()]);
}

#[test]
fn bad_catalog_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ronda1.xlsx");
    let catalog = dir.path().join("catalog.toml");
    let output = dir.path().join("reporte.xlsx");
    write_survey(&input);
    std::fs::write(&catalog, "[[template]]\ndescription = \"\"\n").unwrap();

    let out = run(&[
        "process",
        path_str(&input),
        "--mode",
        "modernization",
        "-o",
        path_str(&output),
        "--catalog",
        path_str(&catalog),
    ]);
    assert_eq!(out.status.code(), Some(4), "stderr: {}", stderr(&out));
    assert!(!output.exists());
}

#[test]
fn bad_config_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ronda1.xlsx");
    let config = dir.path().join("otledger.toml");
    let output = dir.path().join("reporte.xlsx");
    write_survey(&input);
    std::fs::write(&config, "[modernization]\nremoved_range = [\"BO\", \"BH\"]\n").unwrap();

    let out = run(&[
        "process",
        path_str(&input),
        "--mode",
        "modernization",
        "-o",
        path_str(&output),
        "--config",
        path_str(&config),
    ]);
    assert_eq!(out.status.code(), Some(3), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("reversed"));
}

#[test]
fn missing_output_directory_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ronda1.xlsx");
    write_survey(&input);
    let output = dir.path().join("nope").join("reporte.xlsx");

    let out = run(&["process", path_str(&input), "--mode", "modernization", "-o", path_str(&output)]);
    assert_eq!(out.status.code(), Some(2));
}

// ===========================================================================
// otledger catalog
// ===========================================================================

#[test]
fn catalog_json_lists_builtin_templates() {
    let out = run(&["catalog", "--json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let val: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let templates = val.as_array().expect("catalog is a JSON array");
    assert!(!templates.is_empty());
    let transport = templates
        .iter()
        .find(|t| t["description"] == "TRANSPORTE DE LUMINARIA")
        .unwrap();
    assert_eq!(transport["rule"]["kind"], "luminaire_transport");
    assert_eq!(transport["block"], "dismount_transport");
}
