// Report projection: one worksheet per work order, or a single error sheet
// when the batch produced no data.
//
// Sheet layout, top to bottom:
//   OT row, NODOS row (nodes in sync order + TOTAL), installed code rows,
//   MATERIALES INSTALADOS, MATERIALES RETIRADOS, OBSERVACIONES,
//   labor table grouped by block with a VALOR TOTAL formula per line.

use std::collections::HashSet;
use std::path::Path;

use otledger_ledger::ledger::{LuminaireCodes, MaterialLedger};
use otledger_ledger::model::NodeRecord;
use otledger_ledger::{BatchResult, OtLabor, WorkOrder};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};

use crate::error::IoError;

pub const ERROR_SHEET: &str = "Errores";

pub const ERROR_LINES: [&str; 4] = [
    "Datos no válidos - Razones posibles:",
    "1. Columnas requeridas faltantes",
    "2. Valores \"NINGUNO\" o 0 en todos los registros",
    "3. Formato de archivo incorrecto",
];

pub const LABOR_HEADERS: [&str; 5] = [
    "DESCRIPCION MANO DE OBRA",
    "UNIDAD",
    "CANTIDAD",
    "VALOR UNITARIO",
    "VALOR TOTAL",
];

const LABOR_WIDTHS: [f64; 5] = [45.0, 10.0, 12.0, 15.0, 15.0];
const MAX_SHEET_NAME: usize = 31;

struct Formats {
    bold: Format,
    cell: Format,
    header: Format,
    money: Format,
    money_bold: Format,
}

impl Formats {
    fn new() -> Self {
        let cell = Format::new().set_border(FormatBorder::Thin);
        Self {
            bold: Format::new().set_bold(),
            header: cell.clone().set_bold().set_align(FormatAlign::Center),
            money: cell.clone().set_num_format("\"$ \"#,##0.00"),
            money_bold: cell.clone().set_bold().set_num_format("\"$ \"#,##0.00"),
            cell,
        }
    }
}

/// Write the report for `result` to `path`. Returns the number of sheets.
pub fn write_report(result: &BatchResult, path: &Path) -> Result<usize, IoError> {
    let (mut workbook, sheets) = build_workbook(result)?;
    workbook.save(path)?;
    log::info!("report written to {} ({sheets} sheet(s))", path.display());
    Ok(sheets)
}

/// Render the report into an in-memory xlsx file.
pub fn write_report_to_buffer(result: &BatchResult) -> Result<Vec<u8>, IoError> {
    let (mut workbook, _) = build_workbook(result)?;
    Ok(workbook.save_to_buffer()?)
}

fn build_workbook(result: &BatchResult) -> Result<(Workbook, usize), IoError> {
    let mut workbook = Workbook::new();
    let formats = Formats::new();

    if !result.has_data() {
        log::warn!("no work order produced data; writing '{ERROR_SHEET}' sheet only");
        write_error_sheet(workbook.add_worksheet().set_name(ERROR_SHEET)?, &formats)?;
        return Ok((workbook, 1));
    }

    let mut used_names = HashSet::new();
    let mut sheets = 0;
    // Every OT gets a sheet, even one whose rows carried nothing but nodes.
    for order in result.batch.orders() {
        let name = unique_sheet_name(&order.ot, &mut used_names);
        let worksheet = workbook.add_worksheet().set_name(&name)?;
        let labor = result.labor_for(&order.ot);
        write_order_sheet(worksheet, order, labor, &formats)?;
        sheets += 1;
    }
    Ok((workbook, sheets))
}

fn write_error_sheet(worksheet: &mut Worksheet, formats: &Formats) -> Result<(), IoError> {
    worksheet.set_column_width(0, 60)?;
    for (row, line) in ERROR_LINES.iter().enumerate() {
        if row == 0 {
            worksheet.write_string_with_format(0, 0, *line, &formats.bold)?;
        } else {
            worksheet.write_string(row as u32, 0, *line)?;
        }
    }
    Ok(())
}

/// `OT_{ot}` with characters Excel rejects replaced, cut to 31 characters
/// and made unique (case-insensitively) within the workbook.
pub fn unique_sheet_name(ot: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = format!("OT_{ot}")
        .chars()
        .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_end_matches('\'').to_string();
    let base: String = cleaned.chars().take(MAX_SHEET_NAME).collect();

    let mut candidate = base.clone();
    let mut n = 2;
    while !used.insert(candidate.to_lowercase()) {
        let suffix = format!("_{n}");
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        candidate = base.chars().take(keep).collect::<String>() + &suffix;
        n += 1;
    }
    candidate
}

fn column(index: usize) -> Result<u16, IoError> {
    u16::try_from(index).map_err(|_| IoError::Write(format!("column {index} is out of range")))
}

fn write_order_sheet(
    worksheet: &mut Worksheet,
    order: &WorkOrder,
    labor: Option<&OtLabor>,
    formats: &Formats,
) -> Result<(), IoError> {
    let nodes = order.ordered_nodes();
    let total_col = column(nodes.len() + 1)?;
    let mut row: u32 = 0;

    for (col, width) in LABOR_WIDTHS.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }

    worksheet.write_string_with_format(row, 0, "OT", &formats.header)?;
    worksheet.write_string_with_format(row, 1, &order.ot, &formats.cell)?;
    row += 1;

    worksheet.write_string_with_format(row, 0, "NODOS", &formats.header)?;
    for (i, node) in nodes.iter().enumerate() {
        worksheet.write_string_with_format(row, column(i + 1)?, node.node_id.as_str(), &formats.header)?;
    }
    worksheet.write_string_with_format(row, total_col, "TOTAL", &formats.header)?;
    row += 1;

    row = write_code_rows(worksheet, row, &order.codes_n1, &nodes, total_col, formats)?;
    row = write_code_rows(worksheet, row, &order.codes_n2, &nodes, total_col, formats)?;

    row = write_ledger_section(worksheet, row, "MATERIALES INSTALADOS", &order.installed, &nodes, total_col, formats)?;
    row = write_ledger_section(worksheet, row, "MATERIALES RETIRADOS", &order.removed, &nodes, total_col, formats)?;

    worksheet.write_string_with_format(row, 0, "OBSERVACIONES", &formats.header)?;
    for (i, node) in nodes.iter().enumerate() {
        let text = order
            .observations
            .get(&node.node_id)
            .map(|set| set.iter().cloned().collect::<Vec<_>>().join("; "))
            .unwrap_or_default();
        worksheet.write_string_with_format(row, column(i + 1)?, &text, &formats.cell)?;
    }
    row += 2;

    if let Some(labor) = labor {
        write_labor_table(worksheet, row, labor, formats)?;
    }
    Ok(())
}

fn write_code_rows(
    worksheet: &mut Worksheet,
    mut row: u32,
    codes: &LuminaireCodes,
    nodes: &[&NodeRecord],
    total_col: u16,
    formats: &Formats,
) -> Result<u32, IoError> {
    for (key, _) in codes.iter() {
        worksheet.write_string_with_format(row, 0, key.to_string(), &formats.bold)?;
        for (i, node) in nodes.iter().enumerate() {
            let joined = codes
                .codes(key, &node.node_id)
                .map(|set| set.iter().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            worksheet.write_string_with_format(row, column(i + 1)?, &joined, &formats.cell)?;
        }
        worksheet.write_number_with_format(row, total_col, codes.count(key) as f64, &formats.cell)?;
        row += 1;
    }
    Ok(row)
}

fn write_ledger_section(
    worksheet: &mut Worksheet,
    mut row: u32,
    title: &str,
    ledger: &MaterialLedger,
    nodes: &[&NodeRecord],
    total_col: u16,
    formats: &Formats,
) -> Result<u32, IoError> {
    row += 1;
    worksheet.merge_range(row, 0, row, total_col, title, &formats.header)?;
    row += 1;

    for key in ledger.keys() {
        worksheet.write_string_with_format(row, 0, key, &formats.cell)?;
        for (i, node) in nodes.iter().enumerate() {
            let qty = ledger.quantity(key, &node.node_id);
            let col = column(i + 1)?;
            if qty > 0.0 {
                worksheet.write_number_with_format(row, col, qty, &formats.cell)?;
            } else {
                worksheet.write_blank(row, col, &formats.cell)?;
            }
        }
        worksheet.write_number_with_format(row, total_col, ledger.total(key), &formats.cell)?;
        row += 1;
    }
    Ok(row)
}

fn write_labor_table(worksheet: &mut Worksheet, mut row: u32, labor: &OtLabor, formats: &Formats) -> Result<u32, IoError> {
    for (col, header) in LABOR_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(row, col as u16, *header, &formats.header)?;
    }
    row += 1;

    let first_line_row = row + 1;
    for (block, lines) in labor.by_block() {
        worksheet.merge_range(row, 0, row, 4, block.title(), &formats.header)?;
        row += 1;
        for line in lines {
            let excel_row = row + 1;
            worksheet.write_string_with_format(row, 0, &line.description, &formats.cell)?;
            worksheet.write_string_with_format(row, 1, &line.unit, &formats.cell)?;
            worksheet.write_number_with_format(row, 2, line.quantity, &formats.cell)?;
            worksheet.write_number_with_format(row, 3, line.unit_price, &formats.money)?;
            worksheet.write_formula_with_format(row, 4, format!("=C{excel_row}*D{excel_row}").as_str(), &formats.money)?;
            row += 1;
        }
    }

    if !labor.lines.is_empty() {
        worksheet.write_string_with_format(row, 3, "TOTAL", &formats.header)?;
        worksheet.write_formula_with_format(row, 4, format!("=SUM(E{first_line_row}:E{row})").as_str(), &formats.money_bold)?;
        row += 1;
    }
    Ok(row)
}
