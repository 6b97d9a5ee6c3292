// Workbook reading: any calamine-supported file → SheetTables.
//
// The first row of each sheet's used range is the header row. Rows and
// headers are padded with the range's starting column so that column
// positions (and therefore column letters) match what the user sees.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use otledger_ledger::normalize::format_number;
use otledger_ledger::{Cell, SheetTable, Upload};

use crate::error::IoError;

/// Convert an Excel serial date (1900 system) to a timestamp.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match serial_to_datetime(dt.as_f64()) {
            Some(ts) => Cell::DateTime(ts),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
    }
}

fn header_text(data: &Data) -> String {
    match data {
        Data::String(s) => s.clone(),
        Data::Float(n) => format_number(*n),
        Data::Int(n) => n.to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Read every sheet of a workbook.
pub fn read_workbook(path: &Path) -> Result<Vec<SheetTable>, IoError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| IoError::Open {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(IoError::Open {
            path: path.display().to_string(),
            message: "workbook contains no sheets".into(),
        });
    }

    let mut tables = Vec::with_capacity(sheet_names.len());
    for name in &sheet_names {
        let range = workbook.worksheet_range(name).map_err(|e| IoError::Sheet {
            sheet: name.clone(),
            message: e.to_string(),
        })?;

        let (_, start_col) = range.start().unwrap_or((0, 0));
        let pad = start_col as usize;
        let mut rows = range.rows();

        let Some(header_row) = rows.next() else {
            tables.push(SheetTable::new(name.clone(), Vec::new()));
            continue;
        };
        let mut headers = vec![String::new(); pad];
        headers.extend(header_row.iter().map(header_text));

        let mut table = SheetTable::new(name.clone(), headers);
        for row in rows {
            if row.iter().all(|d| matches!(d, Data::Empty)) {
                continue;
            }
            let mut cells = vec![Cell::Empty; pad];
            cells.extend(row.iter().map(to_cell));
            table.rows.push(cells);
        }
        log::debug!("{}: sheet '{}' has {} data row(s)", path.display(), name, table.rows.len());
        tables.push(table);
    }
    Ok(tables)
}

/// Read a file as an engine upload. Read failures are carried inside the
/// upload so the batch accounts for them instead of aborting.
pub fn read_upload(path: &Path) -> Upload {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match read_workbook(path) {
        Ok(sheets) => Upload::new(name, sheets),
        Err(e) => Upload::failed(name, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn serial_dates() {
        let ts = serial_to_datetime(45414.5).unwrap();
        assert_eq!(ts.to_string(), "2024-05-02 12:00:00");
        assert_eq!(serial_to_datetime(f64::NAN), None);
    }

    #[test]
    fn reads_headers_and_typed_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet().set_name("Datos").unwrap();
        sheet.write_string(0, 1, "2.Nro de O.T.").unwrap();
        sheet.write_string(0, 2, "MATERIAL 1").unwrap();
        sheet.write_number(1, 1, 4501.0).unwrap();
        sheet.write_string(1, 2, "CABLE").unwrap();
        sheet.write_boolean(2, 1, true).unwrap();
        workbook.save(&path).unwrap();

        let tables = read_workbook(&path).unwrap();
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.name, "Datos");
        // Column B stays column B even though column A is empty.
        assert_eq!(table.column("2.Nro de O.T."), Some(1));
        assert_eq!(table.rows[0][1], Cell::Number(4501.0));
        assert_eq!(table.rows[0][2], Cell::Text("CABLE".into()));
        assert_eq!(table.rows[1][1], Cell::Bool(true));
    }

    #[test]
    fn unreadable_file_becomes_failed_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a workbook").unwrap();

        let upload = read_upload(&path);
        assert_eq!(upload.name, "broken.xlsx");
        assert!(upload.sheets.is_err());
        assert!(matches!(read_workbook(&path), Err(IoError::Open { .. })));
    }
}
