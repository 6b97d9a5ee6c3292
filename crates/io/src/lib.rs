//! `otledger-io`: Spreadsheet boundary for otledger.
//!
//! Reads uploaded workbooks (xlsx, xls, ods) into engine `SheetTable`s,
//! loads labor catalogs and writes the per-OT result workbook.

pub mod catalog;
pub mod error;
pub mod report;
pub mod workbook;

pub use catalog::load_catalog;
pub use error::IoError;
pub use report::{write_report, write_report_to_buffer};
pub use workbook::{read_upload, read_workbook};
