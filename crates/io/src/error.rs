use std::fmt;

#[derive(Debug)]
pub enum IoError {
    /// The workbook could not be opened or is not a spreadsheet.
    Open { path: String, message: String },
    /// One sheet of an opened workbook could not be read.
    Sheet { sheet: String, message: String },
    /// The report could not be assembled or saved.
    Write(String),
    /// The catalog file could not be read or is invalid.
    Catalog(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, message } => write!(f, "cannot open '{path}': {message}"),
            Self::Sheet { sheet, message } => write!(f, "cannot read sheet '{sheet}': {message}"),
            Self::Write(msg) => write!(f, "report write error: {msg}"),
            Self::Catalog(msg) => write!(f, "catalog error: {msg}"),
        }
    }
}

impl std::error::Error for IoError {}

impl From<rust_xlsxwriter::XlsxError> for IoError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Self::Write(e.to_string())
    }
}
