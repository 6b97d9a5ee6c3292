use std::fmt;

#[derive(Debug)]
pub enum LedgerError {
    /// A sheet lacks one or more required columns for the selected schema.
    SchemaMismatch { sheet: String, missing: Vec<String> },
    /// A whole uploaded file could not be processed.
    FileProcessing { file: String, message: String },
    /// TOML parse / deserialization error in the engine config.
    ConfigParse(String),
    /// Config validation error (bad column letters, non-positive thresholds, etc.).
    ConfigValidation(String),
    /// TOML parse / deserialization error in a labor catalog.
    CatalogParse(String),
    /// Catalog validation error (empty catalog, blank description, etc.).
    CatalogValidation(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaMismatch { sheet, missing } => {
                write!(f, "sheet '{sheet}': missing column(s) {}", missing.join(", "))
            }
            Self::FileProcessing { file, message } => {
                write!(f, "file '{file}': {message}")
            }
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::CatalogParse(msg) => write!(f, "catalog parse error: {msg}"),
            Self::CatalogValidation(msg) => write!(f, "catalog validation error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}
