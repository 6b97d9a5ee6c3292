//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 2    | Usage error (bad arguments)                               |
//! | 3    | Engine config could not be read or failed validation      |
//! | 4    | Labor catalog could not be loaded                         |
//! | 5    | Report assembly failed (nothing usable was written)       |
//! | 6    | No work order produced data (error sheet was written)     |
//!
//! File and row failures inside a batch never change the exit code; they
//! are logged and counted in the batch summary.

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// `--config` could not be read, parsed or validated.
pub const EXIT_CONFIG: u8 = 3;

/// `--catalog` could not be read or has invalid templates.
pub const EXIT_CATALOG: u8 = 4;

/// The result workbook could not be assembled or saved.
pub const EXIT_REPORT: u8 = 5;

/// The batch produced no data. The report holds only the error sheet.
pub const EXIT_NO_DATA: u8 = 6;
