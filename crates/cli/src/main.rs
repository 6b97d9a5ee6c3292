// otledger - work-order ledgers and labor reports from field-survey workbooks

mod catalog;
mod exit_codes;
mod process;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use otledger_ledger::{Catalog, EngineConfig, Schema};
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_CATALOG, EXIT_CONFIG, EXIT_NO_DATA, EXIT_REPORT, EXIT_SUCCESS, EXIT_USAGE};

/// Environment variable holding the log filter (`info` when unset).
pub const LOG_ENV: &str = "OTLEDGER_LOG";

#[derive(Parser)]
#[command(name = "otledger")]
#[command(about = "Fold field-survey workbooks into per-OT ledgers and labor reports")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a batch of survey workbooks into a report workbook
    #[command(after_help = "\
Examples:
  otledger process ronda1.xlsx ronda2.xlsx --mode modernization -o reporte.xlsx
  otledger process mant.xlsx --mode maintenance -o mant_reporte.xlsx --json
  otledger process *.xlsx --mode modernization -o out.xlsx --catalog mano_de_obra.xlsx")]
    Process {
        /// Workbooks to fold into one batch (xlsx, xls, ods)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Row schema of the input workbooks
        #[arg(long, short = 'm', value_enum)]
        mode: Mode,

        /// Report workbook to write
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Labor catalog (.toml or a workbook); built-in catalog when omitted
        #[arg(long, env = "OTLEDGER_CATALOG")]
        catalog: Option<PathBuf>,

        /// Engine config TOML; defaults when omitted
        #[arg(long, env = "OTLEDGER_CONFIG")]
        config: Option<PathBuf>,

        /// Print the batch result as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Show the labor catalog with the rule and block inferred for each line
    Catalog {
        /// Labor catalog (.toml or a workbook); built-in catalog when omitted
        #[arg(long, env = "OTLEDGER_CATALOG")]
        catalog: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    #[value(alias = "modernizacion")]
    Modernization,
    #[value(alias = "mantenimiento")]
    Maintenance,
}

impl From<Mode> for Schema {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Modernization => Schema::Modernization,
            Mode::Maintenance => Schema::Maintenance,
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("OTLEDGER_COMMIT"), ")",
        "\nengine:  otledger-ledger ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("OTLEDGER_TARGET"),
    )
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    // `init` also installs the log → tracing bridge for the library crates.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Process {
            files,
            mode,
            output,
            catalog,
            config,
            json,
        } => process::cmd_process(&files, mode.into(), &output, catalog.as_deref(), config.as_deref(), json),
        Commands::Catalog { catalog, json } => catalog::cmd_catalog(catalog.as_deref(), json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CATALOG, message: msg.into(), hint: None }
    }

    pub fn report(msg: impl Into<String>) -> Self {
        Self { code: EXIT_REPORT, message: msg.into(), hint: None }
    }

    pub fn no_data(msg: impl Into<String>) -> Self {
        Self { code: EXIT_NO_DATA, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Shared option loading
// ============================================================================

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::config(format!("{}: {}", path.display(), e)))?;
    EngineConfig::from_toml(&text).map_err(|e| CliError::config(format!("{}: {}", path.display(), e)))
}

pub fn load_catalog(path: Option<&Path>) -> Result<Catalog, CliError> {
    match path {
        Some(path) => otledger_io::load_catalog(path).map_err(|e| {
            CliError::catalog(e.to_string())
                .with_hint("a catalog workbook needs 'DESCRIPCION MANO DE OBRA' and 'UNIDAD' columns")
        }),
        None => Catalog::builtin().map_err(|e| CliError::catalog(e.to_string())),
    }
}
