//! `otledger-ledger`: Work-order ledger and labor inference engine.
//!
//! Pure engine crate: receives pre-loaded sheet tables, folds them into
//! per-work-order ledgers and infers labor quantities from a catalog.
//! No CLI or file-format dependencies.

pub mod catalog;
pub mod cell;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod identity;
pub mod labor;
pub mod ledger;
pub mod matcher;
pub mod measure;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod summary;
pub mod timestamp;

pub use catalog::{Block, Catalog, LaborTemplate, Rule};
pub use cell::{Cell, SheetTable};
pub use config::EngineConfig;
pub use engine::{run, BatchResult, Upload};
pub use error::LedgerError;
pub use extract::Schema;
pub use labor::{LaborAssignment, LaborEngine, LaborLine, OtLabor};
pub use model::{Batch, NodeId, NodeRecord, RowFact, WorkOrder};
