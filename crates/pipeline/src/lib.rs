//! The chart definition control plane.
//!
//! - [`VersionLedger`] snapshots every change to a definition and supports
//!   history, diff and rollback.
//! - [`ValidationPipeline`] checks dataset availability, payload contracts and
//!   formula safety, and grants auto-approval.
//! - [`BuildOrchestrator`] fans build requests out into jobs and tasks and
//!   owns every job/task state transition.
//!
//! Persistence goes through the [`LedgerStore`] and [`BuildStore`] seams,
//! implemented by [`PgStore`] and [`MemoryStore`]. Both apply the same pure
//! rules from [`revision`] and [`transitions`] while holding their lock.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod revision;
pub mod store;
pub mod transitions;
pub mod validation;

pub use collaborators::{
    AuditEntry, AuditSink, CatalogError, DatasetCatalog, MemoryAuditSink, PgAuditSink,
    PgDatasetCatalog, StaticDatasetCatalog,
};
pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use ledger::{VersionComparison, VersionLedger};
pub use orchestrator::{BuildJobDetail, BuildOrchestrator};
pub use store::{BuildScope, BuildStore, LedgerStore, MemoryStore, PgStore, TaskUpdate};
pub use validation::{ValidationPipeline, ValidationReport};
