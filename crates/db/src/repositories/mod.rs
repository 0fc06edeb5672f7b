//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Every method issues a single statement against any `PgExecutor`, so the
//! same call works on the pool or inside a caller-owned transaction
//! (`&mut *tx`), where the control plane holds its row locks.

pub mod audit_repo;
pub mod build_job_repo;
pub mod build_task_repo;
pub mod chart_definition_repo;
pub mod chart_version_repo;
pub mod dataset_repo;

pub use audit_repo::AuditLogRepo;
pub use build_job_repo::BuildJobRepo;
pub use build_task_repo::BuildTaskRepo;
pub use chart_definition_repo::ChartDefinitionRepo;
pub use chart_version_repo::ChartVersionRepo;
pub use dataset_repo::DatasetRepo;
