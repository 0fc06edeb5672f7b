//! External collaborators consumed by the control plane: the dataset
//! catalog and the audit sink.

use std::collections::HashMap;

use async_trait::async_trait;
use chartops_core::types::DbId;
use chartops_db::models::audit::CreateAuditLog;
use chartops_db::repositories::{AuditLogRepo, DatasetRepo};
use chartops_db::DbPool;
use tokio::sync::Mutex;

use crate::error::PipelineResult;

// ---------------------------------------------------------------------------
// Dataset catalog
// ---------------------------------------------------------------------------

/// The catalog could not answer. Validation reports this as an error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Dataset catalog unavailable: {0}")]
pub struct CatalogError(pub String);

#[async_trait]
pub trait DatasetCatalog: Send + Sync {
    async fn exists(&self, dataset_id: DbId) -> Result<bool, CatalogError>;

    /// Column names of a dataset known to exist.
    async fn columns(&self, dataset_id: DbId) -> Result<Vec<String>, CatalogError>;
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticDatasetCatalog {
    datasets: HashMap<DbId, Vec<String>>,
    unavailable: bool,
}

impl StaticDatasetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset<I, S>(mut self, dataset_id: DbId, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datasets
            .insert(dataset_id, columns.into_iter().map(Into::into).collect());
        self
    }

    /// A catalog whose every call fails.
    pub fn unavailable() -> Self {
        Self {
            datasets: HashMap::new(),
            unavailable: true,
        }
    }

    fn check_available(&self) -> Result<(), CatalogError> {
        if self.unavailable {
            return Err(CatalogError("catalog is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DatasetCatalog for StaticDatasetCatalog {
    async fn exists(&self, dataset_id: DbId) -> Result<bool, CatalogError> {
        self.check_available()?;
        Ok(self.datasets.contains_key(&dataset_id))
    }

    async fn columns(&self, dataset_id: DbId) -> Result<Vec<String>, CatalogError> {
        self.check_available()?;
        Ok(self.datasets.get(&dataset_id).cloned().unwrap_or_default())
    }
}

/// Catalog backed by the `datasets` table.
#[derive(Clone)]
pub struct PgDatasetCatalog {
    pool: DbPool,
}

impl PgDatasetCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatasetCatalog for PgDatasetCatalog {
    async fn exists(&self, dataset_id: DbId) -> Result<bool, CatalogError> {
        DatasetRepo::find_by_id(&self.pool, dataset_id)
            .await
            .map(|d| d.is_some())
            .map_err(|e| CatalogError(e.to_string()))
    }

    async fn columns(&self, dataset_id: DbId) -> Result<Vec<String>, CatalogError> {
        DatasetRepo::find_by_id(&self.pool, dataset_id)
            .await
            .map(|d| d.map(|d| d.column_names).unwrap_or_default())
            .map_err(|e| CatalogError(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Audit sink
// ---------------------------------------------------------------------------

/// One auditable action.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub actor_id: Option<DbId>,
    pub entity_type: &'static str,
    pub entity_id: DbId,
    pub action: &'static str,
    pub detail: Option<serde_json::Value>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(&self, entry: AuditEntry) -> PipelineResult<()>;
}

/// Send `entry` to `sink`, logging and discarding any failure. The action
/// being audited has already committed and is never undone.
pub async fn record_audit(sink: &dyn AuditSink, entry: AuditEntry) {
    let action = entry.action;
    let entity_id = entry.entity_id;
    if let Err(e) = sink.log(entry).await {
        tracing::warn!(error = %e, action, entity_id, "Failed to write audit entry");
    }
}

/// Audit sink that keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn log(&self, entry: AuditEntry) -> PipelineResult<()> {
        self.entries.lock().await.push(entry);
        Ok(())
    }
}

/// Audit sink writing to the `audit_logs` table.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: DbPool,
}

impl PgAuditSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn log(&self, entry: AuditEntry) -> PipelineResult<()> {
        let row = CreateAuditLog {
            actor_id: entry.actor_id,
            action_type: entry.action.to_string(),
            entity_type: entry.entity_type.to_string(),
            entity_id: entry.entity_id,
            details_json: entry.detail,
        };
        AuditLogRepo::insert(&self.pool, &row).await?;
        Ok(())
    }
}
