use std::sync::Arc;

use chartops_db::DbPool;
use chartops_pipeline::{
    AuditSink, BuildOrchestrator, BuildStore, DatasetCatalog, LedgerStore, MemoryAuditSink,
    MemoryStore, PgAuditSink, PgDatasetCatalog, PgStore, PipelineConfig, ValidationPipeline,
    VersionLedger,
};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every component sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database pool, absent when running on the in-memory store.
    pub pool: Option<DbPool>,
    pub ledger: Arc<VersionLedger>,
    pub validation: Arc<ValidationPipeline>,
    pub orchestrator: Arc<BuildOrchestrator>,
    /// Control-plane tunables, also read by the stateless formula routes.
    pub config: PipelineConfig,
}

impl AppState {
    /// Control plane backed by Postgres.
    pub fn postgres(pool: DbPool, config: PipelineConfig) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        let audit: Arc<dyn AuditSink> = Arc::new(PgAuditSink::new(pool.clone()));
        let catalog = Arc::new(PgDatasetCatalog::new(pool.clone()));
        Self::assemble(Some(pool), store.clone(), store, catalog, audit, config)
    }

    /// Control plane backed by process memory, for tests and local tooling.
    pub fn in_memory(catalog: Arc<dyn DatasetCatalog>, config: PipelineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let audit: Arc<dyn AuditSink> = Arc::new(MemoryAuditSink::new());
        Self::assemble(None, store.clone(), store, catalog, audit, config)
    }

    fn assemble(
        pool: Option<DbPool>,
        ledger_store: Arc<dyn LedgerStore>,
        build_store: Arc<dyn BuildStore>,
        catalog: Arc<dyn DatasetCatalog>,
        audit: Arc<dyn AuditSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            pool,
            ledger: Arc::new(VersionLedger::new(ledger_store.clone(), audit.clone())),
            validation: Arc::new(ValidationPipeline::new(
                ledger_store,
                catalog,
                audit.clone(),
                config.clone(),
            )),
            orchestrator: Arc::new(BuildOrchestrator::new(build_store, audit, config.clone())),
            config,
        }
    }
}
