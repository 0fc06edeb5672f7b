//! Repository for the `datasets` catalog table.

use chartops_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::dataset::Dataset;

/// Column list for `datasets` queries.
const COLUMNS: &str = "id, name, column_names, created_at, updated_at";

/// Provides registration and lookup of datasets.
pub struct DatasetRepo;

impl DatasetRepo {
    /// Register a dataset and its column names.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        name: &str,
        column_names: &[String],
    ) -> Result<Dataset, sqlx::Error> {
        let query = format!(
            "INSERT INTO datasets (name, column_names) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Dataset>(&query)
            .bind(name)
            .bind(column_names)
            .fetch_one(executor)
            .await
    }

    /// Find a dataset by ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Dataset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM datasets WHERE id = $1");
        sqlx::query_as::<_, Dataset>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }
}
