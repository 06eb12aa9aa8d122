//! Static table registry.
//!
//! Every persisted entity declares its table layout here. The Postgres
//! backend builds its statements from these descriptors, and startup checks
//! them against the live catalog after migrations have run.

use sqlx::PgPool;
use tracing::debug;

use crate::application::repos::RepoError;

use super::util::map_sqlx_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMapping {
    pub table: &'static str,
    pub key: &'static str,
    /// Columns in select order; the key comes first.
    pub columns: &'static [&'static str],
    /// Deterministic order for the query-builder read path.
    pub page_order: &'static str,
}

impl TableMapping {
    pub fn select_list(&self) -> String {
        self.columns.join(", ")
    }
}

pub const DEMO_TABLE: TableMapping = TableMapping {
    table: "demo",
    key: "id",
    columns: &["id", "name", "age", "created_at", "modified_at"],
    page_order: "created_at ASC, id ASC",
};

pub const REGISTERED_TABLES: &[TableMapping] = &[DEMO_TABLE];

/// Confirm every registered column exists in the connected database.
pub async fn verify_schema(pool: &PgPool, tables: &[TableMapping]) -> Result<(), RepoError> {
    for mapping in tables {
        let present: Vec<String> = sqlx::query_scalar(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1",
        )
        .bind(mapping.table)
        .fetch_all(pool)
        .await
        .map_err(map_sqlx_error)?;

        let missing: Vec<&str> = mapping
            .columns
            .iter()
            .copied()
            .filter(|column| !present.iter().any(|name| name == column))
            .collect();

        if !missing.is_empty() {
            return Err(RepoError::Integrity {
                message: format!(
                    "table `{}` is missing columns: {}",
                    mapping.table,
                    missing.join(", ")
                ),
            });
        }

        debug!(
            target = "scaffold::infra::db",
            table = mapping.table,
            columns = mapping.columns.len(),
            "table mapping verified"
        );
    }
    Ok(())
}
