use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::{
    application::pagination::{Page, PageRequest},
    application::repos::{DemoQueryFilter, DemoReader, DemoWriter, RepoError},
    application::session::{ChangeKind, StampedChange},
    domain::entities::DemoRecord,
};

use super::PostgresRepositories;
use super::schema::DEMO_TABLE;
use super::util::{convert_count, map_sqlx_error};

/// Raw fast path: no filters, no ordering, first `$1` rows as stored.
const TOP_RECORDS_SQL: &str = "SELECT id, name, age, created_at, modified_at FROM demo LIMIT $1";

#[derive(sqlx::FromRow)]
struct DemoRow {
    id: Uuid,
    name: String,
    age: Option<i32>,
    created_at: OffsetDateTime,
    modified_at: OffsetDateTime,
}

impl From<DemoRow> for DemoRecord {
    fn from(row: DemoRow) -> Self {
        DemoRecord::restore(row.id, row.name, row.age, row.created_at, row.modified_at)
    }
}

fn select_demo() -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(DEMO_TABLE.select_list());
    qb.push(" FROM ");
    qb.push(DEMO_TABLE.table);
    qb.push(" WHERE 1=1");
    qb
}

fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, filter: &DemoQueryFilter) {
    if let Some(name) = filter.name.as_deref() {
        qb.push(" AND name ILIKE ");
        qb.push_bind(format!("%{}%", escape_like(name)));
    }
    if let Some(age) = filter.age {
        qb.push(" AND age = ");
        qb.push_bind(age);
    }
    if let Some(min_age) = filter.min_age {
        qb.push(" AND age >= ");
        qb.push_bind(min_age);
    }
}

/// Match user input literally inside an `ILIKE` pattern.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl DemoReader for PostgresRepositories {
    async fn list_all(&self) -> Result<Vec<DemoRecord>, RepoError> {
        let mut qb = select_demo();
        qb.push(" ORDER BY ");
        qb.push(DEMO_TABLE.page_order);

        let rows = qb
            .build_query_as::<DemoRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DemoRecord::from).collect())
    }

    async fn find_by_key(&self, id: Uuid) -> Result<Option<DemoRecord>, RepoError> {
        let mut qb = select_demo();
        qb.push(" AND ");
        qb.push(DEMO_TABLE.key);
        qb.push(" = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<DemoRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(DemoRecord::from))
    }

    async fn get_page(
        &self,
        page: PageRequest,
        filter: &DemoQueryFilter,
    ) -> Result<Page<DemoRecord>, RepoError> {
        let offset = i64::try_from(page.offset())
            .map_err(|_| RepoError::invalid_input("page offset exceeds supported range"))?;

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
        count_qb.push(DEMO_TABLE.table);
        count_qb.push(" WHERE 1=1");
        push_filter(&mut count_qb, filter);

        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = select_demo();
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY ");
        qb.push(DEMO_TABLE.page_order);
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(page.page_size()));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<DemoRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Page::new(
            rows.into_iter().map(DemoRecord::from).collect(),
            convert_count(total)?,
            page,
        ))
    }

    async fn top_records(&self, count: i64) -> Result<Vec<DemoRecord>, RepoError> {
        if count < 0 {
            return Err(RepoError::invalid_input("count must not be negative"));
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, DemoRow>(TOP_RECORDS_SQL)
            .bind(count)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DemoRecord::from).collect())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl DemoWriter for PostgresRepositories {
    async fn apply(&self, changes: &[StampedChange]) -> Result<(), RepoError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        for change in changes {
            apply_change(&mut tx, change).await?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(
            target = "scaffold::infra::db::demo",
            changes = changes.len(),
            "demo batch committed"
        );
        Ok(())
    }
}

/// Execute one change inside the batch transaction.
///
/// Returning early drops `tx`, which rolls the whole batch back.
async fn apply_change(
    tx: &mut Transaction<'_, Postgres>,
    change: &StampedChange,
) -> Result<(), RepoError> {
    let record = change.record();
    let mut qb: QueryBuilder<'_, Postgres> = match change.kind() {
        ChangeKind::Added => {
            let mut qb = QueryBuilder::new("INSERT INTO ");
            qb.push(DEMO_TABLE.table);
            qb.push(" (");
            qb.push(DEMO_TABLE.select_list());
            qb.push(") VALUES (");
            let mut values = qb.separated(", ");
            values.push_bind(record.id());
            values.push_bind(record.name().to_string());
            values.push_bind(record.age());
            values.push_bind(record.created_at());
            values.push_bind(record.modified_at());
            values.push_unseparated(")");
            qb
        }
        ChangeKind::Modified => {
            let mut qb = QueryBuilder::new("UPDATE ");
            qb.push(DEMO_TABLE.table);
            qb.push(" SET name = ");
            qb.push_bind(record.name().to_string());
            qb.push(", age = ");
            qb.push_bind(record.age());
            qb.push(", modified_at = ");
            qb.push_bind(record.modified_at());
            qb.push(" WHERE ");
            qb.push(DEMO_TABLE.key);
            qb.push(" = ");
            qb.push_bind(record.id());
            qb
        }
        ChangeKind::Deleted => {
            let mut qb = QueryBuilder::new("DELETE FROM ");
            qb.push(DEMO_TABLE.table);
            qb.push(" WHERE ");
            qb.push(DEMO_TABLE.key);
            qb.push(" = ");
            qb.push_bind(record.id());
            qb
        }
    };

    let result = qb
        .build()
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

    if result.rows_affected() == 0 {
        debug!(
            target = "scaffold::infra::db::demo",
            demo_id = %record.id(),
            change = change.kind().as_str(),
            "change matched no row"
        );
        return Err(RepoError::NotFound);
    }
    Ok(())
}
