use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest, PaginationError};
use crate::application::repos::{DemoQueryFilter, DemoReader, DemoWriter, RepoError};
use crate::application::session::DemoSession;
use crate::cache::EntityCache;
use crate::domain::clock::Clock;
use crate::domain::entities::DemoRecord;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("demo `{0}` not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Persistence(#[from] RepoError),
}

impl From<DomainError> for DemoError {
    fn from(error: DomainError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<PaginationError> for DemoError {
    fn from(error: PaginationError) -> Self {
        Self::Validation(error.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateDemoCommand {
    pub name: Option<String>,
    pub age: Option<i32>,
}

/// Full replacement of the mutable fields; an absent age clears it.
#[derive(Debug, Clone)]
pub struct UpdateDemoCommand {
    pub id: Uuid,
    pub name: Option<String>,
    pub age: Option<i32>,
}

#[derive(Clone)]
pub struct DemoService {
    reader: Arc<dyn DemoReader>,
    writer: Arc<dyn DemoWriter>,
    clock: Arc<dyn Clock>,
    cache: Arc<EntityCache<Uuid, DemoRecord>>,
    max_page_size: u32,
}

impl DemoService {
    pub fn new(
        reader: Arc<dyn DemoReader>,
        writer: Arc<dyn DemoWriter>,
        clock: Arc<dyn Clock>,
        cache: Arc<EntityCache<Uuid, DemoRecord>>,
        max_page_size: u32,
    ) -> Self {
        Self {
            reader,
            writer,
            clock,
            cache,
            max_page_size,
        }
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    pub fn cache(&self) -> &EntityCache<Uuid, DemoRecord> {
        &self.cache
    }

    fn session(&self) -> DemoSession {
        DemoSession::new(self.writer.clone(), self.clock.clone())
    }

    pub async fn create(&self, command: CreateDemoCommand) -> Result<DemoRecord, DemoError> {
        let name = command.name.unwrap_or_default();
        let record = DemoRecord::new(&name, command.age, self.clock.now())?;
        let id = record.id();

        let mut session = self.session();
        session.add(record);
        let created = single_written(session.commit().await, id)?;

        info!(
            target = "scaffold::application::demo",
            demo_id = %created.id(),
            "demo created"
        );
        Ok(created)
    }

    pub async fn update(&self, command: UpdateDemoCommand) -> Result<DemoRecord, DemoError> {
        let UpdateDemoCommand { id, name, age } = command;
        let name = name.unwrap_or_default();

        let mut record = self
            .reader
            .find_by_key(id)
            .await?
            .ok_or(DemoError::NotFound(id))?;
        record.rename(&name)?;
        record.set_age(age)?;

        let mut session = self.session();
        session.update(record);
        let updated = single_written(session.commit().await, id)?;

        info!(
            target = "scaffold::application::demo",
            demo_id = %id,
            "demo updated"
        );
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DemoError> {
        let Some(record) = self.reader.find_by_key(id).await? else {
            warn!(
                target = "scaffold::application::demo",
                demo_id = %id,
                "delete requested for missing demo"
            );
            return Err(DemoError::NotFound(id));
        };

        let mut session = self.session();
        session.remove(record);
        session.commit().await.map_err(|err| commit_error(err, id))?;

        info!(
            target = "scaffold::application::demo",
            demo_id = %id,
            "demo deleted"
        );
        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<DemoRecord>, DemoError> {
        self.reader.list_all().await.map_err(DemoError::from)
    }

    pub async fn find(&self, id: Uuid) -> Result<DemoRecord, DemoError> {
        self.reader
            .find_by_key(id)
            .await?
            .ok_or(DemoError::NotFound(id))
    }

    /// Cache-or-compute lookup. Entries are not refreshed by writes.
    pub async fn find_cached(&self, id: Uuid) -> Result<DemoRecord, DemoError> {
        let reader = self.reader.clone();
        self.cache
            .get_or_try_insert_with(id, || async move { reader.find_by_key(id).await })
            .await?
            .ok_or(DemoError::NotFound(id))
    }

    pub async fn page(
        &self,
        page_index: u32,
        page_size: u32,
        filter: DemoQueryFilter,
    ) -> Result<Page<DemoRecord>, DemoError> {
        let request = PageRequest::new(page_index, page_size, self.max_page_size)?;
        self.reader
            .get_page(request, &filter.normalized())
            .await
            .map_err(DemoError::from)
    }

    pub async fn top(&self, count: i64) -> Result<Vec<DemoRecord>, DemoError> {
        if count < 0 {
            return Err(DemoError::Validation(
                "count must not be negative".to_string(),
            ));
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        self.reader
            .top_records(count)
            .await
            .map_err(DemoError::from)
    }

    pub async fn health_check(&self) -> Result<(), RepoError> {
        self.reader.health_check().await
    }
}

fn commit_error(error: RepoError, id: Uuid) -> DemoError {
    match error {
        RepoError::NotFound => DemoError::NotFound(id),
        other => DemoError::Persistence(other),
    }
}

fn single_written(
    result: Result<Vec<DemoRecord>, RepoError>,
    id: Uuid,
) -> Result<DemoRecord, DemoError> {
    result
        .map_err(|err| commit_error(err, id))?
        .into_iter()
        .find(|record| record.id() == id)
        .ok_or_else(|| {
            DemoError::Persistence(RepoError::Integrity {
                message: format!("commit did not return demo `{id}`"),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::domain::clock::ManualClock;
    use crate::infra::memory::MemoryRepositories;
    use time::Duration;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-06-01 12:00:00 UTC);

    fn service() -> (DemoService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let repos = Arc::new(MemoryRepositories::new());
        let cache = Arc::new(EntityCache::new(&CacheConfig::default(), clock.clone()));
        let service = DemoService::new(repos.clone(), repos, clock.clone(), cache, 100);
        (service, clock)
    }

    #[tokio::test]
    async fn create_requires_a_name() {
        let (service, _) = service();
        let err = service
            .create(CreateDemoCommand::default())
            .await
            .expect_err("missing name");
        assert!(matches!(err, DemoError::Validation(_)));
        assert!(service.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn update_missing_demo_is_not_found() {
        let (service, _) = service();
        let id = Uuid::new_v4();
        let err = service
            .update(UpdateDemoCommand {
                id,
                name: Some("Bob".into()),
                age: None,
            })
            .await
            .expect_err("missing");
        assert!(matches!(err, DemoError::NotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn update_validates_before_writing() {
        let (service, clock) = service();
        let created = service
            .create(CreateDemoCommand {
                name: Some("Alice".into()),
                age: Some(20),
            })
            .await
            .expect("create");

        clock.advance(Duration::minutes(1));
        let err = service
            .update(UpdateDemoCommand {
                id: created.id(),
                name: Some("Alice".into()),
                age: Some(999),
            })
            .await
            .expect_err("age out of range");
        assert!(matches!(err, DemoError::Validation(_)));

        let stored = service.find(created.id()).await.expect("find");
        assert_eq!(stored, created);
    }

    #[tokio::test]
    async fn top_rejects_negative_counts_and_short_circuits_zero() {
        let (service, _) = service();
        service
            .create(CreateDemoCommand {
                name: Some("Alice".into()),
                age: None,
            })
            .await
            .expect("create");

        assert!(matches!(
            service.top(-1).await,
            Err(DemoError::Validation(_))
        ));
        assert!(service.top(0).await.expect("zero").is_empty());
        assert_eq!(service.top(5).await.expect("five").len(), 1);
    }

    #[tokio::test]
    async fn page_rejects_windows_outside_the_ceiling() {
        let (service, _) = service();
        let err = service
            .page(1, 101, DemoQueryFilter::default())
            .await
            .expect_err("too large");
        assert!(matches!(err, DemoError::Validation(_)));

        let err = service
            .page(0, 10, DemoQueryFilter::default())
            .await
            .expect_err("zero index");
        assert!(matches!(err, DemoError::Validation(_)));
    }
}
