//! In-process Demo store.
//!
//! Used when no database URL is configured and by tests. Rows are kept in
//! insertion order, which stands in for the natural storage order seen by
//! the raw top-N path. Batches apply to a copy that replaces the live rows
//! only when every change succeeds.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{DemoQueryFilter, DemoReader, DemoWriter, RepoError};
use crate::application::session::{ChangeKind, StampedChange};
use crate::domain::entities::DemoRecord;

#[derive(Debug, Default)]
pub struct MemoryRepositories {
    rows: RwLock<Vec<DemoRecord>>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

fn page_ordered(rows: &[DemoRecord]) -> Vec<DemoRecord> {
    let mut ordered = rows.to_vec();
    ordered.sort_by_key(|record| (record.created_at(), record.id()));
    ordered
}

fn position(rows: &[DemoRecord], id: Uuid) -> Option<usize> {
    rows.iter().position(|record| record.id() == id)
}

#[async_trait]
impl DemoReader for MemoryRepositories {
    async fn list_all(&self) -> Result<Vec<DemoRecord>, RepoError> {
        Ok(page_ordered(&self.rows.read().await))
    }

    async fn find_by_key(&self, id: Uuid) -> Result<Option<DemoRecord>, RepoError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|record| record.id() == id).cloned())
    }

    async fn get_page(
        &self,
        page: PageRequest,
        filter: &DemoQueryFilter,
    ) -> Result<Page<DemoRecord>, RepoError> {
        let offset = usize::try_from(page.offset())
            .map_err(|_| RepoError::invalid_input("page offset exceeds supported range"))?;

        let filtered: Vec<DemoRecord> = page_ordered(&self.rows.read().await)
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();
        let total = filtered.len() as u64;
        let items = filtered
            .into_iter()
            .skip(offset)
            .take(page.page_size() as usize)
            .collect();

        Ok(Page::new(items, total, page))
    }

    async fn top_records(&self, count: i64) -> Result<Vec<DemoRecord>, RepoError> {
        let count = usize::try_from(count)
            .map_err(|_| RepoError::invalid_input("count must not be negative"))?;
        let rows = self.rows.read().await;
        Ok(rows.iter().take(count).cloned().collect())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[async_trait]
impl DemoWriter for MemoryRepositories {
    async fn apply(&self, changes: &[StampedChange]) -> Result<(), RepoError> {
        let mut rows = self.rows.write().await;
        let mut staged = rows.clone();

        for change in changes {
            let record = change.record();
            match change.kind() {
                ChangeKind::Added => {
                    if position(&staged, record.id()).is_some() {
                        return Err(RepoError::Duplicate {
                            constraint: "demo_pkey".to_string(),
                        });
                    }
                    staged.push(record.clone());
                }
                ChangeKind::Modified => {
                    let index = position(&staged, record.id()).ok_or(RepoError::NotFound)?;
                    staged[index] = record.clone();
                }
                ChangeKind::Deleted => {
                    let index = position(&staged, record.id()).ok_or(RepoError::NotFound)?;
                    staged.remove(index);
                }
            }
        }

        *rows = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::Duration;
    use time::macros::datetime;

    use super::*;
    use crate::application::session::DemoSession;
    use crate::domain::clock::{Clock, ManualClock};

    async fn seed(repos: &Arc<MemoryRepositories>, clock: &Arc<ManualClock>, names: &[&str]) {
        for name in names {
            let mut session = DemoSession::new(repos.clone(), clock.clone());
            session.add(DemoRecord::new(name, None, clock.now()).expect("valid"));
            session.commit().await.expect("commit");
            clock.advance(Duration::seconds(1));
        }
    }

    fn fixtures() -> (Arc<MemoryRepositories>, Arc<ManualClock>) {
        (
            Arc::new(MemoryRepositories::new()),
            Arc::new(ManualClock::new(datetime!(2024-01-01 00:00:00 UTC))),
        )
    }

    #[tokio::test]
    async fn pages_follow_creation_order() {
        let (repos, clock) = fixtures();
        seed(&repos, &clock, &["a", "b", "c", "d", "e"]).await;

        let request = PageRequest::new(2, 2, 100).expect("valid");
        let page = repos
            .get_page(request, &DemoQueryFilter::default())
            .await
            .expect("page");

        let names: Vec<_> = page.items.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["c", "d"]);
        assert_eq!(page.total, 5);
    }

    #[tokio::test]
    async fn failed_batch_leaves_rows_untouched() {
        let (repos, clock) = fixtures();
        seed(&repos, &clock, &["a"]).await;
        let existing = repos.list_all().await.expect("list").remove(0);
        let ghost = DemoRecord::new("ghost", None, clock.now()).expect("valid");

        let mut session = DemoSession::new(repos.clone(), clock.clone());
        session.add(DemoRecord::new("b", None, clock.now()).expect("valid"));
        session.remove(existing);
        session.update(ghost);

        let err = session.commit().await.expect_err("ghost row");
        assert!(matches!(err, RepoError::NotFound));

        let names: Vec<_> = repos
            .list_all()
            .await
            .expect("list")
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["a"]);
    }

    #[tokio::test]
    async fn top_records_use_storage_order() {
        let (repos, clock) = fixtures();
        seed(&repos, &clock, &["first", "second", "third"]).await;

        let top = repos.top_records(2).await.expect("top");
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name(), "first");
        assert!(repos.top_records(0).await.expect("zero").is_empty());
        assert!(matches!(
            repos.top_records(-3).await,
            Err(RepoError::InvalidInput { .. })
        ));
    }
}
