//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest, PaginationError};
use crate::application::session::StampedChange;
use crate::domain::entities::DemoRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid query: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Optional predicates applied by the paged query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemoQueryFilter {
    /// Case-insensitive substring match on the name.
    pub name: Option<String>,
    /// Exact age match.
    pub age: Option<i32>,
    /// Inclusive lower bound on age.
    pub min_age: Option<i32>,
}

impl DemoQueryFilter {
    /// Drop blank name filters so they behave like an absent filter.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.and_then(|value| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });
        self
    }

    pub fn matches(&self, record: &DemoRecord) -> bool {
        if let Some(needle) = self.name.as_deref()
            && !record
                .name()
                .to_lowercase()
                .contains(&needle.to_lowercase())
        {
            return false;
        }
        if let Some(age) = self.age
            && record.age() != Some(age)
        {
            return false;
        }
        if let Some(min_age) = self.min_age
            && !record.age().is_some_and(|value| value >= min_age)
        {
            return false;
        }
        true
    }
}

/// Read side of the Demo store.
///
/// `get_page`, `list_all` and `find_by_key` form the query-builder path and
/// share the page order `created_at ASC, id ASC`. `top_records` is an
/// independent raw-query path that returns rows in natural storage order.
#[async_trait]
pub trait DemoReader: Send + Sync {
    async fn list_all(&self) -> Result<Vec<DemoRecord>, RepoError>;

    async fn find_by_key(&self, id: Uuid) -> Result<Option<DemoRecord>, RepoError>;

    async fn get_page(
        &self,
        page: PageRequest,
        filter: &DemoQueryFilter,
    ) -> Result<Page<DemoRecord>, RepoError>;

    async fn top_records(&self, count: i64) -> Result<Vec<DemoRecord>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

/// Write side of the Demo store.
///
/// `apply` must persist the whole batch atomically: either every change is
/// visible afterwards or none is. A modified or deleted record that no longer
/// exists fails the batch with [`RepoError::NotFound`].
#[async_trait]
pub trait DemoWriter: Send + Sync {
    async fn apply(&self, changes: &[StampedChange]) -> Result<(), RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record(name: &str, age: Option<i32>) -> DemoRecord {
        DemoRecord::new(name, age, datetime!(2024-01-01 00:00:00 UTC)).expect("valid")
    }

    #[test]
    fn blank_name_filter_is_dropped() {
        let filter = DemoQueryFilter {
            name: Some("   ".to_string()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(filter, DemoQueryFilter::default());
    }

    #[test]
    fn name_filter_is_case_insensitive_substring() {
        let filter = DemoQueryFilter {
            name: Some("LIC".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&record("Alice", None)));
        assert!(!filter.matches(&record("Bob", None)));
    }

    #[test]
    fn age_predicates_skip_records_without_age() {
        let exact = DemoQueryFilter {
            age: Some(30),
            ..Default::default()
        };
        assert!(exact.matches(&record("a", Some(30))));
        assert!(!exact.matches(&record("a", Some(31))));
        assert!(!exact.matches(&record("a", None)));

        let bound = DemoQueryFilter {
            min_age: Some(18),
            ..Default::default()
        };
        assert!(bound.matches(&record("a", Some(18))));
        assert!(!bound.matches(&record("a", Some(17))));
        assert!(!bound.matches(&record("a", None)));
    }
}
