//! Domain entities mirrored from persistent storage.

use std::ops::RangeInclusive;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

pub const DEMO_NAME_MAX_CHARS: usize = 128;
pub const DEMO_AGE_RANGE: RangeInclusive<i32> = 0..=200;

/// The sample entity exposed by the service.
///
/// Fields are only reachable through accessors; state changes go through the
/// named mutators below, and the audit timestamps are written exclusively by
/// the persistence session's stamping pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoRecord {
    id: Uuid,
    name: String,
    age: Option<i32>,
    created_at: OffsetDateTime,
    modified_at: OffsetDateTime,
}

impl DemoRecord {
    /// Build a new, not yet persisted record with a fresh identity.
    pub fn new(name: &str, age: Option<i32>, now: OffsetDateTime) -> Result<Self, DomainError> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: normalize_name(name)?,
            age: validate_age(age)?,
            created_at: now,
            modified_at: now,
        })
    }

    /// Rehydrate a record loaded from storage.
    pub fn restore(
        id: Uuid,
        name: String,
        age: Option<i32>,
        created_at: OffsetDateTime,
        modified_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            name,
            age,
            created_at,
            modified_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> Option<i32> {
        self.age
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn modified_at(&self) -> OffsetDateTime {
        self.modified_at
    }

    pub fn rename(&mut self, name: &str) -> Result<(), DomainError> {
        self.name = normalize_name(name)?;
        Ok(())
    }

    pub fn set_age(&mut self, age: Option<i32>) -> Result<(), DomainError> {
        self.age = validate_age(age)?;
        Ok(())
    }

    pub(crate) fn stamp_created(&mut self, now: OffsetDateTime) {
        self.created_at = now;
        self.modified_at = now;
    }

    pub(crate) fn stamp_modified(&mut self, now: OffsetDateTime) {
        // created_at <= modified_at must survive a clock that steps backwards.
        self.modified_at = now.max(self.created_at);
    }
}

fn normalize_name(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("name", "is required"));
    }
    if trimmed.chars().count() > DEMO_NAME_MAX_CHARS {
        return Err(DomainError::validation(
            "name",
            format!("must be at most {DEMO_NAME_MAX_CHARS} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_age(age: Option<i32>) -> Result<Option<i32>, DomainError> {
    match age {
        Some(value) if !DEMO_AGE_RANGE.contains(&value) => Err(DomainError::validation(
            "age",
            format!(
                "must be between {} and {}",
                DEMO_AGE_RANGE.start(),
                DEMO_AGE_RANGE.end()
            ),
        )),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-03-01 09:00:00 UTC);

    #[test]
    fn new_record_trims_name_and_stamps_both_timestamps() {
        let record = DemoRecord::new("  Alice ", Some(30), T0).expect("valid record");
        assert_eq!(record.name(), "Alice");
        assert_eq!(record.age(), Some(30));
        assert_eq!(record.created_at(), T0);
        assert_eq!(record.modified_at(), T0);
        assert!(!record.id().is_nil());
    }

    #[test]
    fn new_records_receive_distinct_identities() {
        let a = DemoRecord::new("a", None, T0).expect("valid");
        let b = DemoRecord::new("a", None, T0).expect("valid");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = DemoRecord::new("   ", None, T0).expect_err("blank name");
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn overlong_name_is_rejected() {
        let name = "x".repeat(DEMO_NAME_MAX_CHARS + 1);
        assert!(DemoRecord::new(&name, None, T0).is_err());
    }

    #[test]
    fn age_outside_range_is_rejected() {
        assert!(DemoRecord::new("a", Some(-1), T0).is_err());
        assert!(DemoRecord::new("a", Some(201), T0).is_err());
        assert!(DemoRecord::new("a", Some(200), T0).is_ok());
    }

    #[test]
    fn rename_keeps_identity_and_rejects_blank() {
        let mut record = DemoRecord::new("Alice", None, T0).expect("valid");
        let id = record.id();
        record.rename("Bob").expect("rename");
        assert_eq!(record.name(), "Bob");
        assert_eq!(record.id(), id);
        assert!(record.rename("").is_err());
        assert_eq!(record.name(), "Bob");
    }

    #[test]
    fn modified_stamp_never_precedes_creation() {
        let mut record = DemoRecord::new("Alice", None, T0).expect("valid");
        record.stamp_modified(T0 - Duration::hours(1));
        assert_eq!(record.modified_at(), T0);

        record.stamp_modified(T0 + Duration::minutes(5));
        assert_eq!(record.created_at(), T0);
        assert_eq!(record.modified_at(), T0 + Duration::minutes(5));
    }
}
