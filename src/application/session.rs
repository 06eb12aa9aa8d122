//! Unit of work for Demo writes.
//!
//! A [`DemoSession`] collects staged additions, modifications and removals.
//! [`DemoSession::commit`] reads the clock once, truncates the reading to whole
//! microseconds, stamps every staged addition and modification, and only then hands the batch to the [`DemoWriter`].
//! Writers receive [`StampedChange`] values, which can only be produced by
//! that stamping pass.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{DemoWriter, RepoError};
use crate::domain::clock::{Clock, truncate_to_micros};
use crate::domain::entities::DemoRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// A staged change whose audit timestamps have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedChange {
    kind: ChangeKind,
    record: DemoRecord,
}

impl StampedChange {
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn record(&self) -> &DemoRecord {
        &self.record
    }
}

#[derive(Debug)]
struct Pending {
    kind: ChangeKind,
    record: DemoRecord,
}

pub struct DemoSession {
    writer: Arc<dyn DemoWriter>,
    clock: Arc<dyn Clock>,
    pending: Vec<Pending>,
}

impl DemoSession {
    pub fn new(writer: Arc<dyn DemoWriter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            writer,
            clock,
            pending: Vec::new(),
        }
    }

    pub fn add(&mut self, record: DemoRecord) {
        self.stage(ChangeKind::Added, record);
    }

    pub fn update(&mut self, record: DemoRecord) {
        self.stage(ChangeKind::Modified, record);
    }

    pub fn remove(&mut self, record: DemoRecord) {
        self.stage(ChangeKind::Deleted, record);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Stamp and flush every staged change.
    ///
    /// Returns the stamped added and modified records in staging order.
    /// Nothing is written if the session is empty.
    pub async fn commit(self) -> Result<Vec<DemoRecord>, RepoError> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }

        let now = truncate_to_micros(self.clock.now());
        let changes = stamp_all(self.pending, now);

        debug!(
            target = "scaffold::session",
            changes = changes.len(),
            stamped_at = %now,
            "committing unit of work"
        );

        self.writer.apply(&changes).await?;

        Ok(changes
            .into_iter()
            .filter(|change| change.kind != ChangeKind::Deleted)
            .map(|change| change.record)
            .collect())
    }

    /// Stage a change, folding it into any earlier change for the same record.
    fn stage(&mut self, kind: ChangeKind, record: DemoRecord) {
        let id = record.id();
        let Some(position) = self.position_of(id) else {
            self.pending.push(Pending { kind, record });
            return;
        };

        let previous = self.pending[position].kind;
        match (previous, kind) {
            // Never reached the store, so there is nothing to delete.
            (ChangeKind::Added, ChangeKind::Deleted) => {
                self.pending.remove(position);
            }
            (ChangeKind::Added, _) => {
                self.pending[position].record = record;
            }
            // The stored row still exists, so re-adding it is an overwrite.
            (ChangeKind::Deleted, ChangeKind::Added) => {
                self.pending[position] = Pending {
                    kind: ChangeKind::Modified,
                    record,
                };
            }
            (_, next) => {
                self.pending[position] = Pending { kind: next, record };
            }
        }
    }

    fn position_of(&self, id: Uuid) -> Option<usize> {
        self.pending.iter().position(|entry| entry.record.id() == id)
    }
}

fn stamp_all(pending: Vec<Pending>, now: OffsetDateTime) -> Vec<StampedChange> {
    pending
        .into_iter()
        .map(|Pending { kind, mut record }| {
            match kind {
                ChangeKind::Added => record.stamp_created(now),
                ChangeKind::Modified => record.stamp_modified(now),
                ChangeKind::Deleted => {}
            }
            StampedChange { kind, record }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use time::Duration;
    use time::macros::datetime;
    use tokio::sync::Mutex;

    use crate::domain::clock::ManualClock;

    const T0: OffsetDateTime = datetime!(2024-02-01 10:00:00 UTC);

    #[derive(Default)]
    struct RecordingWriter {
        batches: Mutex<Vec<Vec<StampedChange>>>,
        fail_with_not_found: bool,
    }

    #[async_trait]
    impl DemoWriter for RecordingWriter {
        async fn apply(&self, changes: &[StampedChange]) -> Result<(), RepoError> {
            if self.fail_with_not_found {
                return Err(RepoError::NotFound);
            }
            self.batches.lock().await.push(changes.to_vec());
            Ok(())
        }
    }

    fn session_at(writer: Arc<RecordingWriter>, now: OffsetDateTime) -> DemoSession {
        DemoSession::new(writer, Arc::new(ManualClock::new(now)))
    }

    #[tokio::test]
    async fn commit_stamps_every_added_record() {
        let writer = Arc::new(RecordingWriter::default());
        let mut session = session_at(writer.clone(), T0 + Duration::minutes(1));

        // Constructed with a stale timestamp; the commit pass overrides it.
        session.add(DemoRecord::new("Alice", None, T0).expect("valid"));
        session.add(DemoRecord::new("Bob", None, T0).expect("valid"));

        let written = session.commit().await.expect("commit");

        assert_eq!(written.len(), 2);
        for record in &written {
            assert_eq!(record.created_at(), T0 + Duration::minutes(1));
            assert_eq!(record.modified_at(), T0 + Duration::minutes(1));
        }

        let batches = writer.batches.lock().await;
        assert_eq!(batches.len(), 1);
        assert!(batches[0].iter().all(|change| change.kind() == ChangeKind::Added));
    }

    #[tokio::test]
    async fn commit_restamps_modified_without_touching_creation() {
        let writer = Arc::new(RecordingWriter::default());
        let mut record = DemoRecord::new("Alice", None, T0).expect("valid");
        record.rename("Alicia").expect("rename");

        let mut session = session_at(writer, T0 + Duration::hours(2));
        session.update(record);
        let written = session.commit().await.expect("commit");

        assert_eq!(written[0].created_at(), T0);
        assert_eq!(written[0].modified_at(), T0 + Duration::hours(2));
        assert_eq!(written[0].name(), "Alicia");
    }

    #[tokio::test]
    async fn empty_session_commits_without_touching_the_writer() {
        let writer = Arc::new(RecordingWriter::default());
        let session = session_at(writer.clone(), T0);

        let written = session.commit().await.expect("commit");

        assert!(written.is_empty());
        assert!(writer.batches.lock().await.is_empty());
    }

    #[tokio::test]
    async fn deleted_records_are_flushed_but_not_returned() {
        let writer = Arc::new(RecordingWriter::default());
        let record = DemoRecord::new("Alice", None, T0).expect("valid");

        let mut session = session_at(writer.clone(), T0 + Duration::minutes(5));
        session.remove(record.clone());
        let written = session.commit().await.expect("commit");

        assert!(written.is_empty());
        let batches = writer.batches.lock().await;
        assert_eq!(batches[0][0].kind(), ChangeKind::Deleted);
        assert_eq!(batches[0][0].record(), &record);
    }

    #[test]
    fn add_then_remove_cancels_out() {
        let writer = Arc::new(RecordingWriter::default());
        let mut session = session_at(writer, T0);
        let record = DemoRecord::new("Alice", None, T0).expect("valid");

        session.add(record.clone());
        session.remove(record);

        assert!(session.is_empty());
    }

    #[test]
    fn add_then_update_stays_an_addition_with_latest_state() {
        let writer = Arc::new(RecordingWriter::default());
        let mut session = session_at(writer, T0);
        let mut record = DemoRecord::new("Alice", None, T0).expect("valid");

        session.add(record.clone());
        record.rename("Alicia").expect("rename");
        session.update(record);

        assert_eq!(session.pending_len(), 1);
        assert_eq!(session.pending[0].kind, ChangeKind::Added);
        assert_eq!(session.pending[0].record.name(), "Alicia");
    }

    #[test]
    fn update_then_remove_becomes_a_removal() {
        let writer = Arc::new(RecordingWriter::default());
        let mut session = session_at(writer, T0);
        let record = DemoRecord::new("Alice", None, T0).expect("valid");

        session.update(record.clone());
        session.remove(record);

        assert_eq!(session.pending_len(), 1);
        assert_eq!(session.pending[0].kind, ChangeKind::Deleted);
    }

    #[test]
    fn remove_then_add_becomes_a_modification() {
        let writer = Arc::new(RecordingWriter::default());
        let mut session = session_at(writer, T0);
        let mut record = DemoRecord::new("Alice", None, T0).expect("valid");

        session.remove(record.clone());
        record.rename("Alicia").expect("rename");
        session.add(record);

        assert_eq!(session.pending_len(), 1);
        assert_eq!(session.pending[0].kind, ChangeKind::Modified);
        assert_eq!(session.pending[0].record.name(), "Alicia");
    }

    #[tokio::test]
    async fn commit_stamps_whole_microseconds() {
        let writer = Arc::new(RecordingWriter::default());
        let mut session = session_at(writer, T0 + Duration::nanoseconds(1_234_567));
        session.add(DemoRecord::new("Alice", None, T0).expect("valid"));

        let written = session.commit().await.expect("commit");

        assert_eq!(written[0].created_at(), T0 + Duration::microseconds(1_234));
        assert_eq!(written[0].modified_at(), written[0].created_at());
    }

    #[tokio::test]
    async fn writer_failures_propagate() {
        let writer = Arc::new(RecordingWriter {
            fail_with_not_found: true,
            ..Default::default()
        });
        let mut session = session_at(writer, T0);
        session.update(DemoRecord::new("Alice", None, T0).expect("valid"));

        let err = session.commit().await.expect_err("writer failure");
        assert!(matches!(err, RepoError::NotFound));
    }
}
