//! Merging pushed, fetched, and optimistic records into one ordered,
//! duplicate-free sequence.
//!
//! Identity is the only dedup criterion. A record whose id is already present
//! is never appended again, which absorbs both a push echo of an optimistic
//! write and a transport that delivers the same event twice.

use std::{collections::HashSet, fmt::Debug, hash::Hash};

use serde::de::DeserializeOwned;
use shared::models::{Comment, CommentId, Message, MessageId, Timestamp, UserId};

/// A row that can live in a [`Timeline`].
pub trait Record: Clone + Debug + DeserializeOwned + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + Debug + DeserializeOwned + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
    fn created_at(&self) -> Timestamp;
    fn author(&self) -> UserId;

    /// Rows flagged as removed by the backend are dropped instead of displayed.
    fn is_removed(&self) -> bool {
        false
    }
}

impl Record for Message {
    type Id = MessageId;

    fn id(&self) -> MessageId {
        self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn author(&self) -> UserId {
        self.sender_id
    }

    fn is_removed(&self) -> bool {
        self.is_deleted
    }
}

impl Record for Comment {
    type Id = CommentId;

    fn id(&self) -> CommentId {
        self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn author(&self) -> UserId {
        self.author_id
    }
}

/// A decoded row change delivered by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<R: Record> {
    Inserted(R),
    Updated(R),
    Deleted(R::Id),
}

impl<R: Record> Change<R> {
    /// The record carried by inserts and updates.
    pub fn record(&self) -> Option<&R> {
        match self {
            Self::Inserted(record) | Self::Updated(record) => Some(record),
            Self::Deleted(_) => None,
        }
    }
}

/// Appends `incoming` unless a record with the same id is already present.
///
/// Merging the same record twice yields the same sequence as merging it once.
#[must_use]
pub fn merge<R: Record>(mut existing: Vec<R>, incoming: R) -> Vec<R> {
    let id = incoming.id();
    if existing.iter().all(|record| record.id() != id) {
        existing.push(incoming);
    }
    existing
}

/// Where a pushed record lands relative to the records already displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderPolicy {
    /// Pushed records go to the tail in the order they arrive.
    #[default]
    Arrival,
    /// Pushed records are placed by creation time, after any equal timestamps.
    Chronological,
}

/// What a [`Timeline`] did with a record handed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Added at the tail.
    Appended,
    /// Added before the tail, by timestamp or at a restored index.
    Inserted,
    /// An existing record with the same id was overwritten or removed.
    Replaced,
    /// Nothing changed: the id was already present, or the row was removed.
    Duplicate,
}

impl MergeOutcome {
    /// Returns `true` when the visible sequence changed.
    #[must_use]
    pub const fn changed(self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

/// The ordered record sequence owned by one open view.
#[derive(Debug, Clone)]
pub struct Timeline<R: Record> {
    records: Vec<R>,
    ids: HashSet<R::Id>,
    policy: OrderPolicy,
}

impl<R: Record> Default for Timeline<R> {
    fn default() -> Self {
        Self::new(OrderPolicy::default())
    }
}

impl<R: Record> Timeline<R> {
    /// Creates an empty timeline.
    ///
    /// # Arguments
    /// * `policy` - Where records inserted after the snapshot are placed.
    ///
    /// # Returns
    /// A timeline with no records.
    #[must_use]
    pub fn new(policy: OrderPolicy) -> Self {
        Self {
            records: Vec::new(),
            ids: HashSet::new(),
            policy,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> OrderPolicy {
        self.policy
    }

    /// The records in display order.
    #[must_use]
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Number of displayed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: R::Id) -> bool {
        self.ids.contains(&id)
    }

    /// Looks a record up by id.
    ///
    /// # Arguments
    /// * `id` - The record identity.
    ///
    /// # Returns
    /// The displayed record, or `None` when it is not in the timeline.
    #[must_use]
    pub fn get(&self, id: R::Id) -> Option<&R> {
        self.position(id).map(|index| &self.records[index])
    }

    /// The ids currently displayed, for a later [`Timeline::replace_snapshot`].
    #[must_use]
    pub fn ids(&self) -> HashSet<R::Id> {
        self.ids.clone()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<R> {
        self.records
    }

    /// Adds a record that is not yet present. Removed rows are ignored.
    pub fn insert(&mut self, record: R) -> MergeOutcome {
        if record.is_removed() || self.ids.contains(&record.id()) {
            return MergeOutcome::Duplicate;
        }
        self.ids.insert(record.id());

        match self.policy {
            OrderPolicy::Arrival => {
                self.records.push(record);
                MergeOutcome::Appended
            }
            OrderPolicy::Chronological => {
                let created_at = record.created_at();
                let index = self
                    .records
                    .partition_point(|existing| existing.created_at() <= created_at);
                if index == self.records.len() {
                    self.records.push(record);
                    MergeOutcome::Appended
                } else {
                    self.records.insert(index, record);
                    MergeOutcome::Inserted
                }
            }
        }
    }

    /// Replaces the record with the same id in place, or inserts it.
    pub fn upsert(&mut self, record: R) -> MergeOutcome {
        if record.is_removed() {
            return if self.remove(record.id()).is_some() {
                MergeOutcome::Replaced
            } else {
                MergeOutcome::Duplicate
            };
        }
        match self.position(record.id()) {
            Some(index) => {
                self.records[index] = record;
                MergeOutcome::Replaced
            }
            None => self.insert(record),
        }
    }

    /// Removes a record by id, returning it when it was present.
    pub fn remove(&mut self, id: R::Id) -> Option<R> {
        self.remove_indexed(id).map(|(_, record)| record)
    }

    /// Removes a record and reports where it was, for [`Timeline::restore_at`].
    pub fn remove_indexed(&mut self, id: R::Id) -> Option<(usize, R)> {
        let index = self.position(id)?;
        self.ids.remove(&id);
        Some((index, self.records.remove(index)))
    }

    /// Puts a removed record back at `index`, clamped to the tail.
    pub fn restore_at(&mut self, index: usize, record: R) -> MergeOutcome {
        if record.is_removed() || self.ids.contains(&record.id()) {
            return MergeOutcome::Duplicate;
        }
        self.ids.insert(record.id());
        let index = index.min(self.records.len());
        self.records.insert(index, record);
        MergeOutcome::Inserted
    }

    /// Rebuilds the sequence from a fetched snapshot.
    ///
    /// # Arguments
    /// * `snapshot` - The rows the backend returned.
    /// * `known` - The ids displayed when the fetch started.
    ///
    /// A record missing from the snapshot is dropped when its id is in
    /// `known`, since the backend no longer has it. Records added after the
    /// fetch started (pushed or optimistic rows that raced it) are kept and
    /// re-merged after the snapshot.
    pub fn replace_snapshot(&mut self, snapshot: Vec<R>, known: &HashSet<R::Id>) {
        let fetched: HashSet<R::Id> = snapshot.iter().map(|record| record.id()).collect();
        let carried: Vec<R> = std::mem::take(&mut self.records)
            .into_iter()
            .filter(|record| !fetched.contains(&record.id()) && !known.contains(&record.id()))
            .collect();
        self.ids.clear();

        let mut snapshot = snapshot;
        if self.policy == OrderPolicy::Chronological {
            snapshot.sort_by_key(|record| record.created_at());
        }
        for record in snapshot.into_iter().chain(carried) {
            self.insert(record);
        }
    }

    /// Applies a pushed change. Returns whether the visible sequence changed.
    pub fn apply(&mut self, change: Change<R>) -> bool {
        match change {
            Change::Inserted(record) => self.insert(record).changed(),
            Change::Updated(record) => self.upsert(record).changed(),
            Change::Deleted(id) => self.remove(id).is_some(),
        }
    }

    fn position(&self, id: R::Id) -> Option<usize> {
        if !self.ids.contains(&id) {
            return None;
        }
        self.records.iter().position(|record| record.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use shared::models::ListingId;

    fn at(minute: i64) -> Timestamp {
        Timestamp(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minute))
    }

    fn message(minute: i64, sender: UserId, receiver: UserId) -> Message {
        Message {
            id: MessageId::new_v4(),
            listing_id: ListingId(42),
            sender_id: sender,
            receiver_id: receiver,
            body: format!("at {minute}"),
            created_at: at(minute),
            read_at: None,
            is_deleted: false,
        }
    }

    fn thread(len: i64) -> (Vec<Message>, UserId, UserId) {
        let a = UserId::new_v4();
        let b = UserId::new_v4();
        let records = (0..len).map(|minute| message(minute, a, b)).collect();
        (records, a, b)
    }

    #[test]
    fn merge_is_idempotent() {
        let (existing, a, b) = thread(3);
        let incoming = message(5, b, a);

        let once = merge(existing.clone(), incoming.clone());
        let twice = merge(once.clone(), incoming);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_appends_new_identity_at_tail() {
        let (existing, a, b) = thread(3);
        let incoming = message(4, a, b);

        let merged = merge(existing.clone(), incoming.clone());
        assert_eq!(merged.len(), existing.len() + 1);
        assert_eq!(merged.last(), Some(&incoming));
    }

    #[test]
    fn merge_of_present_identity_is_noop() {
        let (existing, _, _) = thread(3);
        let mut echo = existing[1].clone();
        echo.body = "server copy".into();

        assert_eq!(merge(existing.clone(), echo), existing);
    }

    #[test]
    fn arrival_order_keeps_late_records_at_tail() {
        let (existing, a, b) = thread(3);
        let mut timeline = Timeline::new(OrderPolicy::Arrival);
        timeline.replace_snapshot(existing, &HashSet::new());

        let early = message(-10, a, b);
        assert_eq!(timeline.insert(early.clone()), MergeOutcome::Appended);
        assert_eq!(timeline.records().last(), Some(&early));
    }

    #[test]
    fn chronological_order_places_by_timestamp() {
        let (existing, a, b) = thread(3);
        let mut timeline = Timeline::new(OrderPolicy::Chronological);
        timeline.replace_snapshot(existing, &HashSet::new());

        let early = message(-10, a, b);
        assert_eq!(timeline.insert(early.clone()), MergeOutcome::Inserted);
        assert_eq!(timeline.records().first(), Some(&early));

        let tie = message(1, b, a);
        timeline.insert(tie.clone());
        assert_eq!(timeline.records()[3], tie);
    }

    #[test]
    fn duplicate_insert_reports_duplicate() {
        let (existing, _, _) = thread(2);
        let mut timeline = Timeline::default();
        timeline.replace_snapshot(existing.clone(), &HashSet::new());

        assert_eq!(timeline.insert(existing[0].clone()), MergeOutcome::Duplicate);
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn snapshot_keeps_records_that_raced_the_fetch() {
        let (existing, a, b) = thread(2);
        let mut timeline = Timeline::default();

        let pushed = message(9, a, b);
        timeline.insert(pushed.clone());
        timeline.insert(existing[1].clone());
        timeline.replace_snapshot(existing.clone(), &HashSet::new());

        let ids: Vec<_> = timeline.records().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![existing[0].id, existing[1].id, pushed.id]);
    }

    #[test]
    fn snapshot_drops_records_the_backend_no_longer_has() {
        let (existing, a, b) = thread(3);
        let mut timeline = Timeline::default();
        timeline.replace_snapshot(existing.clone(), &HashSet::new());

        let known = timeline.ids();
        let pushed = message(9, b, a);
        timeline.insert(pushed.clone());
        timeline.replace_snapshot(vec![existing[0].clone(), existing[2].clone()], &known);

        let ids: Vec<_> = timeline.records().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![existing[0].id, existing[2].id, pushed.id]);
        assert!(!timeline.contains(existing[1].id));
    }

    #[test]
    fn upsert_replaces_in_place() {
        let (existing, _, _) = thread(3);
        let mut timeline = Timeline::default();
        timeline.replace_snapshot(existing.clone(), &HashSet::new());

        let mut read = existing[1].clone();
        read.read_at = Some(at(30));
        assert_eq!(timeline.upsert(read.clone()), MergeOutcome::Replaced);
        assert_eq!(timeline.records()[1], read);
        assert_eq!(timeline.len(), 3);
    }

    #[test]
    fn soft_deleted_update_removes_message() {
        let (existing, _, _) = thread(3);
        let mut timeline = Timeline::default();
        timeline.replace_snapshot(existing.clone(), &HashSet::new());

        let mut deleted = existing[0].clone();
        deleted.is_deleted = true;
        assert!(timeline.apply(Change::Updated(deleted)));
        assert!(!timeline.contains(existing[0].id));
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn apply_delete_of_unknown_id_is_noop() {
        let (existing, _, _) = thread(2);
        let mut timeline = Timeline::default();
        timeline.replace_snapshot(existing, &HashSet::new());

        assert!(!timeline.apply(Change::Deleted(MessageId::new_v4())));
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn restore_at_returns_record_to_its_slot() {
        let (existing, _, _) = thread(3);
        let mut timeline = Timeline::default();
        timeline.replace_snapshot(existing.clone(), &HashSet::new());

        let (index, removed) = timeline.remove_indexed(existing[1].id).unwrap();
        assert_eq!(index, 1);
        assert_eq!(timeline.restore_at(index, removed), MergeOutcome::Inserted);
        assert_eq!(timeline.records(), existing.as_slice());
        assert_eq!(
            timeline.restore_at(9, existing[0].clone()),
            MergeOutcome::Duplicate
        );
    }

    #[test]
    fn deleted_rows_in_snapshot_are_skipped() {
        let (mut existing, _, _) = thread(3);
        existing[2].is_deleted = true;
        let mut timeline = Timeline::default();
        timeline.replace_snapshot(existing, &HashSet::new());

        assert_eq!(timeline.len(), 2);
    }
}
