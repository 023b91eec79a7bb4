//! Push transport: row-change notifications scoped to a table and an
//! equality filter.
//!
//! Everything above this module depends only on [`PushTransport`]. The
//! websocket implementation speaks the hosted backend's channel protocol; the
//! in-memory backend implements the same trait for tests and demos.

pub mod phoenix;
mod socket;

pub use socket::RealtimeSocket;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tokio::sync::mpsc;

use crate::error::ClientResult;

/// Handle returned by [`PushTransport::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u64);

impl Display for ChannelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "channel-{}", self.0)
    }
}

/// Row operation carried by a push event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl TryFrom<&str> for ChangeKind {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            _ => Err("invalid change kind"),
        }
    }
}

/// Which change kinds a channel wants to receive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventFilter {
    #[default]
    All,
    Only(ChangeKind),
}

impl EventFilter {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "*",
            Self::Only(kind) => kind.as_str(),
        }
    }

    #[must_use]
    pub fn accepts(self, kind: ChangeKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == kind,
        }
    }
}

/// `column = value` row filter, rendered `column=eq.value` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqFilter {
    pub column: String,
    pub value: String,
}

impl EqFilter {
    pub fn new(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }

    /// True when `row` has `column` equal to the filter value.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        match row.get(&self.column) {
            Some(Value::String(text)) => *text == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

impl Display for EqFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

/// A logical channel: a named topic listening to changes on one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub topic: String,
    pub table: String,
    pub schema: String,
    pub filter: Option<EqFilter>,
    pub events: EventFilter,
}

impl ChannelSpec {
    pub fn new(
        topic: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            table: table.into(),
            schema: schema.into(),
            filter: None,
            events: EventFilter::All,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: EqFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventFilter) -> Self {
        self.events = events;
        self
    }

    /// Server-side routing: table, change kind, and equality filter. Deletes
    /// are matched against the old row since the new one is absent.
    #[must_use]
    pub fn matches(&self, event: &PushEvent) -> bool {
        if event.table != self.table || !self.events.accepts(event.kind) {
            return false;
        }
        let Some(filter) = &self.filter else {
            return true;
        };
        event
            .record
            .as_ref()
            .or(event.old_record.as_ref())
            .is_some_and(|row| filter.matches(row))
    }
}

/// One row change as delivered by the backend, before model decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub record: Option<Value>,
    pub old_record: Option<Value>,
}

impl PushEvent {
    #[must_use]
    pub fn insert(table: impl Into<String>, record: Value) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Insert,
            record: Some(record),
            old_record: None,
        }
    }

    #[must_use]
    pub fn update(table: impl Into<String>, record: Value) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Update,
            record: Some(record),
            old_record: None,
        }
    }

    #[must_use]
    pub fn delete(table: impl Into<String>, old_record: Value) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Delete,
            record: None,
            old_record: Some(old_record),
        }
    }
}

impl std::fmt::Debug for dyn PushTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("PushTransport")
    }
}

/// Subscribe-by-filter push interface.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Joins a channel and forwards matching events into `sink` until
    /// [`PushTransport::unsubscribe`] is called.
    ///
    /// # Errors
    /// [`crate::ClientError::Subscription`] when the channel cannot be
    /// established.
    async fn subscribe(
        &self,
        spec: ChannelSpec,
        sink: mpsc::UnboundedSender<PushEvent>,
    ) -> ClientResult<ChannelId>;

    /// Leaves a channel. Unknown ids are ignored.
    async fn unsubscribe(&self, channel: ChannelId) -> ClientResult<()>;
}
