use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use shared::models::{
    Comment, CommentId, ConversationKey, ListingId, Message, MessageId, NewComment, NewMessage,
    Timestamp, UserId,
};
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use super::{CommentStore, MessageStore, TableNames};
use crate::{
    error::{ClientError, ClientResult},
    realtime::{ChannelId, ChannelSpec, PushEvent, PushTransport},
};

#[derive(Debug, Default)]
struct Tables {
    messages: Vec<Message>,
    comments: Vec<Comment>,
}

#[derive(Debug)]
struct Listener {
    spec: ChannelSpec,
    sink: mpsc::UnboundedSender<PushEvent>,
}

/// In-process backend with the same ownership rules as the hosted one.
///
/// Implements both stores and the push transport: every write publishes a
/// change event to the channels whose spec matches it.
#[derive(Debug)]
pub struct MemoryBackend {
    tables: TableNames,
    state: RwLock<Tables>,
    listeners: Mutex<HashMap<ChannelId, Listener>>,
    next_channel: AtomicU64,
    offline: AtomicBool,
    refuse_subscriptions: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(TableNames::default())
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new(tables: TableNames) -> Self {
        Self {
            tables,
            state: RwLock::new(Tables::default()),
            listeners: Mutex::new(HashMap::new()),
            next_channel: AtomicU64::new(1),
            offline: AtomicBool::new(false),
            refuse_subscriptions: AtomicBool::new(false),
            latency: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// While offline every store call fails with a retryable network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// While set, new subscriptions fail to establish.
    pub fn refuse_subscriptions(&self, refuse: bool) {
        self.refuse_subscriptions.store(refuse, Ordering::SeqCst);
    }

    /// Delays every fetch by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    /// Number of channels currently subscribed.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Ends every open channel from the server side, as a dropped socket does.
    /// Returns how many were ended.
    pub fn end_channels(&self) -> usize {
        let mut listeners = lock(&self.listeners);
        let ended = listeners.len();
        listeners.clear();
        ended
    }

    /// Publishes an arbitrary event, bypassing the tables.
    pub fn inject_raw_event(&self, event: PushEvent) {
        self.publish(&event);
    }

    /// Re-publishes the insert event of a stored message, as a transport that
    /// delivers twice would. Returns `false` when the id is unknown.
    pub async fn publish_duplicate(&self, id: MessageId) -> bool {
        let state = self.state.read().await;
        let Some(message) = state.messages.iter().find(|m| m.id == id) else {
            return false;
        };
        match to_row(message) {
            Ok(row) => {
                self.publish(&PushEvent::insert(&self.tables.messages, row));
                true
            }
            Err(_) => false,
        }
    }

    /// Stores rows directly, without events or ownership checks.
    pub async fn seed_messages(&self, messages: impl IntoIterator<Item = Message>) {
        self.state.write().await.messages.extend(messages);
    }

    pub async fn seed_comments(&self, comments: impl IntoIterator<Item = Comment>) {
        self.state.write().await.comments.extend(comments);
    }

    /// Flags a stored message as deleted without publishing a change.
    /// Returns `false` when no such message exists.
    pub async fn soft_delete_message(&self, id: MessageId) -> bool {
        let mut state = self.state.write().await;
        match state.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.is_deleted = true;
                true
            }
            None => false,
        }
    }

    fn ensure_online(&self) -> ClientResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Network("backend offline".into()));
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn publish(&self, event: &PushEvent) {
        let listeners = lock(&self.listeners);
        for (channel, listener) in listeners.iter() {
            if listener.spec.matches(event) && listener.sink.send(event.clone()).is_err() {
                debug!(channel = %channel, "listener dropped its receiver");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_row<T: Serialize>(record: &T) -> ClientResult<Value> {
    Ok(serde_json::to_value(record)?)
}

#[async_trait]
impl MessageStore for MemoryBackend {
    async fn fetch_messages(&self, key: &ConversationKey) -> ClientResult<Vec<Message>> {
        self.ensure_online()?;
        self.simulate_latency().await;
        self.ensure_online()?;
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| !m.is_deleted && key.contains(m))
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn send_message(&self, message: &NewMessage) -> ClientResult<Message> {
        self.ensure_online()?;
        if message.sender_id == message.receiver_id {
            return Err(ClientError::validation("sender and receiver must differ"));
        }
        let mut state = self.state.write().await;
        if state.messages.iter().any(|m| m.id == message.id) {
            return Err(ClientError::validation(format!(
                "duplicate message id {}",
                message.id
            )));
        }
        let stored = message.optimistic(Timestamp::now());
        state.messages.push(stored.clone());
        self.publish(&PushEvent::insert(&self.tables.messages, to_row(&stored)?));
        Ok(stored)
    }

    async fn mark_read(&self, id: MessageId, reader: UserId) -> ClientResult<Message> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ClientError::NotFound(format!("message {id}")))?;
        if message.receiver_id != reader {
            return Err(ClientError::Permission(format!(
                "message {id} is not addressed to {reader}"
            )));
        }
        if message.read_at.is_some() {
            return Ok(message.clone());
        }
        message.read_at = Some(Timestamp::now());
        let updated = message.clone();
        self.publish(&PushEvent::update(&self.tables.messages, to_row(&updated)?));
        Ok(updated)
    }

    async fn recent_messages(&self, user: UserId, limit: usize) -> ClientResult<Vec<Message>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| !m.is_deleted && (m.sender_id == user || m.receiver_id == user))
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(limit);
        Ok(messages)
    }
}

#[async_trait]
impl CommentStore for MemoryBackend {
    async fn fetch_comments(&self, listing: ListingId) -> ClientResult<Vec<Comment>> {
        self.ensure_online()?;
        self.simulate_latency().await;
        self.ensure_online()?;
        let state = self.state.read().await;
        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|c| c.listing_id == listing)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn create_comment(&self, comment: &NewComment) -> ClientResult<Comment> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        if state.comments.iter().any(|c| c.id == comment.id) {
            return Err(ClientError::validation(format!(
                "duplicate comment id {}",
                comment.id
            )));
        }
        let stored = comment.optimistic(Timestamp::now());
        state.comments.push(stored.clone());
        self.publish(&PushEvent::insert(&self.tables.comments, to_row(&stored)?));
        Ok(stored)
    }

    async fn edit_comment(
        &self,
        id: CommentId,
        actor: UserId,
        body: &str,
    ) -> ClientResult<Comment> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let comment = state
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ClientError::NotFound(format!("comment {id}")))?;
        if comment.author_id != actor {
            return Err(ClientError::Permission(format!(
                "comment {id} belongs to another user"
            )));
        }
        comment.body = body.to_string();
        comment.updated_at = Some(Timestamp::now());
        let updated = comment.clone();
        self.publish(&PushEvent::update(&self.tables.comments, to_row(&updated)?));
        Ok(updated)
    }

    async fn delete_comment(&self, id: CommentId, actor: UserId) -> ClientResult<()> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let index = state
            .comments
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ClientError::NotFound(format!("comment {id}")))?;
        if state.comments[index].author_id != actor {
            return Err(ClientError::Permission(format!(
                "comment {id} belongs to another user"
            )));
        }
        let removed = state.comments.remove(index);
        self.publish(&PushEvent::delete(&self.tables.comments, to_row(&removed)?));
        Ok(())
    }
}

#[async_trait]
impl PushTransport for MemoryBackend {
    async fn subscribe(
        &self,
        spec: ChannelSpec,
        sink: mpsc::UnboundedSender<PushEvent>,
    ) -> ClientResult<ChannelId> {
        if self.refuse_subscriptions.load(Ordering::SeqCst) {
            return Err(ClientError::Subscription(format!(
                "channel {} refused",
                spec.topic
            )));
        }
        let id = ChannelId(self.next_channel.fetch_add(1, Ordering::SeqCst));
        debug!(topic = %spec.topic, channel = %id, "memory channel subscribed");
        lock(&self.listeners).insert(id, Listener { spec, sink });
        Ok(id)
    }

    async fn unsubscribe(&self, channel: ChannelId) -> ClientResult<()> {
        lock(&self.listeners).remove(&channel);
        Ok(())
    }
}
