//! Subscription manager: one live channel per open view.
//!
//! A [`Subscription`] owns the task that decodes push events and hands them
//! to the view's callback. Closing it cancels the task and waits for it, so
//! once [`Subscription::close`] returns no callback can run again.

use std::sync::Arc;

use serde_json::Value;
use shared::models::{Comment, ConversationKey, ListingId, Message};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use crate::reconcile::Change;
use crate::{
    error::{ClientError, ClientResult},
    realtime::{ChangeKind, ChannelId, ChannelSpec, EqFilter, EventFilter, PushEvent, PushTransport},
    reconcile::Record,
    store::TableNames,
};

/// What a subscription listens to and which changes it lets through.
///
/// The transport filters by listing only; `accepts` narrows further on the
/// client.
pub trait Scope: Send + Sync + 'static {
    type Record: Record;

    fn channel(&self, tables: &TableNames) -> ChannelSpec;

    fn accepts(&self, change: &Change<Self::Record>) -> bool;
}

impl Scope for ConversationKey {
    type Record = Message;

    fn channel(&self, tables: &TableNames) -> ChannelSpec {
        ChannelSpec::new(
            format!("chat:{}:{}:{}", self.listing_id, self.low, self.high),
            tables.schema.clone(),
            tables.messages.clone(),
        )
        .with_filter(EqFilter::new("listing_id", self.listing_id))
        .with_events(EventFilter::All)
    }

    fn accepts(&self, change: &Change<Message>) -> bool {
        change.record().is_none_or(|message| self.contains(message))
    }
}

/// All comments under one listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListingComments(pub ListingId);

impl std::fmt::Display for ListingComments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listing {}", self.0)
    }
}

impl Scope for ListingComments {
    type Record = Comment;

    fn channel(&self, tables: &TableNames) -> ChannelSpec {
        ChannelSpec::new(
            format!("comments:{}", self.0),
            tables.schema.clone(),
            tables.comments.clone(),
        )
        .with_filter(EqFilter::new("listing_id", self.0))
        .with_events(EventFilter::All)
    }

    fn accepts(&self, change: &Change<Comment>) -> bool {
        change.record().is_none_or(|comment| comment.listing_id == self.0)
    }
}

/// Decodes a raw push event into a typed change.
///
/// # Errors
/// [`ClientError::Decode`] when the row is missing or does not match `R`.
pub fn decode_change<R: Record>(event: PushEvent) -> ClientResult<Change<R>> {
    let kind = event.kind;
    let row = |value: Option<Value>| {
        value.ok_or_else(|| ClientError::Decode(format!("{} event without a row", kind.as_str())))
    };
    match kind {
        ChangeKind::Insert => Ok(Change::Inserted(serde_json::from_value(row(event.record)?)?)),
        ChangeKind::Update => Ok(Change::Updated(serde_json::from_value(row(event.record)?)?)),
        ChangeKind::Delete => {
            let old = row(event.old_record)?;
            let id = old
                .get("id")
                .cloned()
                .ok_or_else(|| ClientError::Decode("delete event without an id".into()))?;
            Ok(Change::Deleted(serde_json::from_value(id)?))
        }
    }
}

/// A live channel feeding one callback. State: open until closed or dropped.
#[derive(Debug)]
pub struct Subscription {
    channel: ChannelId,
    topic: String,
    transport: Arc<dyn PushTransport>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Joins the scope's channel and starts dispatching accepted changes to
    /// `callback`.
    ///
    /// # Errors
    /// [`ClientError::Subscription`] when the channel cannot be established.
    pub async fn open<S, F>(
        transport: Arc<dyn PushTransport>,
        tables: &TableNames,
        scope: S,
        callback: F,
    ) -> ClientResult<Self>
    where
        S: Scope,
        F: FnMut(Change<S::Record>) + Send + 'static,
    {
        Self::open_with_end(transport, tables, scope, callback, |_| {}).await
    }

    /// Like [`Subscription::open`], and calls `on_ended` with a reason if the
    /// transport ends the channel before it is closed.
    ///
    /// # Arguments
    /// * `transport` - The push transport to join the channel on.
    /// * `tables` - Table names used to build the channel.
    /// * `scope` - What to listen to.
    /// * `callback` - Receives every accepted change.
    /// * `on_ended` - Runs at most once, never after [`Subscription::close`].
    ///
    /// # Errors
    /// [`ClientError::Subscription`] when the channel cannot be established.
    pub async fn open_with_end<S, F, E>(
        transport: Arc<dyn PushTransport>,
        tables: &TableNames,
        scope: S,
        callback: F,
        on_ended: E,
    ) -> ClientResult<Self>
    where
        S: Scope,
        F: FnMut(Change<S::Record>) + Send + 'static,
        E: FnOnce(String) + Send + 'static,
    {
        let spec = scope.channel(tables);
        let topic = spec.topic.clone();
        let (sink, events) = mpsc::unbounded_channel();
        let channel = transport.subscribe(spec, sink).await?;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(dispatch(
            scope,
            events,
            callback,
            on_ended,
            cancel.clone(),
            topic.clone(),
        ));
        info!(topic = %topic, channel = %channel, "subscription opened");

        Ok(Self {
            channel,
            topic,
            transport,
            cancel,
            task: Some(task),
        })
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// False once closed, or once the transport ended the channel.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Tears the channel down. No callback runs after this returns.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        if let Err(err) = self.transport.unsubscribe(self.channel).await {
            warn!(topic = %self.topic, error = %err, "unsubscribe failed");
        }
        info!(topic = %self.topic, channel = %self.channel, "subscription closed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.task.take().is_none() {
            return;
        }
        let transport = Arc::clone(&self.transport);
        let channel = self.channel;
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let _ = transport.unsubscribe(channel).await;
            });
        }
    }
}

async fn dispatch<S, F, E>(
    scope: S,
    mut events: mpsc::UnboundedReceiver<PushEvent>,
    mut callback: F,
    on_ended: E,
    cancel: CancellationToken,
    topic: String,
) where
    S: Scope,
    F: FnMut(Change<S::Record>) + Send + 'static,
    E: FnOnce(String) + Send + 'static,
{
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(event) = event else {
            if !cancel.is_cancelled() {
                warn!(topic = %topic, "push channel ended");
                on_ended(format!("live channel {topic} was closed by the server"));
            }
            break;
        };
        if cancel.is_cancelled() {
            break;
        }

        match decode_change::<S::Record>(event) {
            Ok(change) if scope.accepts(&change) => callback(change),
            Ok(_) => debug!(topic = %topic, "change outside scope ignored"),
            Err(err) => warn!(topic = %topic, error = %err, "skipping malformed push event"),
        }
    }
}

/// Holds at most one subscription for a view.
#[derive(Debug)]
pub struct SubscriptionManager {
    transport: Arc<dyn PushTransport>,
    tables: TableNames,
    active: Option<Subscription>,
}

impl SubscriptionManager {
    #[must_use]
    pub fn new(transport: Arc<dyn PushTransport>, tables: TableNames) -> Self {
        Self {
            transport,
            tables,
            active: None,
        }
    }

    /// Closes any current subscription, then opens one for `scope`.
    ///
    /// # Errors
    /// [`ClientError::Subscription`] when the new channel cannot be
    /// established. The previous subscription is closed either way.
    pub async fn open<S, F>(&mut self, scope: S, callback: F) -> ClientResult<()>
    where
        S: Scope,
        F: FnMut(Change<S::Record>) + Send + 'static,
    {
        self.open_with_end(scope, callback, |_| {}).await
    }

    /// Like [`SubscriptionManager::open`], reporting a transport-ended
    /// channel to `on_ended`.
    ///
    /// # Errors
    /// [`ClientError::Subscription`] when the new channel cannot be
    /// established.
    pub async fn open_with_end<S, F, E>(
        &mut self,
        scope: S,
        callback: F,
        on_ended: E,
    ) -> ClientResult<()>
    where
        S: Scope,
        F: FnMut(Change<S::Record>) + Send + 'static,
        E: FnOnce(String) + Send + 'static,
    {
        self.close().await;
        let subscription = Subscription::open_with_end(
            Arc::clone(&self.transport),
            &self.tables,
            scope,
            callback,
            on_ended,
        )
        .await?;
        self.active = Some(subscription);
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(subscription) = self.active.take() {
            subscription.close().await;
        }
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.active.as_ref().is_some_and(Subscription::is_open)
    }

    #[must_use]
    pub fn active_topic(&self) -> Option<&str> {
        self.active.as_ref().map(Subscription::topic)
    }
}
