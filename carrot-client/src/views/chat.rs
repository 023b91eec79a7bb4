use std::sync::Arc;

use chrono::Utc;
use shared::models::{ConversationKey, Message, NewMessage, Timestamp, UserId};
use tracing::{info, instrument, warn};

use super::{LiveStatus, LiveView};
use crate::{
    error::{ClientError, ClientResult},
    presentation::{Locale, MessageView, present_messages},
    realtime::PushTransport,
    reconcile::OrderPolicy,
    store::{MessageStore, TableNames},
    validation::{MAX_MESSAGE_CHARS, validate_body},
};

/// One open conversation between the viewer and a counterpart.
#[derive(Debug)]
pub struct ChatView {
    store: Arc<dyn MessageStore>,
    viewer: UserId,
    live: LiveView<ConversationKey>,
}

impl ChatView {
    /// Creates a closed chat view with arrival ordering.
    ///
    /// # Arguments
    /// * `store` - Where messages are fetched and sent.
    /// * `transport` - Push transport for live changes.
    /// * `tables` - Backend table names.
    /// * `viewer` - The signed-in user.
    ///
    /// # Returns
    /// A view in [`LiveStatus::Closed`]; call [`ChatView::open`] next.
    pub fn new(
        store: Arc<dyn MessageStore>,
        transport: Arc<dyn PushTransport>,
        tables: TableNames,
        viewer: UserId,
    ) -> Self {
        Self::with_policy(store, transport, tables, viewer, OrderPolicy::default())
    }

    /// Like [`ChatView::new`] with an explicit [`OrderPolicy`].
    pub fn with_policy(
        store: Arc<dyn MessageStore>,
        transport: Arc<dyn PushTransport>,
        tables: TableNames,
        viewer: UserId,
        policy: OrderPolicy,
    ) -> Self {
        Self {
            store,
            viewer,
            live: LiveView::new(transport, tables, policy),
        }
    }

    #[must_use]
    pub const fn viewer(&self) -> UserId {
        self.viewer
    }

    /// Opens `key`, replacing whatever conversation was open before.
    ///
    /// # Errors
    /// [`ClientError::Validation`] when the viewer is not a participant, or
    /// the store error when the snapshot cannot be fetched. A channel that
    /// fails to establish is reported through [`ChatView::degraded_reason`].
    #[instrument(skip(self), fields(viewer = %self.viewer))]
    pub async fn open(&self, key: ConversationKey) -> ClientResult<()> {
        if !key.involves(self.viewer) {
            return Err(ClientError::validation("viewer is not part of this conversation"));
        }
        let store = Arc::clone(&self.store);
        self.live
            .open(key, |key| async move { store.fetch_messages(&key).await })
            .await?;
        info!(key = %key, count = self.live.read(|state| state.timeline.len()), "conversation opened");
        Ok(())
    }

    /// Fetches the open conversation again.
    ///
    /// # Errors
    /// Validation when nothing is open, else the store error.
    pub async fn refresh(&self) -> ClientResult<()> {
        let store = Arc::clone(&self.store);
        self.live
            .refresh(|key| async move { store.fetch_messages(&key).await })
            .await
    }

    /// Sends `body` to the counterpart.
    ///
    /// The message shows up locally right away. On failure it is removed
    /// again and the error returned; on success the stored row replaces it.
    ///
    /// # Errors
    /// Validation for an empty or oversized body or when no conversation is
    /// open, else the store error.
    #[instrument(skip(self, body), fields(viewer = %self.viewer))]
    pub async fn send(&self, body: &str) -> ClientResult<Message> {
        let body = validate_body(body, MAX_MESSAGE_CHARS)?;
        let (generation, key) = self.live.current()?;
        let receiver = key
            .counterpart(self.viewer)
            .ok_or_else(|| ClientError::validation("viewer is not part of this conversation"))?;

        let draft = NewMessage::new(key.listing_id, self.viewer, receiver, body);
        self.live.update(generation, |timeline| {
            timeline.insert(draft.optimistic(Timestamp::now()))
        });

        match self.store.send_message(&draft).await {
            Ok(stored) => {
                self.live
                    .update(generation, |timeline| timeline.upsert(stored.clone()));
                Ok(stored)
            }
            Err(err) => {
                warn!(id = %draft.id, error = %err, "send failed, rolling back");
                self.live
                    .update(generation, |timeline| timeline.remove(draft.id));
                Err(err)
            }
        }
    }

    /// Marks every unread message addressed to the viewer as read. Returns
    /// how many were marked.
    ///
    /// # Errors
    /// The first store error; messages marked before it stay marked.
    pub async fn mark_read_incoming(&self) -> ClientResult<usize> {
        let (generation, _) = self.live.current()?;
        let unread: Vec<_> = self.live.read(|state| {
            state
                .timeline
                .records()
                .iter()
                .filter(|message| message.receiver_id == self.viewer && !message.is_read())
                .map(|message| message.id)
                .collect()
        });

        for id in &unread {
            let updated = self.store.mark_read(*id, self.viewer).await?;
            self.live
                .update(generation, |timeline| timeline.upsert(updated));
        }
        Ok(unread.len())
    }

    /// The displayed messages, in display order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.live.records()
    }

    #[must_use]
    pub fn present(&self, locale: Locale) -> Vec<MessageView> {
        present_messages(&self.messages(), Some(self.viewer), Utc::now(), locale)
    }

    #[must_use]
    pub fn key(&self) -> Option<ConversationKey> {
        self.live.scope()
    }

    #[must_use]
    pub fn live_status(&self) -> LiveStatus {
        self.live.live_status()
    }

    /// Why live updates are unavailable, when the view is snapshot-only.
    #[must_use]
    pub fn degraded_reason(&self) -> Option<String> {
        self.live.degraded_reason()
    }

    /// Tears the channel down and clears the view.
    pub async fn close(&self) {
        self.live.close().await;
    }
}
