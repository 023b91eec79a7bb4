//! The chat list: recent messages grouped into one room per conversation.

use std::collections::HashMap;

use serde::Serialize;
use shared::models::{ConversationKey, Message, Timestamp, UserId};
use tracing::debug;

use crate::{error::ClientResult, store::MessageStore};

/// Recent messages scanned when building the room list.
pub const DEFAULT_INBOX_LIMIT: usize = 50;

/// One conversation as shown in the chat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRoom {
    pub key: ConversationKey,
    pub counterpart: UserId,
    /// Newest message of the conversation.
    pub last_message: String,
    pub last_message_at: Timestamp,
    /// Messages to the viewer that have not been read.
    pub unread: usize,
}

/// Groups messages into rooms, newest room first.
///
/// Messages the viewer neither sent nor received are ignored.
#[must_use]
pub fn group_rooms(messages: &[Message], viewer: UserId) -> Vec<ChatRoom> {
    let mut rooms: HashMap<ConversationKey, ChatRoom> = HashMap::new();

    for message in messages.iter().filter(|m| !m.is_deleted) {
        let key = message.conversation_key();
        let Some(counterpart) = key.counterpart(viewer) else {
            continue;
        };
        let unread = usize::from(message.receiver_id == viewer && !message.is_read());

        rooms
            .entry(key)
            .and_modify(|room| {
                room.unread += unread;
                if message.created_at > room.last_message_at {
                    room.last_message.clone_from(&message.body);
                    room.last_message_at = message.created_at;
                }
            })
            .or_insert_with(|| ChatRoom {
                key,
                counterpart,
                last_message: message.body.clone(),
                last_message_at: message.created_at,
                unread,
            });
    }

    let mut rooms: Vec<ChatRoom> = rooms.into_values().collect();
    rooms.sort_by(|a, b| {
        b.last_message_at
            .cmp(&a.last_message_at)
            .then_with(|| a.key.cmp(&b.key))
    });
    rooms
}

/// The viewer's chat rooms, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inbox {
    pub rooms: Vec<ChatRoom>,
}

impl Inbox {
    /// Loads the viewer's `limit` most recent messages and groups them.
    ///
    /// # Errors
    /// The store error.
    pub async fn load(store: &dyn MessageStore, viewer: UserId, limit: usize) -> ClientResult<Self> {
        let messages = store.recent_messages(viewer, limit).await?;
        let rooms = group_rooms(&messages, viewer);
        debug!(messages = messages.len(), rooms = rooms.len(), "inbox loaded");
        Ok(Self { rooms })
    }

    /// Sum of unread messages across all rooms.
    #[must_use]
    pub fn total_unread(&self) -> usize {
        self.rooms.iter().map(|room| room.unread).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
