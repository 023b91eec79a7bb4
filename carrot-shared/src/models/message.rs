use serde::{Deserialize, Serialize};

use super::{ConversationKey, ListingId, MessageId, Timestamp, UserId};

/// A row of the messages table: one chat line between two participants about a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique identifier for the message.
    pub id: MessageId,

    /// Listing the conversation is about.
    pub listing_id: ListingId,

    /// ID of the user who sent the message.
    pub sender_id: UserId,

    /// ID of the user the message is addressed to.
    pub receiver_id: UserId,

    /// The message text.
    pub body: String,

    /// When the backend stored the message.
    pub created_at: Timestamp,

    /// When the receiver read the message, if they have.
    #[serde(default)]
    pub read_at: Option<Timestamp>,

    /// Soft-delete flag; deleted rows are never displayed.
    #[serde(default)]
    pub is_deleted: bool,
}

impl Message {
    /// The conversation this message belongs to.
    #[must_use]
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::from_ordered(self.listing_id, self.sender_id, self.receiver_id)
    }

    #[must_use]
    pub const fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Insert payload for a new message. The id is chosen by the sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMessage {
    pub id: MessageId,
    pub listing_id: ListingId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub body: String,
}

impl NewMessage {
    /// Builds an insert payload with a freshly generated id.
    #[must_use]
    pub fn new(
        listing_id: ListingId,
        sender_id: UserId,
        receiver_id: UserId,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new_v4(),
            listing_id,
            sender_id,
            receiver_id,
            body: body.into(),
        }
    }

    /// The locally displayed copy of this message before the backend confirms it.
    #[must_use]
    pub fn optimistic(&self, created_at: Timestamp) -> Message {
        Message {
            id: self.id,
            listing_id: self.listing_id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            body: self.body.clone(),
            created_at,
            read_at: None,
            is_deleted: false,
        }
    }
}
