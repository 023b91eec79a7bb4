use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;

use super::{ListingId, Message, UserId};

/// Why a [`ConversationKey`] could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("a conversation needs two distinct participants")]
    SameParticipant,
}

/// Identity of a chat: a listing plus an unordered pair of participants.
///
/// The key is derived, never stored. `low`/`high` hold the participants in
/// ascending order so that `(l, a, b)` and `(l, b, a)` produce equal keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    pub listing_id: ListingId,
    pub low: UserId,
    pub high: UserId,
}

impl ConversationKey {
    /// Builds the key for a conversation between `a` and `b` about `listing_id`.
    ///
    /// # Errors
    /// Returns [`KeyError::SameParticipant`] when `a == b`.
    pub fn new(listing_id: ListingId, a: UserId, b: UserId) -> Result<Self, KeyError> {
        if a == b {
            return Err(KeyError::SameParticipant);
        }
        Ok(Self::from_ordered(listing_id, a, b))
    }

    pub(crate) fn from_ordered(listing_id: ListingId, a: UserId, b: UserId) -> Self {
        Self {
            listing_id,
            low: a.min(b),
            high: a.max(b),
        }
    }

    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.low == user || self.high == user
    }

    /// The other participant from `user`'s point of view.
    #[must_use]
    pub fn counterpart(&self, user: UserId) -> Option<UserId> {
        if user == self.low {
            Some(self.high)
        } else if user == self.high {
            Some(self.low)
        } else {
            None
        }
    }

    /// True when `message` was exchanged in this conversation, in either direction.
    #[must_use]
    pub fn contains(&self, message: &Message) -> bool {
        message.listing_id == self.listing_id
            && message.sender_id != message.receiver_id
            && self.involves(message.sender_id)
            && self.involves(message.receiver_id)
    }
}

impl Display for ConversationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}:{}", self.listing_id, self.low, self.high)
    }
}
