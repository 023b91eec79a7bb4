//! Data access: typed request/response calls over the messages and comments
//! tables.

mod memory;
mod rest;

pub use memory::MemoryBackend;
pub use rest::RestStore;
pub(crate) use rest::error_for_status;

use async_trait::async_trait;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use shared::{
    BackendConfig,
    config::{DEFAULT_COMMENTS_TABLE, DEFAULT_MESSAGES_TABLE, DEFAULT_SCHEMA},
    models::{
        Comment, CommentId, ConversationKey, ListingId, Message, MessageId, NewComment,
        NewMessage, UserId,
    },
};

use crate::error::ClientResult;

/// Physical table names and schema shared by the stores and the channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub messages: String,
    pub comments: String,
    pub schema: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            messages: DEFAULT_MESSAGES_TABLE.to_string(),
            comments: DEFAULT_COMMENTS_TABLE.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

impl From<&BackendConfig> for TableNames {
    fn from(config: &BackendConfig) -> Self {
        Self {
            messages: config.messages_table.clone(),
            comments: config.comments_table.clone(),
            schema: config.schema.clone(),
        }
    }
}

/// Persistent access to chat messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Non-deleted messages of one conversation, oldest first.
    async fn fetch_messages(&self, key: &ConversationKey) -> ClientResult<Vec<Message>>;

    /// Inserts a message and returns the stored row.
    async fn send_message(&self, message: &NewMessage) -> ClientResult<Message>;

    /// Stamps `read_at` on a message addressed to `reader`. Already-read
    /// messages are returned unchanged.
    async fn mark_read(&self, id: MessageId, reader: UserId) -> ClientResult<Message>;

    /// Non-deleted messages `user` sent or received, newest first.
    async fn recent_messages(&self, user: UserId, limit: usize) -> ClientResult<Vec<Message>>;
}

/// Persistent access to listing comments. Mutations are owner-scoped.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Comments under a listing, oldest first.
    async fn fetch_comments(&self, listing: ListingId) -> ClientResult<Vec<Comment>>;

    async fn create_comment(&self, comment: &NewComment) -> ClientResult<Comment>;

    /// Replaces the body of a comment owned by `actor`.
    async fn edit_comment(&self, id: CommentId, actor: UserId, body: &str)
    -> ClientResult<Comment>;

    /// Deletes a comment owned by `actor`.
    async fn delete_comment(&self, id: CommentId, actor: UserId) -> ClientResult<()>;
}

impl Debug for dyn MessageStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("MessageStore")
    }
}

impl Debug for dyn CommentStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("CommentStore")
    }
}
