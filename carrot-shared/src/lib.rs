#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]

//! Models, configuration, and logging shared by the Carrot client library and CLI.

pub mod config;
pub mod logging;
pub mod models;

pub use config::{BackendConfig, Config, ConfigError, LogFormat, LoggingConfig};
pub use models::{
    Comment, CommentId, ConversationKey, ErrorResponse, ListingId, Message, MessageId, NewComment,
    NewMessage, Notification, NotificationKind, Timestamp, UserId,
};
