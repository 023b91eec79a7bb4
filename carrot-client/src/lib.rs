#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]

//! Realtime conversation sync for the Carrot marketplace client.
//!
//! Layers, bottom up: [`store`] talks to the tables, [`realtime`] delivers
//! row changes, [`subscription`] scopes those changes to one open view,
//! [`reconcile`] merges them without duplicates, and [`presentation`] turns
//! records into display rows. [`views`] wires the layers together for a
//! chat or a comment thread.

pub mod auth;
pub mod error;
pub mod inbox;
pub mod local;
pub mod presentation;
pub mod realtime;
pub mod reconcile;
pub mod store;
pub mod subscription;
pub mod validation;
pub mod views;

pub use auth::AuthClient;
pub use error::{ClientError, ClientResult};
pub use inbox::{ChatRoom, DEFAULT_INBOX_LIMIT, Inbox, group_rooms};
pub use presentation::{CommentView, Locale, MessageView, relative_time};
pub use realtime::{PushTransport, RealtimeSocket};
pub use reconcile::{Change, MergeOutcome, OrderPolicy, Record, Timeline, merge};
pub use store::{CommentStore, MemoryBackend, MessageStore, RestStore, TableNames};
pub use subscription::{ListingComments, Scope, Subscription, SubscriptionManager};
pub use views::{ChatView, CommentThread, LiveStatus, Viewer};
