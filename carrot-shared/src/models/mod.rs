pub mod comment;
pub mod conversation;
pub mod errors;
pub mod ids;
pub mod message;
pub mod notification;
pub mod timestamp;
pub mod user;

pub use comment::{Comment, NewComment};
pub use conversation::{ConversationKey, KeyError};
pub use errors::ErrorResponse;
pub use ids::{CommentId, ListingId, MessageId, UserId};
pub use message::{Message, NewMessage};
pub use notification::{Notification, NotificationKind};
pub use timestamp::Timestamp;
pub use user::{AuthUser, Session};
