use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Timestamp;

/// What triggered a notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Chat,
    System,
    Wishlist,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Chat => "chat",
            Self::System => "system",
            Self::Wishlist => "wishlist",
        }
    }
}

impl TryFrom<&str> for NotificationKind {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "chat" => Ok(Self::Chat),
            "system" => Ok(Self::System),
            "wishlist" => Ok(Self::Wishlist),
            _ => Err("invalid notification kind"),
        }
    }
}

/// A locally kept notification entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub avatar: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            NotificationKind::Like,
            NotificationKind::Comment,
            NotificationKind::Chat,
            NotificationKind::System,
            NotificationKind::Wishlist,
        ] {
            assert_eq!(NotificationKind::try_from(kind.as_str()), Ok(kind));
        }
        assert!(NotificationKind::try_from("poke").is_err());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&NotificationKind::Wishlist).unwrap();
        assert_eq!(json, "\"wishlist\"");
    }
}
