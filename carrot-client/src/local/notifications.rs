use std::path::{Path, PathBuf};

use shared::models::{Notification, NotificationKind, Timestamp};
use tracing::debug;
use uuid::Uuid;

use super::{StorageError, read_json, write_json};

/// Oldest entries beyond this are dropped.
pub const MAX_NOTIFICATIONS: usize = 50;

/// Something the user should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// Someone liked one of the user's listings.
    Like { listing_title: String },
    Comment {
        listing_title: String,
        author: Option<String>,
    },
    Chat { listing_title: String },
    System { message: Option<String> },
    /// A wishlisted listing changed price.
    Wishlist {
        listing_title: String,
        price_dropped: bool,
    },
}

impl NotificationEvent {
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::Like { .. } => NotificationKind::Like,
            Self::Comment { .. } => NotificationKind::Comment,
            Self::Chat { .. } => NotificationKind::Chat,
            Self::System { .. } => NotificationKind::System,
            Self::Wishlist { .. } => NotificationKind::Wishlist,
        }
    }

    /// Title, body, and avatar glyph.
    fn content(&self) -> (&'static str, String, &'static str) {
        match self {
            Self::Like { listing_title } => (
                "내 상품을 좋아해요",
                format!("\"{listing_title}\"에 관심있어 하는 분이 계시네요!"),
                "❤️",
            ),
            Self::Comment {
                listing_title,
                author,
            } => (
                "댓글이 달렸어요",
                format!(
                    "{}님이 \"{listing_title}\"에 댓글을 남겼어요",
                    author.as_deref().unwrap_or("익명")
                ),
                "💬",
            ),
            Self::Chat { listing_title } => (
                "채팅 메시지",
                format!(
                    "\"{listing_title}\"에 대한 문의가 도착했어요. 빠른 답변으로 좋은 거래하세요!"
                ),
                "💌",
            ),
            Self::System { message } => (
                "당근 알림",
                message
                    .clone()
                    .unwrap_or_else(|| "새로운 소식이 있어요".to_string()),
                "🥕",
            ),
            Self::Wishlist {
                listing_title,
                price_dropped,
            } => (
                "관심상품 가격 변동",
                format!(
                    "관심 등록한 \"{listing_title}\"의 가격이 {}",
                    if *price_dropped {
                        "내려갔어요!"
                    } else {
                        "변경되었어요!"
                    }
                ),
                "💰",
            ),
        }
    }
}

/// The user's notifications, newest first.
#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    path: Option<PathBuf>,
    entries: Vec<Notification>,
}

impl NotificationStore {
    /// A store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// # Errors
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let mut entries: Vec<Notification> = read_json(&path)?;
        entries.truncate(MAX_NOTIFICATIONS);
        debug!(path = %path.display(), count = entries.len(), "notifications loaded");
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// Writes the store back to the file it was loaded from.
    ///
    /// # Errors
    /// Fails when the file cannot be written.
    pub fn save(&self) -> Result<(), StorageError> {
        match &self.path {
            Some(path) => write_json(path, &self.entries),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Records `event` as the newest notification and returns it.
    pub fn push(&mut self, event: &NotificationEvent) -> Notification {
        let (title, body, avatar) = event.content();
        let notification = Notification {
            id: Uuid::new_v4(),
            kind: event.kind(),
            title: title.to_string(),
            body,
            avatar: avatar.to_string(),
            is_read: false,
            created_at: Timestamp::now(),
        };
        self.entries.insert(0, notification.clone());
        self.entries.truncate(MAX_NOTIFICATIONS);
        notification
    }

    #[must_use]
    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|n| !n.is_read).count()
    }

    /// Returns `false` when no notification has `id`.
    pub fn mark_read(&mut self, id: Uuid) -> bool {
        match self.entries.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.is_read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for notification in &mut self.entries {
            notification.is_read = true;
        }
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Notification> {
        let index = self.entries.iter().position(|n| n.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use test_case::test_case;

    fn like(title: &str) -> NotificationEvent {
        NotificationEvent::Like {
            listing_title: title.into(),
        }
    }

    #[test_case(like("자전거"), "내 상품을 좋아해요", "\"자전거\"에 관심있어 하는 분이 계시네요!", "❤️" ; "like")]
    #[test_case(
        NotificationEvent::Comment { listing_title: "책상".into(), author: None },
        "댓글이 달렸어요", "익명님이 \"책상\"에 댓글을 남겼어요", "💬" ; "anonymous comment"
    )]
    #[test_case(
        NotificationEvent::Comment { listing_title: "책상".into(), author: Some("당근이".into()) },
        "댓글이 달렸어요", "당근이님이 \"책상\"에 댓글을 남겼어요", "💬" ; "named comment"
    )]
    #[test_case(
        NotificationEvent::System { message: None },
        "당근 알림", "새로운 소식이 있어요", "🥕" ; "system default"
    )]
    #[test_case(
        NotificationEvent::Wishlist { listing_title: "의자".into(), price_dropped: true },
        "관심상품 가격 변동", "관심 등록한 \"의자\"의 가격이 내려갔어요!", "💰" ; "price drop"
    )]
    #[test_case(
        NotificationEvent::Wishlist { listing_title: "의자".into(), price_dropped: false },
        "관심상품 가격 변동", "관심 등록한 \"의자\"의 가격이 변경되었어요!", "💰" ; "price change"
    )]
    fn builds_localized_content(event: NotificationEvent, title: &str, body: &str, avatar: &str) {
        let mut store = NotificationStore::in_memory();
        let notification = store.push(&event);

        assert_eq!(notification.kind, event.kind());
        assert_eq!(notification.title, title);
        assert_eq!(notification.body, body);
        assert_eq!(notification.avatar, avatar);
        assert!(!notification.is_read);
    }

    #[test]
    fn newest_first_and_capped() {
        let mut store = NotificationStore::in_memory();
        for i in 0..=MAX_NOTIFICATIONS {
            store.push(&like(&format!("item {i}")));
        }

        assert_eq!(store.entries().len(), MAX_NOTIFICATIONS);
        assert!(store.entries()[0].body.contains(&format!("item {MAX_NOTIFICATIONS}")));
        assert!(store.entries().iter().all(|n| !n.body.contains("\"item 0\"")));
    }

    #[test]
    fn read_state_and_removal() {
        let mut store = NotificationStore::in_memory();
        let first = store.push(&like("a"));
        let second = store.push(&NotificationEvent::Chat {
            listing_title: "b".into(),
        });
        assert_eq!(store.unread_count(), 2);

        assert!(store.mark_read(first.id));
        assert!(!store.mark_read(Uuid::new_v4()));
        assert_eq!(store.unread_count(), 1);

        assert_eq!(store.remove(second.id).map(|n| n.id), Some(second.id));
        assert_eq!(store.unread_count(), 0);

        store.push(&like("c"));
        store.mark_all_read();
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn persists_across_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notifications.json");

        let mut store = NotificationStore::load(&path).unwrap();
        assert!(store.entries().is_empty());
        let pushed = store.push(&like("자전거"));
        store.save().unwrap();

        let reloaded = NotificationStore::load(&path).unwrap();
        assert_eq!(reloaded.entries(), &[pushed]);
        assert_eq!(reloaded.path(), Some(path.as_path()));
    }
}
