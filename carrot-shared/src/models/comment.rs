use serde::{Deserialize, Serialize};

use super::{CommentId, ListingId, Timestamp, UserId};

/// A public comment under a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    pub listing_id: ListingId,
    pub author_id: UserId,
    pub author_display_name: String,
    pub body: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl Comment {
    /// True when the author changed the comment after posting it.
    #[must_use]
    pub fn is_edited(&self) -> bool {
        self.updated_at
            .is_some_and(|updated| updated > self.created_at)
    }
}

/// Insert payload for a new comment. The id is chosen by the author's client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewComment {
    pub id: CommentId,
    pub listing_id: ListingId,
    pub author_id: UserId,
    pub author_display_name: String,
    pub body: String,
}

impl NewComment {
    #[must_use]
    pub fn new(
        listing_id: ListingId,
        author_id: UserId,
        author_display_name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: CommentId::new_v4(),
            listing_id,
            author_id,
            author_display_name: author_display_name.into(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn optimistic(&self, created_at: Timestamp) -> Comment {
        Comment {
            id: self.id,
            listing_id: self.listing_id,
            author_id: self.author_id,
            author_display_name: self.author_display_name.clone(),
            body: self.body.clone(),
            created_at,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn comment_at(created: Timestamp, updated: Option<Timestamp>) -> Comment {
        Comment {
            id: CommentId::new_v4(),
            listing_id: ListingId(1),
            author_id: UserId::new_v4(),
            author_display_name: "당근이".into(),
            body: "아직 판매중인가요?".into(),
            created_at: created,
            updated_at: updated,
        }
    }

    #[test]
    fn edited_only_when_updated_after_creation() {
        let created = Timestamp(Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap());
        let later = Timestamp(created.0 + Duration::minutes(3));

        assert!(!comment_at(created, None).is_edited());
        assert!(!comment_at(created, Some(created)).is_edited());
        assert!(comment_at(created, Some(later)).is_edited());
    }

    #[test]
    fn missing_updated_at_deserializes() {
        let json = format!(
            r#"{{"id":"{}","listing_id":3,"author_id":"{}","author_display_name":"kim","body":"hello","created_at":"2025-05-01T09:00:00Z"}}"#,
            CommentId::new_v4(),
            UserId::new_v4()
        );
        let comment: Comment = serde_json::from_str(&json).unwrap();
        assert!(comment.updated_at.is_none());
        assert_eq!(comment.listing_id, ListingId(3));
    }
}
