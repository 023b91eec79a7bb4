//! Display-ready view models for messages and comments.
//!
//! Everything here is a pure function of its inputs: the current time and the
//! viewer are passed in explicitly.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Serialize;
use shared::models::{Comment, CommentId, Message, MessageId, Timestamp, UserId};

use crate::reconcile::Record;

const SECONDS_PER_HOUR: i32 = 3600;
const KST_OFFSET_HOURS: i32 = 9;

/// Display language for relative times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Locale {
    /// Korean, with calendar dates in KST.
    #[default]
    Ko,
    /// English, with calendar dates in UTC.
    En,
}

impl Locale {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ko => "ko",
            Self::En => "en",
        }
    }

    /// Calendar dates are rendered in the locale's home time zone.
    fn offset(self) -> FixedOffset {
        let hours = match self {
            Self::Ko => KST_OFFSET_HOURS,
            Self::En => 0,
        };
        FixedOffset::east_opt(hours * SECONDS_PER_HOUR).unwrap_or_else(|| Utc.fix())
    }
}

impl TryFrom<&str> for Locale {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "ko" => Ok(Self::Ko),
            "en" => Ok(Self::En),
            _ => Err("invalid locale"),
        }
    }
}

/// Buckets the age of `then` relative to `now`: under a minute, minutes,
/// hours, then a calendar date. Times in the future count as "just now".
#[must_use]
pub fn relative_time(now: DateTime<Utc>, then: DateTime<Utc>, locale: Locale) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();

    match locale {
        Locale::Ko if minutes < 1 => "방금 전".to_string(),
        Locale::Ko if minutes < 60 => format!("{minutes}분 전"),
        Locale::Ko if hours < 24 => format!("{hours}시간 전"),
        Locale::En if minutes < 1 => "just now".to_string(),
        Locale::En if minutes == 1 => "1 minute ago".to_string(),
        Locale::En if minutes < 60 => format!("{minutes} minutes ago"),
        Locale::En if hours == 1 => "1 hour ago".to_string(),
        Locale::En if hours < 24 => format!("{hours} hours ago"),
        Locale::Ko => then
            .with_timezone(&locale.offset())
            .format("%Y. %-m. %-d.")
            .to_string(),
        Locale::En => then
            .with_timezone(&locale.offset())
            .format("%Y-%m-%d")
            .to_string(),
    }
}

/// A chat message ready to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub id: MessageId,
    pub body: String,
    pub sender_id: UserId,
    /// Sent by the viewer.
    pub is_own: bool,
    /// Relative time, e.g. "5분 전".
    pub display_time: String,
    /// First message of a run from the same sender.
    pub show_sender_header: bool,
    pub is_read: bool,
}

/// A listing comment ready to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub author_display_name: String,
    pub body: String,
    pub is_own: bool,
    pub display_time: String,
    pub show_sender_header: bool,
    pub is_edited: bool,
}

fn is_own(author: UserId, viewer: Option<UserId>) -> bool {
    viewer == Some(author)
}

/// Header flags for a sequence: set on the first record and wherever the
/// author changes from the previous record.
fn sender_headers<R: Record>(records: &[R]) -> impl Iterator<Item = bool> + '_ {
    records.iter().enumerate().map(move |(index, record)| {
        index == 0 || records[index - 1].author() != record.author()
    })
}

fn display_time(now: DateTime<Utc>, at: Timestamp, locale: Locale) -> String {
    relative_time(now, at.0, locale)
}

/// Maps messages to display rows, keeping their order.
///
/// # Arguments
/// * `records` - Messages in display order.
/// * `viewer` - The signed-in user, if any, for `is_own`.
/// * `now` - Reference time for relative timestamps.
/// * `locale` - Display language.
///
/// # Returns
/// One [`MessageView`] per message.
#[must_use]
pub fn present_messages(
    records: &[Message],
    viewer: Option<UserId>,
    now: DateTime<Utc>,
    locale: Locale,
) -> Vec<MessageView> {
    records
        .iter()
        .zip(sender_headers(records))
        .map(|(message, show_sender_header)| MessageView {
            id: message.id,
            body: message.body.clone(),
            sender_id: message.sender_id,
            is_own: is_own(message.sender_id, viewer),
            display_time: display_time(now, message.created_at, locale),
            show_sender_header,
            is_read: message.is_read(),
        })
        .collect()
}

/// Comment counterpart of [`present_messages`].
#[must_use]
pub fn present_comments(
    records: &[Comment],
    viewer: Option<UserId>,
    now: DateTime<Utc>,
    locale: Locale,
) -> Vec<CommentView> {
    records
        .iter()
        .zip(sender_headers(records))
        .map(|(comment, show_sender_header)| CommentView {
            id: comment.id,
            author_display_name: comment.author_display_name.clone(),
            body: comment.body.clone(),
            is_own: is_own(comment.author_id, viewer),
            display_time: display_time(now, comment.created_at, locale),
            show_sender_header,
            is_edited: comment.is_edited(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use shared::models::ListingId;
    use test_case::test_case;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 8, 12, 0, 0).unwrap()
    }

    #[test_case(Duration::seconds(0), Locale::Ko => "방금 전"; "ko now")]
    #[test_case(Duration::seconds(59), Locale::Ko => "방금 전"; "ko under a minute")]
    #[test_case(Duration::minutes(1), Locale::Ko => "1분 전"; "ko one minute")]
    #[test_case(Duration::minutes(59), Locale::Ko => "59분 전"; "ko minutes")]
    #[test_case(Duration::hours(1), Locale::Ko => "1시간 전"; "ko one hour")]
    #[test_case(Duration::hours(23), Locale::Ko => "23시간 전"; "ko hours")]
    #[test_case(Duration::hours(24), Locale::Ko => "2025. 3. 7."; "ko calendar date")]
    #[test_case(Duration::seconds(-30), Locale::Ko => "방금 전"; "ko future clamps")]
    #[test_case(Duration::seconds(10), Locale::En => "just now"; "en now")]
    #[test_case(Duration::minutes(1), Locale::En => "1 minute ago"; "en one minute")]
    #[test_case(Duration::minutes(5), Locale::En => "5 minutes ago"; "en minutes")]
    #[test_case(Duration::hours(1), Locale::En => "1 hour ago"; "en one hour")]
    #[test_case(Duration::hours(3), Locale::En => "3 hours ago"; "en hours")]
    #[test_case(Duration::days(40), Locale::En => "2025-01-27"; "en calendar date")]
    fn relative_time_buckets(age: Duration, locale: Locale) -> String {
        relative_time(now(), now() - age, locale)
    }

    #[test]
    fn korean_dates_use_seoul_calendar_day() {
        let then = Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap();
        assert_eq!(relative_time(now(), then, Locale::Ko), "2025. 3. 2.");
    }

    fn message(sender: UserId, receiver: UserId, minutes_ago: i64) -> Message {
        Message {
            id: MessageId::new_v4(),
            listing_id: ListingId(42),
            sender_id: sender,
            receiver_id: receiver,
            body: "네 가능합니다".into(),
            created_at: Timestamp(now() - Duration::minutes(minutes_ago)),
            read_at: None,
            is_deleted: false,
        }
    }

    #[test]
    fn first_record_always_shows_header() {
        let a = UserId::new_v4();
        let b = UserId::new_v4();
        let views = present_messages(&[message(a, b, 3)], None, now(), Locale::Ko);
        assert!(views[0].show_sender_header);
        assert!(present_messages(&[], Some(a), now(), Locale::Ko).is_empty());
    }

    #[test]
    fn header_follows_sender_changes() {
        let a = UserId::new_v4();
        let b = UserId::new_v4();
        let records = [
            message(a, b, 10),
            message(a, b, 9),
            message(b, a, 8),
            message(a, b, 1),
        ];
        let headers: Vec<bool> = present_messages(&records, Some(a), now(), Locale::Ko)
            .into_iter()
            .map(|view| view.show_sender_header)
            .collect();
        assert_eq!(headers, vec![true, false, true, true]);
    }

    #[test]
    fn is_own_requires_matching_viewer() {
        let a = UserId::new_v4();
        let b = UserId::new_v4();
        let records = [message(a, b, 2), message(b, a, 1)];

        let as_a = present_messages(&records, Some(a), now(), Locale::Ko);
        assert_eq!(
            as_a.iter().map(|v| v.is_own).collect::<Vec<_>>(),
            [true, false]
        );

        let anonymous = present_messages(&records, None, now(), Locale::Ko);
        assert!(anonymous.iter().all(|view| !view.is_own));
        assert_eq!(anonymous[0].display_time, "2분 전");
    }

    #[test]
    fn comment_views_carry_edit_flag_and_author() {
        let author = UserId::new_v4();
        let created = Timestamp(now() - Duration::hours(2));
        let comment = Comment {
            id: CommentId::new_v4(),
            listing_id: ListingId(7),
            author_id: author,
            author_display_name: "당근이".into(),
            body: "네고 되나요?".into(),
            created_at: created,
            updated_at: Some(Timestamp(now() - Duration::minutes(5))),
        };

        let views = present_comments(&[comment], Some(author), now(), Locale::Ko);
        assert!(views[0].is_own);
        assert!(views[0].is_edited);
        assert!(views[0].show_sender_header);
        assert_eq!(views[0].author_display_name, "당근이");
        assert_eq!(views[0].display_time, "2시간 전");
    }
}
