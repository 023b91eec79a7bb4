use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            #[must_use]
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

uuid_id!(
    /// Identity of an authenticated marketplace user.
    UserId
);
uuid_id!(
    /// Identity of a chat message. Generated by the sending client so optimistic
    /// copies and push echoes share it.
    MessageId
);
uuid_id!(
    /// Identity of a listing comment.
    CommentId
);

/// Identity of a listing (a product for sale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub i64);

impl Display for ListingId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

impl From<i64> for ListingId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_transparently() {
        let id = Uuid::parse_str("f47ac10b-58cc-4372-a567-0e02b2c3d479").unwrap();
        let json = serde_json::to_string(&UserId(id)).unwrap();
        assert_eq!(json, "\"f47ac10b-58cc-4372-a567-0e02b2c3d479\"");

        let listing: ListingId = serde_json::from_str("42").unwrap();
        assert_eq!(listing, ListingId(42));
        assert_eq!(listing.to_string(), "42");
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(MessageId::new_v4(), MessageId::new_v4());
    }
}
