pub mod chat;
pub mod comments;
pub mod completion;
pub mod notifications;
pub mod rooms;
pub mod session;

use client::Locale;

/// Parses `--locale` values.
pub fn parse_locale(value: &str) -> Result<Locale, String> {
    Locale::try_from(value).map_err(|_| format!("unknown locale `{value}`; use ko or en"))
}
