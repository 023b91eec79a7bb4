use serde::{Deserialize, Serialize};

use super::UserId;

/// The signed-in user as reported by the auth endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    /// Unique identifier for the user.
    pub id: UserId,

    /// The user's email address.
    #[serde(default)]
    pub email: Option<String>,

    /// Free-form profile data supplied at sign-up.
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    /// Name shown next to the user's comments: the profile nickname, else the
    /// local part of the e-mail address, else a generic label.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(nickname) = self
            .user_metadata
            .get("nickname")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            return nickname.to_string();
        }

        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty())
            .map_or_else(|| "익명".to_string(), ToString::to_string)
    }
}

/// Tokens issued by a successful password sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}
