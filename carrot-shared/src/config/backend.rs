use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::ConfigError;

pub const DEFAULT_MESSAGES_TABLE: &str = "chat_messages";
pub const DEFAULT_COMMENTS_TABLE: &str = "comments";
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const REALTIME_PROTOCOL_VERSION: &str = "1.0.0";

/// Where the hosted backend lives and how its tables are named.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project base URL, always stored with a trailing slash.
    pub url: Url,

    /// Public (anon) API key sent with every request.
    pub api_key: String,

    /// Physical name of the logical `messages` table.
    pub messages_table: String,

    /// Physical name of the logical `comments` table.
    pub comments_table: String,

    /// Database schema the tables live in.
    pub schema: String,

    /// Per-request timeout for HTTP calls and realtime join replies.
    pub request_timeout_secs: u64,
}

impl BackendConfig {
    /// Builds a configuration with default table names for `url`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] when `url` is not an http(s) URL.
    pub fn new(url: &str, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: normalize_base(url)?,
            api_key: api_key.into(),
            messages_table: DEFAULT_MESSAGES_TABLE.to_string(),
            comments_table: DEFAULT_COMMENTS_TABLE.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        })
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base of the table REST endpoints (`…/rest/v1/`).
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] if the join fails.
    pub fn rest_url(&self) -> Result<Url, ConfigError> {
        self.join("rest/v1/")
    }

    /// Base of the auth endpoints (`…/auth/v1/`).
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] if the join fails.
    pub fn auth_url(&self) -> Result<Url, ConfigError> {
        self.join("auth/v1/")
    }

    /// Websocket endpoint of the realtime service, with the API key attached.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] if the URL cannot be rewritten to ws(s).
    pub fn realtime_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.join("realtime/v1/websocket")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ConfigError::InvalidUrl(format!("cannot use {scheme} for {url}")))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", REALTIME_PROTOCOL_VERSION);
        Ok(url)
    }

    fn join(&self, path: &str) -> Result<Url, ConfigError> {
        self.url
            .join(path)
            .map_err(|err| ConfigError::InvalidUrl(format!("{}{path}: {err}", self.url)))
    }
}

pub(crate) fn normalize_base(raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw.trim()).map_err(|err| ConfigError::InvalidUrl(format!("{raw}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "{raw}: backend URL must use http or https"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_endpoints_follow_project_url() {
        let config = BackendConfig::new("https://demo.supabase.co", "anon").unwrap();

        assert_eq!(
            config.rest_url().unwrap().as_str(),
            "https://demo.supabase.co/rest/v1/"
        );
        assert_eq!(
            config.auth_url().unwrap().as_str(),
            "https://demo.supabase.co/auth/v1/"
        );
        assert_eq!(
            config.realtime_url().unwrap().as_str(),
            "wss://demo.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn plain_http_maps_to_ws_and_keeps_sub_path() {
        let config = BackendConfig::new("http://127.0.0.1:54321/project", "key").unwrap();

        assert_eq!(config.url.as_str(), "http://127.0.0.1:54321/project/");
        assert_eq!(
            config.realtime_url().unwrap().as_str(),
            "ws://127.0.0.1:54321/project/realtime/v1/websocket?apikey=key&vsn=1.0.0"
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            BackendConfig::new("ftp://example.com", "key"),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            BackendConfig::new("not a url", "key"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn defaults_match_hosted_schema() {
        let config = BackendConfig::new("https://demo.supabase.co/", "anon").unwrap();
        assert_eq!(config.messages_table, "chat_messages");
        assert_eq!(config.comments_table, "comments");
        assert_eq!(config.schema, "public");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }
}
