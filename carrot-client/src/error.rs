use reqwest::StatusCode;
use shared::{ConfigError, ErrorResponse, models::KeyError};
use thiserror::Error;

/// Result alias used throughout the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures surfaced by the data access layer, the push transport, and the views.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or a transient backend status. Callers may retry.
    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The backend rejected an operation on a record the caller does not own.
    #[error("not allowed: {0}")]
    Permission(String),

    /// The push channel could not be established.
    #[error("subscription failed: {0}")]
    Subscription(String),

    /// Local input check or a 4xx the backend attributes to the request itself.
    #[error("invalid input: {message}")]
    Validation {
        message: String,
        response: Option<ErrorResponse>,
    },

    /// The backend answered with a body that does not match the model.
    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            response: None,
        }
    }

    /// True for failures a caller may reasonably retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Maps a non-success HTTP status and its parsed body into the taxonomy.
    #[must_use]
    pub fn from_status(status: StatusCode, body: ErrorResponse) -> Self {
        let message = if body.message.is_empty() {
            status.to_string()
        } else {
            body.to_string()
        };

        if status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            return Self::Network(message);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Self::Permission(message);
        }
        if status == StatusCode::NOT_FOUND || body.is_no_rows() {
            return Self::NotFound(message);
        }
        Self::Validation {
            message,
            response: Some(body),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<KeyError> for ClientError {
    fn from(err: KeyError) -> Self {
        Self::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(StatusCode::INTERNAL_SERVER_ERROR => "network"; "server error")]
    #[test_case(StatusCode::BAD_GATEWAY => "network"; "bad gateway")]
    #[test_case(StatusCode::REQUEST_TIMEOUT => "network"; "request timeout")]
    #[test_case(StatusCode::TOO_MANY_REQUESTS => "network"; "rate limited")]
    #[test_case(StatusCode::UNAUTHORIZED => "permission"; "unauthorized")]
    #[test_case(StatusCode::FORBIDDEN => "permission"; "forbidden")]
    #[test_case(StatusCode::NOT_FOUND => "not_found"; "missing")]
    #[test_case(StatusCode::CONFLICT => "validation"; "conflict")]
    #[test_case(StatusCode::BAD_REQUEST => "validation"; "bad request")]
    fn status_maps_into_taxonomy(status: StatusCode) -> &'static str {
        match ClientError::from_status(status, ErrorResponse::new("boom")) {
            ClientError::Network(_) => "network",
            ClientError::Permission(_) => "permission",
            ClientError::NotFound(_) => "not_found",
            ClientError::Validation { .. } => "validation",
            _ => "other",
        }
    }

    #[test]
    fn no_rows_code_is_not_found() {
        let body: ErrorResponse = serde_json::from_str(
            r#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned","details":null,"hint":null}"#,
        )
        .unwrap();
        assert!(matches!(
            ClientError::from_status(StatusCode::NOT_ACCEPTABLE, body),
            ClientError::NotFound(_)
        ));
    }

    #[test]
    fn validation_keeps_backend_body() {
        let err = ClientError::from_status(
            StatusCode::BAD_REQUEST,
            ErrorResponse::with_details("value too long", "body"),
        );
        match err {
            ClientError::Validation { message, response } => {
                assert_eq!(message, "value too long: body");
                assert_eq!(response.unwrap().details.as_deref(), Some("body"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(ClientError::Network("reset".into()).is_retryable());
        assert!(!ClientError::NotFound("x".into()).is_retryable());
        assert!(!ClientError::Permission("x".into()).is_retryable());
        assert!(!ClientError::Subscription("x".into()).is_retryable());
        assert!(!ClientError::validation("empty").is_retryable());
        assert!(!ClientError::Decode("x".into()).is_retryable());
    }

    #[test]
    fn empty_backend_message_falls_back_to_status() {
        let err = ClientError::from_status(StatusCode::FORBIDDEN, ErrorResponse::default());
        assert_eq!(err.to_string(), "not allowed: 403 Forbidden");
    }
}
