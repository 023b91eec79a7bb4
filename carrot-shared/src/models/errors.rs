use serde::{Deserialize, Serialize};

/// Error body returned by the hosted backend (`PostgREST` and auth endpoints).
///
/// Auth endpoints use `error_description`/`msg` instead of `message`; both are
/// accepted as aliases.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// The main error message
    #[serde(default, alias = "msg", alias = "error_description")]
    pub message: String,
    /// Optional additional details about the error
    #[serde(default)]
    pub details: Option<String>,
    /// Optional hint from the database
    #[serde(default)]
    pub hint: Option<String>,
    /// Backend error code, e.g. `PGRST116` or a SQLSTATE
    #[serde(default)]
    pub code: Option<String>,
}

impl ErrorResponse {
    /// Creates a new error response with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Creates a new error response with message and details.
    pub fn with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Some(details.into()),
            ..Self::default()
        }
    }

    /// Checks if this error response has details.
    #[must_use]
    pub const fn has_details(&self) -> bool {
        self.details.is_some()
    }

    /// True when the backend reports that no row matched a single-row request.
    #[must_use]
    pub fn is_no_rows(&self) -> bool {
        self.code.as_deref() == Some("PGRST116")
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {}", self.message, details),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ErrorResponse {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_new() {
        let error = ErrorResponse::new("Test error");
        assert_eq!(error.message, "Test error");
        assert_eq!(error.details, None);
        assert!(!error.has_details());
    }

    #[test]
    fn test_postgrest_body_deserialization() {
        let json = r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#;
        let error: ErrorResponse = serde_json::from_str(json).unwrap();
        assert!(error.is_no_rows());
        assert_eq!(error.details.as_deref(), Some("The result contains 0 rows"));
    }

    #[test]
    fn test_auth_body_deserialization() {
        let json = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        let error: ErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(error.message, "Invalid login credentials");
        assert!(!error.is_no_rows());
    }

    #[test]
    fn test_error_response_display() {
        let error_no_details = ErrorResponse::new("Simple error");
        assert_eq!(format!("{error_no_details}"), "Simple error");

        let error_with_details = ErrorResponse::with_details("Main error", "Additional info");
        assert_eq!(
            format!("{error_with_details}"),
            "Main error: Additional info"
        );
    }
}
