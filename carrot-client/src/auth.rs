//! Password sign-in against the hosted auth endpoint.

use reqwest::{Client, StatusCode};
use serde_json::json;
use shared::{BackendConfig, models::Session};
use tracing::{debug, info, instrument};

use crate::{
    error::{ClientError, ClientResult},
    store::error_for_status,
};

/// Client for the password grant and sign-out endpoints.
#[derive(Clone, Debug)]
pub struct AuthClient {
    auth_url: String,
    client: Client,
    api_key: String,
}

impl AuthClient {
    /// Creates an auth client for the configured backend.
    ///
    /// # Arguments
    /// * `config` - Backend URL, API key and request timeout.
    ///
    /// # Returns
    /// A client that signs in against `{url}/auth/v1`.
    ///
    /// # Errors
    /// Fails when the auth URL cannot be derived or the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            auth_url: config.auth_url()?.to_string(),
            client,
            api_key: config.api_key.clone(),
        })
    }

    /// Exchanges e-mail and password for a session.
    ///
    /// # Errors
    /// [`ClientError::Permission`] for rejected credentials, network errors
    /// otherwise.
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> ClientResult<Session> {
        let response = self
            .client
            .post(format!("{}token", self.auth_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let response = error_for_status(response).await.map_err(rejected_credentials)?;
        let session: Session = response.json().await?;
        info!(user = %session.user.id, "signed in");
        Ok(session)
    }

    /// Revokes the session's tokens.
    ///
    /// # Errors
    /// Network errors; an already expired session is not an error.
    pub async fn sign_out(&self, session: &Session) -> ClientResult<()> {
        let response = self
            .client
            .post(format!("{}logout", self.auth_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("session already expired");
            return Ok(());
        }
        error_for_status(response).await?;
        info!(user = %session.user.id, "signed out");
        Ok(())
    }
}

/// The token endpoint answers bad credentials with 400.
fn rejected_credentials(err: ClientError) -> ClientError {
    match err {
        ClientError::Validation { message, .. } => ClientError::Permission(message),
        other => other,
    }
}
