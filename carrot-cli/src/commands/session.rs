use std::{env, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use client::{AuthClient, RealtimeSocket, RestStore, TableNames, Viewer};
use directories::BaseDirs;
use shared::{Config, logging::initialize_tracing, models::Session};
use tracing::debug;

pub const ENV_EMAIL: &str = "CARROT_EMAIL";
pub const ENV_PASSWORD: &str = "CARROT_PASSWORD";

/// A signed-in connection to the backend.
#[derive(Debug)]
pub struct Backend {
    pub store: Arc<RestStore>,
    pub socket: Arc<RealtimeSocket>,
    pub tables: TableNames,
    auth: AuthClient,
    session: Session,
}

impl Backend {
    /// Loads configuration, starts logging, and signs in with the
    /// credentials from the environment.
    pub async fn connect(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Config::load_config(config_path).context("failed to load configuration")?;
        initialize_tracing(&config.logging);
        let (email, password) = credentials()?;

        let auth = AuthClient::new(&config.backend)?;
        let session = auth
            .sign_in_with_password(&email, &password)
            .await
            .context("sign-in failed")?;

        let store = RestStore::new(&config.backend)?;
        store.set_access_token(Some(session.access_token.clone()));
        let socket = RealtimeSocket::from_config(&config.backend)?
            .with_access_token(session.access_token.clone());
        debug!(user = %session.user.id, "backend connected");

        Ok(Self {
            store: Arc::new(store),
            socket: Arc::new(socket),
            tables: TableNames::from(&config.backend),
            auth,
            session,
        })
    }

    #[must_use]
    pub fn viewer(&self) -> Viewer {
        Viewer::from(&self.session.user)
    }

    /// Closes the realtime socket and revokes the session.
    pub async fn disconnect(self) -> Result<()> {
        self.socket.close().await;
        self.auth
            .sign_out(&self.session)
            .await
            .context("sign-out failed")
    }
}

fn credentials() -> Result<(String, String)> {
    let read = |name: &str| env::var(name).ok().filter(|value| !value.trim().is_empty());
    match (read(ENV_EMAIL), read(ENV_PASSWORD)) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => bail!("set {ENV_EMAIL} and {ENV_PASSWORD} to sign in"),
    }
}

/// Where the CLI keeps local state such as notifications.
pub fn data_dir() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.data_dir().join("carrot"))
        .unwrap_or_else(|| PathBuf::from("./.carrot"))
}

pub fn notifications_path() -> PathBuf {
    data_dir().join("notifications.json")
}
