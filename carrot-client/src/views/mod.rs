//! View controllers: the owners of one open conversation or comment thread.
//!
//! Each view holds its timeline behind a shared lock. The push callback gets
//! a clone of that lock plus the generation it was opened under, and applies
//! changes only while that generation is still current. Closing or reopening
//! bumps the generation, which also discards snapshots still in flight.

mod chat;
mod comments;

pub use chat::ChatView;
pub use comments::CommentThread;

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use shared::models::{AuthUser, UserId};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::{
    error::{ClientError, ClientResult},
    realtime::PushTransport,
    reconcile::{Change, OrderPolicy, Timeline},
    store::TableNames,
    subscription::{Scope, SubscriptionManager},
};

/// Whether a view is receiving pushed changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveStatus {
    #[default]
    Closed,
    Live,
    /// The channel could not be established or was ended by the transport;
    /// the view shows its last snapshot.
    SnapshotOnly,
}

impl LiveStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Live => "live",
            Self::SnapshotOnly => "snapshot_only",
        }
    }
}

/// The signed-in user looking at a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: UserId,
    pub display_name: String,
}

impl Viewer {
    /// Creates a viewer.
    ///
    /// # Arguments
    /// * `id` - The user id.
    /// * `display_name` - Name shown on authored comments.
    ///
    /// # Returns
    /// A new [`Viewer`].
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

impl From<&AuthUser> for Viewer {
    fn from(user: &AuthUser) -> Self {
        Self::new(user.id, user.display_name())
    }
}

#[derive(Debug)]
struct ViewState<S: Scope> {
    scope: Option<S>,
    generation: u64,
    timeline: Timeline<S::Record>,
    live: LiveStatus,
    degraded: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Open/close lifecycle shared by the chat and comment views.
#[derive(Debug)]
struct LiveView<S: Scope> {
    policy: OrderPolicy,
    state: Arc<Mutex<ViewState<S>>>,
    subscriptions: AsyncMutex<SubscriptionManager>,
}

impl<S> LiveView<S>
where
    S: Scope + Clone + std::fmt::Display,
{
    fn new(transport: Arc<dyn PushTransport>, tables: TableNames, policy: OrderPolicy) -> Self {
        Self {
            policy,
            state: Arc::new(Mutex::new(ViewState {
                scope: None,
                generation: 0,
                timeline: Timeline::new(policy),
                live: LiveStatus::Closed,
                degraded: None,
            })),
            subscriptions: AsyncMutex::new(SubscriptionManager::new(transport, tables)),
        }
    }

    /// Subscribes to `scope`, then loads its snapshot with `fetch`.
    ///
    /// A failed subscription degrades the view instead of failing the open. A
    /// failed fetch is returned; the view stays open so it can be refreshed.
    async fn open<F, Fut>(&self, scope: S, fetch: F) -> ClientResult<()>
    where
        F: FnOnce(S) -> Fut,
        Fut: Future<Output = ClientResult<Vec<S::Record>>>,
    {
        let generation = {
            let mut subscriptions = self.subscriptions.lock().await;
            subscriptions.close().await;

            let generation = {
                let mut state = lock(&self.state);
                state.generation += 1;
                state.scope = Some(scope.clone());
                state.timeline = Timeline::new(self.policy);
                state.live = LiveStatus::Closed;
                state.degraded = None;
                state.generation
            };

            let shared = Arc::clone(&self.state);
            let on_change = move |change: Change<S::Record>| {
                let mut state = lock(&shared);
                if state.generation == generation {
                    state.timeline.apply(change);
                }
            };
            let shared = Arc::clone(&self.state);
            let label = scope.to_string();
            let on_ended = move |reason: String| {
                let mut state = lock(&shared);
                if state.generation == generation {
                    warn!(scope = %label, reason = %reason, "live updates lost, showing snapshot only");
                    state.live = LiveStatus::SnapshotOnly;
                    state.degraded = Some(reason);
                }
            };
            let opened = subscriptions
                .open_with_end(scope.clone(), on_change, on_ended)
                .await;

            let mut state = lock(&self.state);
            match opened {
                // A channel that already ended has set the degraded reason.
                Ok(()) if state.degraded.is_some() => {}
                Ok(()) => state.live = LiveStatus::Live,
                Err(err) => {
                    warn!(scope = %scope, error = %err, "live updates unavailable, showing snapshot only");
                    state.live = LiveStatus::SnapshotOnly;
                    state.degraded = Some(err.to_string());
                }
            }
            generation
        };

        self.load_snapshot(generation, scope, fetch).await
    }

    /// Reloads the snapshot of the currently open scope.
    async fn refresh<F, Fut>(&self, fetch: F) -> ClientResult<()>
    where
        F: FnOnce(S) -> Fut,
        Fut: Future<Output = ClientResult<Vec<S::Record>>>,
    {
        let (generation, scope) = self.current()?;
        self.load_snapshot(generation, scope, fetch).await
    }

    async fn load_snapshot<F, Fut>(&self, generation: u64, scope: S, fetch: F) -> ClientResult<()>
    where
        F: FnOnce(S) -> Fut,
        Fut: Future<Output = ClientResult<Vec<S::Record>>>,
    {
        let label = scope.to_string();
        let known = lock(&self.state).timeline.ids();
        let fetched = fetch(scope).await;

        let mut state = lock(&self.state);
        if state.generation != generation {
            debug!(scope = %label, "discarding snapshot for a view that moved on");
            return Ok(());
        }
        let snapshot = fetched?;
        debug!(scope = %label, count = snapshot.len(), "snapshot loaded");
        state.timeline.replace_snapshot(snapshot, &known);
        Ok(())
    }

    async fn close(&self) {
        self.subscriptions.lock().await.close().await;
        let mut state = lock(&self.state);
        state.generation += 1;
        state.scope = None;
        state.timeline = Timeline::new(self.policy);
        state.live = LiveStatus::Closed;
        state.degraded = None;
    }

    /// The generation and scope of the open view.
    fn current(&self) -> ClientResult<(u64, S)> {
        let state = lock(&self.state);
        state
            .scope
            .clone()
            .map(|scope| (state.generation, scope))
            .ok_or_else(|| ClientError::validation("view is not open"))
    }

    /// Runs `f` on the timeline if the view is still on `generation`.
    fn update<T>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut Timeline<S::Record>) -> T,
    ) -> Option<T> {
        let mut state = lock(&self.state);
        (state.generation == generation).then(|| f(&mut state.timeline))
    }

    fn read<T>(&self, f: impl FnOnce(&ViewState<S>) -> T) -> T {
        f(&lock(&self.state))
    }

    fn records(&self) -> Vec<S::Record> {
        self.read(|state| state.timeline.records().to_vec())
    }

    fn live_status(&self) -> LiveStatus {
        self.read(|state| state.live)
    }

    fn degraded_reason(&self) -> Option<String> {
        self.read(|state| state.degraded.clone())
    }

    fn scope(&self) -> Option<S> {
        self.read(|state| state.scope.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn viewer_from_auth_user_uses_display_name() {
        let user = AuthUser {
            id: UserId::new_v4(),
            email: Some("seller@example.com".into()),
            user_metadata: json!({}),
        };
        let viewer = Viewer::from(&user);
        assert_eq!(viewer.id, user.id);
        assert_eq!(viewer.display_name, "seller");
    }

    #[test]
    fn live_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(LiveStatus::SnapshotOnly).unwrap(),
            json!("snapshot_only")
        );
        assert_eq!(LiveStatus::default().as_str(), "closed");
    }
}
