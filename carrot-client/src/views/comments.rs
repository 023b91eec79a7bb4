use std::sync::Arc;

use chrono::Utc;
use shared::models::{Comment, CommentId, ListingId, NewComment, Timestamp};
use tracing::{instrument, warn};

use super::{LiveStatus, LiveView, Viewer};
use crate::{
    error::{ClientError, ClientResult},
    presentation::{CommentView, Locale, present_comments},
    realtime::PushTransport,
    reconcile::OrderPolicy,
    store::{CommentStore, TableNames},
    subscription::ListingComments,
    validation::{MAX_COMMENT_CHARS, validate_body},
};

/// The public comment thread under one listing.
///
/// Anyone can read a thread; writing needs a signed-in [`Viewer`]. Every
/// write shows up locally first and is undone exactly if the backend
/// rejects it.
#[derive(Debug)]
pub struct CommentThread {
    store: Arc<dyn CommentStore>,
    viewer: Option<Viewer>,
    live: LiveView<ListingComments>,
}

impl CommentThread {
    /// Creates a closed thread. `viewer` is `None` for read-only access.
    pub fn new(
        store: Arc<dyn CommentStore>,
        transport: Arc<dyn PushTransport>,
        tables: TableNames,
        viewer: Option<Viewer>,
    ) -> Self {
        Self {
            store,
            viewer,
            live: LiveView::new(transport, tables, OrderPolicy::default()),
        }
    }

    #[must_use]
    pub fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    /// # Errors
    /// The store error when the snapshot cannot be fetched.
    #[instrument(skip(self))]
    pub async fn open(&self, listing: ListingId) -> ClientResult<()> {
        let store = Arc::clone(&self.store);
        self.live
            .open(ListingComments(listing), |scope| async move {
                store.fetch_comments(scope.0).await
            })
            .await
    }

    /// # Errors
    /// Validation when nothing is open, else the store error.
    pub async fn refresh(&self) -> ClientResult<()> {
        let store = Arc::clone(&self.store);
        self.live
            .refresh(|scope| async move { store.fetch_comments(scope.0).await })
            .await
    }

    /// Posts a comment as the viewer.
    ///
    /// # Errors
    /// Permission without a viewer, validation for a bad body, else the
    /// store error.
    #[instrument(skip(self, body))]
    pub async fn post(&self, body: &str) -> ClientResult<Comment> {
        let viewer = self.require_viewer()?;
        let body = validate_body(body, MAX_COMMENT_CHARS)?;
        let (generation, scope) = self.live.current()?;

        let draft = NewComment::new(scope.0, viewer.id, viewer.display_name.clone(), body);
        self.live.update(generation, |timeline| {
            timeline.insert(draft.optimistic(Timestamp::now()))
        });

        match self.store.create_comment(&draft).await {
            Ok(stored) => {
                self.live
                    .update(generation, |timeline| timeline.upsert(stored.clone()));
                Ok(stored)
            }
            Err(err) => {
                warn!(id = %draft.id, error = %err, "comment post failed, rolling back");
                self.live
                    .update(generation, |timeline| timeline.remove(draft.id));
                Err(err)
            }
        }
    }

    /// Replaces the body of one of the viewer's comments.
    ///
    /// # Errors
    /// Permission without a viewer or when the backend refuses, not found
    /// when the comment is not in the thread, validation for a bad body.
    #[instrument(skip(self, body))]
    pub async fn edit(&self, id: CommentId, body: &str) -> ClientResult<Comment> {
        let viewer = self.require_viewer()?;
        let body = validate_body(body, MAX_COMMENT_CHARS)?;
        let (generation, _) = self.live.current()?;

        let prior = self
            .live
            .read(|state| state.timeline.get(id).cloned())
            .ok_or_else(|| ClientError::NotFound(format!("comment {id}")))?;
        let mut edited = prior.clone();
        edited.body.clone_from(&body);
        edited.updated_at = Some(Timestamp::now());
        self.live
            .update(generation, |timeline| timeline.upsert(edited));

        match self.store.edit_comment(id, viewer.id, &body).await {
            Ok(stored) => {
                self.live
                    .update(generation, |timeline| timeline.upsert(stored.clone()));
                Ok(stored)
            }
            Err(err) => {
                warn!(id = %id, error = %err, "comment edit failed, restoring");
                self.live
                    .update(generation, |timeline| timeline.upsert(prior));
                Err(err)
            }
        }
    }

    /// Deletes one of the viewer's comments.
    ///
    /// # Errors
    /// Permission without a viewer or when the backend refuses, not found
    /// when the comment is not in the thread.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CommentId) -> ClientResult<()> {
        let viewer = self.require_viewer()?;
        let (generation, _) = self.live.current()?;

        let removed = self
            .live
            .update(generation, |timeline| timeline.remove_indexed(id))
            .flatten()
            .ok_or_else(|| ClientError::NotFound(format!("comment {id}")))?;

        match self.store.delete_comment(id, viewer.id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(id = %id, error = %err, "comment delete failed, restoring");
                let (index, comment) = removed;
                self.live
                    .update(generation, |timeline| timeline.restore_at(index, comment));
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn comments(&self) -> Vec<Comment> {
        self.live.records()
    }

    #[must_use]
    pub fn present(&self, locale: Locale) -> Vec<CommentView> {
        let viewer = self.viewer.as_ref().map(|viewer| viewer.id);
        present_comments(&self.comments(), viewer, Utc::now(), locale)
    }

    #[must_use]
    pub fn listing(&self) -> Option<ListingId> {
        self.live.scope().map(|scope| scope.0)
    }

    #[must_use]
    pub fn live_status(&self) -> LiveStatus {
        self.live.live_status()
    }

    #[must_use]
    pub fn degraded_reason(&self) -> Option<String> {
        self.live.degraded_reason()
    }

    pub async fn close(&self) {
        self.live.close().await;
    }

    fn require_viewer(&self) -> ClientResult<&Viewer> {
        self.viewer
            .as_ref()
            .ok_or_else(|| ClientError::Permission("sign in to write comments".into()))
    }
}
