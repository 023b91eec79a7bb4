use std::{collections::HashSet, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use client::{
    CommentThread, CommentView, LiveStatus, Locale,
    local::{NotificationEvent, NotificationStore},
};
use shared::models::{CommentId, ListingId};
use uuid::Uuid;

use super::{chat::FOLLOW_POLL, parse_locale, session};

#[derive(Args, Debug)]
pub struct CommentsArgs {
    /// Listing whose comments to show
    #[arg(long)]
    pub listing: i64,

    /// Keep running and print new comments as they arrive
    #[arg(long)]
    pub follow: bool,

    /// Display language for times (ko or en)
    #[arg(long, default_value = "ko", value_parser = parse_locale)]
    pub locale: Locale,
}

#[derive(Subcommand, Debug)]
pub enum CommentAction {
    /// Post a new comment
    Post {
        #[arg(long)]
        listing: i64,
        /// Comment text
        text: String,
    },
    /// Replace the text of one of your comments
    Edit {
        #[arg(long)]
        listing: i64,
        #[arg(long)]
        id: Uuid,
        /// New comment text
        text: String,
    },
    /// Delete one of your comments
    Delete {
        #[arg(long)]
        listing: i64,
        #[arg(long)]
        id: Uuid,
    },
}

async fn open_thread(backend: &session::Backend, listing: i64) -> Result<CommentThread> {
    let thread = CommentThread::new(
        backend.store.clone(),
        backend.socket.clone(),
        backend.tables.clone(),
        Some(backend.viewer()),
    );
    thread
        .open(ListingId(listing))
        .await
        .context("failed to load comments")?;
    Ok(thread)
}

pub async fn handle_comments(config: Option<PathBuf>, args: CommentsArgs) -> Result<()> {
    let backend = session::Backend::connect(config).await?;
    let thread = open_thread(&backend, args.listing).await?;

    let comments = thread.present(args.locale);
    if comments.is_empty() {
        println!("No comments yet.");
    }
    for comment in &comments {
        print_comment(comment);
    }

    if args.follow {
        follow(&thread, args.listing, args.locale, comments).await?;
    }

    thread.close().await;
    backend.disconnect().await
}

async fn follow(
    thread: &CommentThread,
    listing: i64,
    locale: Locale,
    shown: Vec<CommentView>,
) -> Result<()> {
    if thread.live_status() == LiveStatus::SnapshotOnly {
        eprintln!(
            "warning: live updates unavailable: {}",
            thread.degraded_reason().unwrap_or_default()
        );
        return Ok(());
    }

    let path = session::notifications_path();
    let mut notifications = NotificationStore::load(&path)
        .with_context(|| format!("failed to load notifications from {}", path.display()))?;
    let mut shown: HashSet<_> = shown.into_iter().map(|comment| comment.id).collect();

    println!("Following comments... (press Ctrl+C to stop)");
    let stop = tokio::signal::ctrl_c();
    tokio::pin!(stop);
    let mut ticker = tokio::time::interval(FOLLOW_POLL);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                if thread.live_status() == LiveStatus::SnapshotOnly {
                    eprintln!(
                        "warning: live updates lost: {}",
                        thread.degraded_reason().unwrap_or_default()
                    );
                    break;
                }
                for comment in thread.present(locale).iter().filter(|c| shown.insert(c.id)) {
                    print_comment(comment);
                    if !comment.is_own {
                        notifications.push(&NotificationEvent::Comment {
                            listing_title: format!("#{listing}"),
                            author: Some(comment.author_display_name.clone()),
                        });
                    }
                }
            }
        }
    }

    notifications.save().context("failed to save notifications")?;
    Ok(())
}

pub async fn handle_action(config: Option<PathBuf>, action: CommentAction) -> Result<()> {
    let backend = session::Backend::connect(config).await?;

    match action {
        CommentAction::Post { listing, text } => {
            let thread = open_thread(&backend, listing).await?;
            let posted = thread.post(&text).await.context("failed to post comment")?;
            println!("Posted comment {}", posted.id);
            thread.close().await;
        }
        CommentAction::Edit { listing, id, text } => {
            let thread = open_thread(&backend, listing).await?;
            thread
                .edit(CommentId(id), &text)
                .await
                .context("failed to edit comment")?;
            println!("Edited comment {id}");
            thread.close().await;
        }
        CommentAction::Delete { listing, id } => {
            let thread = open_thread(&backend, listing).await?;
            thread
                .delete(CommentId(id))
                .await
                .context("failed to delete comment")?;
            println!("Deleted comment {id}");
            thread.close().await;
        }
    }

    backend.disconnect().await
}

fn print_comment(comment: &CommentView) {
    let own = if comment.is_own { " (me)" } else { "" };
    let edited = if comment.is_edited { " (edited)" } else { "" };
    println!(
        "{}{own} [{}]{edited}\n  {}\n  id: {}",
        comment.author_display_name, comment.display_time, comment.body, comment.id
    );
}
