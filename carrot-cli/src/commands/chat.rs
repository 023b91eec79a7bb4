use std::{collections::HashSet, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Args;
use client::{
    ChatView, LiveStatus, Locale, MessageStore, MessageView,
    local::{NotificationEvent, NotificationStore},
    validation::{MAX_MESSAGE_CHARS, validate_body},
};
use shared::models::{ConversationKey, ListingId, NewMessage, UserId};
use uuid::Uuid;

use super::{parse_locale, session};

/// How often a followed view is redrawn.
pub const FOLLOW_POLL: Duration = Duration::from_millis(250);

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Listing the conversation is about
    #[arg(long)]
    pub listing: i64,

    /// The other participant's user id
    #[arg(long = "with")]
    pub with: Uuid,

    /// Keep running and print new messages as they arrive
    #[arg(long)]
    pub follow: bool,

    /// Display language for times (ko or en)
    #[arg(long, default_value = "ko", value_parser = parse_locale)]
    pub locale: Locale,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Listing the conversation is about
    #[arg(long)]
    pub listing: i64,

    /// Recipient user id
    #[arg(long)]
    pub to: Uuid,

    /// Message text
    #[arg()]
    pub text: String,
}

pub async fn handle_chat(config: Option<PathBuf>, args: ChatArgs) -> Result<()> {
    let backend = session::Backend::connect(config).await?;
    let viewer = backend.viewer();
    let key = ConversationKey::new(ListingId(args.listing), viewer.id, UserId(args.with))
        .context("cannot open a conversation with yourself")?;

    let view = ChatView::new(
        backend.store.clone(),
        backend.socket.clone(),
        backend.tables.clone(),
        viewer.id,
    );
    view.open(key).await.context("failed to load conversation")?;

    let messages = view.present(args.locale);
    if messages.is_empty() {
        println!("No messages yet.");
    }
    for message in &messages {
        print_message(message);
    }
    let marked = view.mark_read_incoming().await?;
    if marked > 0 {
        println!("({marked} marked as read)");
    }

    if args.follow {
        follow(&view, args.listing, args.locale, messages).await?;
    }

    view.close().await;
    backend.disconnect().await
}

async fn follow(view: &ChatView, listing: i64, locale: Locale, shown: Vec<MessageView>) -> Result<()> {
    if view.live_status() == LiveStatus::SnapshotOnly {
        eprintln!(
            "warning: live updates unavailable: {}",
            view.degraded_reason().unwrap_or_default()
        );
        return Ok(());
    }

    let path = session::notifications_path();
    let mut notifications = NotificationStore::load(&path)
        .with_context(|| format!("failed to load notifications from {}", path.display()))?;
    let mut shown: HashSet<_> = shown.into_iter().map(|message| message.id).collect();

    println!("Following conversation... (press Ctrl+C to stop)");
    let stop = tokio::signal::ctrl_c();
    tokio::pin!(stop);
    let mut ticker = tokio::time::interval(FOLLOW_POLL);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                if view.live_status() == LiveStatus::SnapshotOnly {
                    eprintln!(
                        "warning: live updates lost: {}",
                        view.degraded_reason().unwrap_or_default()
                    );
                    break;
                }
                let mut incoming = false;
                for message in view.present(locale).iter().filter(|m| shown.insert(m.id)) {
                    print_message(message);
                    if !message.is_own {
                        incoming = true;
                        notifications.push(&NotificationEvent::Chat {
                            listing_title: format!("#{listing}"),
                        });
                    }
                }
                if incoming {
                    view.mark_read_incoming().await?;
                }
            }
        }
    }

    notifications.save().context("failed to save notifications")?;
    Ok(())
}

pub async fn handle_send(config: Option<PathBuf>, args: SendArgs) -> Result<()> {
    let body = validate_body(&args.text, MAX_MESSAGE_CHARS)?;
    let backend = session::Backend::connect(config).await?;
    let viewer = backend.viewer();

    let draft = NewMessage::new(ListingId(args.listing), viewer.id, UserId(args.to), body);
    let sent = backend
        .store
        .send_message(&draft)
        .await
        .context("failed to send message")?;
    println!("Sent message {} to {}", sent.id, sent.receiver_id);

    backend.disconnect().await
}

fn print_message(message: &MessageView) {
    if message.show_sender_header {
        let sender = if message.is_own {
            "me".to_string()
        } else {
            short_id(&message.sender_id.to_string())
        };
        println!("{sender}:");
    }
    let read = if message.is_own && message.is_read { " (read)" } else { "" };
    println!("  [{}] {}{read}", message.display_time, message.body);
}

/// First block of a uuid, enough to tell participants apart.
pub fn short_id(id: &str) -> String {
    id.split('-').next().unwrap_or(id).to_string()
}
