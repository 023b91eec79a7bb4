use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use client::{ChatRoom, DEFAULT_INBOX_LIMIT, Inbox, Locale, relative_time};

use super::{chat::short_id, parse_locale, session};

#[derive(Args, Debug)]
pub struct RoomsArgs {
    /// How many recent messages to group into rooms
    #[arg(long, default_value_t = DEFAULT_INBOX_LIMIT)]
    pub limit: usize,

    /// Display language for times (ko or en)
    #[arg(long, default_value = "ko", value_parser = parse_locale)]
    pub locale: Locale,
}

pub async fn handle_rooms(config: Option<PathBuf>, args: RoomsArgs) -> Result<()> {
    let backend = session::Backend::connect(config).await?;
    let viewer = backend.viewer();

    let inbox = Inbox::load(backend.store.as_ref(), viewer.id, args.limit)
        .await
        .context("failed to load chat rooms")?;
    render_rooms(&inbox, args.locale);

    backend.disconnect().await
}

fn render_rooms(inbox: &Inbox, locale: Locale) {
    if inbox.is_empty() {
        println!("No chat rooms yet.");
        return;
    }
    let now = Utc::now();
    for room in &inbox.rooms {
        println!("{}", room_line(room, now, locale));
    }
    println!("{} unread in total", inbox.total_unread());
}

fn room_line(room: &ChatRoom, now: chrono::DateTime<Utc>, locale: Locale) -> String {
    let unread = if room.unread > 0 {
        format!(" ({} new)", room.unread)
    } else {
        String::new()
    };
    format!(
        "- listing {} with {}{unread} [{}]\n  {}",
        room.key.listing_id,
        short_id(&room.counterpart.to_string()),
        relative_time(now, room.last_message_at.0, locale),
        room.last_message
    )
}
