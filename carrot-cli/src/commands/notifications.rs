use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use client::{
    Locale,
    local::NotificationStore,
    relative_time,
};

use super::{parse_locale, session};

#[derive(Args, Debug)]
pub struct NotificationsArgs {
    /// Mark every notification as read after listing them
    #[arg(long)]
    pub read_all: bool,

    /// Remove all notifications
    #[arg(long, conflicts_with = "read_all")]
    pub clear: bool,

    /// Notification file (defaults to the user data directory)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Display language for times (ko or en)
    #[arg(long, default_value = "ko", value_parser = parse_locale)]
    pub locale: Locale,
}

pub fn handle_notifications(args: &NotificationsArgs) -> Result<()> {
    let path = args.file.clone().unwrap_or_else(session::notifications_path);
    let mut store = NotificationStore::load(&path)
        .with_context(|| format!("failed to load notifications from {}", path.display()))?;

    if args.clear {
        store.clear();
        store.save().context("failed to save notifications")?;
        println!("Notifications cleared.");
        return Ok(());
    }

    if store.entries().is_empty() {
        println!("No notifications.");
        return Ok(());
    }

    let now = Utc::now();
    println!("{} unread", store.unread_count());
    for notification in store.entries() {
        let marker = if notification.is_read { " " } else { "*" };
        println!(
            "{marker} {} {} [{}]\n    {}",
            notification.avatar,
            notification.title,
            relative_time(now, notification.created_at.0, args.locale),
            notification.body
        );
    }

    if args.read_all {
        store.mark_all_read();
        store.save().context("failed to save notifications")?;
    }
    Ok(())
}
