//! Integration tests for the CLI argument handling and offline commands.

use assert_cmd::Command;
use client::local::{NotificationEvent, NotificationStore};
use predicates::prelude::PredicateBooleanExt;
use std::time::Duration;
use tempfile::tempdir;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("cli").unwrap();
    cmd.env_remove("CARROT_BACKEND_URL")
        .env_remove("CARROT_API_KEY")
        .env_remove("SUPABASE_URL")
        .env_remove("SUPABASE_ANON_KEY")
        .env_remove("CARROT_EMAIL")
        .env_remove("CARROT_PASSWORD")
        .timeout(Duration::from_secs(10));
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("rooms"))
        .stdout(predicates::str::contains("chat"))
        .stdout(predicates::str::contains("send"))
        .stdout(predicates::str::contains("comments"))
        .stdout(predicates::str::contains("comment"))
        .stdout(predicates::str::contains("completion"));
}

#[test]
fn test_chat_requires_listing_and_counterpart() {
    cli()
        .arg("chat")
        .assert()
        .failure()
        .stderr(predicates::str::contains(
            "the following required arguments were not provided",
        ))
        .stderr(predicates::str::contains("--listing <LISTING>"))
        .stderr(predicates::str::contains("--with <WITH>"));
}

#[test]
fn test_chat_rejects_invalid_user_id() {
    cli()
        .args(["chat", "--listing", "42", "--with", "not-a-uuid"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value"));
}

#[test]
fn test_unknown_locale_is_rejected() {
    cli()
        .args(["comments", "--listing", "42", "--locale", "fr"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("unknown locale `fr`"));
}

#[test]
fn test_blank_message_is_rejected_before_connecting() {
    cli()
        .args([
            "send",
            "--listing",
            "42",
            "--to",
            "550e8400-e29b-41d4-a716-446655440000",
            "   ",
        ])
        .assert()
        .failure()
        .stderr(predicates::str::contains("body is empty"));
}

#[test]
fn test_missing_backend_configuration_is_reported() {
    let dir = tempdir().unwrap();
    cli()
        .current_dir(dir.path())
        .args(["comments", "--listing", "42"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("failed to load configuration"))
        .stderr(predicates::str::contains("backend.url"));
}

#[test]
fn test_missing_credentials_are_reported() {
    let dir = tempdir().unwrap();
    cli()
        .current_dir(dir.path())
        .env("CARROT_BACKEND_URL", "http://127.0.0.1:9")
        .env("CARROT_API_KEY", "anon-key")
        .args(["rooms"])
        .assert()
        .failure()
        .stderr(
            predicates::str::contains("CARROT_EMAIL")
                .and(predicates::str::contains("CARROT_PASSWORD")),
        );
}

#[test]
fn test_unreachable_backend_gets_retry_hint() {
    let dir = tempdir().unwrap();
    cli()
        .current_dir(dir.path())
        .env("CARROT_BACKEND_URL", "http://127.0.0.1:9")
        .env("CARROT_API_KEY", "anon-key")
        .env("CARROT_EMAIL", "seller@example.com")
        .env("CARROT_PASSWORD", "secret")
        .args(["rooms"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("sign-in failed"))
        .stderr(predicates::str::contains("hint:"));
}

#[test]
fn test_completion_generates_script() {
    cli()
        .args(["completion", "--shell", "bash"])
        .assert()
        .success()
        .stdout(predicates::str::contains("carrot"));
}

#[test]
fn test_notifications_lists_and_marks_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notifications.json");
    let mut store = NotificationStore::load(&path).unwrap();
    store.push(&NotificationEvent::Like {
        listing_title: "자전거".into(),
    });
    store.save().unwrap();

    cli()
        .args(["notifications", "--read-all", "--file"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicates::str::contains("1 unread"))
        .stdout(predicates::str::contains("내 상품을 좋아해요"));

    let reloaded = NotificationStore::load(&path).unwrap();
    assert_eq!(reloaded.unread_count(), 0);
}

#[test]
fn test_notifications_empty_file() {
    let dir = tempdir().unwrap();
    cli()
        .args(["notifications", "--file"])
        .arg(dir.path().join("none.json"))
        .assert()
        .success()
        .stdout(predicates::str::contains("No notifications."));
}
