//! Integration tests for the `event-dispatch` binary.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use std::path::Path;
use std::process::{Command, Output};

fn event_dispatch(db: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_event-dispatch"))
        .arg("--db")
        .arg(db)
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("binary runs")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn status_json(db: &Path) -> serde_json::Value {
    let output = event_dispatch(db, &["status", "--output", "json"]);
    assert!(output.status.success());
    serde_json::from_str(&stdout(&output)).unwrap()
}

#[test]
fn emit_then_run_processes_event() {
    let temp = TempDir::new().unwrap();
    let db = temp.child("events.db");

    let output = event_dispatch(
        db.path(),
        &["emit", "user.registered", "--payload", r#"{"username":"john"}"#],
    );
    assert!(output.status.success());
    db.assert(predicate::path::exists());
    let id = stdout(&output).trim().to_string();
    assert_eq!(id.len(), 36);

    let output = event_dispatch(
        db.path(),
        &["run", "--workers", "1", "--poll-interval-ms", "10", "--for-secs", "1"],
    );
    assert!(output.status.success());

    let stats = status_json(db.path());
    assert_eq!(stats["done"], 1);
    assert_eq!(stats["pending"], 0);

    let output = event_dispatch(db.path(), &["list", "--status", "done", "--output", "json"]);
    let events: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(events[0]["id"], id.as_str());
    assert_eq!(events[0]["payload"]["username"], "john");
}

#[test]
fn unknown_event_fails_and_can_be_requeued() {
    let temp = TempDir::new().unwrap();
    let db = temp.child("events.db");

    event_dispatch(db.path(), &["emit", "no.such.handler"]);
    event_dispatch(
        db.path(),
        &["run", "--poll-interval-ms", "10", "--for-secs", "1"],
    );

    let output = event_dispatch(db.path(), &["list", "--status", "failed", "--output", "json"]);
    let events: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let error = events[0]["error"].as_str().unwrap();
    assert!(predicate::str::contains("no handler registered").eval(error));

    let output = event_dispatch(db.path(), &["requeue"]);
    assert!(output.status.success());
    assert!(predicate::str::contains("1 failed event(s)").eval(stdout(&output).as_str()));

    let stats = status_json(db.path());
    assert_eq!(stats["pending"], 1);
    assert_eq!(stats["failed"], 0);
}

#[test]
fn invalid_payload_is_rejected() {
    let temp = TempDir::new().unwrap();
    let db = temp.child("events.db");

    let output = event_dispatch(db.path(), &["emit", "log.message", "--payload", "{not json"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(predicate::str::contains("not valid JSON").eval(stderr.as_ref()));
    assert_eq!(status_json(db.path())["pending"], 0);
}
