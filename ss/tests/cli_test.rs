//! CLI tests for the `ss` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ss(store: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("ss").unwrap();
    cmd.arg("--store").arg(store);
    cmd
}

#[test]
fn test_set_then_get() {
    let temp = TempDir::new().unwrap();
    let store = temp.path().join("durable.json");

    ss(&store)
        .args(["set", "preferences", r#"{"useUsers":"tokens"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set preferences"));

    ss(&store)
        .args(["get", "preferences", "missing"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"useUsers":"tokens"}"#))
        .stdout(predicate::str::contains("(missing)"));
}

#[test]
fn test_list_empty_store() {
    let temp = TempDir::new().unwrap();
    ss(&temp.path().join("durable.json"))
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No keys found"));
}

#[test]
fn test_bare_word_stored_as_string() {
    let temp = TempDir::new().unwrap();
    let store = temp.path().join("durable.json");

    ss(&store).args(["set", "username", "alice"]).assert().success();
    ss(&store)
        .args(["get", "username"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""alice""#));

    ss(&store).args(["remove", "username"]).assert().success();
    ss(&store)
        .arg("list")
        .assert()
        .stdout(predicate::str::contains("No keys found"));
}
