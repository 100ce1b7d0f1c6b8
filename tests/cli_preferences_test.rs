//! Integration tests for reading and writing preferences through the CLI.

mod common;

use common::TestEnv;
use predicates::prelude::*;

/// An environment whose store is seeded only by explicit `prefs merge`.
fn manual_merge_env() -> TestEnv {
    let env = TestEnv::new();
    std::fs::write(env.config_path(), "merge-on-startup #false\n").unwrap();
    env
}

#[test]
fn test_get_by_full_key() {
    let env = TestEnv::new();
    let pref = env.json(&["get", "application/timeout"]);

    assert_eq!(pref["full_key"], "application/timeout");
    assert_eq!(pref["scope"], "APPLICATION");
    assert_eq!(pref["type"], "INT");
    assert_eq!(pref["value"], 30);
    assert_eq!(pref["minimum"], 0.0);
    assert_eq!(pref["maximum"], 100.0);
    assert_eq!(pref["from_file"], true);
}

#[test]
fn test_get_by_parts() {
    let env = TestEnv::new();
    let pref = env.json(&["get", "--scope", "user", "--owner", "alice", "--key", "theme"]);
    assert_eq!(pref["full_key"], "user/alice/theme");
    assert_eq!(pref["value"], "dark");
    assert_eq!(pref["group"], "ui");
}

#[test]
fn test_get_scope_is_case_insensitive() {
    let env = TestEnv::new();
    let pref = env.json(&["get", "MODULE/INVENTORY/page-size"]);
    assert_eq!(pref["value"], 50);
}

#[test]
fn test_get_missing_preference() {
    let env = TestEnv::new();
    env.prefs()
        .args(["get", "application/nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_list_filters() {
    let env = TestEnv::new();

    let ints = env.json(&["list", "--type", "int"]);
    assert_eq!(ints["count"], 2);

    let alice = env.json(&["list", "--scope", "user", "--owner", "alice"]);
    assert_eq!(alice["count"], 1);
    assert_eq!(alice["preferences"][0]["key"], "theme");

    let ui = env.json(&["list", "--scope", "user", "--owner", "alice", "--group", "ui"]);
    assert_eq!(ui["count"], 1);

    let other = env.json(&["list", "--scope", "user", "--owner", "alice", "--group", "other"]);
    assert_eq!(other["count"], 0);
}

#[test]
fn test_list_scope_without_owner_fails() {
    let env = TestEnv::new();
    env.prefs()
        .args(["list", "--scope", "role"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires an owner"));
}

#[test]
fn test_set_survives_reload() {
    let env = TestEnv::new();

    let updated = env.json(&["set", "application/timeout", "60"]);
    assert_eq!(updated["value"], 60);
    assert_eq!(updated["from_file"], true);

    let merge = env.json(&["reload"]);
    let skipped: Vec<&str> = merge["skipped"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k.as_str().unwrap())
        .collect();
    assert!(skipped.contains(&"application/timeout"));

    let pref = env.json(&["get", "application/timeout"]);
    assert_eq!(pref["value"], 60);
}

#[test]
fn test_set_out_of_bounds_is_rejected() {
    let env = TestEnv::new();
    env.prefs()
        .args(["set", "application/timeout", "150"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("above maximum"));

    let pref = env.json(&["get", "application/timeout"]);
    assert_eq!(pref["value"], 30);
}

#[test]
fn test_set_wrong_type_is_rejected() {
    let env = TestEnv::new();
    env.prefs()
        .args(["set", "module/INVENTORY/page-size", "many"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot coerce"));
}

#[test]
fn test_set_creates_runtime_preference() {
    let env = TestEnv::new();
    let pref = env.json(&[
        "set",
        "user/bob/font-size",
        "14",
        "--type",
        "int",
        "--min",
        "8",
        "--max",
        "32",
        "--group",
        "ui",
    ]);
    assert_eq!(pref["value"], 14);
    assert_eq!(pref["from_file"], false);

    let ui = env.json(&["list", "--scope", "user", "--owner", "bob", "--group", "ui"]);
    assert_eq!(ui["count"], 1);
}

#[test]
fn test_set_with_inverted_bounds_fails() {
    let env = TestEnv::new();
    env.prefs()
        .args([
            "set", "application/retries", "3", "--type", "int", "--min", "10", "--max", "1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid bounds"));
}

#[test]
fn test_set_bounds_on_string_is_rejected() {
    let env = TestEnv::new();
    env.prefs()
        .args(["set", "user/bob/nickname", "bobby", "--type", "string", "--max", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only allowed on INT and FLOAT"));
}

#[test]
fn test_list_application_with_owner_fails() {
    let env = TestEnv::new();
    env.prefs()
        .args(["list", "--scope", "application", "--owner", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not take an owner"));
}

#[test]
fn test_delete_help_explains_startup_merge() {
    let env = TestEnv::new();
    env.prefs()
        .args(["delete", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("merge-on-startup"));
}

#[test]
fn test_create_is_strict() {
    let env = TestEnv::new();
    env.prefs()
        .args(["create", "application/timeout", "10", "--type", "int"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let created = env.json(&["create", "role/ROLE_OPS/alerts", "true", "--type", "bool"]);
    assert_eq!(created["value"], true);
}

#[test]
fn test_delete_then_reload_restores_definition() {
    let env = manual_merge_env();
    env.json(&["merge"]);
    env.json(&["set", "application/timeout", "60"]);

    let deleted = env.json(&["delete", "application/timeout"]);
    assert_eq!(deleted["deleted"], true);
    env.prefs()
        .args(["get", "application/timeout"])
        .assert()
        .failure();

    env.json(&["reload"]);
    let pref = env.json(&["get", "application/timeout"]);
    assert_eq!(pref["value"], 30);
    assert_eq!(pref["from_file"], true);
}

#[test]
fn test_delete_missing_fails() {
    let env = TestEnv::new();
    env.prefs()
        .args(["delete", "user/nobody/theme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_human_errors() {
    let env = TestEnv::new();
    env.prefs()
        .args(["-H", "get", "application/nope"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error: "));
}
