//! Integration tests for `prefs check`, `prefs export` and `prefs config`.

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_check_valid_document() {
    let env = TestEnv::new();
    let path = env.definitions_path();
    let result = env.json(&["check", path.to_str().unwrap()]);

    assert_eq!(result["valid"], true);
    assert_eq!(result["files"][0]["definitions"], 4);
    assert!(!env.db_path().exists());
}

#[test]
fn test_check_invalid_document() {
    let env = TestEnv::new();
    let bad = env.path().join("bad.kdl");
    std::fs::write(
        &bad,
        r#"
preferences {
    application key="timeout" type="INT" val="30"
    application key="timeout" type="INT" val="40"
}
"#,
    )
    .unwrap();

    env.prefs()
        .args(["check", bad.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"valid\":false"))
        .stdout(predicate::str::contains("timeout"));
}

#[test]
fn test_check_requires_files() {
    let env = TestEnv::new();
    env.prefs().arg("check").assert().failure();
}

#[test]
fn test_export_to_stdout() {
    let env = TestEnv::new();
    env.prefs()
        .arg("export")
        .assert()
        .success()
        .stdout(predicate::str::contains("preferences"))
        .stdout(predicate::str::contains("timeout"))
        .stdout(predicate::str::contains("ROLE_ADMIN"));
}

#[test]
fn test_export_reflects_store_and_checks_clean() {
    let env = TestEnv::new();
    env.json(&["set", "application/timeout", "75"]);

    let out = env.path().join("exported.kdl");
    let exported = env.json(&["export", "-o", out.to_str().unwrap()]);
    assert_eq!(exported["count"], 4);

    let checked = env.json(&["check", out.to_str().unwrap()]);
    assert_eq!(checked["valid"], true);
    assert_eq!(checked["files"][0]["definitions"], 4);

    // A fresh store seeded from the export carries the updated value
    let fresh = TestEnv::with_definitions(&std::fs::read_to_string(&out).unwrap());
    let pref = fresh.json(&["get", "application/timeout"]);
    assert_eq!(pref["value"], 75);
    assert_eq!(pref["maximum"], 100.0);
}

#[test]
fn test_config_show_sources() {
    let env = TestEnv::new();
    let config = env.json(&["config", "show"]);

    assert_eq!(config["database"]["source"], "env:PREFS_DB");
    assert_eq!(config["definitions"]["source"], "env:PREFS_DEFINITIONS");
    assert_eq!(config["merge_on_startup"]["value"], true);
    assert_eq!(config["merge_on_startup"]["source"], "default");
    assert_eq!(config["log_level"]["value"], "warn");
}

#[test]
fn test_config_show_flag_beats_env() {
    let env = TestEnv::new();
    let config = env.json(&["--db", ":memory:", "-v", "config", "show"]);

    assert_eq!(config["database"]["value"], ":memory:");
    assert_eq!(config["database"]["source"], "cli");
    assert_eq!(config["log_level"]["value"], "info");
    assert_eq!(config["log_level"]["source"], "cli");
}

#[test]
fn test_config_file_values() {
    let env = TestEnv::new();
    std::fs::write(
        env.config_path(),
        "merge-on-startup #false\nlog-level \"debug\"\n",
    )
    .unwrap();

    let config = env.json(&["config", "show"]);
    assert_eq!(config["config_path"]["source"], "env:PREFS_CONFIG");
    assert_eq!(config["merge_on_startup"]["value"], false);
    assert_eq!(config["merge_on_startup"]["source"], "config");
    assert_eq!(config["log_level"]["value"], "debug");
}

#[test]
fn test_invalid_config_is_reported() {
    let env = TestEnv::new();
    std::fs::write(env.config_path(), "log-level \"chatty\"\n").unwrap();

    env.prefs()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}
