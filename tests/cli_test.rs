//! Integration tests for the iniconf CLI.
//!
//! These tests verify that:
//! - `iniconf show/get` report merged values as JSON or human text
//! - `iniconf set/reset` edit only the user file
//! - `iniconf exec` runs remote command paths
//! - errors are reported on stderr with a failing exit code

mod common;

use common::TestEnv;
use predicates::prelude::*;

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("Invalid JSON")
}

#[test]
fn test_help_flag() {
    TestEnv::new()
        .iniconf()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"));
}

#[test]
fn test_show_merges_layers() {
    let env = TestEnv::new();
    env.write("-defaults", "[Core]\nColor=red\nSize=1\n");
    env.write("", "[Core]\nSize=2\n");
    env.write("-constants", "[Core]\nMode=locked\n");

    let output = env.iniconf().arg("show").output().unwrap();
    assert!(output.status.success());
    let json = json_stdout(&output);
    let values = json["values"].as_array().unwrap();
    let find = |key: &str| {
        values
            .iter()
            .find(|v| v["ini_key"] == key)
            .unwrap_or_else(|| panic!("missing {key}"))
            .clone()
    };
    assert_eq!(find("Color")["text"], "red");
    assert_eq!(find("Size")["text"], "2");
    assert_eq!(find("Mode")["write_protected"], true);
}

#[test]
fn test_show_human_readable() {
    let env = TestEnv::new();
    env.write("", "[Core]\nName=Robin\n");
    env.iniconf()
        .args(["-H", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[Core]"))
        .stdout(predicate::str::contains("Name = Robin"));
}

#[test]
fn test_get_single_value() {
    let env = TestEnv::new();
    env.write("", "[Core]\nName=Robin\n");
    let output = env.iniconf().args(["get", "Core", "name"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(json_stdout(&output)["values"][0]["text"], "Robin");
}

#[test]
fn test_set_writes_user_file_only() {
    let env = TestEnv::new();
    env.write("-defaults", "[Core]\nColor=red\n");

    env.iniconf()
        .args(["set", "Core", "Name", "Dapplo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"saved\":true"));

    let saved = env.read("");
    assert!(saved.contains("[Core]"));
    assert!(saved.contains("Name=Dapplo"));
    assert!(!saved.contains("Color"));
    assert_eq!(env.read("-defaults"), "[Core]\nColor=red\n");
}

#[test]
fn test_set_constant_fails() {
    let env = TestEnv::new();
    env.write("-constants", "[Core]\nMode=locked\n");
    env.iniconf()
        .args(["set", "Core", "Mode", "open"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("write protected"));
}

#[test]
fn test_reset_lets_defaults_show_through() {
    let env = TestEnv::new();
    env.write("-defaults", "[Core]\nColor=red\n");
    env.write("", "[Core]\nColor=blue\nSize=3\n");

    let output = env
        .iniconf()
        .args(["reset", "Core", "Color"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(json_stdout(&output)["values"][0]["text"], "red");

    let saved = env.read("");
    assert!(!saved.contains("Color"));
    assert!(saved.contains("Size=3"));
}

#[test]
fn test_exec_remote_command() {
    let env = TestEnv::new();
    env.write("", "[Core]\nTags=a\n");

    env.iniconf()
        .args(["exec", "set/demo/settings/Core/Tags/a%2Cb%2Cc"])
        .assert()
        .success();
    assert!(env.read("").contains("Tags=a,b,c"));

    let output = env
        .iniconf()
        .args(["exec", "get/demo/settings/Core/Tags"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(json_stdout(&output).get("saved").is_none());

    env.iniconf()
        .args(["exec", "get/other/settings/Core/Tags"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_unknown_section_is_an_error() {
    let env = TestEnv::new();
    env.iniconf()
        .args(["get", "Nope", "Key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("Unknown section"));
}
