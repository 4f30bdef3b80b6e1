#![cfg(feature = "cli")]

use std::process::{Command, Output};

fn realmlink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_realmlink"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("realmlink should run")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn encode_prints_dictionary() {
    let output = realmlink(&["--format", "json", "encode", r#"{"a": [1, 1]}"#]);

    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        serde_json::json!({
            "0": ["object", [["a", 1]]],
            "1": ["array", [2, 2]],
            "2": ["number", 1],
        })
    );
}

#[test]
fn decode_renders_functions_as_markers() {
    let dictionary = r#"{"0":["array",[1,1]],"1":["function",{"key":"k","length":2}]}"#;
    let output = realmlink(&["--format", "json", "decode", dictionary]);

    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        serde_json::json!(["[Function: 2]", "[Function: 2]"])
    );
}

#[test]
fn decode_unknown_type_returns_60() {
    let output = realmlink(&["decode", r#"{"0":["bigint","1"]}"#]);

    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("bigint"));
}

#[test]
fn invalid_json_returns_usage() {
    let output = realmlink(&["encode", "{not json"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn demo_calls_across_realms() {
    let output = realmlink(&["--format", "json", "demo", "--a", "20", "--b", "22"]);

    assert!(output.status.success());
    let out = stdout_json(&output);
    assert_eq!(out["result"], serde_json::json!(42));
    assert_eq!(out["channels"], serde_json::json!(["math", "greeting"]));
}

#[test]
fn version_prints_package_version() {
    let output = realmlink(&["version"]);

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("realmlink {}", env!("CARGO_PKG_VERSION"))
    );
}
