use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const STORY: &str = r#"{
    "name": "Night Ward",
    "startnode": "1",
    "passages": [
        {"pid": "1", "name": "Arrival", "text": "[[Triage]]"},
        {"pid": "2", "name": "Triage", "tags": "decision", "text": "[[Resus->Resus]] [[Wait|Waiting]]"},
        {"pid": "3", "name": "Resus", "text": "Stable."},
        {"pid": "4", "name": "Waiting", "text": "The clock ticks. [[Car Park]]"}
    ]
}"#;

fn write_story(dir: &Path) -> String {
    let path = dir.join("story.json");
    std::fs::write(&path, STORY).expect("story file write should succeed");
    path.to_str().expect("story path should be utf8").to_string()
}

fn run_cli(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_storygraph"))
        .args(args)
        .current_dir(cwd)
        .env_remove("STORYGRAPH_DB")
        .env_remove("STORYGRAPH_OWNER")
        .env_remove("STORYGRAPH_LOG")
        .output()
        .expect("cli process should start")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn convert_command_overrides_expected_payload_json() {
    let temp = TempDir::new().expect("tempdir should create");
    let input = write_story(temp.path());

    let output = run_cli(
        &[
            "convert",
            "--input",
            &input,
            "--slug",
            "ward",
            "--tag",
            "night",
            "--visibility",
            "public",
        ],
        temp.path(),
    );
    assert_success(&output);

    let payload: Value = serde_json::from_slice(&output.stdout).expect("payload should parse");
    assert_eq!(payload["slug"], "ward");
    assert_eq!(payload["title"], "Night Ward");
    assert_eq!(payload["visibility"], "PUBLIC");
    assert_eq!(payload["tags"], serde_json::json!(["night"]));
    assert_eq!(payload["nodes"].as_array().map(Vec::len), Some(4));
    assert_eq!(payload["transitions"].as_array().map(Vec::len), Some(5));
}

#[test]
fn check_command_missing_passages_expected_validation_exit_code() {
    let temp = TempDir::new().expect("tempdir should create");
    let input = temp.path().join("empty.json");
    std::fs::write(&input, r#"{"name": "Empty", "passages": []}"#).expect("write");

    let output = run_cli(
        &["check", "--input", input.to_str().expect("utf8")],
        temp.path(),
    );

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("passages_present"), "{stderr}");
}

#[test]
fn check_command_strict_malformed_entry_expected_validation_exit_code() {
    let temp = TempDir::new().expect("tempdir should create");
    let input = temp.path().join("broken.json");
    std::fs::write(&input, r#"{"name": "Broken", "passages": [{"name": "A"}, 7]}"#)
        .expect("write");

    let output = run_cli(
        &["check", "--input", input.to_str().expect("utf8"), "--strict"],
        temp.path(),
    );
    assert_eq!(output.status.code(), Some(2));

    let relaxed = run_cli(&["check", "--input", input.to_str().expect("utf8")], temp.path());
    assert_success(&relaxed);
}

#[test]
fn convert_command_invalid_json_expected_error_exit_code() {
    let temp = TempDir::new().expect("tempdir should create");
    let input = temp.path().join("bad.json");
    std::fs::write(&input, "{not json").expect("write");

    let output = run_cli(
        &["convert", "--input", input.to_str().expect("utf8")],
        temp.path(),
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: "), "{stderr}");
}

#[test]
fn import_then_show_expected_stored_graph() {
    let temp = TempDir::new().expect("tempdir should create");
    let input = write_story(temp.path());
    let db = temp.path().join("data").join("stories.db");
    let db = db.to_str().expect("db path should be utf8");

    let first = run_cli(
        &["import", "--input", &input, "--owner", "ana", "--db", db],
        temp.path(),
    );
    assert_success(&first);
    let stdout = String::from_utf8_lossy(&first.stdout);
    assert!(stdout.contains("story: night-ward"), "{stdout}");
    assert!(stdout.contains("revision: 1"), "{stdout}");

    let second = run_cli(
        &["import", "--input", &input, "--owner", "ana", "--db", db],
        temp.path(),
    );
    assert_success(&second);
    assert!(String::from_utf8_lossy(&second.stdout).contains("revision: 2"));

    let show = run_cli(&["show", "--slug", "night-ward", "--db", db, "--json"], temp.path());
    assert_success(&show);
    let graph: Value = serde_json::from_slice(&show.stdout).expect("graph should parse");
    assert_eq!(graph["story"]["owner"], "ana");
    assert_eq!(graph["story"]["revision"], 2);
    assert_eq!(graph["nodes"].as_array().map(Vec::len), Some(4));

    let text = run_cli(&["show", "--slug", "night-ward", "--db", db], temp.path());
    assert_success(&text);
    let stdout = String::from_utf8_lossy(&text.stdout);
    assert!(stdout.contains("node triage [DECISION]"), "{stdout}");
    assert!(stdout.contains("1. Resus -> resus"), "{stdout}");
}

#[test]
fn import_command_without_owner_expected_error() {
    let temp = TempDir::new().expect("tempdir should create");
    let input = write_story(temp.path());

    let output = run_cli(&["import", "--input", &input], temp.path());

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("owner is required"));
}

#[test]
fn show_command_unknown_slug_expected_not_found() {
    let temp = TempDir::new().expect("tempdir should create");
    let db = temp.path().join("stories.db");

    let output = run_cli(
        &["show", "--slug", "ghost", "--db", db.to_str().expect("utf8")],
        temp.path(),
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}
