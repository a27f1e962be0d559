use assert_cmd::prelude::*;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::process::Command;

const FRUIT_CSV: &str = "name,age\nApple,10\nBanana,20\napricot,30\nGrape,40\nBanana,50\n,60\n";

fn write_fixture(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

fn colfilter() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("colfilter"))
}

fn stdout_of(cmd: &mut Command) -> String {
    let assert = cmd.assert().success();
    String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
}

fn stderr_of_failure(cmd: &mut Command) -> String {
    let assert = cmd.assert().failure();
    String::from_utf8_lossy(&assert.get_output().stderr).into_owned()
}

#[test]
fn rows_prints_matching_records_as_csv() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(dir.path(), "fruit.csv", FRUIT_CSV);

    let stdout = stdout_of(
        colfilter()
            .arg("rows")
            .arg("--input")
            .arg(&input)
            .args(["--filter", "name=AP"]),
    );

    assert_eq!(stdout, "name,age\nApple,10\napricot,30\nGrape,40\n");
}

#[test]
fn rows_intersects_filters_and_prints_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(dir.path(), "fruit.csv", FRUIT_CSV);

    let stdout = stdout_of(
        colfilter()
            .arg("rows")
            .arg("--input")
            .arg(&input)
            .args(["--filter", "name=ap", "--filter", "age=>15"])
            .args(["--format", "json"]),
    );

    let value: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    assert_eq!(
        value,
        serde_json::json!([
            { "name": "apricot", "age": "30" },
            { "name": "Grape", "age": "40" },
        ])
    );
}

#[test]
fn rows_sorts_descending_and_keeps_ties_in_source_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(dir.path(), "fruit.csv", FRUIT_CSV);

    let stdout = stdout_of(
        colfilter()
            .arg("rows")
            .arg("--input")
            .arg(&input)
            .args(["--filter", "age=<55", "--sort", "name", "--descending"]),
    );

    assert_eq!(
        stdout,
        "name,age\nGrape,40\nBanana,20\nBanana,50\napricot,30\nApple,10\n"
    );
}

#[test]
fn candidates_ignore_the_columns_own_filter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(dir.path(), "fruit.csv", FRUIT_CSV);

    let stdout = stdout_of(
        colfilter()
            .arg("candidates")
            .arg("--input")
            .arg(&input)
            .args(["--column", "name"])
            .args(["--filter", "name=zzz", "--filter", "age=<55"]),
    );

    assert_eq!(stdout, "Apple\napricot\nBanana\nGrape\n");
}

#[test]
fn candidates_honour_config_and_narrowing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(dir.path(), "fruit.csv", FRUIT_CSV);
    let config = write_fixture(
        dir.path(),
        "engine.json",
        r#"{ "candidates": { "includeBlank": false } }"#,
    );

    let stdout = stdout_of(
        colfilter()
            .arg("--config")
            .arg(&config)
            .arg("candidates")
            .arg("--input")
            .arg(&input)
            .args(["--column", "name", "--narrow", "AP", "--format", "json"]),
    );

    let values: Vec<String> = serde_json::from_str(&stdout).expect("json output");
    assert_eq!(values, vec!["Apple", "apricot", "Grape"]);
}

#[test]
fn unknown_filter_column_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(dir.path(), "fruit.csv", FRUIT_CSV);

    let stderr = stderr_of_failure(
        colfilter()
            .arg("rows")
            .arg("--input")
            .arg(&input)
            .args(["--filter", "zip=1"]),
    );

    assert!(
        stderr.contains("no value extractor registered for column"),
        "stderr:\n{stderr}"
    );
}

#[test]
fn malformed_filter_argument_is_rejected_by_the_parser() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(dir.path(), "fruit.csv", FRUIT_CSV);

    let stderr = stderr_of_failure(
        colfilter()
            .arg("rows")
            .arg("--input")
            .arg(&input)
            .args(["--filter", "name"]),
    );

    assert!(stderr.contains("expected COLUMN=EXPR"), "stderr:\n{stderr}");
}

#[test]
fn unknown_config_keys_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(dir.path(), "fruit.csv", FRUIT_CSV);
    let config = write_fixture(
        dir.path(),
        "engine.json",
        r#"{ "candidates": { "includeBlanks": false } }"#,
    );

    let stderr = stderr_of_failure(
        colfilter()
            .arg("--config")
            .arg(&config)
            .arg("candidates")
            .arg("--input")
            .arg(&input)
            .args(["--column", "name"]),
    );

    assert!(stderr.contains("invalid engine config"), "stderr:\n{stderr}");
}

#[test]
fn short_records_are_padded_with_a_warning() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(dir.path(), "ragged.csv", "name,age\nApple\nBanana,20\n");

    let assert = colfilter()
        .arg("rows")
        .arg("--input")
        .arg(&input)
        .env("RUST_LOG", "warn")
        .assert()
        .success();

    let output = assert.get_output();
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "name,age\nApple,\nBanana,20\n"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("resizing"), "stderr:\n{stderr}");
}
