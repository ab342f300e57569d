use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn ctxfetch() -> Command {
    let mut cmd = Command::cargo_bin("ctxfetch").expect("binary exists");
    cmd.env_remove("CTXFETCH_AUTO_GENERATE")
        .env_remove("CTXFETCH_MAX_FILE_SIZE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_displays_usage() {
    ctxfetch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("render"));
}

#[test]
fn render_prints_document_and_status() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("main.rs"), "fn main() {\n    run();\n}\n").expect("write");
    fs::write(temp.path().join("notes.md"), "first\nsecond\nthird\n").expect("write");

    ctxfetch()
        .arg("render")
        .arg("--root")
        .arg(temp.path())
        .args(["--file", "main.rs", "--snippet", "notes.md:2-3"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# --- Code context ---"))
        .stdout(predicate::str::contains("## File: main.rs:"))
        .stdout(predicate::str::contains("```rust\nfn main() {"))
        .stdout(predicate::str::contains("### L2-3\n```markdown\nsecond\nthird\n```"))
        .stderr(predicate::str::contains(
            "Context generated: 1 file(s), 1 snippet(s)",
        ));
}

#[test]
fn render_json_to_output_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(temp.path().join("src")).expect("mkdir");
    fs::write(temp.path().join("src/a.txt"), "alpha\n").expect("write");
    fs::write(temp.path().join("src/b.txt"), "beta\n").expect("write");
    let output = temp.path().join("out/context.json");

    ctxfetch()
        .arg("render")
        .arg("--root")
        .arg(temp.path())
        .args(["--dir", "src", "--json", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = fs::read_to_string(&output).expect("output written");
    let value: serde_json::Value = serde_json::from_str(&written).expect("valid json");
    assert_eq!(value["status"], "Context generated: 2 file(s)");
    let text = value["text"].as_str().expect("text field");
    assert!(text.contains("alpha"));
    assert!(text.contains("beta"));
}

#[test]
fn render_without_selection_fails() {
    let temp = tempfile::tempdir().expect("tempdir");

    ctxfetch()
        .arg("render")
        .arg("--root")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing selected"));
}

#[test]
fn malformed_snippet_is_reported() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("a.txt"), "alpha\n").expect("write");

    ctxfetch()
        .arg("render")
        .arg("--root")
        .arg(temp.path())
        .args(["--snippet", "a.txt:0-2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid snippet"));
}

#[test]
fn completions_are_generated() {
    ctxfetch()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ctxfetch"));
}
