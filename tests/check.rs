use std::path::Path;
use std::process::Command;

const SNAPSHOT: &str = r#"{
  "number": 41,
  "title": "Add invoice export",
  "body": "Exports invoices as CSV.",
  "createdAt": "2024-09-01T10:00:00Z",
  "commits": [{ "message": "add export" }],
  "files": [
    { "path": "app/export.rb", "additions": 6, "deletions": 0 },
    { "path": "app/csv.rb", "additions": 6, "deletions": 1 },
    { "path": "lib/format.rb", "additions": 6, "deletions": 0 }
  ],
  "comments": [{ "author": "alice", "body": "nice" }]
}"#;

fn run_check(dir: &Path, extra: &[&str]) -> std::process::Output {
    let file = dir.join("pr.json");
    std::fs::write(&file, SNAPSHOT).unwrap();

    Command::new(env!("CARGO_BIN_EXE_prwarden"))
        .args(["check", "--file"])
        .arg(&file)
        .args(["--username", "meyerbot", "--now", "2024-09-16T10:00:00Z"])
        .args(extra)
        .current_dir(dir)
        .env_remove("GITHUB_TOKEN")
        .output()
        .unwrap()
}

#[test]
fn check_plans_ticket_and_tests_comments() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_check(dir.path(), &["--format", "json"]);
    assert!(output.status.success(), "check failed: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["number"], 41);
    assert_eq!(json["candidacy"]["status"], "candidate");
    assert_eq!(json["verdicts"]["tests"], "violated");
    assert_eq!(json["verdicts"]["staleness"], "violated");

    let policies: Vec<&str> = json["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["policy"].as_str().unwrap())
        .collect();
    assert_eq!(policies, vec!["ticket-reference", "test-coverage"]);
}

#[test]
fn check_respects_config_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".prwarden.toml"),
        "[policy]\nticket_check = false\nmin_files = 4\n",
    )
    .unwrap();

    let output = run_check(dir.path(), &["--format", "json"]);
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["candidacy"]["status"], "tooFewFiles");
    assert!(json["actions"].as_array().unwrap().is_empty());
}

#[test]
fn check_without_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_prwarden"))
        .arg("check")
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
}
