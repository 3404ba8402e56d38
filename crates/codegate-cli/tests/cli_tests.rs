//! CLI integration tests using assert_cmd.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CATALOG: &str = "../../catalog/challenges.toml";

fn codegate(home: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("codegate").unwrap();
    cmd.env("HOME", home)
        .env_remove("CODEGATE_ANTHROPIC_KEY")
        .env_remove("CODEGATE_OPENAI_KEY");
    cmd
}

/// Write a config whose default provider is the given TOML provider table.
fn write_config(dir: &Path, provider_table: &str) -> PathBuf {
    let path = dir.join("codegate.toml");
    std::fs::write(
        &path,
        format!(
            "default_provider = \"reviewer\"\ndefault_model = \"test-model\"\ntimeout_secs = 5\n\n[providers.reviewer]\n{provider_table}\n"
        ),
    )
    .unwrap();
    path
}

fn write_submission(dir: &Path) -> PathBuf {
    let path = dir.join("solution.rs");
    std::fs::write(
        &path,
        "use std::collections::HashMap;\n\nfn two_sum(nums: &[i32], target: i32) -> Option<(usize, usize)> {\n    let mut seen = HashMap::new();\n    for (i, n) in nums.iter().enumerate() {\n        if let Some(&j) = seen.get(&(target - n)) {\n            return Some((j, i));\n        }\n        seen.insert(*n, i);\n    }\n    None\n}\n",
    )
    .unwrap();
    path
}

fn review(home: &Path, config: &Path, data: &Path, task: &str, file: &Path) -> Command {
    let mut cmd = codegate(home);
    cmd.arg("review")
        .arg("--catalog")
        .arg(CATALOG)
        .arg("--task")
        .arg(task)
        .arg("--file")
        .arg(file)
        .arg("--config")
        .arg(config)
        .arg("--data-dir")
        .arg(data);
    cmd
}

#[test]
fn validate_sample_catalog() {
    let home = TempDir::new().unwrap();
    codegate(home.path())
        .arg("validate")
        .arg("--catalog")
        .arg(CATALOG)
        .assert()
        .success()
        .stdout(predicate::str::contains("5 challenges"))
        .stdout(predicate::str::contains("All catalogs valid"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(
        &path,
        "[catalog]\nid = \"b\"\nname = \"Broken\"\n\n[[challenges]]\nid = \"x\"\ntitle = \"X\"\n",
    )
    .unwrap();

    codegate(dir.path())
        .arg("validate")
        .arg("--catalog")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] WARNING: no requirements"))
        .stdout(predicate::str::contains("1 warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    let home = TempDir::new().unwrap();
    codegate(home.path())
        .arg("validate")
        .arg("--catalog")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    codegate(dir.path())
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created codegate.toml"))
        .stdout(predicate::str::contains("Created catalog/example.toml"));

    assert!(dir.path().join("codegate.toml").exists());

    codegate(dir.path())
        .current_dir(dir.path())
        .arg("validate")
        .arg("--catalog")
        .arg("catalog")
        .assert()
        .success()
        .stdout(predicate::str::contains("All catalogs valid"));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    codegate(dir.path())
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    codegate(dir.path())
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn stats_on_empty_data_dir() {
    let dir = TempDir::new().unwrap();
    codegate(dir.path())
        .current_dir(dir.path())
        .arg("stats")
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No attempts recorded yet"));
}

#[test]
fn review_approves_and_records_history() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "type = \"mock\"");
    let data = dir.path().join("data");
    let file = write_submission(dir.path());

    review(dir.path(), &config, &data, "two-sum", &file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Verdict: APPROVED  (45/60)"))
        .stdout(predicate::str::contains("First attempt at this challenge."))
        .stdout(predicate::str::contains("+100 XP"));

    let history = std::fs::read_to_string(data.join("history.json")).unwrap();
    assert!(history.contains("\"task_id\": \"two-sum\""));
    assert!(!history.contains("HashMap::new"));

    review(dir.path(), &config, &data, "two-sum", &file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Change since last attempt: +0"))
        .stdout(predicate::str::contains("XP").not());

    codegate(dir.path())
        .arg("stats")
        .arg("--config")
        .arg(&config)
        .arg("--data-dir")
        .arg(&data)
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_attempts\": 2"))
        .stdout(predicate::str::contains("\"total_xp\": 100"));
}

#[test]
fn review_incident_applies_performance_floor() {
    let dir = TempDir::new().unwrap();
    // Approved by the mock, but performance 7 is below the incident floor.
    let config = write_config(dir.path(), "type = \"mock\"");
    let data = dir.path().join("data");
    let file = write_submission(dir.path());

    let output = review(dir.path(), &config, &data, "stale-cache", &file)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["record"]["status"], "REJECTED");
    assert_eq!(json["record"]["total_score"], 45);
    assert_eq!(json["rejection_reason"]["rule"], "incident_performance");
    assert_eq!(json["xp_awarded"], 0);
}

#[test]
fn review_falls_back_when_provider_is_unreachable() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        "type = \"openai\"\napi_key = \"test\"\nbase_url = \"http://127.0.0.1:1\"",
    );
    let data = dir.path().join("data");
    let file = write_submission(dir.path());

    let output = review(dir.path(), &config, &data, "two-sum", &file)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["record"]["status"], "REJECTED");
    assert_eq!(json["record"]["total_score"], 0);
    assert_eq!(json["fallback"], "unavailable");

    let history = std::fs::read_to_string(data.join("history.json")).unwrap();
    assert!(history.contains("two-sum"));
}

#[test]
fn review_rejects_unreadable_assessment() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        "type = \"mock\"\nresponse = \"I think this code is great!\"",
    );
    let data = dir.path().join("data");
    let file = write_submission(dir.path());

    review(dir.path(), &config, &data, "two-sum", &file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Verdict: REJECTED  (0/60)"))
        .stdout(predicate::str::contains("could not be read"));
}

#[test]
fn review_json_hides_validation_details() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        "type = \"mock\"\nresponse = '{\"total_score\": 70, \"rubric\": {\"functional_correctness\": 12}}'",
    );
    let data = dir.path().join("data");
    let file = write_submission(dir.path());

    let output = review(dir.path(), &config, &data, "two-sum", &file)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["fallback"], "unreadable");
    assert_eq!(json["record"]["total_score"], 0);
    assert!(!stdout.contains("out_of_range"));
    assert!(!stdout.contains("functional_correctness\": 12"));
}

#[test]
fn review_keeps_unreadable_history_aside() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "type = \"mock\"");
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("history.json"), "[{\"task_id\": \"old\"").unwrap();
    let file = write_submission(dir.path());

    review(dir.path(), &config, &data, "two-sum", &file)
        .assert()
        .success();

    let kept: Vec<String> = std::fs::read_dir(&data)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("history.json.corrupt-"))
        .collect();
    assert_eq!(kept.len(), 1);
    assert_eq!(
        std::fs::read_to_string(data.join(&kept[0])).unwrap(),
        "[{\"task_id\": \"old\""
    );

    let history = std::fs::read_to_string(data.join("history.json")).unwrap();
    assert!(history.contains("two-sum"));
}

#[test]
fn review_rejects_empty_submission_without_recording() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "type = \"mock\"");
    let data = dir.path().join("data");
    let file = dir.path().join("empty.rs");
    std::fs::write(&file, "   \n").unwrap();

    review(dir.path(), &config, &data, "two-sum", &file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));

    assert!(!data.join("history.json").exists());
}

#[test]
fn review_unknown_task() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "type = \"mock\"");
    let file = write_submission(dir.path());

    review(dir.path(), &config, &dir.path().join("data"), "no-such-task", &file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("challenge 'no-such-task' not found"));
}

#[test]
fn reset_clears_history() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "type = \"mock\"");
    let data = dir.path().join("data");
    let file = write_submission(dir.path());

    review(dir.path(), &config, &data, "two-sum", &file)
        .assert()
        .success();

    codegate(dir.path())
        .arg("reset")
        .arg("--config")
        .arg(&config)
        .arg("--data-dir")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared history and progress"));

    codegate(dir.path())
        .arg("stats")
        .arg("--config")
        .arg(&config)
        .arg("--data-dir")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("No attempts recorded yet"));
}

#[test]
fn list_models_from_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "type = \"mock\"");

    codegate(dir.path())
        .arg("list-models")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Provider: reviewer (default)"))
        .stdout(predicate::str::contains("mock-model"));
}

#[test]
fn help_output() {
    let home = TempDir::new().unwrap();
    codegate(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("code review gate"));
}

#[test]
fn version_output() {
    let home = TempDir::new().unwrap();
    codegate(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("codegate"));
}
