use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn bin() -> Command {
    let path = assert_cmd::cargo::cargo_bin!("forge");
    let mut cmd = Command::new(path);
    cmd.env_remove("FORGE_ROOT").env_remove("AIDEV_ROOT");
    cmd
}

fn bin_with_config(config_dir: &Path) -> Command {
    let mut cmd = bin();
    cmd.env("FORGE_CONFIG_DIR", config_dir)
        .env("AIDEV_CONFIG_DIR", config_dir);
    cmd
}

fn parse_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("json output")
}

fn read_config(config_dir: &Path) -> Value {
    let content = fs::read_to_string(config_dir.join("forge").join("config.json")).unwrap();
    serde_json::from_str(&content).expect("config json")
}

#[test]
fn version_reports_identity() {
    bin()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("forge"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stdout(predicate::str::contains("os/arch"));
}

#[test]
fn version_json_output() {
    let output = bin()
        .arg("--json")
        .arg("version")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value = parse_json(&output);
    assert!(value["ok"].as_bool().unwrap());
    assert_eq!(value["result"]["name"].as_str().unwrap(), "forge");
    assert_eq!(
        value["result"]["version"].as_str().unwrap(),
        env!("CARGO_PKG_VERSION")
    );
}

#[test]
fn config_show_fresh_reports_unset_and_defaults() {
    let dir = tempdir().unwrap();

    bin_with_config(dir.path())
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Default root: unset"))
        .stdout(predicate::str::contains("built-in defaults"))
        .stdout(predicate::str::contains("Claude Code"))
        .stdout(predicate::str::contains("Codex"));
}

#[test]
fn config_path_prints_config_file_location() {
    let dir = tempdir().unwrap();

    let expected = dir.path().join("forge").join("config.json");
    bin_with_config(dir.path())
        .arg("config")
        .arg("path")
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.to_string_lossy().as_ref()));
}

#[test]
fn set_root_persists_and_is_shown() {
    let config_dir = tempdir().unwrap();
    let root = tempdir().unwrap();

    bin_with_config(config_dir.path())
        .arg("config")
        .arg("set-root")
        .arg(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("default root updated"));

    let value = read_config(config_dir.path());
    assert_eq!(
        value["root"].as_str().unwrap(),
        root.path().to_string_lossy()
    );
    // Saving fills in the built-in commands so the user can edit them.
    assert_eq!(value["commands"].as_array().unwrap().len(), 2);

    bin_with_config(config_dir.path())
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            root.path().to_string_lossy().as_ref(),
        ));
}

#[test]
fn set_root_rejects_missing_directory() {
    let config_dir = tempdir().unwrap();
    let missing = config_dir.path().join("missing");

    bin_with_config(config_dir.path())
        .arg("config")
        .arg("set-root")
        .arg(&missing)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("invalid root"));
}

#[test]
fn set_root_preserves_custom_commands_and_bookmarks() {
    let config_dir = tempdir().unwrap();
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();

    let seeded = serde_json::json!({
        "root": first.path().to_string_lossy(),
        "commands": [
            {"name": "Aider", "command": "aider", "args": ["--auto-commits"]}
        ],
        "projects": [
            {"name": "blog", "path": "~/Projects/blog"}
        ]
    });
    fs::create_dir_all(config_dir.path().join("forge")).unwrap();
    fs::write(
        config_dir.path().join("forge").join("config.json"),
        seeded.to_string(),
    )
    .unwrap();

    bin_with_config(config_dir.path())
        .arg("config")
        .arg("set-root")
        .arg(second.path())
        .assert()
        .success();

    let value = read_config(config_dir.path());
    assert_eq!(
        value["root"].as_str().unwrap(),
        second.path().to_string_lossy()
    );
    assert_eq!(value["commands"].as_array().unwrap().len(), 1);
    assert_eq!(value["commands"][0]["name"].as_str().unwrap(), "Aider");
    assert_eq!(
        value["projects"][0]["path"].as_str().unwrap(),
        "~/Projects/blog"
    );
}

#[test]
fn root_subcommand_is_an_alias_for_config_show() {
    let dir = tempdir().unwrap();

    bin_with_config(dir.path())
        .arg("root")
        .assert()
        .success()
        .stdout(predicate::str::contains("Default root: unset"));
}

#[test]
fn fresh_run_without_terminal_requires_configuration() {
    let dir = tempdir().unwrap();

    bin_with_config(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no root configured"));
}

#[test]
fn env_override_with_invalid_root_fails() {
    let config_dir = tempdir().unwrap();
    let missing = config_dir.path().join("missing");

    bin_with_config(config_dir.path())
        .env("FORGE_ROOT", &missing)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn env_override_is_used_without_persisting() {
    let config_dir = tempdir().unwrap();
    let empty_root = tempdir().unwrap();

    bin_with_config(config_dir.path())
        .env("FORGE_ROOT", empty_root.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no project directories"))
        .stderr(predicate::str::contains(
            empty_root.path().to_string_lossy().as_ref(),
        ));

    assert!(!config_dir.path().join("forge").join("config.json").exists());
}

#[test]
fn legacy_env_override_is_honored() {
    let config_dir = tempdir().unwrap();
    let empty_root = tempdir().unwrap();

    bin_with_config(config_dir.path())
        .env("AIDEV_ROOT", empty_root.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            empty_root.path().to_string_lossy().as_ref(),
        ));
}

#[test]
fn explicit_root_wins_over_env_and_saved_root() {
    let config_dir = tempdir().unwrap();
    let saved = tempdir().unwrap();
    let env_root = tempdir().unwrap();
    let explicit = tempdir().unwrap();

    bin_with_config(config_dir.path())
        .arg("config")
        .arg("set-root")
        .arg(saved.path())
        .assert()
        .success();

    bin_with_config(config_dir.path())
        .env("FORGE_ROOT", env_root.path())
        .arg(explicit.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no project directories"))
        .stderr(predicate::str::contains(
            explicit.path().to_string_lossy().as_ref(),
        ));
}

#[test]
fn explicit_root_is_saved_on_first_use() {
    let config_dir = tempdir().unwrap();
    let root = tempdir().unwrap();

    // The scan still fails (the root is empty), but the root has already
    // been persisted as a side effect.
    bin_with_config(config_dir.path())
        .arg(root.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("saved default root"));

    let value = read_config(config_dir.path());
    assert_eq!(
        value["root"].as_str().unwrap(),
        root.path().to_string_lossy()
    );
}

#[test]
fn explicit_root_is_not_saved_under_env_override() {
    let config_dir = tempdir().unwrap();
    let root = tempdir().unwrap();
    let env_root = tempdir().unwrap();

    bin_with_config(config_dir.path())
        .env("FORGE_ROOT", env_root.path())
        .arg(root.path())
        .assert()
        .failure()
        .code(1);

    assert!(!config_dir.path().join("forge").join("config.json").exists());
}

#[test]
fn explicit_root_does_not_replace_saved_root() {
    let config_dir = tempdir().unwrap();
    let saved = tempdir().unwrap();
    let other = tempdir().unwrap();

    bin_with_config(config_dir.path())
        .arg("config")
        .arg("set-root")
        .arg(saved.path())
        .assert()
        .success();

    bin_with_config(config_dir.path())
        .arg(other.path())
        .assert()
        .failure()
        .code(1);

    let value = read_config(config_dir.path());
    assert_eq!(
        value["root"].as_str().unwrap(),
        saved.path().to_string_lossy()
    );
}

#[test]
fn invalid_explicit_root_is_a_usage_error() {
    let config_dir = tempdir().unwrap();
    let missing = config_dir.path().join("missing");

    bin_with_config(config_dir.path())
        .arg(&missing)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("invalid root"));
}

#[test]
fn saved_root_launch_requires_a_terminal() {
    let config_dir = tempdir().unwrap();
    let root = tempdir().unwrap();

    bin_with_config(config_dir.path())
        .arg("config")
        .arg("set-root")
        .arg(root.path())
        .assert()
        .success();

    bin_with_config(config_dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("terminal"));
}

#[test]
fn legacy_config_is_migrated_forward() {
    let config_dir = tempdir().unwrap();
    let legacy_dir = tempdir().unwrap();
    let root = tempdir().unwrap();

    let legacy = serde_json::json!({"root": root.path().to_string_lossy()});
    fs::create_dir_all(legacy_dir.path().join("aidev")).unwrap();
    fs::write(
        legacy_dir.path().join("aidev").join("config.json"),
        legacy.to_string(),
    )
    .unwrap();

    bin()
        .env("FORGE_CONFIG_DIR", config_dir.path())
        .env("AIDEV_CONFIG_DIR", legacy_dir.path())
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            root.path().to_string_lossy().as_ref(),
        ));

    assert!(config_dir.path().join("forge").join("config.json").exists());
}

#[test]
fn config_show_json_output() {
    let config_dir = tempdir().unwrap();
    let root = tempdir().unwrap();

    bin_with_config(config_dir.path())
        .arg("config")
        .arg("set-root")
        .arg(root.path())
        .assert()
        .success();

    let output = bin_with_config(config_dir.path())
        .arg("--json")
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value = parse_json(&output);
    assert!(value["ok"].as_bool().unwrap());
    assert_eq!(
        value["result"]["root"].as_str().unwrap(),
        root.path().to_string_lossy()
    );
    assert!(value["result"]["custom_commands"].as_bool().unwrap());
}

#[test]
fn json_errors_are_reported_in_the_wrapper() {
    let config_dir = tempdir().unwrap();
    let missing = config_dir.path().join("missing");

    let output = bin_with_config(config_dir.path())
        .env("FORGE_ROOT", &missing)
        .arg("--json")
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let value = parse_json(&output);
    assert!(!value["ok"].as_bool().unwrap());
    let error = value["error"].as_str().unwrap_or_default();
    assert!(error.contains("does not exist"));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    bin().arg("--definitely-unknown").assert().failure().code(2);
}
