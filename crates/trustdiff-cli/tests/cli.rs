use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    /// Config pointing the cache and the only trust store into a temp dir.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let anchors = dir.path().join("anchors");
        std::fs::create_dir_all(&anchors).unwrap();

        let certified = rcgen::generate_simple_self_signed(vec!["anchor.example".into()]).unwrap();
        std::fs::write(anchors.join("corp-root.pem"), certified.cert.pem()).unwrap();

        let config = dir.path().join("config.toml");
        std::fs::write(
            &config,
            format!(
                "cache_dir = {:?}\n\n[[sources]]\nname = \"Corp Anchors\"\npath = {:?}\n",
                dir.path().join("cache").display().to_string(),
                anchors.display().to_string(),
            ),
        )
        .unwrap();

        Self { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("trustdiff").unwrap();
        cmd.env_remove("RUST_LOG")
            .arg("--no-color")
            .arg("--config")
            .arg(&self.config);
        cmd
    }
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("trustdiff")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("diff"));
}

#[test]
fn roots_reads_configured_directory() {
    let ws = Workspace::new();
    let output = ws.cmd().args(["roots", "--output", "json"]).output().unwrap();
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["sources"], serde_json::json!(["Corp Anchors"]));
    assert_eq!(records[0]["friendly_name"], "corp-root");
    assert_eq!(records[0]["fingerprint"].as_str().unwrap().len(), 64);
}

#[test]
fn roots_csv_has_header() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["roots", "-o", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("subject,fingerprint,not_after,sources\n"))
        .stdout(predicate::str::contains("Corp Anchors"));
}

#[test]
fn status_on_empty_cache() {
    let ws = Workspace::new();
    let output = ws.cmd().args(["status", "-o", "json"]).output().unwrap();
    assert!(output.status.success());

    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["cached_certificates"], 0);
    assert_eq!(status["stale"], true);
    assert!(status["last_updated_utc"].is_null());
    assert!(status["cache_file"]
        .as_str()
        .unwrap()
        .ends_with("MicrosoftTrustedRootProgramCertificates.json"));
}

#[test]
fn diff_requires_a_refreshed_catalog() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("diff")
        .assert()
        .failure()
        .stderr(predicate::str::contains("trustdiff refresh"));
    assert!(!ws.path().join("cache").exists());
}

#[test]
fn config_init_refuses_to_overwrite() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    let fresh = ws.path().join("fresh").join("config.toml");
    Command::cargo_bin("trustdiff")
        .unwrap()
        .arg("--config")
        .arg(&fresh)
        .args(["config", "init"])
        .assert()
        .success();
    let written = std::fs::read_to_string(&fresh).unwrap();
    assert!(written.contains("refresh_interval_hours = 12"));

    Command::cargo_bin("trustdiff")
        .unwrap()
        .arg("--config")
        .arg(&fresh)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}
