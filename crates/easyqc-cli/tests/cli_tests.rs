//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn easyqc() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("easyqc").unwrap();
    cmd.env_remove("EASYQC_RATER").env_remove("RUST_LOG");
    cmd
}

/// A temp dir holding a config file and a registered project `study1`.
fn project() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let cfg = dir.path().join("easyqc.toml");
    easyqc()
        .arg("--config")
        .arg(&cfg)
        .args(["init", "study1"])
        .arg(dir.path().join("study1"))
        .assert()
        .success();
    (dir, cfg)
}

#[test]
fn help_lists_subcommands() {
    easyqc()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rate"))
        .stdout(predicate::str::contains("aggregate"))
        .stdout(predicate::str::contains("query"));
}

#[test]
fn rate_requires_four_positionals() {
    easyqc()
        .args(["rate", "study1", "memory", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("EZQCID"));
}

#[test]
fn rate_rejects_extra_positionals() {
    easyqc()
        .args(["rate", "study1", "memory", "alice", "sub-001", "extra"])
        .assert()
        .failure();
}

#[test]
fn init_creates_project_and_config() {
    let dir = TempDir::new().unwrap();
    let cfg = dir.path().join("easyqc.toml");

    easyqc()
        .arg("--config")
        .arg(&cfg)
        .args(["init", "study1"])
        .arg(dir.path().join("study1"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Created project 'study1'"))
        .stdout(predicate::str::contains("Registered 'study1'"));

    assert!(dir.path().join("study1/settings_study1.json").exists());
    let config = std::fs::read_to_string(&cfg).unwrap();
    assert!(config.contains("study1"));
}

#[test]
fn unknown_project_fails() {
    let dir = TempDir::new().unwrap();
    easyqc()
        .arg("--config")
        .arg(dir.path().join("easyqc.toml"))
        .args(["module", "list", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown project 'nope'"));
}

#[test]
fn module_lifecycle() {
    let (dir, cfg) = project();

    easyqc()
        .arg("--config")
        .arg(&cfg)
        .args([
            "module", "add", "study1", "memory", "Memory", "--score", "Quality=1-5", "--tag",
            "Artifact",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added module 'memory'"));

    easyqc()
        .arg("--config")
        .arg(&cfg)
        .args(["module", "list", "study1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("example"))
        .stdout(predicate::str::contains("memory"))
        .stdout(predicate::str::contains("1,2,3,4,5"));

    easyqc()
        .arg("--config")
        .arg(&cfg)
        .args(["module", "add", "study1", "memory", "Again"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let export = dir.path().join("out/memory.json");
    easyqc()
        .arg("--config")
        .arg(&cfg)
        .args(["module", "export", "study1", "memory"])
        .arg(&export)
        .assert()
        .success();
    assert!(export.exists());

    easyqc()
        .args(["validate"])
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Module: memory"))
        .stdout(predicate::str::contains("Module file valid."));

    easyqc()
        .arg("--config")
        .arg(&cfg)
        .args(["module", "remove", "study1", "example"])
        .assert()
        .success();

    easyqc()
        .arg("--config")
        .arg(&cfg)
        .args(["module", "remove", "study1", "memory"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("last remaining"));
}

#[test]
fn validate_rejects_missing_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"name": "memory", "label": "Memory"}"#).unwrap();

    easyqc()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn query_filters_csv() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.csv");
    std::fs::write(&path, "ezqcid,score1,tag1\ns1,2,True\ns2,3,False\ns3,2,False\n").unwrap();

    easyqc()
        .arg("query")
        .arg(&path)
        .arg("SELECT ezqcid, _othervar_ FROM df WHERE score1 = '2' AND tag1 = 'False'")
        .assert()
        .success()
        .stdout(predicate::str::contains("s3"))
        .stdout(predicate::str::contains("1 row(s)"))
        .stdout(predicate::str::contains("s1").not());
}

#[test]
fn query_falls_back_on_bad_sql() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.csv");
    std::fs::write(&path, "ezqcid,score1\ns1,2\ns2,3\n").unwrap();

    easyqc()
        .arg("query")
        .arg(&path)
        .arg("SELECT FROM WHERE")
        .assert()
        .success()
        .stderr(predicate::str::contains("query not applied"))
        .stdout(predicate::str::contains("2 row(s)"));
}

#[test]
fn query_writes_output() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.csv");
    let out = dir.path().join("out.csv");
    std::fs::write(&path, "ezqcid,age\ns1,30\ns2,41\n").unwrap();

    easyqc()
        .arg("query")
        .arg(&path)
        .arg("SELECT ezqcid FROM df WHERE age > 35")
        .arg("--output")
        .arg(&out)
        .assert()
        .success();
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "ezqcid\ns2\n");
}

#[test]
fn covariates_from_ids_and_directories() {
    let (dir, cfg) = project();
    let cov = dir.path().join("study1/Table/ezqc_all.csv");

    easyqc()
        .arg("--config")
        .arg(&cfg)
        .args(["covariates", "study1", "--ids", "sub-001, sub-002 sub-003", "--batch", "b1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 3 subject(s)"));
    let content = std::fs::read_to_string(&cov).unwrap();
    assert!(content.starts_with("0,ezqcid,ezqcbatch\n"));
    assert!(content.contains("sub-002,sub-002,b1"));

    let subjects = dir.path().join("raw");
    for s in ["sub-b", "sub-a"] {
        std::fs::create_dir_all(subjects.join(s)).unwrap();
    }
    std::fs::write(subjects.join("notes.txt"), "not a subject").unwrap();
    easyqc()
        .arg("--config")
        .arg(&cfg)
        .args(["covariates", "study1"])
        .arg(&subjects)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 subject(s)"));
    let content = std::fs::read_to_string(&cov).unwrap();
    assert_eq!(content, "0,ezqcid\nsub-a,sub-a\nsub-b,sub-b\n");
}
