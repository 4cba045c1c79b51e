use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

// Every run gets its own config, cache and state locations.
fn extdata(home: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_extdata"));
    cmd.env("NO_COLOR", "1")
        .env("EXTDATA_CONFIG", home.path().join("sources.kdl"))
        .env("EXTDATA_CACHE_DIR", home.path().join("cache"))
        .env("EXTDATA_STATE_DIR", home.path().join("state"));
    cmd
}

#[test]
fn test_help_command() {
    let home = TempDir::new().unwrap();
    extdata(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fetch data from web endpoints"));
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    let expected = format!("extdata {}", env!("CARGO_PKG_VERSION"));
    extdata(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}

#[test]
fn test_fetch_inline_as_json() {
    let home = TempDir::new().unwrap();
    extdata(&home)
        .args([
            "fetch",
            "inline",
            "text=name,price\nApple,1.20\nFig,10.00",
            "format=csv with header",
            "-o",
            "json",
            "--no-meta",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\""))
        .stdout(predicate::str::contains("\"Fig\""))
        .stdout(predicate::str::contains("__time").not());
}

#[test]
fn test_fetch_inline_table_with_mapping() {
    let home = TempDir::new().unwrap();
    extdata(&home)
        .args([
            "fetch",
            "inline",
            "text=name,price\nApple,1.20\nFig,10.00",
            "format=csv with header",
            "data=fruit=name",
            "filters=name=Fig",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("fruit"))
        .stdout(predicate::str::contains("Fig"))
        .stdout(predicate::str::contains("Apple").not())
        .stdout(predicate::str::contains("__stale: false"));
}

#[test]
fn test_fetch_yaml_output() {
    let home = TempDir::new().unwrap();
    extdata(&home)
        .args(["fetch", "inline", "text={\"city\": \"Oslo\"}", "-o", "yaml", "--no-meta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("city:"))
        .stdout(predicate::str::contains("Oslo"));
}

#[test]
fn test_fetch_without_connector_fails() {
    let home = TempDir::new().unwrap();
    extdata(&home)
        .args(["fetch", "web", "text=hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No suitable connector"))
        .stderr(predicate::str::contains("returned no data"));
}

#[test]
fn test_fetch_from_configured_directory() {
    let home = TempDir::new().unwrap();
    let reports = home.path().join("reports");
    fs::create_dir(&reports).unwrap();
    fs::write(reports.join("jan.csv"), "month,total\njan,10\n").unwrap();
    fs::write(
        home.path().join("sources.kdl"),
        format!("source \"reports\" {{\n    path \"{}\"\n}}\n", reports.display()),
    )
    .unwrap();

    extdata(&home)
        .args(["fetch", "file", "directory=reports", "file name=jan.csv", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"10\""));
}

#[test]
fn test_explicit_config_flag_wins() {
    let home = TempDir::new().unwrap();
    let other = home.path().join("other.kdl");
    fs::write(&other, "source \"crm\" {\n    type \"postgres\"\n    host \"db.local\"\n}\n").unwrap();

    extdata(&home)
        .args(["sources", "--config"])
        .arg(&other)
        .assert()
        .success()
        .stdout(predicate::str::contains("crm"))
        .stdout(predicate::str::contains("db.local"));
}

#[test]
fn test_sources_masks_passwords() {
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join("sources.kdl"),
        "source \"crm\" {\n    type \"postgres\"\n    password \"hunter2\"\n}\n",
    )
    .unwrap();

    extdata(&home)
        .arg("sources")
        .assert()
        .success()
        .stdout(predicate::str::contains("crm"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_sources_unknown_scope_fails() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("sources.kdl"), "source \"crm\" {\n    type \"postgres\"\n}\n").unwrap();

    extdata(&home)
        .args(["sources", "billing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("billing"));
}

#[test]
fn test_sources_without_config() {
    let home = TempDir::new().unwrap();
    extdata(&home)
        .arg("sources")
        .assert()
        .success()
        .stdout(predicate::str::contains("No sources configured"));
}

#[test]
fn test_cache_clear() {
    let home = TempDir::new().unwrap();
    extdata(&home)
        .args(["cache", "clear", "--throttle"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 cached response(s)"))
        .stdout(predicate::str::contains("Reset 0 throttle reservation(s)"));
}

#[test]
fn test_quiet_suppresses_messages() {
    let home = TempDir::new().unwrap();
    extdata(&home)
        .args(["cache", "clear", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_jsonpath_on_file() {
    let home = TempDir::new().unwrap();
    let doc = home.path().join("items.json");
    fs::write(&doc, r#"{"items": [{"name": "a", "price": 3}, {"name": "b", "price": 12}]}"#).unwrap();

    extdata(&home)
        .arg("jsonpath")
        .arg(&doc)
        .arg("$.items[?(@.price > 5)].name")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"b\""))
        .stdout(predicate::str::contains("\"a\"").not());
}

#[test]
fn test_jsonpath_reads_stdin() {
    let home = TempDir::new().unwrap();
    extdata(&home)
        .args(["jsonpath", "-", "$.city"])
        .write_stdin("city: Oslo\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Oslo\""));
}

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    extdata(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("extdata"));
}

#[test]
fn test_invalid_command() {
    let home = TempDir::new().unwrap();
    extdata(&home)
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}
