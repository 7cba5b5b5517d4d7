//! End-to-end tests driving the `pk` binary.
//!
//! Tests the full flow: park setup → check-in → check-out → report,
//! against a database configured through a temp config file.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn pk_binary() -> String {
    env!("CARGO_BIN_EXE_pk").to_string()
}

/// Writes a config file pointing at a database inside `temp`.
fn write_config(temp: &Path) -> PathBuf {
    let db_file = temp.join("data").join("pk.db");
    let config_file = temp.join("config.toml");
    std::fs::write(
        &config_file,
        format!(
            "database_path = \"{}\"\nbusy_timeout_ms = 2000\n",
            db_file.display()
        ),
    )
    .unwrap();
    config_file
}

fn pk(config: &Path, args: &[&str]) -> Output {
    Command::new(pk_binary())
        .env_remove("RUST_LOG")
        .env_remove("PK_DATABASE_PATH")
        .env_remove("PK_BUSY_TIMEOUT_MS")
        .env_remove("PK_DEFAULT_SLOT_TYPE")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run pk")
}

fn pk_ok(config: &Path, args: &[&str]) -> String {
    let output = pk(config, args);
    assert!(
        output.status.success(),
        "pk {args:?} should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

fn pk_json(config: &Path, args: &[&str]) -> serde_json::Value {
    serde_json::from_str(&pk_ok(config, args)).unwrap()
}

/// Creates park 1 with building 1 (slots 1..=2, car) and building 2 (slot 3, motorcycle).
fn setup_park(temp: &Path, config: &Path) {
    let layout = temp.join("layout.json");
    std::fs::write(
        &layout,
        r#"[
            {"name": "A", "slots": [{"label": "A1"}, {"label": "A2"}]},
            {"name": "B", "slots": [{"label": "M1", "type": "motorcycle"}]}
        ]"#,
    )
    .unwrap();
    let layout = layout.display().to_string();
    let stdout = pk_ok(
        config,
        &[
            "park",
            "create",
            "--name",
            "Central",
            "--latitude",
            "13.7563",
            "--longitude",
            "100.5018",
            "--fixed-first-period",
            "60",
            "--fixed-first-period-cost",
            "20",
            "--hourly-cost",
            "10",
            "--layout",
            &layout,
        ],
    );
    assert_eq!(
        stdout.trim(),
        "Created park 1 (Central) with 2 buildings and 3 slots"
    );
}

#[test]
fn test_check_in_and_out_flow() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    setup_park(temp.path(), &config);

    let opened = pk_json(
        &config,
        &[
            "check-in", "--park", "1", "--plate", "1กข 1234", "--province", "Bangkok", "--json",
        ],
    );
    let code = opened["code"].as_str().unwrap().to_string();
    assert!(code.starts_with("00000001-"), "unexpected code {code}");
    assert_eq!(opened["slot"]["status"], "occupied");

    let park = pk_json(&config, &["park", "show", "1", "--json"]);
    assert_eq!(park["capacity"], 3);
    assert_eq!(park["vacancy"], 2);

    let closed = pk_json(
        &config,
        &["check-out", &code, "--discount", "5", "--json"],
    );
    // Checked out within the first hour: 20.00 flat, less the discount.
    assert_eq!(closed["amount"], "15.00");
    assert_eq!(closed["discount"], "5.00");

    let bill = pk_json(&config, &["bill", "show", &code, "--json"]);
    assert_eq!(bill["amount"], "15.00");

    let report = pk_json(&config, &["report", "1", "--period", "monthly", "--json"]);
    let buckets = report.as_array().unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0]["amount"], "15.00");
    assert_eq!(buckets[0]["park_name"], "Central");
}

#[test]
fn test_conflicts_exit_with_error() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    setup_park(temp.path(), &config);

    pk_ok(
        &config,
        &["check-in", "--slot", "3", "--plate", "AB 1", "--province", "Bangkok"],
    );

    let again = pk(
        &config,
        &["check-in", "--slot", "3", "--plate", "AB 2", "--province", "Bangkok"],
    );
    assert!(!again.status.success());
    let stderr = String::from_utf8_lossy(&again.stderr);
    assert!(
        stderr.contains("slot with id 3 is occupied"),
        "unexpected stderr: {stderr}"
    );

    let full = pk(
        &config,
        &[
            "check-in", "--building", "2", "--type", "motorcycle", "--plate", "AB 3",
            "--province", "Bangkok",
        ],
    );
    assert!(!full.status.success());
    let stderr = String::from_utf8_lossy(&full.stderr);
    assert!(
        stderr.contains("no vacant motorcycle slot in building 2"),
        "unexpected stderr: {stderr}"
    );

    let status = pk_ok(&config, &["status"]);
    assert!(status.contains("Status: OK"));
    assert!(status.contains("Slots: 2 vacant, 1 occupied, 0 closed"));
    assert!(status.contains("Open bills: 1"));
}

#[test]
fn test_deleting_building_hides_its_slots() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    setup_park(temp.path(), &config);

    let stdout = pk_ok(&config, &["building", "delete", "1"]);
    assert_eq!(stdout.trim(), "Deleted building 1 (A)");

    let closed = pk(&config, &["slot", "close", "1"]);
    assert!(!closed.status.success());
    assert!(String::from_utf8_lossy(&closed.stderr).contains("slot with id '1' cannot be found"));

    let parks = pk_json(&config, &["park", "list", "--json"]);
    assert_eq!(parks[0]["capacity"], 1);
}

#[test]
fn test_invalid_arguments_are_rejected() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let output = pk(&config, &["check-in", "--plate", "AB 1", "--province", "Bangkok"]);
    assert!(!output.status.success());

    let output = pk(&config, &["report", "1", "--period", "yearly"]);
    assert!(!output.status.success());

    // Unknown parks yield an empty report rather than an error.
    let stdout = pk_ok(&config, &["report", "7"]);
    assert_eq!(stdout.trim(), "No revenue recorded for park 7.");
}
