//! Startup behaviour of the binary.

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::{tempdir, NamedTempFile};

/// The binary with every configuration variable cleared, run in `dir`.
fn statuswatch_bin(dir: &std::path::Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("statuswatch")?;
    cmd.current_dir(dir)
        .env_remove("TELEGRAM_BOT_TOKEN")
        .env_remove("RUST_LOG")
        .env_remove("STATUSWATCH_TELEGRAM__TOKEN")
        .env_remove("STATUSWATCH_TELEGRAM__API_URL")
        .env_remove("STATUSWATCH_STATUS__URL")
        .env_remove("STATUSWATCH_STORE__PATH");
    Ok(cmd)
}

#[test]
fn test_startup_fails_without_token() -> Result<()> {
    let dir = tempdir()?;
    let mut cmd = statuswatch_bin(dir.path())?;

    cmd.assert()
        .failure()
        .stderr(contains("Telegram bot token is not set"));

    // Nothing is written when startup is aborted.
    assert!(!dir.path().join("chat_ids.json").exists());
    Ok(())
}

#[test]
fn test_startup_fails_with_missing_config_file() -> Result<()> {
    let dir = tempdir()?;
    let mut cmd = statuswatch_bin(dir.path())?;
    cmd.env("TELEGRAM_BOT_TOKEN", "123:abc")
        .arg("--config-file")
        .arg("/tmp/this/file/does/not/exist.toml");

    cmd.assert()
        .failure()
        .stderr(contains("Config file not found at specified path"));
    Ok(())
}

#[test]
fn test_startup_fails_with_malformed_config_file() -> Result<()> {
    let dir = tempdir()?;
    let mut file = NamedTempFile::new()?;
    writeln!(file, "[status]\ninterval_seconds = \"often\"")?;

    let mut cmd = statuswatch_bin(dir.path())?;
    cmd.env("TELEGRAM_BOT_TOKEN", "123:abc")
        .arg("--config-file")
        .arg(file.path());

    cmd.assert()
        .failure()
        .stderr(contains("Failed to load configuration"));
    Ok(())
}

#[test]
fn test_startup_fails_when_telegram_is_unreachable() -> Result<()> {
    let dir = tempdir()?;
    let mut cmd = statuswatch_bin(dir.path())?;
    cmd.env("TELEGRAM_BOT_TOKEN", "123:abc")
        .env("STATUSWATCH_TELEGRAM__API_URL", "http://127.0.0.1:9");

    cmd.assert()
        .failure()
        .stderr(contains("Failed to start"))
        .stderr(contains("Failed to establish Telegram session"))
        .stderr(contains("123:abc").not());
    Ok(())
}

#[test]
fn test_help_lists_flags() -> Result<()> {
    let dir = tempdir()?;
    let mut cmd = statuswatch_bin(dir.path())?;
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(contains("--config-file"))
        .stdout(contains("--interval-seconds"));
    Ok(())
}
