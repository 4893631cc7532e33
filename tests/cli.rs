#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use anyhow::Result;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

#[path = "util.rs"]
mod util;

fn tasklist(data_dir: &Path, seed_url: &str) -> Command {
    let mut cmd = Command::cargo_bin("tasklist").expect("binary built");
    cmd.env("TASKLIST_DATA_DIR", data_dir)
        .env("TASKLIST_SEED_URL", seed_url)
        .env("TASKLIST_FETCH_TIMEOUT_SECS", "5")
        .env("TASKLIST_LOG", "off");
    cmd
}

fn json_stdout(cmd: &mut Command) -> Result<Value> {
    let output = cmd.output()?;
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn first_list_seeds_once_and_persists() -> Result<()> {
    let dir = tempdir()?;
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/todos")
        .with_status(200)
        .with_body(util::page_json(&[("Water the plants", false), ("Call mum", true)]))
        .expect(1)
        .create();
    let url = format!("{}/todos", server.url());

    let status = tasklist(dir.path(), &url).arg("seed-status").output()?;
    assert_eq!(String::from_utf8_lossy(&status.stdout).trim(), "not seeded");

    let first = json_stdout(tasklist(dir.path(), &url).args(["list", "--json"]))?;
    let second = json_stdout(tasklist(dir.path(), &url).args(["list", "--json"]))?;
    assert_eq!(first, second);
    let titles: Vec<&str> = first
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Water the plants", "Call mum"]);

    let status = json_stdout(tasklist(dir.path(), &url).args(["seed-status", "--json"]))?;
    assert_eq!(status["seeded"], true);
    assert!(dir.path().join("tasklist.sqlite3").exists());
    assert!(dir.path().join("settings.json").exists());
    mock.assert();
    Ok(())
}

#[test]
fn edit_commands_change_one_field_each() -> Result<()> {
    let dir = tempdir()?;
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/todos")
        .with_status(200)
        .with_body(util::page_json(&[]))
        .create();
    let url = format!("{}/todos", server.url());

    let created = json_stdout(tasklist(dir.path(), &url).args([
        "add",
        "Plan trip",
        "--description",
        "book hotel",
        "--date",
        "1700000000000",
        "--json",
    ]))?;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["title"], "Plan trip");
    assert_eq!(created["is_completed"], false);

    let done = json_stdout(tasklist(dir.path(), &url).args(["complete", &id, "--json"]))?;
    assert_eq!(done["is_completed"], true);
    assert_eq!(done["description"], "book hotel");

    let renamed = json_stdout(tasklist(dir.path(), &url).args(["rename", &id, "Plan holiday", "--json"]))?;
    assert_eq!(renamed["title"], "Plan holiday");
    assert_eq!(renamed["is_completed"], true);

    let cleared = json_stdout(tasklist(dir.path(), &url).args(["describe", &id, "--json"]))?;
    assert!(cleared.get("description").is_none());

    let moved = json_stdout(tasklist(dir.path(), &url).args(["redate", &id, "1800000000000", "--json"]))?;
    assert_eq!(moved["date"], 1_800_000_000_000i64);

    tasklist(dir.path(), &url).args(["delete", &id]).assert().success();
    let listed = json_stdout(tasklist(dir.path(), &url).args(["list", "--json"]))?;
    assert_eq!(listed.as_array().unwrap().len(), 0);
    Ok(())
}

#[test]
fn unknown_id_exits_non_zero_with_code() -> Result<()> {
    let dir = tempdir()?;
    let id = uuid::Uuid::new_v4().to_string();
    let output = tasklist(dir.path(), "http://127.0.0.1:9/todos")
        .args(["complete", &id])
        .output()?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: [TASKS/NOT_FOUND]"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn unreachable_seed_source_fails_and_stays_unseeded() -> Result<()> {
    let dir = tempdir()?;
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let url = format!("http://{}/todos", listener.local_addr()?);
    drop(listener);

    let output = tasklist(dir.path(), &url).arg("list").output()?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: [SEED/FETCH_TRANSPORT]"), "stderr: {stderr}");

    let status = tasklist(dir.path(), &url).arg("seed-status").output()?;
    assert_eq!(String::from_utf8_lossy(&status.stdout).trim(), "not seeded");
    Ok(())
}
