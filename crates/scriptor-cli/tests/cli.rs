//! Runs the `scriptor` binary with `sh` as database client.
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn scriptor(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_scriptor"))
        .arg("--client-path")
        .arg("sh")
        .arg("--history-path")
        .arg(root.join("history"))
        .arg("--tmp-file-path")
        .arg(root.join("script.tmp"))
        .arg("--porcelain")
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_update_db_then_list() {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("scripts");
    fs::create_dir_all(&scripts).unwrap();
    fs::write(scripts.join("01_a.sh"), "true").unwrap();
    fs::write(scripts.join("02_b.sh"), "true").unwrap();
    let scripts_arg = scripts.display().to_string();

    let run = scriptor(dir.path(), &["update-db", "--path", &scripts_arg]);
    assert_eq!(run.status.code(), Some(0));
    assert_eq!(stdout(&run).trim(), "01_a.sh\n02_b.sh");

    let again = scriptor(dir.path(), &["update-db", "--path", &scripts_arg]);
    assert_eq!(again.status.code(), Some(0));
    assert_eq!(stdout(&again).trim(), "");

    let list = scriptor(dir.path(), &["list"]);
    assert_eq!(list.status.code(), Some(0));
    assert_eq!(stdout(&list).lines().count(), 2);
}

#[test]
fn test_failed_script_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("scripts");
    fs::create_dir_all(&scripts).unwrap();
    fs::write(scripts.join("01_a.sh"), "exit 1").unwrap();
    fs::write(scripts.join("02_b.sh"), "true").unwrap();
    let scripts_arg = scripts.display().to_string();

    let run = scriptor(dir.path(), &["update-db", "--path", &scripts_arg]);

    assert_eq!(run.status.code(), Some(2));
    assert_eq!(stdout(&run).trim(), "01_a.sh");
    assert!(String::from_utf8_lossy(&run.stderr).contains("update finished with failed scripts"));
}

#[test]
fn test_mark_script() {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("scripts");
    fs::create_dir_all(&scripts).unwrap();
    fs::write(scripts.join("01_a.sh"), "exit 1").unwrap();
    let script_arg = scripts.join("01_a.sh").display().to_string();
    let scripts_arg = scripts.display().to_string();

    let mark = scriptor(dir.path(), &["mark-script", "--path", &script_arg]);
    assert_eq!(mark.status.code(), Some(0));
    assert_eq!(stdout(&mark).trim(), "01_a.sh");

    let run = scriptor(dir.path(), &["update-db", "--path", &scripts_arg]);
    assert_eq!(run.status.code(), Some(0));
}

#[test]
fn test_missing_client_path_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_scriptor"))
        .args(["list", "--history-path"])
        .arg(dir.path().join("history"))
        .env_remove("SCRIPTOR_CLIENT_PATH")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("client path"));
}
