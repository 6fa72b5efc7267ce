//! Engine runs through `sh` with a sled-backed history.
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use scriptor_core::{
    ExecutionStatus, RunStatus, ScannerConfig, ScriptAction, Scriptor, ScriptorConfig,
};
use scriptor_driver_shell::ShellDriverConfig;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("scripts")).unwrap();
        Self { dir }
    }

    fn script(&self, name: &str, content: &str) {
        fs::write(self.dir.path().join("scripts").join(name), content).unwrap();
    }

    fn marker(&self) -> String {
        self.dir.path().join("marker").display().to_string()
    }

    fn scriptor(&self) -> Scriptor {
        let driver = ShellDriverConfig::new("sh", self.dir.path().join("history"))
            .with_tmp_file_path(self.dir.path().join("script.tmp"))
            .with_save_output(true);
        Scriptor::new(ScriptorConfig::new(
            ScannerConfig::new(self.dir.path().join("scripts")),
            Arc::new(driver),
        ))
    }

    fn marker_lines(&self) -> Vec<String> {
        let path = self.marker();
        if !Path::new(&path).exists() {
            return Vec::new();
        }
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[tokio::test]
async fn test_scripts_run_once() {
    let ws = Workspace::new();
    let marker = ws.marker();
    ws.script("01_a.sh", &format!("echo a >> {marker}"));
    ws.script("02_b.sh", &format!("echo b >> {marker}"));

    let first = ws.scriptor().update_database().await.unwrap();
    let second = ws.scriptor().update_database().await.unwrap();

    assert_eq!(first.len(), 2);
    assert!(second.is_empty());
    assert_eq!(ws.marker_lines(), vec!["a", "b"]);

    let history = ws.scriptor().list_executed_scripts().await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|r| r.action == ScriptAction::Execute));
}

#[tokio::test]
async fn test_failure_halts_and_is_retried() {
    let ws = Workspace::new();
    let marker = ws.marker();
    ws.script("01_a.sh", &format!("echo a >> {marker}"));
    ws.script("02_b.sh", "echo 'relation missing' >&2\nexit 1");
    ws.script("03_c.sh", &format!("echo c >> {marker}"));

    let report = ws.scriptor().update_database().await.unwrap();

    assert_eq!(report.status(), RunStatus::Aborted);
    assert_eq!(report.len(), 2);
    assert_eq!(report.executed_scripts()[1].execution_status, ExecutionStatus::Ko);
    assert_eq!(report.executed_scripts()[1].execution_output, "relation missing\n");
    assert_eq!(ws.marker_lines(), vec!["a"]);

    ws.script("02_b.sh", "true");
    let retry = ws.scriptor().update_database().await.unwrap();

    let names: Vec<_> = retry
        .executed_scripts()
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(names, vec!["02_b.sh", "03_c.sh"]);
    assert_eq!(ws.marker_lines(), vec!["a", "c"]);
}

#[tokio::test]
async fn test_mark_script_skips_execution() {
    let ws = Workspace::new();
    let marker = ws.marker();
    ws.script("01_a.sh", &format!("echo a >> {marker}"));

    let path = ws.dir.path().join("scripts").join("01_a.sh");
    let marked = ws.scriptor().mark_script(&path).await.unwrap();
    assert_eq!(marked.action, ScriptAction::MarkAsExecuted);

    let report = ws.scriptor().update_database().await.unwrap();
    assert!(report.is_empty());
    assert!(ws.marker_lines().is_empty());
}
