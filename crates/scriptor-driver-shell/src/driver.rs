//! Driver running each script through an external client binary.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use scriptor_core::{Driver, DriverError, ExecutedScript, Execution, Script};

use crate::config::ShellDriverConfig;
use crate::history::ShellHistory;

/// Writes a script to a temporary file and hands it to the client.
///
/// A non-zero exit status or a timeout is a KO. Only a client that cannot be
/// started at all is a driver error.
#[derive(Debug)]
pub struct ShellDriver {
    config: ShellDriverConfig,
    history: ShellHistory,
}

impl ShellDriver {
    /// Open the history and build the driver.
    pub fn open(config: ShellDriverConfig) -> Result<Self, DriverError> {
        let history = ShellHistory::open(&config.history_path)?;
        Ok(Self { config, history })
    }

    /// The local history.
    pub fn history(&self) -> &ShellHistory {
        &self.history
    }

    async fn run_client(&self) -> Result<Execution, DriverError> {
        let file = self.config.tmp_file_path.to_string_lossy().into_owned();
        let mut command = Command::new(&self.config.client_path);
        command
            .args(self.config.command_args(&file))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => DriverError::Unavailable(format!(
                "cannot start {}: {e}",
                self.config.client_path.display()
            )),
            _ => DriverError::Io(e),
        })?;

        let waited = match self.config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    return Ok(Execution::ko(format!(
                        "client timed out after {} ms",
                        timeout.as_millis()
                    )));
                }
            },
            None => child.wait_with_output().await,
        };
        let output = waited?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if self.config.print_output && !text.is_empty() {
            tracing::info!(output = %text.trim_end(), "client output");
        }

        if output.status.success() {
            let execution = Execution::ok();
            Ok(if self.config.save_output {
                execution.with_output(text)
            } else {
                execution
            })
        } else {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            tracing::debug!(exit = %code, "client exited with failure");
            Ok(Execution::ko(text))
        }
    }
}

#[async_trait]
impl Driver for ShellDriver {
    async fn execute_script(&self, script: &Script) -> Result<Execution, DriverError> {
        tokio::fs::write(&self.config.tmp_file_path, script.content.as_bytes()).await?;

        let started = Instant::now();
        let execution = self.run_client().await?;
        Ok(execution.with_duration_millis(started.elapsed().as_millis() as u64))
    }

    async fn list_executed_scripts(&self) -> Result<Vec<ExecutedScript>, DriverError> {
        self.history.list()
    }

    async fn mark_as_executed(
        &self,
        executed_script: ExecutedScript,
    ) -> Result<ExecutedScript, DriverError> {
        let mut record = executed_script.into_marked();
        if !self.config.save_output {
            record.execution_output.clear();
        }
        self.history.put(&record)?;
        Ok(record)
    }

    async fn override_script(
        &self,
        executed_script: ExecutedScript,
    ) -> Result<ExecutedScript, DriverError> {
        let record = executed_script.into_overridden();
        self.history.put(&record)?;
        Ok(record)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    use scriptor_core::{ExecutionStatus, OrderingKey, ScriptAction};
    use tempfile::TempDir;

    fn script(name: &str, content: &str) -> Script {
        Script::new(name, name, OrderingKey::parse(name), content)
    }

    fn driver(
        dir: &TempDir,
        config: impl FnOnce(ShellDriverConfig) -> ShellDriverConfig,
    ) -> ShellDriver {
        let base = ShellDriverConfig::new("sh", dir.path().join("history"))
            .with_tmp_file_path(dir.path().join("script.tmp"));
        ShellDriver::open(config(base)).unwrap()
    }

    #[tokio::test]
    async fn test_successful_script() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&dir, |c| c.with_save_output(true));

        let execution = driver
            .execute_script(&script("01_a.sh", "echo hello"))
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Ok);
        assert_eq!(execution.output.as_deref(), Some("hello\n"));
        assert!(execution.duration_millis.is_some());
    }

    #[tokio::test]
    async fn test_output_dropped_unless_saved() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&dir, |c| c);

        let execution = driver
            .execute_script(&script("01_a.sh", "echo hello"))
            .await
            .unwrap();
        assert_eq!(execution.output, None);
    }

    #[tokio::test]
    async fn test_failing_script_is_ko() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&dir, |c| c);

        let execution = driver
            .execute_script(&script("01_a.sh", "echo broken >&2\nexit 3"))
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Ko);
        assert_eq!(execution.output.as_deref(), Some("broken\n"));
    }

    #[tokio::test]
    async fn test_timeout_is_ko() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&dir, |c| c.with_timeout(Duration::from_millis(100)));

        let execution = driver
            .execute_script(&script("01_a.sh", "sleep 5"))
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Ko);
        assert!(execution.output.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_client_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            ShellDriverConfig::new(dir.path().join("no-such-client"), dir.path().join("history"))
                .with_tmp_file_path(dir.path().join("script.tmp"));
        let driver = ShellDriver::open(config).unwrap();

        let result = driver.execute_script(&script("01_a.sh", "echo")).await;
        assert!(matches!(result, Err(DriverError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_mark_and_override_persist() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&dir, |c| c);
        let first = script("01_a.sh", "echo a");

        let marked = driver
            .mark_as_executed(ExecutedScript::without_execution(
                &first,
                ScriptAction::MarkAsExecuted,
            ))
            .await
            .unwrap();
        assert_eq!(marked.action, ScriptAction::MarkAsExecuted);

        let changed = script("01_a.sh", "echo b");
        driver
            .override_script(ExecutedScript::without_execution(&changed, ScriptAction::Execute))
            .await
            .unwrap();

        let records = driver.list_executed_scripts().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, ScriptAction::OverrideExecuted);
        assert_eq!(records[0].checksum, changed.checksum);
    }
}
