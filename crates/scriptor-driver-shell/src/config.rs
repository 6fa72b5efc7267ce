//! Shell driver configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scriptor_core::{Driver, DriverConfig, DriverError};

use crate::driver::ShellDriver;

/// Default location of the temporary script file.
pub const DEFAULT_TMP_FILE_PATH: &str = "/tmp/scriptor.tmp";

/// Placeholder replaced by the script file path in client arguments.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// How to invoke the database client.
#[derive(Debug, Clone)]
pub struct ShellDriverConfig {
    /// Client binary, e.g. `psql` or `mongosh`.
    pub client_path: PathBuf,
    /// Arguments passed before the script file. An argument containing
    /// `{file}` receives the file path instead of it being appended.
    pub client_args: Vec<String>,
    /// Where each script is written before the client runs it.
    pub tmp_file_path: PathBuf,
    /// Directory of the local execution history.
    pub history_path: PathBuf,
    /// Log client output at info level.
    pub print_output: bool,
    /// Keep client output in history records.
    pub save_output: bool,
    /// Bound on a single client run; exceeding it is a KO.
    pub timeout: Option<Duration>,
}

impl ShellDriverConfig {
    /// Run `client_path` and keep history under `history_path`.
    pub fn new(client_path: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> Self {
        Self {
            client_path: client_path.into(),
            client_args: Vec::new(),
            tmp_file_path: PathBuf::from(DEFAULT_TMP_FILE_PATH),
            history_path: history_path.into(),
            print_output: false,
            save_output: false,
            timeout: None,
        }
    }

    /// Append a client argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.client_args.push(arg.into());
        self
    }

    /// Replace the client arguments.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.client_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the temporary script file.
    pub fn with_tmp_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tmp_file_path = path.into();
        self
    }

    /// Log client output.
    pub fn with_print_output(mut self, enabled: bool) -> Self {
        self.print_output = enabled;
        self
    }

    /// Keep client output in history.
    pub fn with_save_output(mut self, enabled: bool) -> Self {
        self.save_output = enabled;
        self
    }

    /// Bound each client run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Arguments for one run on `file`.
    pub(crate) fn command_args(&self, file: &str) -> Vec<String> {
        let mut substituted = false;
        let mut args: Vec<String> = self
            .client_args
            .iter()
            .map(|arg| {
                if arg.contains(FILE_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(FILE_PLACEHOLDER, file)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(file.to_string());
        }
        args
    }
}

impl DriverConfig for ShellDriverConfig {
    fn to_driver(&self) -> Result<Arc<dyn Driver>, DriverError> {
        let driver: Arc<dyn Driver> = Arc::new(ShellDriver::open(self.clone())?);
        Ok(driver)
    }

    fn log(&self) {
        tracing::info!(
            client = %self.client_path.display(),
            args = ?self.client_args,
            tmp_file = %self.tmp_file_path.display(),
            history = %self.history_path.display(),
            print_output = self.print_output,
            save_output = self.save_output,
            timeout_ms = self.timeout.map(|t| t.as_millis() as u64),
            "shell driver configuration"
        );
    }
}
