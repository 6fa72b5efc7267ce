//! Execution outcomes and history records.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::identity::Script;

/// How a history record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptAction {
    /// The script ran against the target store.
    Execute,
    /// The script was recorded without running.
    MarkAsExecuted,
    /// A previous record was replaced by operator intent.
    OverrideExecuted,
}

impl fmt::Display for ScriptAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptAction::Execute => write!(f, "EXECUTE"),
            ScriptAction::MarkAsExecuted => write!(f, "MARK_AS_EXECUTED"),
            ScriptAction::OverrideExecuted => write!(f, "OVERRIDE_EXECUTED"),
        }
    }
}

/// Outcome of a driver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// The script succeeded.
    #[serde(rename = "OK")]
    Ok,
    /// The script failed; output holds the diagnostic.
    #[serde(rename = "KO")]
    Ko,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Ok => write!(f, "OK"),
            ExecutionStatus::Ko => write!(f, "KO"),
        }
    }
}

/// What a driver returns after running a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// OK or KO.
    pub status: ExecutionStatus,
    /// Duration measured by the backend, if it measures one.
    pub duration_millis: Option<u64>,
    /// Diagnostic output from the backend.
    pub output: Option<String>,
}

impl Execution {
    /// A successful execution.
    pub fn ok() -> Self {
        Self {
            status: ExecutionStatus::Ok,
            duration_millis: None,
            output: None,
        }
    }

    /// A failed execution with diagnostic output.
    pub fn ko(output: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Ko,
            duration_millis: None,
            output: Some(output.into()),
        }
    }

    /// Attach backend output.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Attach a backend-measured duration.
    pub fn with_duration_millis(mut self, millis: u64) -> Self {
        self.duration_millis = Some(millis);
        self
    }
}

/// Persisted record of a script execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedScript {
    /// Script name.
    pub name: String,
    /// Checksum of the content that was processed.
    pub checksum: String,
    /// How the record came to exist.
    pub action: ScriptAction,
    /// OK or KO.
    pub execution_status: ExecutionStatus,
    /// Execution time; zero when the script did not run.
    pub execution_duration_in_millis: u64,
    /// Client output, possibly empty.
    #[serde(default)]
    pub execution_output: String,
}

impl ExecutedScript {
    /// Record the outcome of running `script`.
    pub fn from_execution(script: &Script, execution: Execution, measured_millis: u64) -> Self {
        Self {
            name: script.name.clone(),
            checksum: script.checksum.clone(),
            action: ScriptAction::Execute,
            execution_status: execution.status,
            execution_duration_in_millis: execution.duration_millis.unwrap_or(measured_millis),
            execution_output: execution.output.unwrap_or_default(),
        }
    }

    /// A record for `script` with the given action and no execution.
    pub fn without_execution(script: &Script, action: ScriptAction) -> Self {
        Self {
            name: script.name.clone(),
            checksum: script.checksum.clone(),
            action,
            execution_status: ExecutionStatus::Ok,
            execution_duration_in_millis: 0,
            execution_output: String::new(),
        }
    }

    /// Normalize a record for persistence through `mark_as_executed`.
    ///
    /// Status becomes OK. `Execute` records keep their action; anything else
    /// becomes `MarkAsExecuted`.
    pub fn into_marked(mut self) -> Self {
        self.execution_status = ExecutionStatus::Ok;
        if self.action != ScriptAction::Execute {
            self.action = ScriptAction::MarkAsExecuted;
        }
        self
    }

    /// Normalize a record for persistence through `override_script`.
    pub fn into_overridden(mut self) -> Self {
        self.execution_status = ExecutionStatus::Ok;
        self.action = ScriptAction::OverrideExecuted;
        self
    }

    /// Whether the record counts as a successful execution.
    pub fn is_ok(&self) -> bool {
        self.execution_status == ExecutionStatus::Ok
    }
}
