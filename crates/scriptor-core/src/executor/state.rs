//! Run and per-script state tracking.

use std::fmt;

use chrono::{DateTime, Utc};

/// Global state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    /// Nothing has happened yet.
    #[default]
    NotStarted,
    /// Scripts are being processed.
    InProgress,
    /// Every scheduled script was processed.
    Completed,
    /// The run halted before the end of the schedule.
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::NotStarted => write!(f, "NOT_STARTED"),
            RunStatus::InProgress => write!(f, "IN_PROGRESS"),
            RunStatus::Completed => write!(f, "COMPLETED"),
            RunStatus::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// State of a single scheduled script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptState {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for ScriptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptState::Pending => write!(f, "pending"),
            ScriptState::Running => write!(f, "running"),
            ScriptState::Succeeded => write!(f, "succeeded"),
            ScriptState::Failed => write!(f, "failed"),
        }
    }
}

/// Progress of one script within a run.
#[derive(Debug, Clone)]
pub struct ScriptProgress {
    /// Script name.
    pub name: String,
    /// Current state.
    pub state: ScriptState,
    /// When processing started.
    pub started_at: Option<DateTime<Utc>>,
    /// When processing ended.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure description, if the script failed.
    pub error: Option<String>,
}

impl ScriptProgress {
    /// A pending entry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ScriptState::Pending,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Mark the script as running.
    pub fn start(&mut self) {
        self.state = ScriptState::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark the script as succeeded.
    pub fn succeed(&mut self) {
        self.state = ScriptState::Succeeded;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the script as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = ScriptState::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    /// Whether the script reached a final state.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, ScriptState::Succeeded | ScriptState::Failed)
    }
}

/// State of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Global status.
    pub status: RunStatus,
    /// One entry per scheduled script, in execution order.
    pub scripts: Vec<ScriptProgress>,
    /// When the run entered IN_PROGRESS.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a final state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunState {
    /// A run over the given script names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scripts: names.into_iter().map(ScriptProgress::new).collect(),
            ..Self::default()
        }
    }

    /// NOT_STARTED to IN_PROGRESS.
    pub fn start(&mut self) {
        self.status = RunStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    /// IN_PROGRESS to COMPLETED.
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// IN_PROGRESS to ABORTED.
    pub fn abort(&mut self) {
        self.status = RunStatus::Aborted;
        self.completed_at = Some(Utc::now());
    }

    /// Whether the run reached a final state.
    pub fn is_finished(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Aborted)
    }

    /// Progress entry at `index`.
    pub fn script_mut(&mut self, index: usize) -> Option<&mut ScriptProgress> {
        self.scripts.get_mut(index)
    }

    /// Scripts that reached a final state.
    pub fn finished_count(&self) -> usize {
        self.scripts.iter().filter(|s| s.is_finished()).count()
    }

    /// Scripts never started.
    pub fn pending_count(&self) -> usize {
        self.scripts
            .iter()
            .filter(|s| s.state == ScriptState::Pending)
            .count()
    }

    /// Wall time of the run in milliseconds, once finished.
    pub fn elapsed_millis(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
