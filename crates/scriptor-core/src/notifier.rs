//! Workflow notifier contract and its failure boundary.
//!
//! A notifier reports run progress to an external observer. It is strictly
//! best-effort: every call made by the engine goes through a
//! [`MonitoringSession`], which bounds it with a timeout and turns any fault
//! into a warning. Nothing a notifier does can change a script outcome.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DEFAULT_NOTIFIER_TIMEOUT;
use crate::report::Report;
use crate::script::{ExecutedScript, Script};

/// Error type returned by notifier implementations.
pub type NotifierError = Box<dyn std::error::Error + Send + Sync>;

/// Identifier of a remote execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionId(pub i64);

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote observer of execution progress.
#[async_trait]
pub trait WorkflowNotifier: Send + Sync {
    /// Open an execution session.
    async fn start_execution(&self) -> Result<ExecutionId, NotifierError>;

    /// Close the session with the final report.
    async fn send_report(&self, id: ExecutionId, report: &Report) -> Result<(), NotifierError>;

    /// A script is about to be processed.
    async fn start_script_execution(
        &self,
        id: ExecutionId,
        script: &Script,
    ) -> Result<(), NotifierError>;

    /// A script has been processed.
    async fn stop_script_execution(
        &self,
        id: ExecutionId,
        executed: &ExecutedScript,
    ) -> Result<(), NotifierError>;
}

/// Selects and builds a notifier.
pub trait NotifierConfig: Send + Sync {
    /// Build the notifier.
    fn to_notifier(&self) -> Result<Arc<dyn WorkflowNotifier>, NotifierError>;

    /// Upper bound for every single notifier call.
    fn timeout(&self) -> Duration {
        DEFAULT_NOTIFIER_TIMEOUT
    }

    /// Log the notifier settings.
    fn log(&self) {}
}

/// Failure boundary around a notifier for one run.
///
/// When the session could not be opened, every later call is a no-op.
pub struct MonitoringSession {
    notifier: Option<Arc<dyn WorkflowNotifier>>,
    timeout: Duration,
    execution_id: Option<ExecutionId>,
}

impl MonitoringSession {
    /// A session that never contacts anything.
    pub fn disabled() -> Self {
        Self {
            notifier: None,
            timeout: DEFAULT_NOTIFIER_TIMEOUT,
            execution_id: None,
        }
    }

    /// Build the notifier from its configuration and open a session.
    ///
    /// A configuration that cannot produce a notifier yields a disabled
    /// session.
    pub async fn from_config(config: Option<&Arc<dyn NotifierConfig>>) -> Self {
        let Some(config) = config else {
            return Self::disabled();
        };
        match config.to_notifier() {
            Ok(notifier) => Self::open(notifier, config.timeout()).await,
            Err(error) => {
                tracing::warn!(%error, "cannot build workflow notifier, monitoring disabled");
                Self::disabled()
            }
        }
    }

    /// Open a session on the given notifier.
    pub async fn open(notifier: Arc<dyn WorkflowNotifier>, timeout: Duration) -> Self {
        let execution_id = guarded(timeout, "start_execution", notifier.start_execution()).await;
        match execution_id {
            Some(id) => tracing::info!(execution_id = %id, "monitoring session opened"),
            None => tracing::warn!("monitoring session unavailable, continuing without it"),
        }
        Self {
            notifier: Some(notifier),
            timeout,
            execution_id,
        }
    }

    /// Identifier of the open session, if any.
    pub fn execution_id(&self) -> Option<ExecutionId> {
        self.execution_id
    }

    /// Whether events are being delivered.
    pub fn is_active(&self) -> bool {
        self.notifier.is_some() && self.execution_id.is_some()
    }

    /// Report that a script is starting.
    pub async fn script_started(&self, script: &Script) {
        if let (Some(notifier), Some(id)) = (&self.notifier, self.execution_id) {
            guarded(
                self.timeout,
                "start_script_execution",
                notifier.start_script_execution(id, script),
            )
            .await;
        }
    }

    /// Report that a script has been processed.
    pub async fn script_stopped(&self, executed: &ExecutedScript) {
        if let (Some(notifier), Some(id)) = (&self.notifier, self.execution_id) {
            guarded(
                self.timeout,
                "stop_script_execution",
                notifier.stop_script_execution(id, executed),
            )
            .await;
        }
    }

    /// Close the session with the final report.
    pub async fn close(self, report: &Report) {
        if let (Some(notifier), Some(id)) = (&self.notifier, self.execution_id) {
            guarded(self.timeout, "send_report", notifier.send_report(id, report)).await;
        }
    }
}

impl fmt::Debug for MonitoringSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoringSession")
            .field("enabled", &self.notifier.is_some())
            .field("timeout", &self.timeout)
            .field("execution_id", &self.execution_id)
            .finish()
    }
}

async fn guarded<T, F>(timeout: Duration, call: &'static str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, NotifierError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(error)) => {
            tracing::warn!(call, %error, "workflow notifier call failed");
            None
        }
        Err(_) => {
            tracing::warn!(call, timeout_ms = timeout.as_millis() as u64, "workflow notifier call timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RunStatus;
    use crate::script::OrderingKey;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        fail_start: bool,
        fail_scripts: bool,
        stall: bool,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl WorkflowNotifier for Recorder {
        async fn start_execution(&self) -> Result<ExecutionId, NotifierError> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail_start {
                return Err("connection refused".into());
            }
            self.events.lock().push("start".to_string());
            Ok(ExecutionId(7))
        }

        async fn send_report(&self, id: ExecutionId, report: &Report) -> Result<(), NotifierError> {
            self.events
                .lock()
                .push(format!("report {id} {}", report.executed_scripts().len()));
            Ok(())
        }

        async fn start_script_execution(
            &self,
            _id: ExecutionId,
            script: &Script,
        ) -> Result<(), NotifierError> {
            if self.fail_scripts {
                return Err("500".into());
            }
            self.events.lock().push(format!("script start {}", script.name));
            Ok(())
        }

        async fn stop_script_execution(
            &self,
            _id: ExecutionId,
            executed: &ExecutedScript,
        ) -> Result<(), NotifierError> {
            self.events.lock().push(format!("script stop {}", executed.name));
            Ok(())
        }
    }

    fn script() -> Script {
        Script::new("01_a.sql", "01_a.sql", OrderingKey::parse("01_a.sql"), "x")
    }

    #[tokio::test]
    async fn test_session_forwards_events() {
        let recorder = Arc::new(Recorder::default());
        let session = MonitoringSession::open(recorder.clone(), Duration::from_secs(1)).await;
        assert_eq!(session.execution_id(), Some(ExecutionId(7)));

        let script = script();
        session.script_started(&script).await;
        session
            .script_stopped(&ExecutedScript::from_execution(&script, crate::script::Execution::ok(), 1))
            .await;
        session.close(&Report::new(Vec::new(), RunStatus::Completed)).await;

        assert_eq!(
            recorder.events(),
            vec!["start", "script start 01_a.sql", "script stop 01_a.sql", "report 7 0"]
        );
    }

    #[tokio::test]
    async fn test_failed_start_disables_later_calls() {
        let recorder = Arc::new(Recorder {
            fail_start: true,
            ..Recorder::default()
        });
        let session = MonitoringSession::open(recorder.clone(), Duration::from_secs(1)).await;

        assert!(!session.is_active());
        session.script_started(&script()).await;
        session.close(&Report::new(Vec::new(), RunStatus::Completed)).await;
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_script_event_failure_is_swallowed() {
        let recorder = Arc::new(Recorder {
            fail_scripts: true,
            ..Recorder::default()
        });
        let session = MonitoringSession::open(recorder.clone(), Duration::from_secs(1)).await;
        session.script_started(&script()).await;
        assert_eq!(recorder.events(), vec!["start"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_notifier_times_out() {
        let recorder = Arc::new(Recorder {
            stall: true,
            ..Recorder::default()
        });
        let session = MonitoringSession::open(recorder, Duration::from_millis(50)).await;
        assert_eq!(session.execution_id(), None);
    }

    #[tokio::test]
    async fn test_disabled_session() {
        let session = MonitoringSession::from_config(None).await;
        assert!(!session.is_active());
        session.close(&Report::new(Vec::new(), RunStatus::Completed)).await;
    }
}
