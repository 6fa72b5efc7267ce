//! Migration executor - processes a reconciled plan against the driver.
//!
//! Scripts run strictly one after another. Each outcome is written to the
//! history as soon as it is known, so an interrupted run leaves history in
//! line with what actually completed.

pub mod state;

use std::time::Instant;

use crate::config::{ExecutionMode, ExecutorConfig};
use crate::error::{DriverError, Error};
use crate::history::HistoryStore;
use crate::notifier::MonitoringSession;
use crate::reconcile::{Plan, PlannedAction, ScheduledScript};
use crate::report::{PlannedStep, Report, ReportAssembler};
use crate::script::{ExecutedScript, ScriptAction};

pub use state::{RunState, RunStatus, ScriptProgress, ScriptState};

/// Executes a plan.
pub struct MigrationExecutor<'a> {
    history: &'a HistoryStore,
    config: &'a ExecutorConfig,
    session: MonitoringSession,
}

impl<'a> MigrationExecutor<'a> {
    /// Create an executor that reports nowhere.
    pub fn new(history: &'a HistoryStore, config: &'a ExecutorConfig) -> Self {
        Self {
            history,
            config,
            session: MonitoringSession::disabled(),
        }
    }

    /// Report progress through the given session.
    pub fn with_session(mut self, session: MonitoringSession) -> Self {
        self.session = session;
        self
    }

    /// List what a run would do without touching the driver or the notifier.
    pub fn dry_run(plan: &Plan) -> Report {
        let mut assembler = ReportAssembler::new();
        for scheduled in &plan.scheduled {
            tracing::info!(
                name = %scheduled.script.name,
                action = %scheduled.action,
                classification = %scheduled.classification,
                "would process script"
            );
            assembler.plan(PlannedStep::from(scheduled));
        }
        let report = assembler.finish(RunStatus::Completed);
        report.log_summary();
        report
    }

    /// Process every scheduled script in order.
    ///
    /// A KO script halts the run unless `continue_on_failure` is set; the
    /// returned report then has status [`RunStatus::Aborted`]. A driver error
    /// aborts with [`Error::RunAborted`], which carries the partial report.
    pub async fn run(self, plan: Plan) -> Result<Report, Error> {
        if self.config.mode == ExecutionMode::Dry {
            return Ok(Self::dry_run(&plan));
        }

        let mut state = RunState::new(plan.scheduled.iter().map(|s| s.script.name.clone()));
        let mut assembler = ReportAssembler::new();

        state.start();
        tracing::info!(
            scheduled = plan.scheduled.len(),
            skipped = plan.skipped.len(),
            mode = %self.config.mode,
            "run started"
        );

        for (index, scheduled) in plan.scheduled.iter().enumerate() {
            if let Some(progress) = state.script_mut(index) {
                progress.start();
            }
            self.session.script_started(&scheduled.script).await;

            let executed = match self.process(scheduled).await {
                Ok(executed) => executed,
                Err(StepFailure { source, outcome }) => {
                    tracing::error!(
                        name = %scheduled.script.name,
                        error = %source,
                        executed = outcome.is_some(),
                        "driver failure, aborting run"
                    );
                    if let Some(progress) = state.script_mut(index) {
                        progress.fail(source.to_string());
                    }
                    if let Some(outcome) = outcome {
                        self.session.script_stopped(&outcome).await;
                        assembler.push(outcome);
                    }
                    state.abort();
                    let report = assembler.finish(state.status);
                    self.session.close(&report).await;
                    report.log_summary();
                    return Err(Error::RunAborted {
                        script: scheduled.script.name.clone(),
                        source,
                        report: Box::new(report),
                    });
                }
            };

            self.session.script_stopped(&executed).await;

            let failed = !executed.is_ok();
            if let Some(progress) = state.script_mut(index) {
                if failed {
                    progress.fail(executed.execution_output.clone());
                } else {
                    progress.succeed();
                }
            }
            assembler.push(executed);

            if failed && !self.config.continue_on_failure {
                tracing::warn!(
                    remaining = state.pending_count(),
                    "halting run after failed script"
                );
                state.abort();
                break;
            }
        }

        if !state.is_finished() {
            state.complete();
        }

        let report = assembler.finish(state.status);
        tracing::debug!(
            finished = state.finished_count(),
            elapsed_ms = ?state.elapsed_millis(),
            "run state settled"
        );
        self.session.close(&report).await;
        report.log_summary();
        Ok(report)
    }

    async fn process(&self, scheduled: &ScheduledScript) -> Result<ExecutedScript, StepFailure> {
        let script = &scheduled.script;
        match scheduled.action {
            PlannedAction::Execute => {
                tracing::info!(name = %script.name, checksum = %script.checksum, "executing script");
                let started = Instant::now();
                let execution = self.history.driver().execute_script(script).await?;
                let elapsed = started.elapsed().as_millis() as u64;

                let executed = ExecutedScript::from_execution(script, execution, elapsed);
                if executed.is_ok() {
                    tracing::info!(
                        name = %executed.name,
                        duration_ms = executed.execution_duration_in_millis,
                        "script executed"
                    );
                } else {
                    tracing::error!(
                        name = %executed.name,
                        output = %executed.execution_output,
                        "script failed"
                    );
                }
                match self.history.record_execution(executed.clone()).await {
                    Ok(stored) => Ok(stored),
                    Err(source) => Err(StepFailure {
                        source,
                        outcome: Some(executed),
                    }),
                }
            }
            PlannedAction::MarkAsExecuted => {
                tracing::info!(name = %script.name, "marking script as executed");
                let record = ExecutedScript::without_execution(script, ScriptAction::MarkAsExecuted);
                Ok(self.history.mark(record).await?)
            }
            PlannedAction::Override => {
                tracing::info!(name = %script.name, checksum = %script.checksum, "overriding script record");
                let record = ExecutedScript::without_execution(script, ScriptAction::OverrideExecuted);
                Ok(self.history.override_record(record).await?)
            }
        }
    }
}

/// A driver call that failed, with the outcome it had already produced.
struct StepFailure {
    source: DriverError,
    /// Set when the script ran but its outcome could not be recorded.
    outcome: Option<ExecutedScript>,
}

impl From<DriverError> for StepFailure {
    fn from(source: DriverError) -> Self {
        Self {
            source,
            outcome: None,
        }
    }
}
