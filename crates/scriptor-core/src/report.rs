//! Execution report.
//!
//! The report is assembled while the executor runs and is returned even when
//! the run aborts, so callers can see how far execution got.

use crate::reconcile::{Classification, PlannedAction, ScheduledScript};
use crate::script::{ExecutedScript, ExecutionStatus, ScriptAction};

pub use crate::executor::state::RunStatus;

/// A scheduled step listed by a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    /// Script name.
    pub name: String,
    /// Checksum of the discovered content.
    pub checksum: String,
    /// Relation to history.
    pub classification: Classification,
    /// Driver call a real run would make.
    pub action: PlannedAction,
}

impl From<&ScheduledScript> for PlannedStep {
    fn from(scheduled: &ScheduledScript) -> Self {
        Self {
            name: scheduled.script.name.clone(),
            checksum: scheduled.script.checksum.clone(),
            classification: scheduled.classification.clone(),
            action: scheduled.action,
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    executed_scripts: Vec<ExecutedScript>,
    status: RunStatus,
    planned: Vec<PlannedStep>,
}

impl Report {
    /// A report over the given outcomes.
    pub fn new(executed_scripts: Vec<ExecutedScript>, status: RunStatus) -> Self {
        Self {
            executed_scripts,
            status,
            planned: Vec::new(),
        }
    }

    /// Attach the planned steps of a dry run.
    pub fn with_planned(mut self, planned: Vec<PlannedStep>) -> Self {
        self.planned = planned;
        self
    }

    /// Outcomes in execution order.
    pub fn executed_scripts(&self) -> &[ExecutedScript] {
        &self.executed_scripts
    }

    /// Consume the report, keeping the outcomes.
    pub fn into_executed_scripts(self) -> Vec<ExecutedScript> {
        self.executed_scripts
    }

    /// Final run status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Steps a dry run would have taken. Empty for real runs.
    pub fn planned(&self) -> &[PlannedStep] {
        &self.planned
    }

    /// Number of outcomes.
    pub fn len(&self) -> usize {
        self.executed_scripts.len()
    }

    /// Whether nothing was processed.
    pub fn is_empty(&self) -> bool {
        self.executed_scripts.is_empty()
    }

    /// KO outcomes.
    pub fn failures(&self) -> impl Iterator<Item = &ExecutedScript> {
        self.executed_scripts
            .iter()
            .filter(|e| e.execution_status == ExecutionStatus::Ko)
    }

    /// Whether any script failed.
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Completed with every script OK.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed && !self.has_failures()
    }

    /// Number of outcomes produced by the given action.
    pub fn count_action(&self, action: ScriptAction) -> usize {
        self.executed_scripts
            .iter()
            .filter(|e| e.action == action)
            .count()
    }

    /// Total script duration in milliseconds.
    pub fn total_duration_millis(&self) -> u64 {
        self.executed_scripts
            .iter()
            .map(|e| e.execution_duration_in_millis)
            .sum()
    }

    /// Log a one-line summary of the run.
    pub fn log_summary(&self) {
        let failures = self.failures().count();
        if failures > 0 || self.status == RunStatus::Aborted {
            tracing::error!(
                status = %self.status,
                processed = self.len(),
                failures,
                "run finished with failures"
            );
        } else {
            tracing::info!(
                status = %self.status,
                executed = self.count_action(ScriptAction::Execute),
                marked = self.count_action(ScriptAction::MarkAsExecuted),
                overridden = self.count_action(ScriptAction::OverrideExecuted),
                planned = self.planned.len(),
                duration_ms = self.total_duration_millis(),
                "run finished"
            );
        }
    }
}

/// Accumulates outcomes in execution order.
#[derive(Debug, Default)]
pub struct ReportAssembler {
    executed_scripts: Vec<ExecutedScript>,
    planned: Vec<PlannedStep>,
}

impl ReportAssembler {
    /// An empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome.
    pub fn push(&mut self, executed: ExecutedScript) {
        self.executed_scripts.push(executed);
    }

    /// Append a planned step.
    pub fn plan(&mut self, step: PlannedStep) {
        self.planned.push(step);
    }

    /// Outcomes gathered so far.
    pub fn executed_scripts(&self) -> &[ExecutedScript] {
        &self.executed_scripts
    }

    /// Number of outcomes gathered so far.
    pub fn len(&self) -> usize {
        self.executed_scripts.len()
    }

    /// Whether nothing has been gathered.
    pub fn is_empty(&self) -> bool {
        self.executed_scripts.is_empty() && self.planned.is_empty()
    }

    /// Freeze into a report.
    pub fn finish(self, status: RunStatus) -> Report {
        Report::new(self.executed_scripts, status).with_planned(self.planned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Execution, OrderingKey, Script};

    fn script(name: &str) -> Script {
        Script::new(name, name, OrderingKey::parse(name), name)
    }

    #[test]
    fn test_assembler_keeps_order() {
        let mut assembler = ReportAssembler::new();
        assembler.push(ExecutedScript::from_execution(&script("01_a"), Execution::ok(), 3));
        assembler.push(ExecutedScript::from_execution(&script("02_b"), Execution::ko("boom"), 4));
        assert_eq!(assembler.len(), 2);

        let report = assembler.finish(RunStatus::Aborted);
        let names: Vec<_> = report.executed_scripts().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["01_a", "02_b"]);
        assert_eq!(report.failures().count(), 1);
        assert!(!report.is_success());
        assert_eq!(report.total_duration_millis(), 7);
    }

    #[test]
    fn test_success_requires_completed_without_ko() {
        let ok = ExecutedScript::from_execution(&script("01_a"), Execution::ok(), 1);
        assert!(Report::new(vec![ok.clone()], RunStatus::Completed).is_success());
        assert!(!Report::new(vec![ok], RunStatus::Aborted).is_success());
        assert!(Report::new(Vec::new(), RunStatus::Completed).is_empty());
    }

    #[test]
    fn test_count_action() {
        let report = Report::new(
            vec![
                ExecutedScript::without_execution(&script("01_a"), ScriptAction::MarkAsExecuted),
                ExecutedScript::from_execution(&script("02_b"), Execution::ok(), 1),
            ],
            RunStatus::Completed,
        );
        assert_eq!(report.count_action(ScriptAction::MarkAsExecuted), 1);
        assert_eq!(report.count_action(ScriptAction::Execute), 1);
        assert_eq!(report.count_action(ScriptAction::OverrideExecuted), 0);
    }
}
