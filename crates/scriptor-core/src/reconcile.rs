//! Reconciliation of discovered scripts against execution history.

use std::fmt;

use regex::Regex;

use crate::config::{DriftPolicy, ExecutionMode, ExecutorConfig, FilterConfig};
use crate::error::{Drift, Error};
use crate::history::ExecutionHistory;
use crate::script::{glob_to_regex, Script, Tag};

/// How a discovered script relates to history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Never recorded.
    New,
    /// Recorded with the same checksum.
    AlreadyExecuted,
    /// Recorded with a different checksum.
    Changed {
        /// Checksum found in history.
        recorded: String,
    },
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::New => write!(f, "new"),
            Classification::AlreadyExecuted => write!(f, "already_executed"),
            Classification::Changed { .. } => write!(f, "changed"),
        }
    }
}

/// Driver call chosen for a scheduled script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    /// `execute_script`, then record the outcome.
    Execute,
    /// `mark_as_executed` without running.
    MarkAsExecuted,
    /// `override_script` without running.
    Override,
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedAction::Execute => write!(f, "execute"),
            PlannedAction::MarkAsExecuted => write!(f, "mark_as_executed"),
            PlannedAction::Override => write!(f, "override"),
        }
    }
}

/// A script with its decided action.
#[derive(Debug, Clone)]
pub struct ScheduledScript {
    /// The discovered script.
    pub script: Script,
    /// Its relation to history.
    pub classification: Classification,
    /// Driver call to make.
    pub action: PlannedAction,
}

/// Outcome of reconciliation, in execution order.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Scripts to hand to the driver.
    pub scheduled: Vec<ScheduledScript>,
    /// Scripts skipped because they already ran with the same checksum.
    pub skipped: Vec<Script>,
}

impl Plan {
    /// Whether there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }
}

/// Classifies scripts and picks the driver call for each.
#[derive(Debug)]
pub struct Reconciler {
    mode: ExecutionMode,
    drift_policy: DriftPolicy,
    mark_patterns: Vec<Regex>,
    override_patterns: Vec<Regex>,
    play_again: Vec<Tag>,
}

impl Reconciler {
    /// Build a reconciler; fails if a directive glob does not compile.
    pub fn new(executor: &ExecutorConfig, filter: &FilterConfig) -> Result<Self, Error> {
        let compile = |globs: &[String]| -> Result<Vec<Regex>, Error> {
            globs.iter().map(|g| glob_to_regex(g)).collect()
        };
        Ok(Self {
            mode: executor.mode,
            drift_policy: executor.drift_policy,
            mark_patterns: compile(&executor.mark_as_executed)?,
            override_patterns: compile(&executor.override_executed)?,
            play_again: filter.tags_to_play_again.clone(),
        })
    }

    /// Classify a single script.
    pub fn classify(script: &Script, history: &ExecutionHistory) -> Classification {
        if history.find(&script.name, &script.checksum).is_some() {
            return Classification::AlreadyExecuted;
        }
        match history.get(&script.name) {
            None => Classification::New,
            Some(record) => Classification::Changed {
                recorded: record.checksum.clone(),
            },
        }
    }

    /// Reconcile scripts against history.
    ///
    /// The resulting schedule is sorted by ordering key, then name. Any
    /// changed script left without a directive aborts with
    /// [`Error::ChecksumDrift`].
    pub fn reconcile(
        &self,
        mut scripts: Vec<Script>,
        history: &ExecutionHistory,
    ) -> Result<Plan, Error> {
        scripts.sort_by(|a, b| a.execution_order(b));

        let mut plan = Plan::default();
        let mut drifts = Vec::new();

        for script in scripts {
            let classification = Self::classify(&script, history);
            let action = self.decide(&script, &classification);

            tracing::debug!(
                name = %script.name,
                classification = %classification,
                action = ?action,
                "script reconciled"
            );

            match action {
                Some(action) => plan.scheduled.push(ScheduledScript {
                    script,
                    classification,
                    action,
                }),
                None => match classification {
                    Classification::Changed { recorded } => drifts.push(Drift {
                        name: script.name.clone(),
                        recorded,
                        discovered: script.checksum.clone(),
                    }),
                    _ => plan.skipped.push(script),
                },
            }
        }

        if !drifts.is_empty() {
            for drift in &drifts {
                tracing::error!(
                    name = %drift.name,
                    recorded = %drift.recorded,
                    discovered = %drift.discovered,
                    "executed script has changed"
                );
            }
            return Err(Error::ChecksumDrift(drifts));
        }

        Ok(plan)
    }

    fn decide(&self, script: &Script, classification: &Classification) -> Option<PlannedAction> {
        let overridden = Self::directive_matches(&self.override_patterns, script);
        let marked = Self::directive_matches(&self.mark_patterns, script);
        let play_again = script.has_any_tag(&self.play_again);

        match classification {
            Classification::New if overridden => Some(PlannedAction::Override),
            Classification::New if marked => Some(PlannedAction::MarkAsExecuted),
            Classification::New if self.mode == ExecutionMode::ForceMarkAsExecuted => {
                Some(PlannedAction::MarkAsExecuted)
            }
            Classification::New => Some(PlannedAction::Execute),
            Classification::AlreadyExecuted if play_again => Some(PlannedAction::Execute),
            Classification::AlreadyExecuted => None,
            Classification::Changed { .. } if overridden => Some(PlannedAction::Override),
            Classification::Changed { .. } if play_again => Some(PlannedAction::Execute),
            Classification::Changed { .. } if self.drift_policy == DriftPolicy::Override => {
                Some(PlannedAction::Override)
            }
            Classification::Changed { .. } => None,
        }
    }

    fn directive_matches(patterns: &[Regex], script: &Script) -> bool {
        if patterns.is_empty() {
            return false;
        }
        let path = script.path_str();
        patterns
            .iter()
            .any(|re| re.is_match(&path) || re.is_match(&script.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ExecutedScript, OrderingKey, ScriptAction};

    fn script(name: &str, content: &str) -> Script {
        Script::new(name, format!("scripts/{name}"), OrderingKey::parse(name), content)
    }

    fn executed(script: &Script) -> ExecutedScript {
        ExecutedScript::without_execution(script, ScriptAction::Execute)
    }

    fn reconciler(executor: ExecutorConfig) -> Reconciler {
        Reconciler::new(&executor, &FilterConfig::default()).unwrap()
    }

    fn names(plan: &Plan) -> Vec<&str> {
        plan.scheduled.iter().map(|s| s.script.name.as_str()).collect()
    }

    #[test]
    fn test_new_scripts_are_scheduled_in_order() {
        let scripts = vec![
            script("10_c.sql", "c"),
            script("2_b.sql", "b"),
            script("01_a.sql", "a"),
        ];
        let plan = reconciler(ExecutorConfig::default())
            .reconcile(scripts, &ExecutionHistory::default())
            .unwrap();

        assert_eq!(names(&plan), vec!["01_a.sql", "2_b.sql", "10_c.sql"]);
        assert!(plan
            .scheduled
            .iter()
            .all(|s| s.action == PlannedAction::Execute && s.classification == Classification::New));
    }

    #[test]
    fn test_identical_checksums_are_skipped() {
        let a = script("01_a.sql", "a");
        let b = script("02_b.sql", "b");
        let history = ExecutionHistory::from_records([executed(&a), executed(&b)]);

        let plan = reconciler(ExecutorConfig::default())
            .reconcile(vec![a, b], &history)
            .unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.skipped.len(), 2);
    }

    #[test]
    fn test_changed_script_is_drift_by_default() {
        let original = script("01_a.sql", "a");
        let history = ExecutionHistory::from_records([executed(&original)]);
        let changed = script("01_a.sql", "a2");

        let result = reconciler(ExecutorConfig::default()).reconcile(vec![changed], &history);

        match result {
            Err(Error::ChecksumDrift(drifts)) => {
                assert_eq!(drifts.len(), 1);
                assert_eq!(drifts[0].name, "01_a.sql");
                assert_eq!(drifts[0].recorded, original.checksum);
            }
            other => panic!("expected drift, got {other:?}"),
        }
    }

    #[test]
    fn test_classification_ignores_history_listing_order() {
        let old = script("01_a.sql", "a");
        let current = script("01_a.sql", "a2");
        let orders = [
            vec![executed(&old), executed(&current)],
            vec![executed(&current), executed(&old)],
        ];

        for records in orders {
            let history = ExecutionHistory::from_records(records);
            let plan = reconciler(ExecutorConfig::default())
                .reconcile(vec![current.clone()], &history)
                .unwrap();

            assert!(plan.is_empty());
            assert_eq!(plan.skipped.len(), 1);
            assert_eq!(
                Reconciler::classify(&current, &history),
                Classification::AlreadyExecuted
            );
        }
    }

    #[test]
    fn test_drift_reports_same_record_in_any_order() {
        let first = executed(&script("01_a.sql", "a"));
        let second = executed(&script("01_a.sql", "b"));
        let changed = script("01_a.sql", "c");

        let recorded: Vec<String> = [
            vec![first.clone(), second.clone()],
            vec![second, first],
        ]
        .into_iter()
        .map(|records| {
            match Reconciler::classify(&changed, &ExecutionHistory::from_records(records)) {
                Classification::Changed { recorded } => recorded,
                other => panic!("expected changed, got {other:?}"),
            }
        })
        .collect();

        assert_eq!(recorded[0], recorded[1]);
    }

    #[test]
    fn test_drift_policy_override() {
        let history = ExecutionHistory::from_records([executed(&script("01_a.sql", "a"))]);
        let executor = ExecutorConfig::default().with_drift_policy(DriftPolicy::Override);

        let plan = reconciler(executor)
            .reconcile(vec![script("01_a.sql", "a2")], &history)
            .unwrap();

        assert_eq!(plan.scheduled[0].action, PlannedAction::Override);
    }

    #[test]
    fn test_override_directive_by_path() {
        let history = ExecutionHistory::from_records([executed(&script("01_a.sql", "a"))]);
        let executor = ExecutorConfig::default().override_path("scripts/01_*");

        let plan = reconciler(executor)
            .reconcile(vec![script("01_a.sql", "a2"), script("02_b.sql", "b")], &history)
            .unwrap();

        assert_eq!(plan.scheduled[0].action, PlannedAction::Override);
        assert_eq!(plan.scheduled[1].action, PlannedAction::Execute);
    }

    #[test]
    fn test_mark_directive_applies_to_new_scripts() {
        let executor = ExecutorConfig::default().mark_path("02_b.sql");
        let plan = reconciler(executor)
            .reconcile(
                vec![script("01_a.sql", "a"), script("02_b.sql", "b")],
                &ExecutionHistory::default(),
            )
            .unwrap();

        assert_eq!(plan.scheduled[0].action, PlannedAction::Execute);
        assert_eq!(plan.scheduled[1].action, PlannedAction::MarkAsExecuted);
    }

    #[test]
    fn test_force_mark_mode() {
        let executor = ExecutorConfig::default().with_mode(ExecutionMode::ForceMarkAsExecuted);
        let plan = reconciler(executor)
            .reconcile(vec![script("01_a.sql", "a")], &ExecutionHistory::default())
            .unwrap();
        assert_eq!(plan.scheduled[0].action, PlannedAction::MarkAsExecuted);
    }

    #[test]
    fn test_tags_to_play_again() {
        let seed = script("01_seed.js", "s").with_tags([Tag::new("always")]);
        let other = script("02_other.js", "o");
        let history = ExecutionHistory::from_records([executed(&seed), executed(&other)]);

        let filter = FilterConfig {
            tags_to_play_again: vec![Tag::new("always")],
            ..FilterConfig::default()
        };
        let reconciler = Reconciler::new(&ExecutorConfig::default(), &filter).unwrap();
        let plan = reconciler.reconcile(vec![seed, other], &history).unwrap();

        assert_eq!(names(&plan), vec!["01_seed.js"]);
        assert_eq!(plan.scheduled[0].classification, Classification::AlreadyExecuted);
        assert_eq!(plan.skipped.len(), 1);
    }
}
