//! Execution history: read once per run, written once per processed script.

use std::collections::HashMap;
use std::sync::Arc;

use crate::driver::Driver;
use crate::error::DriverError;
use crate::script::{ExecutedScript, ScriptAction};

/// Snapshot of the authoritative records, keyed by script name.
///
/// Only OK records are authoritative. A name may carry several of them, for
/// instance after a play-again run on an append-only backend. Overrides
/// supersede every other record for their name. Lookups never depend on the
/// order the backend listed the records in.
#[derive(Debug, Clone, Default)]
pub struct ExecutionHistory {
    records: HashMap<String, Vec<ExecutedScript>>,
}

impl ExecutionHistory {
    /// Build a snapshot from records in any order.
    pub fn from_records(records: impl IntoIterator<Item = ExecutedScript>) -> Self {
        let mut map: HashMap<String, Vec<ExecutedScript>> = HashMap::new();
        for record in records.into_iter().filter(ExecutedScript::is_ok) {
            map.entry(record.name.clone()).or_default().push(record);
        }
        for (name, candidates) in map.iter_mut() {
            if candidates
                .iter()
                .any(|r| r.action == ScriptAction::OverrideExecuted)
            {
                let before = candidates.len();
                candidates.retain(|r| r.action == ScriptAction::OverrideExecuted);
                if candidates.len() != before {
                    tracing::debug!(name = %name, "keeping override over older records");
                }
            }
            candidates.sort_by(|a, b| a.checksum.cmp(&b.checksum));
        }
        Self { records: map }
    }

    /// The authoritative record for a script.
    ///
    /// With several candidates, the one with the lowest checksum is returned.
    pub fn get(&self, name: &str) -> Option<&ExecutedScript> {
        self.records.get(name).and_then(|candidates| candidates.first())
    }

    /// The authoritative record for a script with the given checksum, if any.
    pub fn find(&self, name: &str, checksum: &str) -> Option<&ExecutedScript> {
        self.records
            .get(name)
            .and_then(|candidates| candidates.iter().find(|r| r.checksum == checksum))
    }

    /// Number of scripts with an authoritative record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reads and writes history through a driver.
#[derive(Clone)]
pub struct HistoryStore {
    driver: Arc<dyn Driver>,
}

impl HistoryStore {
    /// Wrap a driver.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// The underlying driver.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Load the authoritative snapshot.
    pub async fn load(&self) -> Result<ExecutionHistory, DriverError> {
        let records = self.driver.list_executed_scripts().await?;
        let total = records.len();
        let history = ExecutionHistory::from_records(records);
        tracing::debug!(total, authoritative = history.len(), "execution history loaded");
        Ok(history)
    }

    /// Every record as returned by the backend.
    pub async fn list(&self) -> Result<Vec<ExecutedScript>, DriverError> {
        self.driver.list_executed_scripts().await
    }

    /// Persist the outcome of a script execution.
    ///
    /// KO outcomes are not persisted, so the next run retries the script.
    pub async fn record_execution(
        &self,
        executed: ExecutedScript,
    ) -> Result<ExecutedScript, DriverError> {
        if !executed.is_ok() {
            return Ok(executed);
        }
        let stored = self.driver.mark_as_executed(executed).await?;
        Ok(stored)
    }

    /// Record a script as executed without running it.
    pub async fn mark(&self, executed: ExecutedScript) -> Result<ExecutedScript, DriverError> {
        let mut executed = executed;
        executed.action = ScriptAction::MarkAsExecuted;
        self.driver.mark_as_executed(executed).await
    }

    /// Replace the record of a script with the current checksum.
    pub async fn override_record(
        &self,
        executed: ExecutedScript,
    ) -> Result<ExecutedScript, DriverError> {
        self.driver.override_script(executed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryDriver;
    use crate::script::{Execution, ExecutionStatus, OrderingKey, Script};

    fn record(name: &str, checksum: &str, action: ScriptAction, status: ExecutionStatus) -> ExecutedScript {
        ExecutedScript {
            name: name.to_string(),
            checksum: checksum.to_string(),
            action,
            execution_status: status,
            execution_duration_in_millis: 0,
            execution_output: String::new(),
        }
    }

    #[test]
    fn test_ko_records_are_not_authoritative() {
        let history = ExecutionHistory::from_records([
            record("01", "a", ScriptAction::Execute, ExecutionStatus::Ko),
            record("02", "b", ScriptAction::Execute, ExecutionStatus::Ok),
        ]);
        assert!(history.get("01").is_none());
        assert_eq!(history.get("02").map(|r| r.checksum.as_str()), Some("b"));
    }

    #[test]
    fn test_override_wins_regardless_of_order() {
        let execute = record("01", "old", ScriptAction::Execute, ExecutionStatus::Ok);
        let overridden = record("01", "new", ScriptAction::OverrideExecuted, ExecutionStatus::Ok);

        let forward = ExecutionHistory::from_records([execute.clone(), overridden.clone()]);
        let backward = ExecutionHistory::from_records([overridden, execute]);

        assert_eq!(forward.get("01").unwrap().checksum, "new");
        assert_eq!(backward.get("01").unwrap().checksum, "new");
        assert_eq!(forward.len(), 1);
    }

    #[test]
    fn test_repeated_executions_do_not_depend_on_listing_order() {
        let old = record("01", "old", ScriptAction::Execute, ExecutionStatus::Ok);
        let current = record("01", "cur", ScriptAction::Execute, ExecutionStatus::Ok);

        let forward = ExecutionHistory::from_records([old.clone(), current.clone()]);
        let backward = ExecutionHistory::from_records([current, old]);

        for history in [&forward, &backward] {
            assert_eq!(history.len(), 1);
            assert_eq!(history.get("01").unwrap().checksum, "cur");
            assert!(history.find("01", "old").is_some());
            assert!(history.find("01", "cur").is_some());
            assert!(history.find("01", "other").is_none());
        }
    }

    #[tokio::test]
    async fn test_record_execution_skips_ko() {
        let driver = Arc::new(MemoryDriver::new());
        let store = HistoryStore::new(driver.clone());
        let script = Script::new("01_a.sql", "01_a.sql", OrderingKey::parse("01_a.sql"), "x");

        let ko = ExecutedScript::from_execution(&script, Execution::ko("err"), 1);
        store.record_execution(ko).await.unwrap();
        assert!(driver.history().is_empty());

        let ok = ExecutedScript::from_execution(&script, Execution::ok(), 1);
        let stored = store.record_execution(ok).await.unwrap();
        assert_eq!(stored.action, ScriptAction::Execute);
        assert_eq!(driver.history().len(), 1);
    }

    #[tokio::test]
    async fn test_load_builds_snapshot() {
        let driver = Arc::new(MemoryDriver::new().with_history([record(
            "01",
            "a",
            ScriptAction::MarkAsExecuted,
            ExecutionStatus::Ok,
        )]));
        let store = HistoryStore::new(driver);
        let history = store.load().await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history.is_empty());
    }
}
