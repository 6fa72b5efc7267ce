//! In-memory driver.
//!
//! Keeps history in a map and never touches a real store. Useful for
//! embedding tests and for scripted failure scenarios.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Driver, DriverConfig};
use crate::error::DriverError;
use crate::script::{Execution, ExecutedScript, Script};

#[derive(Debug, Default)]
struct MemoryState {
    history: BTreeMap<String, ExecutedScript>,
    executed: Vec<String>,
    failures: HashMap<String, String>,
    unavailable: Vec<String>,
    unrecordable: Vec<String>,
    output: Option<String>,
}

/// Driver backed by a process-local map.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    state: Mutex<MemoryState>,
}

impl MemoryDriver {
    /// Create an empty driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the history.
    pub fn with_history(self, records: impl IntoIterator<Item = ExecutedScript>) -> Self {
        {
            let mut state = self.state.lock();
            for record in records {
                state.history.insert(record.name.clone(), record);
            }
        }
        self
    }

    /// Make `execute_script` return KO with the given output for a script.
    pub fn fail_on(self, name: impl Into<String>, output: impl Into<String>) -> Self {
        self.state.lock().failures.insert(name.into(), output.into());
        self
    }

    /// Make `execute_script` return a driver error for a script.
    pub fn unavailable_on(self, name: impl Into<String>) -> Self {
        self.state.lock().unavailable.push(name.into());
        self
    }

    /// Make `mark_as_executed` return a history error for a script.
    pub fn reject_records_for(self, name: impl Into<String>) -> Self {
        self.state.lock().unrecordable.push(name.into());
        self
    }

    /// Output attached to every successful execution.
    pub fn with_output(self, output: impl Into<String>) -> Self {
        self.state.lock().output = Some(output.into());
        self
    }

    /// Names passed to `execute_script`, in call order.
    pub fn executed_names(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// Current history, keyed by script name.
    pub fn history(&self) -> BTreeMap<String, ExecutedScript> {
        self.state.lock().history.clone()
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn execute_script(&self, script: &Script) -> Result<Execution, DriverError> {
        let mut state = self.state.lock();
        if state.unavailable.iter().any(|n| n == &script.name) {
            return Err(DriverError::Unavailable(format!(
                "backend rejected {}",
                script.name
            )));
        }
        state.executed.push(script.name.clone());

        if let Some(output) = state.failures.get(&script.name) {
            return Ok(Execution::ko(output.clone()));
        }
        Ok(match &state.output {
            Some(output) => Execution::ok().with_output(output.clone()),
            None => Execution::ok(),
        })
    }

    async fn list_executed_scripts(&self) -> Result<Vec<ExecutedScript>, DriverError> {
        Ok(self.state.lock().history.values().cloned().collect())
    }

    async fn mark_as_executed(
        &self,
        executed_script: ExecutedScript,
    ) -> Result<ExecutedScript, DriverError> {
        let record = executed_script.into_marked();
        let mut state = self.state.lock();
        if state.unrecordable.iter().any(|n| n == &record.name) {
            return Err(DriverError::History(format!(
                "cannot record {}",
                record.name
            )));
        }
        state.history.insert(record.name.clone(), record.clone());
        Ok(record)
    }

    async fn override_script(
        &self,
        executed_script: ExecutedScript,
    ) -> Result<ExecutedScript, DriverError> {
        let record = executed_script.into_overridden();
        self.state
            .lock()
            .history
            .insert(record.name.clone(), record.clone());
        Ok(record)
    }
}

/// Hands out a shared [`MemoryDriver`], so callers keep a handle on it.
#[derive(Debug, Clone)]
pub struct MemoryDriverConfig {
    driver: Arc<MemoryDriver>,
}

impl MemoryDriverConfig {
    /// Wrap an existing driver.
    pub fn new(driver: Arc<MemoryDriver>) -> Self {
        Self { driver }
    }

    /// The shared driver.
    pub fn driver(&self) -> Arc<MemoryDriver> {
        Arc::clone(&self.driver)
    }
}

impl DriverConfig for MemoryDriverConfig {
    fn to_driver(&self) -> Result<Arc<dyn Driver>, DriverError> {
        let driver: Arc<dyn Driver> = self.driver.clone();
        Ok(driver)
    }

    fn log(&self) {
        tracing::info!("in-memory driver configuration");
    }
}
