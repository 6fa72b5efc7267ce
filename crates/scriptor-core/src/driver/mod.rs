//! Driver contract implemented by every database backend.
//!
//! A backend exposes exactly four capabilities: run a script, list the
//! recorded history, record a script without running it, and replace a
//! recorded script. Backends are chosen at configuration time through a
//! [`DriverConfig`].

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::script::{Execution, ExecutedScript, Script};

pub use memory::{MemoryDriver, MemoryDriverConfig};

/// Capability set of a database backend.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Run a script against the target store.
    ///
    /// Expected failures are returned as a KO [`Execution`]; only a backend
    /// that cannot be used at all returns `Err`. Timeouts are KO.
    async fn execute_script(&self, script: &Script) -> Result<Execution, DriverError>;

    /// Read the persisted history. Order is unspecified.
    async fn list_executed_scripts(&self) -> Result<Vec<ExecutedScript>, DriverError>;

    /// Record a script as executed without running it.
    ///
    /// Implementations persist [`ExecutedScript::into_marked`] of the input
    /// and return what was stored.
    async fn mark_as_executed(
        &self,
        executed_script: ExecutedScript,
    ) -> Result<ExecutedScript, DriverError>;

    /// Replace the authoritative record for a script.
    ///
    /// Implementations persist [`ExecutedScript::into_overridden`] of the
    /// input in place of any previous record with the same name.
    async fn override_script(
        &self,
        executed_script: ExecutedScript,
    ) -> Result<ExecutedScript, DriverError>;
}

/// Selects and builds a backend.
pub trait DriverConfig: Send + Sync {
    /// Build the driver.
    fn to_driver(&self) -> Result<Arc<dyn Driver>, DriverError>;

    /// Log the driver settings.
    fn log(&self);
}
