//! Scriptor core - a migration execution engine.
//!
//! Discovers change scripts, reconciles them against the execution history
//! kept by a pluggable [`Driver`], runs what is pending in a deterministic
//! order and returns a [`Report`]. Progress can be sent to an optional
//! [`WorkflowNotifier`], whose failures never affect the run.

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod executor;
pub mod history;
pub mod notifier;
pub mod reconcile;
pub mod report;
pub mod scanner;
pub mod script;

pub use config::{
    DriftPolicy, ExecutionMode, ExecutorConfig, FilterConfig, ScannerConfig, ScriptorConfig,
};
pub use driver::{Driver, DriverConfig, MemoryDriver, MemoryDriverConfig};
pub use engine::Scriptor;
pub use error::{Drift, DriverError, Error};
pub use executor::{MigrationExecutor, RunState, ScriptState};
pub use history::{ExecutionHistory, HistoryStore};
pub use notifier::{
    ExecutionId, MonitoringSession, NotifierConfig, NotifierError, WorkflowNotifier,
};
pub use reconcile::{Classification, Plan, PlannedAction, Reconciler};
pub use report::{PlannedStep, Report, ReportAssembler, RunStatus};
pub use scanner::Scanner;
pub use script::{
    checksum, ExecutedScript, Execution, ExecutionStatus, OrderingKey, Script, ScriptAction, Tag,
    TagFilter, TagMatcher,
};
