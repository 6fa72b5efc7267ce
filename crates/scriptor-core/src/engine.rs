//! The `Scriptor` entry point.

use std::path::Path;

use crate::config::{ExecutionMode, ScriptorConfig};
use crate::error::Error;
use crate::executor::MigrationExecutor;
use crate::history::HistoryStore;
use crate::notifier::MonitoringSession;
use crate::reconcile::Reconciler;
use crate::report::Report;
use crate::scanner::Scanner;
use crate::script::{ExecutedScript, ScriptAction};

/// Migration runner.
///
/// Each call is an independent run: the driver is built, history is read
/// once and nothing is kept between calls.
#[derive(Debug, Clone)]
pub struct Scriptor {
    config: ScriptorConfig,
}

impl Scriptor {
    /// Create a runner from its configuration.
    pub fn new(config: ScriptorConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ScriptorConfig {
        &self.config
    }

    /// Discover, reconcile and execute pending scripts.
    ///
    /// Script failures are reported in the returned [`Report`]; `Err` means
    /// the run could not be carried out.
    pub async fn update_database(&self) -> Result<Report, Error> {
        self.config.log();

        let scanner = Scanner::new(&self.config.scanner)?;
        let reconciler = Reconciler::new(&self.config.executor, &self.config.filter)?;

        let discovered = scanner.scan()?;
        let scripts = self.config.filter.tag_filter().apply(discovered);

        let history = HistoryStore::new(self.config.driver.to_driver()?);
        let snapshot = history.load().await?;
        let plan = reconciler.reconcile(scripts, &snapshot)?;

        if plan.is_empty() {
            tracing::info!(skipped = plan.skipped.len(), "database is up to date");
        }

        let session = if self.config.executor.mode == ExecutionMode::Dry {
            MonitoringSession::disabled()
        } else {
            if let Some(monitoring) = &self.config.monitoring {
                monitoring.log();
            }
            MonitoringSession::from_config(self.config.monitoring.as_ref()).await
        };

        MigrationExecutor::new(&history, &self.config.executor)
            .with_session(session)
            .run(plan)
            .await
    }

    /// Every record in the execution history.
    pub async fn list_executed_scripts(&self) -> Result<Vec<ExecutedScript>, Error> {
        let history = HistoryStore::new(self.config.driver.to_driver()?);
        Ok(history.list().await?)
    }

    /// Record a single script file as executed without running it.
    pub async fn mark_script(&self, path: &Path) -> Result<ExecutedScript, Error> {
        let script = Scanner::new(&self.config.scanner)?.load(path)?;
        let history = HistoryStore::new(self.config.driver.to_driver()?);

        let stored = history
            .mark(ExecutedScript::without_execution(&script, ScriptAction::MarkAsExecuted))
            .await?;
        tracing::info!(name = %stored.name, checksum = %stored.checksum, "script marked as executed");
        Ok(stored)
    }
}
