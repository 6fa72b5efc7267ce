//! Monitoring configuration.

use std::sync::Arc;
use std::time::Duration;

use scriptor_core::config::DEFAULT_NOTIFIER_TIMEOUT;
use scriptor_core::{NotifierConfig, NotifierError, WorkflowNotifier};

use crate::client::HttpWorkflowNotifier;
use crate::clock::{Clock, SystemClock};
use crate::error::MonitorError;

/// Where and how to reach the monitoring service.
#[derive(Clone)]
pub struct MonitoringConfig {
    /// Base URL, e.g. `http://monitoring:8080`.
    pub base_url: String,
    /// Bound on each request.
    pub timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl MonitoringConfig {
    /// Monitoring at `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_NOTIFIER_TIMEOUT,
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a specific clock for script start dates.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the HTTP notifier.
    pub fn build(&self) -> Result<HttpWorkflowNotifier, MonitorError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(MonitorError::Config(format!(
                "base url must be http(s): {}",
                self.base_url
            )));
        }
        let notifier = HttpWorkflowNotifier::new(&self.base_url, self.timeout)?;
        Ok(notifier.with_clock(Arc::clone(&self.clock)))
    }
}

impl NotifierConfig for MonitoringConfig {
    fn to_notifier(&self) -> Result<Arc<dyn WorkflowNotifier>, NotifierError> {
        let notifier: Arc<dyn WorkflowNotifier> = Arc::new(self.build()?);
        Ok(notifier)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn log(&self) {
        tracing::info!(
            base_url = %self.base_url,
            timeout_ms = self.timeout.as_millis() as u64,
            "monitoring configuration"
        );
    }
}

impl std::fmt::Debug for MonitoringConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitoringConfig::new("http://localhost:8080");
        assert_eq!(config.timeout, DEFAULT_NOTIFIER_TIMEOUT);
        assert_eq!(NotifierConfig::timeout(&config), DEFAULT_NOTIFIER_TIMEOUT);
    }

    #[test]
    fn test_rejects_non_http_url() {
        let config = MonitoringConfig::new("localhost:8080");
        assert!(matches!(config.build(), Err(MonitorError::Config(_))));
        assert!(config.to_notifier().is_err());
    }

    #[test]
    fn test_builds_notifier() {
        let config =
            MonitoringConfig::new("http://localhost:8080/").with_timeout(Duration::from_secs(1));
        assert!(config.to_notifier().is_ok());
    }
}
