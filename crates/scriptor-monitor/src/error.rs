//! Monitoring errors.

use thiserror::Error;

/// Errors raised while talking to the monitoring service.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Transport failure, including timeouts.
    #[error("monitoring request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("monitoring service returned {status} for {url}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Invalid monitoring configuration.
    #[error("invalid monitoring configuration: {0}")]
    Config(String),
}
