//! Scriptor monitoring - reports run progress to a remote HTTP service.
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `POST /v1/executions/start` opens a session and answers `{"executionId": n}`
//! - `PUT /v1/executions/{id}/script/start` announces a script
//! - `PUT /v1/executions/{id}/script/stop` reports its outcome
//! - `PUT /v1/executions/stop/{id}` closes the session
//!
//! Plug a [`MonitoringConfig`] into
//! [`ScriptorConfig::with_monitoring`](scriptor_core::ScriptorConfig::with_monitoring).

pub mod api;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;

pub use client::HttpWorkflowNotifier;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::MonitoringConfig;
pub use error::MonitorError;
