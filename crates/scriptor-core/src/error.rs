//! Core error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::report::Report;

/// Errors raised by a driver backend.
///
/// Expected script failures (bad SQL, refused connection inside the client)
/// are not errors: drivers report them as an [`ExecutionStatus::Ko`]
/// execution. A `DriverError` means the backend itself could not be used.
///
/// [`ExecutionStatus::Ko`]: crate::script::ExecutionStatus::Ko
#[derive(Debug, Error)]
pub enum DriverError {
    /// The backend cannot be reached or started at all.
    #[error("driver unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the execution history failed.
    #[error("execution history error: {0}")]
    History(String),

    /// I/O error while preparing or running a script.
    #[error("driver i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A history record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A script whose content no longer matches its recorded checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    /// Script name.
    pub name: String,
    /// Checksum stored in the execution history.
    pub recorded: String,
    /// Checksum of the discovered content.
    pub discovered: String,
}

/// Engine errors.
///
/// Every variant is fatal for the run. In-run script failures are never
/// raised; they are recorded in the [`Report`].
#[derive(Debug, Error)]
pub enum Error {
    /// A script or the scan root could not be read.
    #[error("cannot read {path}: {reason}")]
    Discovery {
        /// Offending path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A glob or identifier pattern did not compile.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The pattern as configured.
        pattern: String,
        /// Compilation failure.
        reason: String,
    },

    /// A script name does not match the identifier pattern.
    #[error("script {name} does not match identifier pattern {pattern:?}")]
    InvalidIdentifier {
        /// Script file name.
        name: String,
        /// Identifier regex.
        pattern: String,
    },

    /// Two scripts with different names resolve to the same ordering key.
    #[error("scripts {first} and {second} share ordering key {key:?}")]
    DuplicateOrderingKey {
        /// The shared key.
        key: String,
        /// First script name.
        first: String,
        /// Second script name.
        second: String,
    },

    /// Already executed scripts changed without an override directive.
    #[error("checksum drift detected for {} script(s): {}", .0.len(), drift_names(.0))]
    ChecksumDrift(Vec<Drift>),

    /// The driver failed before any script ran.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// The driver failed while running; the report shows what completed.
    #[error("run aborted on {script}: {source}")]
    RunAborted {
        /// Script being processed when the driver failed.
        script: String,
        /// Underlying driver failure.
        #[source]
        source: DriverError,
        /// Outcomes recorded before the failure.
        report: Box<Report>,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the partial report carried by a mid-run abort.
    pub fn partial_report(&self) -> Option<&Report> {
        match self {
            Error::RunAborted { report, .. } => Some(report),
            _ => None,
        }
    }
}

fn drift_names(drifts: &[Drift]) -> String {
    drifts
        .iter()
        .map(|d| d.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RunStatus;

    #[test]
    fn test_drift_display_lists_scripts() {
        let err = Error::ChecksumDrift(vec![
            Drift {
                name: "01_init.sql".to_string(),
                recorded: "aa".to_string(),
                discovered: "bb".to_string(),
            },
            Drift {
                name: "02_users.sql".to_string(),
                recorded: "cc".to_string(),
                discovered: "dd".to_string(),
            },
        ]);
        let message = err.to_string();
        assert!(message.contains("2 script(s)"));
        assert!(message.contains("01_init.sql, 02_users.sql"));
    }

    #[test]
    fn test_partial_report_only_on_abort() {
        let aborted = Error::RunAborted {
            script: "03_x.sql".to_string(),
            source: DriverError::Unavailable("gone".to_string()),
            report: Box::new(Report::new(Vec::new(), RunStatus::Aborted)),
        };
        assert!(aborted.partial_report().is_some());
        assert!(Error::Config("bad".to_string()).partial_report().is_none());
    }
}
