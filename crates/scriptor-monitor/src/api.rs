//! JSON bodies exchanged with the monitoring service.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

use scriptor_core::{ExecutedScript, ExecutionStatus, Report, Script};

/// Answer to `POST /v1/executions/start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStartResponse {
    pub execution_id: i64,
}

/// Body of `PUT /v1/executions/{id}/script/start`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptExecutionStart<'a> {
    pub name: &'a str,
    pub checksum: &'a str,
    pub content: &'a str,
    #[serde(serialize_with = "serialize_instant")]
    pub start_date: DateTime<Utc>,
    pub tags: Vec<&'a str>,
}

impl<'a> ScriptExecutionStart<'a> {
    /// Describe a script starting at `start_date`.
    pub fn new(script: &'a Script, start_date: DateTime<Utc>) -> Self {
        Self {
            name: &script.name,
            checksum: &script.checksum,
            content: &script.content,
            start_date,
            tags: script.tags.iter().map(|t| t.name()).collect(),
        }
    }
}

/// Body of `PUT /v1/executions/{id}/script/stop`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptExecutionStop<'a> {
    pub checksum: &'a str,
    pub execution_duration_in_millis: u64,
    pub execution_status: ExecutionStatus,
    pub execution_output: &'a str,
}

impl<'a> From<&'a ExecutedScript> for ScriptExecutionStop<'a> {
    fn from(executed: &'a ExecutedScript) -> Self {
        Self {
            checksum: &executed.checksum,
            execution_duration_in_millis: executed.execution_duration_in_millis,
            execution_status: executed.execution_status,
            execution_output: &executed.execution_output,
        }
    }
}

/// Body of `PUT /v1/executions/stop/{id}`.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringReport {
    pub scripts_executed_number: usize,
}

impl From<&Report> for MonitoringReport {
    fn from(report: &Report) -> Self {
        Self {
            scripts_executed_number: report.len(),
        }
    }
}

/// ISO-8601 UTC with millisecond precision and a `Z` suffix.
fn serialize_instant<S: Serializer>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&instant.to_rfc3339_opts(SecondsFormat::Millis, true))
}
