//! HTTP client for the monitoring service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;

use scriptor_core::{
    ExecutedScript, ExecutionId, NotifierError, Report, Script, WorkflowNotifier,
};

use crate::api::{ExecutionStartResponse, MonitoringReport, ScriptExecutionStart, ScriptExecutionStop};
use crate::clock::{Clock, SystemClock};
use crate::error::MonitorError;

/// Sends execution workflow messages to `{base_url}/v1/executions`.
pub struct HttpWorkflowNotifier {
    client: Client,
    executions_url: String,
    clock: Arc<dyn Clock>,
}

impl HttpWorkflowNotifier {
    /// Create a notifier with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MonitorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            executions_url: format!("{}/v1/executions", base_url.trim_end_matches('/')),
            clock: Arc::new(SystemClock),
        })
    }

    /// Use a specific clock for script start dates.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Open an execution session.
    pub async fn start(&self) -> Result<ExecutionId, MonitorError> {
        let url = format!("{}/start", self.executions_url);
        let response = check(self.client.post(&url).send().await?, &url)?;
        let body: ExecutionStartResponse = response.json().await?;
        Ok(ExecutionId(body.execution_id))
    }

    /// Close the session with the number of processed scripts.
    pub async fn stop(&self, id: ExecutionId, report: &Report) -> Result<(), MonitorError> {
        let url = format!("{}/stop/{id}", self.executions_url);
        self.put(&url, &MonitoringReport::from(report)).await
    }

    /// Announce a script start.
    pub async fn script_start(&self, id: ExecutionId, script: &Script) -> Result<(), MonitorError> {
        let url = format!("{}/{id}/script/start", self.executions_url);
        let body = ScriptExecutionStart::new(script, self.clock.now());
        self.put(&url, &body).await
    }

    /// Announce a script outcome.
    pub async fn script_stop(
        &self,
        id: ExecutionId,
        executed: &ExecutedScript,
    ) -> Result<(), MonitorError> {
        let url = format!("{}/{id}/script/stop", self.executions_url);
        self.put(&url, &ScriptExecutionStop::from(executed)).await
    }

    async fn put<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<(), MonitorError> {
        let response = self.client.put(url).json(body).send().await?;
        check(response, url)?;
        tracing::debug!(url, "monitoring message delivered");
        Ok(())
    }
}

fn check(response: Response, url: &str) -> Result<Response, MonitorError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(MonitorError::UnexpectedStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl WorkflowNotifier for HttpWorkflowNotifier {
    async fn start_execution(&self) -> Result<ExecutionId, NotifierError> {
        Ok(self.start().await?)
    }

    async fn send_report(&self, id: ExecutionId, report: &Report) -> Result<(), NotifierError> {
        Ok(self.stop(id, report).await?)
    }

    async fn start_script_execution(
        &self,
        id: ExecutionId,
        script: &Script,
    ) -> Result<(), NotifierError> {
        Ok(self.script_start(id, script).await?)
    }

    async fn stop_script_execution(
        &self,
        id: ExecutionId,
        executed: &ExecutedScript,
    ) -> Result<(), NotifierError> {
        Ok(self.script_stop(id, executed).await?)
    }
}

impl std::fmt::Debug for HttpWorkflowNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpWorkflowNotifier")
            .field("executions_url", &self.executions_url)
            .finish_non_exhaustive()
    }
}
