// Remote task API client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{Result, TaskError};
use crate::models::{WireDraft, WirePatch, WireTask};

/// Operations the remote task API offers
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    async fn list(&self) -> Result<Vec<WireTask>>;

    /// Tasks the server considers due or created today
    async fn list_today(&self) -> Result<Vec<WireTask>>;

    async fn list_by_status(&self, status: &str) -> Result<Vec<WireTask>>;

    async fn get(&self, id: &str) -> Result<WireTask>;

    async fn create(&self, body: &WireDraft) -> Result<WireTask>;

    async fn update(&self, id: &str, patch: &WirePatch) -> Result<WireTask>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Gateway speaking JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TaskError::Config(format!("Invalid API base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(TaskError::Config(format!("API base URL cannot have paths: {}", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TaskError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL extended with path segments; ids are percent-encoded
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), %status, "Task API response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TaskError::Gateway {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn list_at(&self, segments: &[&str]) -> Result<Vec<WireTask>> {
        let items: Vec<Value> = self.send_json(self.client.get(self.url(segments))).await?;
        Ok(decode_tasks(items))
    }
}

/// Decode a task list element by element; unreadable items are skipped
pub fn decode_tasks(items: Vec<Value>) -> Vec<WireTask> {
    let mut tasks = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<WireTask>(item) {
            Ok(task) => tasks.push(task),
            Err(e) => {
                warn!(index, error = ?e, "Failed to parse task, skipping");
            }
        }
    }
    tasks
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn list(&self) -> Result<Vec<WireTask>> {
        self.list_at(&["tasks"]).await
    }

    async fn list_today(&self) -> Result<Vec<WireTask>> {
        self.list_at(&["tasks", "today"]).await
    }

    async fn list_by_status(&self, status: &str) -> Result<Vec<WireTask>> {
        self.list_at(&["tasks", "status", status]).await
    }

    async fn get(&self, id: &str) -> Result<WireTask> {
        self.send_json(self.client.get(self.url(&["tasks", id]))).await
    }

    async fn create(&self, body: &WireDraft) -> Result<WireTask> {
        self.send_json(self.client.post(self.url(&["tasks"])).json(body))
            .await
    }

    async fn update(&self, id: &str, patch: &WirePatch) -> Result<WireTask> {
        self.send_json(self.client.put(self.url(&["tasks", id])).json(patch))
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        // Confirmation body is not interpreted
        self.send(self.client.delete(self.url(&["tasks", id]))).await?;
        Ok(())
    }
}

/// Best-effort message from an error response body.
///
/// Looks for `error`, `message` or `error.message` in a JSON body, then
/// falls back to a generic status description.
pub fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [&value["error"], &value["message"], &value["error"]["message"]];
        if let Some(text) = candidates
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .find(|s| !s.is_empty())
        {
            return text.to_string();
        }
    }

    format!("Request failed with status code {}", status.as_u16())
}
