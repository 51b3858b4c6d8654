//! HTTP implementation of the remote queue contract
//!
//! Thin request/response translation over reqwest. Transport failures and
//! timeouts map to `RemoteUnavailable`, a rejected create source to
//! `InvalidSource`, an unknown queue to `NotFound`, and a malformed
//! envelope to `Desync`. No retry logic lives here; the engine decides
//! what to do with a failure.

use super::wire::{CreateQueueRequest, InsertRequest, MoveRequest, PositionReport, QueueEnvelope};
use super::RemoteQueue;
use async_trait::async_trait;
use cadenza_common::model::{
    MediaRef, MoveAnchor, Placement, QueueId, QueueItemId, QueueSnapshot, QueueSource,
};
use cadenza_common::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Items fetched around the selected item on every window read
pub const DEFAULT_WINDOW: u32 = 30;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("Cadenza/", env!("CARGO_PKG_VERSION"));

/// HTTP/JSON client for the server queue API
///
/// Sends the stable client identifier and session token as headers on every
/// request. All calls use a bounded timeout; a timeout is indistinguishable
/// from any other transport failure to callers.
pub struct HttpQueueClient {
    http_client: reqwest::Client,
    base_url: String,
    window: u32,
}

impl HttpQueueClient {
    /// Build a client with the default request timeout
    pub fn new(base_url: impl Into<String>, client_id: Uuid, token: Option<&str>) -> Result<Self> {
        Self::with_timeout(base_url, client_id, token, DEFAULT_TIMEOUT)
    }

    /// Build a client with an explicit request timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        client_id: Uuid,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Client-Identifier",
            HeaderValue::from_str(&client_id.to_string())
                .map_err(|e| Error::Config(format!("invalid client identifier: {e}")))?,
        );
        if let Some(token) = token {
            headers.insert(
                "X-Session-Token",
                HeaderValue::from_str(token)
                    .map_err(|e| Error::Config(format!("invalid session token: {e}")))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::RemoteUnavailable(e.to_string()))?;

        let base_url = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            window: DEFAULT_WINDOW,
        })
    }

    /// Override the fetch window size
    pub fn with_window(mut self, window: u32) -> Self {
        self.window = window;
        self
    }

    /// Map a non-success status common to all envelope operations
    async fn envelope_from(response: reqwest::Response, context: String) -> Result<QueueSnapshot> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(context));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(format!(
                "{context}: server returned {status}: {text}"
            )));
        }
        let envelope: QueueEnvelope = response
            .json()
            .await
            .map_err(|e| Error::Desync(format!("{context}: malformed queue envelope: {e}")))?;
        Ok(envelope.into_snapshot())
    }
}

fn transport_error(context: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::RemoteUnavailable(format!("{context}: request timed out"))
    } else {
        Error::RemoteUnavailable(format!("{context}: {e}"))
    }
}

#[async_trait]
impl RemoteQueue for HttpQueueClient {
    async fn create(&self, source: &QueueSource, shuffle: bool) -> Result<QueueSnapshot> {
        let url = format!("{}/queues", self.base_url);
        debug!(%source, shuffle, "Creating queue");

        let response = self
            .http_client
            .post(&url)
            .json(&CreateQueueRequest {
                source: source.clone(),
                shuffle,
                window: self.window,
            })
            .send()
            .await
            .map_err(|e| transport_error("create queue", e))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::InvalidSource(if text.is_empty() {
                source.to_string()
            } else {
                text
            }));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(format!(
                "create queue: server returned {status}: {text}"
            )));
        }

        let envelope: QueueEnvelope = response
            .json()
            .await
            .map_err(|e| Error::Desync(format!("create queue: malformed queue envelope: {e}")))?;
        let snapshot = envelope.into_snapshot();
        info!(
            queue_id = %snapshot.queue_id,
            items = snapshot.len(),
            "Created queue from {source}"
        );
        Ok(snapshot)
    }

    async fn fetch_window(
        &self,
        queue_id: QueueId,
        center: Option<QueueItemId>,
    ) -> Result<QueueSnapshot> {
        let mut url = format!(
            "{}/queues/{}?window={}",
            self.base_url, queue_id, self.window
        );
        if let Some(center) = center {
            url.push_str(&format!("&center={center}"));
        }
        debug!(%queue_id, ?center, "Fetching queue window");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error("fetch window", e))?;
        Self::envelope_from(response, format!("queue {queue_id}")).await
    }

    async fn append_or_insert(
        &self,
        queue_id: QueueId,
        media: &[MediaRef],
        placement: Placement,
    ) -> Result<QueueSnapshot> {
        let url = format!("{}/queues/{}/items", self.base_url, queue_id);
        debug!(%queue_id, count = media.len(), %placement, "Inserting media");

        let response = self
            .http_client
            .post(&url)
            .json(&InsertRequest {
                media: media.to_vec(),
                placement,
            })
            .send()
            .await
            .map_err(|e| transport_error("insert items", e))?;
        Self::envelope_from(response, format!("queue {queue_id}")).await
    }

    async fn remove(&self, queue_id: QueueId, item: QueueItemId) -> Result<QueueSnapshot> {
        let url = format!("{}/queues/{}/items/{}", self.base_url, queue_id, item);
        debug!(%queue_id, %item, "Removing item");

        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(|e| transport_error("remove item", e))?;
        Self::envelope_from(response, format!("queue {queue_id} item {item}")).await
    }

    async fn move_items(
        &self,
        queue_id: QueueId,
        items: &[QueueItemId],
        anchor: MoveAnchor,
    ) -> Result<QueueSnapshot> {
        let url = format!("{}/queues/{}/items/move", self.base_url, queue_id);
        debug!(%queue_id, count = items.len(), %anchor, "Moving items");

        let response = self
            .http_client
            .post(&url)
            .json(&MoveRequest {
                items: items.to_vec(),
                anchor,
            })
            .send()
            .await
            .map_err(|e| transport_error("move items", e))?;
        Self::envelope_from(response, format!("queue {queue_id}")).await
    }

    async fn report_position(&self, queue_id: QueueId, report: &PositionReport) -> Result<()> {
        let url = format!("{}/queues/{}/timeline", self.base_url, queue_id);
        debug!(
            %queue_id,
            item = %report.item,
            position_ms = report.position_ms,
            state = %report.state,
            "Reporting position"
        );

        let response = self
            .http_client
            .post(&url)
            .json(report)
            .send()
            .await
            .map_err(|e| transport_error("report position", e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("queue {queue_id}")));
        }
        if !status.is_success() {
            return Err(Error::RemoteUnavailable(format!(
                "report position: server returned {status}"
            )));
        }
        Ok(())
    }
}
