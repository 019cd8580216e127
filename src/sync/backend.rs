use crate::error::{LecternError, Result};
use crate::store::{Insights, TranscriptSegment};
use serde::Deserialize;

/// Server-side descriptor returned by a successful upload.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSession {
    pub id: String,
}

/// Processing state reported by the pipeline for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Processing,
    Ready,
    Error,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: RemoteStatus,
}

/// Full processing result, fetched only once status is `Ready`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPayload {
    pub transcript: String,
    pub transcript_segments: Vec<TranscriptSegment>,
    pub insights: Insights,
}

/// Transcription/insight pipeline consumed by the upload coordinator.
///
/// Injected so tests can substitute a scripted backend.
#[async_trait::async_trait]
pub trait BackendClient: Send + Sync {
    /// Upload a finalized recording; returns the server-assigned session id.
    async fn upload(&self, audio: Vec<u8>, event_id: &str, title: &str) -> Result<RemoteSession>;

    /// Query processing status for a previously uploaded session.
    async fn status(&self, id: &str) -> Result<RemoteStatus>;

    /// Fetch the full result. Call only after `status` reported `Ready`.
    async fn fetch(&self, id: &str) -> Result<SessionPayload>;
}

/// HTTP implementation of the pipeline contract:
/// - POST /api/sessions          (multipart: audio, eventId, title)
/// - GET  /api/sessions/{id}/status
/// - GET  /api/sessions/{id}
pub struct HttpBackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl BackendClient for HttpBackendClient {
    async fn upload(&self, audio: Vec<u8>, event_id: &str, title: &str) -> Result<RemoteSession> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("session.wav")
            .mime_str("audio/wav")
            .map_err(|e| LecternError::UploadFailure(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("audio", part)
            .text("eventId", event_id.to_string())
            .text("title", title.to_string());

        let response = self
            .client
            .post(format!("{}/api/sessions", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| LecternError::UploadFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LecternError::UploadFailure(format!(
                "upload rejected with status {}",
                response.status()
            )));
        }

        response
            .json::<RemoteSession>()
            .await
            .map_err(|e| LecternError::UploadFailure(e.to_string()))
    }

    async fn status(&self, id: &str) -> Result<RemoteStatus> {
        let response = self
            .client
            .get(format!("{}/api/sessions/{}/status", self.base_url, id))
            .send()
            .await
            .map_err(|e| LecternError::ProcessingFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LecternError::ProcessingFailure(format!(
                "status query rejected with status {}",
                response.status()
            )));
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| LecternError::ProcessingFailure(e.to_string()))?;

        Ok(body.status)
    }

    async fn fetch(&self, id: &str) -> Result<SessionPayload> {
        let response = self
            .client
            .get(format!("{}/api/sessions/{}", self.base_url, id))
            .send()
            .await
            .map_err(|e| LecternError::ProcessingFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LecternError::ProcessingFailure(format!(
                "result fetch rejected with status {}",
                response.status()
            )));
        }

        response
            .json::<SessionPayload>()
            .await
            .map_err(|e| LecternError::ProcessingFailure(e.to_string()))
    }
}
