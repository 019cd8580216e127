use super::backend::{BackendClient, RemoteStatus};
use super::merge;
use crate::audio::FinalizedRecording;
use crate::config::BackendConfig;
use crate::error::{LecternError, Result};
use crate::store::{AudioRef, DomainStore, Session, SessionStatus};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Bounded retry/backoff knobs for upload and completion polling.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_upload_attempts: u32,
    pub max_poll_attempts: u32,
    /// Backoff before the first upload retry; doubles per attempt
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Fixed interval between status polls
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_upload_attempts: 3,
            max_poll_attempts: 60,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &BackendConfig) -> Self {
        Self {
            max_upload_attempts: cfg.max_upload_attempts,
            max_poll_attempts: cfg.max_poll_attempts,
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_secs(10),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
        }
    }
}

/// Bridges a finalized local recording to the backend-processed result.
///
/// `submit` creates the optimistic session record before any network call and
/// never revokes it: every failure path ends with the session addressable at
/// status `Error` with its audio artifact intact.
pub struct SessionUploadCoordinator {
    store: Arc<Mutex<DomainStore>>,
    backend: Arc<dyn BackendClient>,
    policy: RetryPolicy,
    recordings_dir: PathBuf,
}

impl SessionUploadCoordinator {
    pub fn new(
        store: Arc<Mutex<DomainStore>>,
        backend: Arc<dyn BackendClient>,
        policy: RetryPolicy,
        recordings_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            backend,
            policy,
            recordings_dir: recordings_dir.into(),
        }
    }

    /// Store the recording locally, create the session with status
    /// `Processing`, and kick off reconciliation in the background.
    ///
    /// Returns the new session id as soon as the local write completes; the
    /// caller never waits on the network.
    pub async fn submit(
        &self,
        recording: FinalizedRecording,
        event_id: &str,
        title: &str,
    ) -> Result<String> {
        let session_id = format!("session-{}", uuid::Uuid::new_v4());

        tokio::fs::create_dir_all(&self.recordings_dir).await?;
        let audio_path = self.recordings_dir.join(format!("{}.wav", session_id));
        tokio::fs::write(&audio_path, &recording.wav_bytes).await?;

        let session = Session {
            id: session_id.clone(),
            event_id: event_id.to_string(),
            title: title.to_string(),
            date: Utc::now(),
            audio: AudioRef {
                uri: audio_path.to_string_lossy().into_owned(),
                byte_len: recording.wav_bytes.len(),
            },
            duration_secs: recording.duration_secs,
            transcript: String::new(),
            transcript_segments: Vec::new(),
            insights: None,
            status: SessionStatus::Processing,
            is_pinned: false,
        };

        {
            let mut store = self.store.lock().await;
            store.add_session(session)?;
        }

        info!(
            "Session {} created locally ({:.1}s), starting reconciliation",
            session_id, recording.duration_secs
        );

        self.spawn_reconcile(
            session_id.clone(),
            event_id.to_string(),
            title.to_string(),
            recording.wav_bytes,
        );

        Ok(session_id)
    }

    /// Start a fresh reconciliation attempt for a session that ended in
    /// `Error`. Reads the audio artifact back from its local reference.
    pub async fn retry(&self, session_id: &str) -> Result<()> {
        let (event_id, title, audio_uri) = {
            let mut store = self.store.lock().await;
            let session = store
                .session(session_id)
                .ok_or_else(|| LecternError::NotFound(format!("session {}", session_id)))?;
            let info = (
                session.event_id.clone(),
                session.title.clone(),
                session.audio.uri.clone(),
            );
            store.reset_session_for_retry(session_id)?;
            info
        };

        let audio = tokio::fs::read(&audio_uri).await?;
        info!("Retrying session {}", session_id);

        self.spawn_reconcile(session_id.to_string(), event_id, title, audio);
        Ok(())
    }

    fn spawn_reconcile(&self, session_id: String, event_id: String, title: String, audio: Vec<u8>) {
        let store = Arc::clone(&self.store);
        let backend = Arc::clone(&self.backend);
        let policy = self.policy.clone();

        tokio::spawn(async move {
            reconcile(store, backend, policy, session_id, event_id, title, audio).await;
        });
    }
}

/// Owns one session's `Processing -> Ready | Error` journey.
async fn reconcile(
    store: Arc<Mutex<DomainStore>>,
    backend: Arc<dyn BackendClient>,
    policy: RetryPolicy,
    session_id: String,
    event_id: String,
    title: String,
    audio: Vec<u8>,
) {
    let remote = match upload_with_retries(&*backend, &policy, &event_id, &title, audio).await {
        Ok(remote) => remote,
        Err(e) => {
            error!("Upload failed terminally for session {}: {}", session_id, e);
            mark_failed(&store, &session_id).await;
            return;
        }
    };

    info!(
        "Session {} uploaded (remote id {}), polling for completion",
        session_id, remote
    );

    for attempt in 1..=policy.max_poll_attempts {
        tokio::time::sleep(policy.poll_interval).await;

        match backend.status(&remote).await {
            Ok(RemoteStatus::Processing) => continue,
            Ok(RemoteStatus::Ready) => {
                match backend.fetch(&remote).await {
                    Ok(payload) => {
                        let mut store = store.lock().await;
                        let Some(session) = store.session(&session_id) else {
                            // Deleted locally while processing; nothing to merge into.
                            warn!("Session {} gone before merge", session_id);
                            return;
                        };
                        let mut merged = session.clone();
                        merge::merge_payload(&mut merged, payload);
                        if let Err(e) = store.update_session(merged) {
                            error!("Failed to apply merge for session {}: {}", session_id, e);
                        } else {
                            info!("Session {} reconciled and ready", session_id);
                        }
                    }
                    Err(e) => {
                        error!("Result fetch failed for session {}: {}", session_id, e);
                        mark_failed(&store, &session_id).await;
                    }
                }
                return;
            }
            Ok(RemoteStatus::Error) => {
                error!("Backend reported failure for session {}", session_id);
                mark_failed(&store, &session_id).await;
                return;
            }
            Err(e) => {
                warn!(
                    "Status poll {}/{} failed for session {}: {}",
                    attempt, policy.max_poll_attempts, session_id, e
                );
            }
        }
    }

    error!("Poll budget exhausted for session {}", session_id);
    mark_failed(&store, &session_id).await;
}

async fn upload_with_retries(
    backend: &dyn BackendClient,
    policy: &RetryPolicy,
    event_id: &str,
    title: &str,
    audio: Vec<u8>,
) -> Result<String> {
    let mut backoff = policy.initial_backoff;

    for attempt in 1..=policy.max_upload_attempts {
        match backend.upload(audio.clone(), event_id, title).await {
            Ok(remote) => return Ok(remote.id),
            Err(e) if attempt < policy.max_upload_attempts => {
                warn!(
                    "Upload attempt {}/{} failed: {}",
                    attempt, policy.max_upload_attempts, e
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
            Err(e) => return Err(e),
        }
    }

    Err(LecternError::UploadFailure(
        "upload retry budget exhausted".to_string(),
    ))
}

/// Downgrade only the affected session; the record and its audio reference
/// stay addressable for a later retry.
async fn mark_failed(store: &Arc<Mutex<DomainStore>>, session_id: &str) {
    let mut store = store.lock().await;
    let Some(session) = store.session(session_id) else {
        return;
    };
    let mut failed = session.clone();
    failed.status = SessionStatus::Error;
    if let Err(e) = store.update_session(failed) {
        error!("Failed to mark session {} as failed: {}", session_id, e);
    }
}
