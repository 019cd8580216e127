// Tests for the upload coordinator: the optimistic local write, bounded
// retries, terminal failure handling, user retry, and the insight merge.
//
// The mock backend is gated: it reports `processing` until the test releases
// it, which makes the interleaving with user edits deterministic.

use chrono::Utc;
use lectern::audio::{AudioCaptureEngine, SimulatedHost};
use lectern::error::{LecternError, Result};
use lectern::store::{
    Bullet, DomainStore, Event, Flashcard, Insights, SessionStatus, Summary, TranscriptSegment,
};
use lectern::sync::{
    BackendClient, RemoteSession, RemoteStatus, RetryPolicy, SessionPayload,
    SessionUploadCoordinator,
};
use lectern::FinalizedRecording;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;

struct MockBackend {
    /// Upload attempts to fail before succeeding (u32::MAX = always fail)
    upload_failures: AtomicU32,
    uploads: AtomicU32,
    /// While false, `status` reports `processing`
    released: AtomicBool,
    final_status: RemoteStatus,
    payload: SessionPayload,
}

impl MockBackend {
    fn new(payload: SessionPayload) -> Self {
        Self {
            upload_failures: AtomicU32::new(0),
            uploads: AtomicU32::new(0),
            released: AtomicBool::new(false),
            final_status: RemoteStatus::Ready,
            payload,
        }
    }

    fn failing_uploads(mut self, count: u32) -> Self {
        self.upload_failures = AtomicU32::new(count);
        self
    }

    fn ending_in(mut self, status: RemoteStatus) -> Self {
        self.final_status = status;
        self
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl BackendClient for MockBackend {
    async fn upload(&self, _audio: Vec<u8>, _event_id: &str, _title: &str) -> Result<RemoteSession> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let remaining = self.upload_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.upload_failures.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(LecternError::UploadFailure("connection reset".to_string()));
        }
        Ok(RemoteSession {
            id: "remote-1".to_string(),
        })
    }

    async fn status(&self, _id: &str) -> Result<RemoteStatus> {
        if self.released.load(Ordering::SeqCst) {
            Ok(self.final_status)
        } else {
            Ok(RemoteStatus::Processing)
        }
    }

    async fn fetch(&self, _id: &str) -> Result<SessionPayload> {
        Ok(self.payload.clone())
    }
}

fn generated_card(question: &str, answer: &str) -> Flashcard {
    Flashcard {
        question: question.to_string(),
        answer: answer.to_string(),
        confidence: 0.8,
        source_segments: vec!["seg-1".to_string()],
        is_user_created: false,
        is_edited: false,
        is_pinned: false,
        original: None,
    }
}

fn payload_with_cards(flashcards: Vec<Flashcard>) -> SessionPayload {
    SessionPayload {
        transcript: "entropy measures disorder".to_string(),
        transcript_segments: vec![TranscriptSegment {
            id: "seg-1".to_string(),
            start_secs: 0.0,
            end_secs: 4.2,
            text: "entropy measures disorder".to_string(),
            confidence: 0.95,
        }],
        insights: Insights {
            summary: Summary {
                text: "A lecture on entropy.".to_string(),
                confidence: 0.9,
                source_segments: vec!["seg-1".to_string()],
                is_pinned: false,
            },
            bullets: vec![Bullet {
                text: "Entropy increases".to_string(),
                confidence: 0.9,
                source_segments: vec!["seg-1".to_string()],
            }],
            notes_outline: Vec::new(),
            key_terms: Vec::new(),
            flashcards,
            practice_questions: Vec::new(),
            action_items: Vec::new(),
            timeline: Vec::new(),
            generated_at: Utc::now(),
        },
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_upload_attempts: 2,
        max_poll_attempts: 100,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        poll_interval: Duration::from_millis(5),
    }
}

fn simulated_recording(active_polls: usize, paused_polls: usize) -> FinalizedRecording {
    const RATE: u32 = 16000;
    let host = Arc::new(SimulatedHost::new(RATE, RATE as usize));
    let mut engine = AudioCaptureEngine::new(host);

    engine.start("sim").unwrap();
    for _ in 0..active_polls / 2 {
        engine.poll().unwrap();
    }
    if paused_polls > 0 {
        engine.pause().unwrap();
        for _ in 0..paused_polls {
            engine.poll().unwrap();
        }
        engine.resume().unwrap();
    }
    for _ in 0..(active_polls - active_polls / 2) {
        engine.poll().unwrap();
    }
    engine.stop().unwrap()
}

async fn new_event(store: &Arc<Mutex<DomainStore>>, name: &str) -> String {
    let mut store = store.lock().await;
    let event = Event::new(name, "#FF385C");
    let id = event.id.clone();
    store.add_event(event).unwrap();
    id
}

async fn wait_for_status(store: &Arc<Mutex<DomainStore>>, id: &str, status: SessionStatus) {
    for _ in 0..400 {
        {
            let store = store.lock().await;
            if store.session(id).map(|s| s.status) == Some(status) {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for session {} to reach {:?}", id, status);
}

#[tokio::test]
async fn submit_creates_processing_session_before_any_network_result() {
    let store = Arc::new(Mutex::new(DomainStore::new()));
    let event_id = new_event(&store, "E1").await;
    let dir = TempDir::new().unwrap();

    // 12 one-second polls of capture with a 3-poll pause in the middle
    let recording = simulated_recording(9, 3);

    let backend = Arc::new(MockBackend::new(payload_with_cards(vec![])));
    let coordinator = SessionUploadCoordinator::new(
        Arc::clone(&store),
        backend,
        fast_policy(),
        dir.path(),
    );

    let session_id = coordinator
        .submit(recording, &event_id, "Lecture 1")
        .await
        .unwrap();

    let store = store.lock().await;
    let session = store.session(&session_id).expect("session exists at once");
    assert_eq!(session.status, SessionStatus::Processing);
    assert_eq!(session.event_id, event_id);
    assert!((session.duration_secs - 9.0).abs() < 1e-9);
    assert!(session.insights.is_none());
    assert!(session.audio.byte_len > 0);
    assert!(store
        .event(&event_id)
        .unwrap()
        .session_ids
        .contains(&session_id));
}

#[tokio::test]
async fn successful_reconciliation_merges_result_and_marks_ready() {
    let store = Arc::new(Mutex::new(DomainStore::new()));
    let event_id = new_event(&store, "E1").await;
    let dir = TempDir::new().unwrap();

    let backend = Arc::new(MockBackend::new(payload_with_cards(vec![generated_card(
        "What is entropy?",
        "A measure of disorder",
    )])));
    let coordinator = SessionUploadCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&backend) as Arc<dyn BackendClient>,
        fast_policy(),
        dir.path(),
    );

    let session_id = coordinator
        .submit(simulated_recording(4, 0), &event_id, "Lecture 1")
        .await
        .unwrap();

    backend.release();
    wait_for_status(&store, &session_id, SessionStatus::Ready).await;

    let store = store.lock().await;
    let session = store.session(&session_id).unwrap();
    assert_eq!(session.transcript, "entropy measures disorder");
    assert_eq!(session.transcript_segments.len(), 1);
    let insights = session.insights.as_ref().unwrap();
    assert_eq!(insights.flashcards.len(), 1);
    assert_eq!(insights.summary.text, "A lecture on entropy.");
}

#[tokio::test]
async fn merge_preserves_user_created_flashcard_and_appends_new_one() {
    let store = Arc::new(Mutex::new(DomainStore::new()));
    let event_id = new_event(&store, "E1").await;
    let dir = TempDir::new().unwrap();

    let backend = Arc::new(MockBackend::new(payload_with_cards(vec![generated_card(
        "What is entropy?",
        "generated answer",
    )])));
    let coordinator = SessionUploadCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&backend) as Arc<dyn BackendClient>,
        fast_policy(),
        dir.path(),
    );

    let session_id = coordinator
        .submit(simulated_recording(4, 0), &event_id, "Lecture 1")
        .await
        .unwrap();

    // User writes their own card with the same question while the backend
    // is still processing.
    {
        let mut store = store.lock().await;
        let mut session = store.session(&session_id).unwrap().clone();
        let mut insights = payload_with_cards(vec![]).insights;
        let mut card = generated_card("What is entropy?", "my own answer");
        card.is_user_created = true;
        insights.flashcards.push(card);
        session.insights = Some(insights);
        store.update_session(session).unwrap();
    }

    backend.release();
    wait_for_status(&store, &session_id, SessionStatus::Ready).await;

    let store = store.lock().await;
    let insights = store.session(&session_id).unwrap().insights.as_ref().unwrap();
    assert_eq!(insights.flashcards.len(), 2);

    let user_card = &insights.flashcards[0];
    assert!(user_card.is_user_created);
    assert_eq!(user_card.answer, "my own answer");

    let appended = &insights.flashcards[1];
    assert!(!appended.is_user_created);
    assert_eq!(appended.answer, "generated answer");
}

#[tokio::test]
async fn upload_failure_downgrades_session_but_keeps_it_retryable() {
    let store = Arc::new(Mutex::new(DomainStore::new()));
    let event_id = new_event(&store, "E1").await;
    let dir = TempDir::new().unwrap();

    let backend = Arc::new(
        MockBackend::new(payload_with_cards(vec![])).failing_uploads(u32::MAX),
    );
    backend.release();
    let coordinator = SessionUploadCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&backend) as Arc<dyn BackendClient>,
        fast_policy(),
        dir.path(),
    );

    let session_id = coordinator
        .submit(simulated_recording(4, 0), &event_id, "Lecture 1")
        .await
        .unwrap();

    wait_for_status(&store, &session_id, SessionStatus::Error).await;

    // Retry budget respected
    assert_eq!(backend.uploads.load(Ordering::SeqCst), 2);

    // The session and its audio artifact survive the failure
    {
        let store = store.lock().await;
        let session = store.session(&session_id).unwrap();
        assert!(std::path::Path::new(&session.audio.uri).exists());
    }

    // A user retry against a now-healthy backend completes the session
    let healthy = Arc::new(MockBackend::new(payload_with_cards(vec![])));
    healthy.release();
    let coordinator = SessionUploadCoordinator::new(
        Arc::clone(&store),
        healthy,
        fast_policy(),
        dir.path(),
    );
    coordinator.retry(&session_id).await.unwrap();
    wait_for_status(&store, &session_id, SessionStatus::Ready).await;
}

#[tokio::test]
async fn backend_error_status_is_terminal() {
    let store = Arc::new(Mutex::new(DomainStore::new()));
    let event_id = new_event(&store, "E1").await;
    let dir = TempDir::new().unwrap();

    let backend = Arc::new(
        MockBackend::new(payload_with_cards(vec![])).ending_in(RemoteStatus::Error),
    );
    backend.release();
    let coordinator = SessionUploadCoordinator::new(
        Arc::clone(&store),
        backend,
        fast_policy(),
        dir.path(),
    );

    let session_id = coordinator
        .submit(simulated_recording(4, 0), &event_id, "Lecture 1")
        .await
        .unwrap();

    wait_for_status(&store, &session_id, SessionStatus::Error).await;
}

#[tokio::test]
async fn poll_budget_exhaustion_is_terminal() {
    let store = Arc::new(Mutex::new(DomainStore::new()));
    let event_id = new_event(&store, "E1").await;
    let dir = TempDir::new().unwrap();

    // Never released: status stays `processing` until the budget runs out
    let backend = Arc::new(MockBackend::new(payload_with_cards(vec![])));
    let mut policy = fast_policy();
    policy.max_poll_attempts = 3;
    let coordinator =
        SessionUploadCoordinator::new(Arc::clone(&store), backend, policy, dir.path());

    let session_id = coordinator
        .submit(simulated_recording(4, 0), &event_id, "Lecture 1")
        .await
        .unwrap();

    wait_for_status(&store, &session_id, SessionStatus::Error).await;
}

#[tokio::test]
async fn submit_rejects_unknown_event() {
    let store = Arc::new(Mutex::new(DomainStore::new()));
    let dir = TempDir::new().unwrap();

    let backend = Arc::new(MockBackend::new(payload_with_cards(vec![])));
    let coordinator = SessionUploadCoordinator::new(
        Arc::clone(&store),
        backend,
        fast_policy(),
        dir.path(),
    );

    let err = coordinator
        .submit(simulated_recording(2, 0), "event-missing", "Lecture 1")
        .await
        .unwrap_err();
    assert!(matches!(err, LecternError::ValidationError(_)));

    let store = store.lock().await;
    assert!(store.sessions().is_empty());
}
