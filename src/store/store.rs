use super::model::*;
use super::persist::StateStore;
use crate::error::{LecternError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// The whole persisted domain: every entity collection plus the singletons.
/// Collections are insertion-ordered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainState {
    pub events: Vec<Event>,
    pub sessions: Vec<Session>,
    pub tasks: Vec<Task>,
    pub settings: Settings,
    pub profile: UserProfile,
}

/// Notification emitted once per mutation to every live subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    EventAdded(String),
    EventUpdated(String),
    EventDeleted(String),
    SessionAdded(String),
    SessionUpdated(String),
    SessionDeleted(String),
    TaskAdded(String),
    TaskUpdated(String),
    TaskDeleted(String),
    SettingsUpdated,
    ProfileUpdated,
}

/// Handle identifying one subscriber; pass back to `unsubscribe`.
pub type SubscriptionId = u64;

/// Sole owner of the in-memory domain model.
///
/// Mutations apply atomically (invariant maintenance included) before their
/// notification fires; queries are side-effect-free and report misses as
/// `None`. Share as `Arc<Mutex<DomainStore>>`; the model assumes one logical
/// writer at a time.
pub struct DomainStore {
    state: DomainState,
    persistence: Option<Box<dyn StateStore>>,
    subscribers: Vec<(SubscriptionId, mpsc::UnboundedSender<StoreEvent>)>,
    next_sub_id: SubscriptionId,
}

impl DomainStore {
    pub fn new() -> Self {
        Self {
            state: DomainState::default(),
            persistence: None,
            subscribers: Vec::new(),
            next_sub_id: 0,
        }
    }

    /// Construct with a persistence backend, loading any previously saved
    /// state. A missing or unreadable state file starts empty rather than
    /// failing.
    pub fn with_persistence(persistence: Box<dyn StateStore>) -> Self {
        let state = match persistence.load() {
            Ok(Some(state)) => {
                info!(
                    "Loaded state: {} events, {} sessions, {} tasks",
                    state.events.len(),
                    state.sessions.len(),
                    state.tasks.len()
                );
                state
            }
            Ok(None) => DomainState::default(),
            Err(e) => {
                warn!("Failed to load persisted state, starting empty: {}", e);
                DomainState::default()
            }
        };

        Self {
            state,
            persistence: Some(persistence),
            subscribers: Vec::new(),
            next_sub_id: 0,
        }
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Register an observer. Every subsequent mutation delivers exactly one
    /// `StoreEvent` to the returned receiver until `unsubscribe`.
    pub fn subscribe(&mut self) -> (SubscriptionId, mpsc::UnboundedReceiver<StoreEvent>) {
        let id = self.next_sub_id;
        self.next_sub_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push((id, tx));
        (id, rx)
    }

    /// Remove an observer; no further events are delivered to it.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Persist then fan out one notification per live subscriber.
    /// Persistence failure is logged and non-fatal.
    fn commit(&mut self, event: StoreEvent) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(&self.state) {
                warn!("Failed to persist state: {}", e);
            }
        }

        self.subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn event(&self, id: &str) -> Option<&Event> {
        self.state.events.iter().find(|e| e.id == id)
    }

    pub fn events(&self) -> &[Event] {
        &self.state.events
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.state.sessions.iter().find(|s| s.id == id)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.state.sessions
    }

    pub fn sessions_for_event(&self, event_id: &str) -> Vec<&Session> {
        self.state
            .sessions
            .iter()
            .filter(|s| s.event_id == event_id)
            .collect()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.state.tasks.iter().find(|t| t.id == id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn tasks_for_session(&self, session_id: &str) -> Vec<&Task> {
        self.state
            .tasks
            .iter()
            .filter(|t| t.session_id.as_deref() == Some(session_id))
            .collect()
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn profile(&self) -> &UserProfile {
        &self.state.profile
    }

    // ------------------------------------------------------------------
    // Event mutations
    // ------------------------------------------------------------------

    pub fn add_event(&mut self, event: Event) -> Result<()> {
        if event.name.trim().is_empty() {
            return Err(LecternError::ValidationError(
                "event name must not be empty".to_string(),
            ));
        }

        let id = event.id.clone();
        // Idempotent by id: replace in place rather than duplicating.
        if let Some(existing) = self.state.events.iter_mut().find(|e| e.id == event.id) {
            *existing = event;
            self.commit(StoreEvent::EventUpdated(id));
        } else {
            self.state.events.push(event);
            self.commit(StoreEvent::EventAdded(id));
        }
        Ok(())
    }

    /// Replace an event's user-editable fields. The derived session list is
    /// preserved from the stored record; only the store maintains it.
    pub fn update_event(&mut self, mut event: Event) -> Result<()> {
        let Some(existing) = self.state.events.iter_mut().find(|e| e.id == event.id) else {
            return Err(LecternError::NotFound(format!("event {}", event.id)));
        };
        if event.name.trim().is_empty() {
            return Err(LecternError::ValidationError(
                "event name must not be empty".to_string(),
            ));
        }

        event.session_ids = existing.session_ids.clone();
        let id = event.id.clone();
        *existing = event;
        self.commit(StoreEvent::EventUpdated(id));
        Ok(())
    }

    /// Delete an event and cascade-delete every session it owns.
    pub fn delete_event(&mut self, id: &str) -> Result<()> {
        let Some(pos) = self.state.events.iter().position(|e| e.id == id) else {
            return Err(LecternError::NotFound(format!("event {}", id)));
        };

        self.state.events.remove(pos);
        let before = self.state.sessions.len();
        self.state.sessions.retain(|s| s.event_id != id);
        info!(
            "Deleted event {} (cascaded {} sessions)",
            id,
            before - self.state.sessions.len()
        );

        self.commit(StoreEvent::EventDeleted(id.to_string()));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Session mutations
    // ------------------------------------------------------------------

    /// Add a session, linking it into its owning event's session list.
    /// Re-adding an existing id replaces the record without duplicating the link.
    pub fn add_session(&mut self, session: Session) -> Result<()> {
        if session.id.trim().is_empty() {
            return Err(LecternError::ValidationError(
                "session id must not be empty".to_string(),
            ));
        }
        if self.event(&session.event_id).is_none() {
            return Err(LecternError::ValidationError(format!(
                "session references unknown event {}",
                session.event_id
            )));
        }

        let id = session.id.clone();
        let event_id = session.event_id.clone();

        if let Some(pos) = self.state.sessions.iter().position(|s| s.id == session.id) {
            let old_event_id = self.state.sessions[pos].event_id.clone();
            self.state.sessions[pos] = session;
            if old_event_id != event_id {
                self.unlink_session(&old_event_id, &id);
                self.link_session(&event_id, &id);
            }
            self.commit(StoreEvent::SessionUpdated(id));
        } else {
            self.state.sessions.push(session);
            self.link_session(&event_id, &id);
            self.commit(StoreEvent::SessionAdded(id));
        }
        Ok(())
    }

    /// Replace a session's content. Status may only move forward; ownership
    /// changes go through `move_session`.
    pub fn update_session(&mut self, session: Session) -> Result<()> {
        let Some(existing) = self.state.sessions.iter_mut().find(|s| s.id == session.id) else {
            return Err(LecternError::NotFound(format!("session {}", session.id)));
        };

        if session.event_id != existing.event_id {
            return Err(LecternError::ValidationError(
                "event reassignment must use move_session".to_string(),
            ));
        }
        if session.status != existing.status {
            // Ready and Error are both terminal; the only sanctioned exit
            // from Error is reset_session_for_retry.
            let terminal = matches!(
                existing.status,
                SessionStatus::Ready | SessionStatus::Error
            );
            if terminal || session.status.rank() < existing.status.rank() {
                return Err(LecternError::ValidationError(format!(
                    "session status cannot move {:?} -> {:?}",
                    existing.status, session.status
                )));
            }
        }

        let id = session.id.clone();
        *existing = session;
        self.commit(StoreEvent::SessionUpdated(id));
        Ok(())
    }

    /// Explicit user retry: a failed session goes back to `Processing` for a
    /// fresh reconciliation attempt. Only valid from `Error`.
    pub fn reset_session_for_retry(&mut self, id: &str) -> Result<()> {
        let Some(session) = self.state.sessions.iter_mut().find(|s| s.id == id) else {
            return Err(LecternError::NotFound(format!("session {}", id)));
        };
        if session.status != SessionStatus::Error {
            return Err(LecternError::ValidationError(
                "only failed sessions can be retried".to_string(),
            ));
        }
        session.status = SessionStatus::Processing;
        self.commit(StoreEvent::SessionUpdated(id.to_string()));
        Ok(())
    }

    /// Delete a session, removing its id from the owning event's list.
    pub fn delete_session(&mut self, id: &str) -> Result<()> {
        let Some(pos) = self.state.sessions.iter().position(|s| s.id == id) else {
            return Err(LecternError::NotFound(format!("session {}", id)));
        };

        let event_id = self.state.sessions[pos].event_id.clone();
        self.state.sessions.remove(pos);
        self.unlink_session(&event_id, id);

        self.commit(StoreEvent::SessionDeleted(id.to_string()));
        Ok(())
    }

    /// Reassign a session to another event, keeping both session lists exact.
    pub fn move_session(&mut self, id: &str, new_event_id: &str) -> Result<()> {
        if self.event(new_event_id).is_none() {
            return Err(LecternError::ValidationError(format!(
                "target event {} does not exist",
                new_event_id
            )));
        }
        let Some(session) = self.state.sessions.iter_mut().find(|s| s.id == id) else {
            return Err(LecternError::NotFound(format!("session {}", id)));
        };

        let old_event_id = std::mem::replace(&mut session.event_id, new_event_id.to_string());
        self.unlink_session(&old_event_id, id);
        self.link_session(new_event_id, id);

        self.commit(StoreEvent::SessionUpdated(id.to_string()));
        Ok(())
    }

    pub fn set_session_pinned(&mut self, id: &str, pinned: bool) -> Result<()> {
        let Some(session) = self.state.sessions.iter_mut().find(|s| s.id == id) else {
            return Err(LecternError::NotFound(format!("session {}", id)));
        };
        session.is_pinned = pinned;
        self.commit(StoreEvent::SessionUpdated(id.to_string()));
        Ok(())
    }

    fn link_session(&mut self, event_id: &str, session_id: &str) {
        if let Some(event) = self.state.events.iter_mut().find(|e| e.id == event_id) {
            if !event.session_ids.iter().any(|s| s == session_id) {
                event.session_ids.push(session_id.to_string());
            }
        }
    }

    fn unlink_session(&mut self, event_id: &str, session_id: &str) {
        if let Some(event) = self.state.events.iter_mut().find(|e| e.id == event_id) {
            event.session_ids.retain(|s| s != session_id);
        }
    }

    // ------------------------------------------------------------------
    // Task mutations
    // ------------------------------------------------------------------

    /// Add a task. `session_id`/`course_id` are weak references and are not
    /// validated; tasks may outlive the records they point at.
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if task.text.trim().is_empty() {
            return Err(LecternError::ValidationError(
                "task text must not be empty".to_string(),
            ));
        }

        let id = task.id.clone();
        if let Some(existing) = self.state.tasks.iter_mut().find(|t| t.id == task.id) {
            *existing = task;
            self.commit(StoreEvent::TaskUpdated(id));
        } else {
            self.state.tasks.push(task);
            self.commit(StoreEvent::TaskAdded(id));
        }
        Ok(())
    }

    pub fn update_task(&mut self, task: Task) -> Result<()> {
        if task.text.trim().is_empty() {
            return Err(LecternError::ValidationError(
                "task text must not be empty".to_string(),
            ));
        }
        let Some(existing) = self.state.tasks.iter_mut().find(|t| t.id == task.id) else {
            return Err(LecternError::NotFound(format!("task {}", task.id)));
        };

        let id = task.id.clone();
        *existing = task;
        self.commit(StoreEvent::TaskUpdated(id));
        Ok(())
    }

    pub fn delete_task(&mut self, id: &str) -> Result<()> {
        let Some(pos) = self.state.tasks.iter().position(|t| t.id == id) else {
            return Err(LecternError::NotFound(format!("task {}", id)));
        };
        self.state.tasks.remove(pos);
        self.commit(StoreEvent::TaskDeleted(id.to_string()));
        Ok(())
    }

    pub fn toggle_task(&mut self, id: &str) -> Result<()> {
        let Some(task) = self.state.tasks.iter_mut().find(|t| t.id == id) else {
            return Err(LecternError::NotFound(format!("task {}", id)));
        };
        task.completed = !task.completed;
        self.commit(StoreEvent::TaskUpdated(id.to_string()));
        Ok(())
    }

    pub fn set_task_pinned(&mut self, id: &str, pinned: bool) -> Result<()> {
        let Some(task) = self.state.tasks.iter_mut().find(|t| t.id == id) else {
            return Err(LecternError::NotFound(format!("task {}", id)));
        };
        task.is_pinned = pinned;
        self.commit(StoreEvent::TaskUpdated(id.to_string()));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Singletons
    // ------------------------------------------------------------------

    pub fn update_settings(&mut self, settings: Settings) {
        self.state.settings = settings;
        self.commit(StoreEvent::SettingsUpdated);
    }

    pub fn update_profile(&mut self, profile: UserProfile) {
        self.state.profile = profile;
        self.commit(StoreEvent::ProfileUpdated);
    }
}

impl Default for DomainStore {
    fn default() -> Self {
        Self::new()
    }
}
