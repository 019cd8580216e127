use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of a session.
///
/// Progression is forward-only: `Recording -> Processing -> Ready | Error`.
/// Automated merges never move a session backward; an explicit user retry on
/// a failed session is the one sanctioned `Error -> Processing` move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Recording,
    Processing,
    Ready,
    Error,
}

impl SessionStatus {
    /// Rank used to enforce forward-only progression.
    pub fn rank(&self) -> u8 {
        match self {
            SessionStatus::Recording => 0,
            SessionStatus::Processing => 1,
            SessionStatus::Ready => 2,
            SessionStatus::Error => 2,
        }
    }
}

/// Where the finalized audio artifact lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioRef {
    /// Local path or opaque URL of the encoded artifact
    pub uri: String,
    /// Size of the artifact in bytes
    pub byte_len: usize,
}

/// One transcribed slice of a session, ordered by start time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
    /// Confidence score in [0, 1]
    pub confidence: f32,
}

/// One audio recording together with its transcript and derived insights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Owning event; must reference an existing `Event`
    pub event_id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub audio: AudioRef,
    /// Active recording time in seconds (pauses excluded)
    pub duration_secs: f64,
    pub transcript: String,
    pub transcript_segments: Vec<TranscriptSegment>,
    /// None until backend reconciliation completes
    pub insights: Option<Insights>,
    pub status: SessionStatus,
    pub is_pinned: bool,
}

/// Grouping container (a course or seminar) owning sessions and academic items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    /// Every session with `event_id == self.id`, exactly once each
    pub session_ids: Vec<String>,
    pub assignments: Vec<AcademicItem>,
    pub exams: Vec<AcademicItem>,
    pub highlights: Vec<String>,
}

impl Event {
    pub fn new(name: &str, color: &str) -> Self {
        Self {
            id: format!("event-{}", uuid::Uuid::new_v4()),
            name: name.to_string(),
            description: String::new(),
            color: color.to_string(),
            created_at: Utc::now(),
            session_ids: Vec::new(),
            assignments: Vec::new(),
            exams: Vec::new(),
            highlights: Vec::new(),
        }
    }
}

/// Assignment or exam entry on an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicItem {
    pub id: String,
    pub text: String,
    pub date: Option<DateTime<Utc>>,
    pub completed: bool,
}

/// Everything the backend derives from a session's audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insights {
    pub summary: Summary,
    pub bullets: Vec<Bullet>,
    pub notes_outline: Vec<OutlineSection>,
    pub key_terms: Vec<KeyTerm>,
    pub flashcards: Vec<Flashcard>,
    pub practice_questions: Vec<PracticeQuestion>,
    pub action_items: Vec<ActionItem>,
    pub timeline: Vec<TimelineEntry>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub confidence: f32,
    pub source_segments: Vec<String>,
    #[serde(default)]
    pub is_pinned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bullet {
    pub text: String,
    pub confidence: f32,
    pub source_segments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSection {
    pub heading: String,
    pub items: Vec<String>,
}

/// A term/definition pair extracted from the transcript.
///
/// `is_user_created` and `is_edited` are sticky: once set they survive every
/// automated merge, and the item they protect is never overwritten by
/// regenerated content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyTerm {
    pub term: String,
    pub definition: String,
    pub confidence: f32,
    /// Weak references to transcript segment ids
    pub source_segments: Vec<String>,
    #[serde(default)]
    pub is_user_created: bool,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub is_pinned: bool,
    /// Snapshot of the automated content before a user edit
    #[serde(default)]
    pub original: Option<(String, String)>,
}

/// Question/answer study card. Same override-flag semantics as `KeyTerm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
    pub confidence: f32,
    pub source_segments: Vec<String>,
    #[serde(default)]
    pub is_user_created: bool,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub original: Option<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeQuestion {
    pub question: String,
    pub hint: String,
    pub source_segments: Vec<String>,
}

/// A follow-up extracted from the session. Same override-flag semantics as
/// `KeyTerm`, matched by text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub text: String,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub confidence: f32,
    pub source_segments: Vec<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub is_user_created: bool,
    #[serde(default)]
    pub is_edited: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub start_secs: f64,
    pub end_secs: f64,
    pub title: String,
    pub source_segments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// A standalone to-do. The `session_id`/`course_id` references are weak:
/// tasks outlive the records they came from, so dangling ids are tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub priority: Priority,
    pub session_id: Option<String>,
    pub course_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_pinned: bool,
}

impl Task {
    pub fn new(text: &str, priority: Priority) -> Self {
        Self {
            id: format!("task-{}", uuid::Uuid::new_v4()),
            text: text.to_string(),
            due_date: None,
            completed: false,
            priority,
            session_id: None,
            course_id: None,
            created_at: Utc::now(),
            is_pinned: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicConfig {
    pub device_id: String,
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub auto_gain_control: bool,
    pub noise_suppression: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingQuality {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

/// Process-wide preferences. Referenced for defaults only; owns nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub mic: MicConfig,
    pub offline_mode: bool,
    pub recording_quality: RecordingQuality,
    pub notifications_enabled: bool,
    pub auto_export: bool,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mic: MicConfig {
                device_id: "default".to_string(),
                sample_rate: 16000,
                echo_cancellation: true,
                auto_gain_control: true,
                noise_suppression: true,
            },
            offline_mode: false,
            recording_quality: RecordingQuality::High,
            notifications_enabled: true,
            auto_export: false,
            theme: Theme::System,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub level: Option<String>,
    pub major: Option<String>,
    pub is_logged_in: bool,
}
