//! Reactive domain store
//!
//! Single source of truth for Sessions, Events, Tasks and the Settings /
//! UserProfile singletons:
//! - queries return `Option`/slices, never errors
//! - mutations are atomic and maintain the Event <-> Session link invariant
//! - every mutation notifies each subscriber exactly once
//! - state is saved through an injected `StateStore` after each mutation

mod model;
mod persist;
mod store;

pub use model::{
    AcademicItem, ActionItem, AudioRef, Bullet, Event, Flashcard, Insights, KeyTerm, MicConfig,
    OutlineSection, PracticeQuestion, Priority, RecordingQuality, Session, SessionStatus,
    Settings, Summary, Task, Theme, TimelineEntry, TranscriptSegment, UserProfile,
};
pub use persist::{JsonStateStore, StateStore};
pub use store::{DomainState, DomainStore, StoreEvent, SubscriptionId};
