//! Upload and reconciliation
//!
//! Turns a finalized recording into an optimistic local session, uploads it,
//! polls the pipeline for completion, and merges the result back into the
//! store without destroying user edits.

mod backend;
mod coordinator;
mod merge;

pub use backend::{BackendClient, HttpBackendClient, RemoteSession, RemoteStatus, SessionPayload};
pub use coordinator::{RetryPolicy, SessionUploadCoordinator};
pub use merge::merge_payload;
