pub mod audio;
pub mod config;
pub mod error;
pub mod store;
pub mod sync;

pub use audio::{
    AudioCaptureEngine, AudioHost, CaptureState, FinalizedRecording, InputStream, SimulatedHost,
};
pub use config::Config;
pub use error::{LecternError, Result};
pub use store::{DomainStore, Event, Session, SessionStatus, StoreEvent, Task};
pub use sync::{BackendClient, HttpBackendClient, RetryPolicy, SessionUploadCoordinator};
