use thiserror::Error;

/// Errors surfaced by the capture engine, the domain store, and the
/// upload coordinator.
#[derive(Error, Debug)]
pub enum LecternError {
    /// Input device missing, permission denied, or already held.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Engine operation called outside its valid state.
    #[error("invalid capture transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    /// Network/transport failure while uploading a finished recording.
    #[error("upload failed: {0}")]
    UploadFailure(String),

    /// Backend reported failure, or the polling budget ran out.
    #[error("processing failed: {0}")]
    ProcessingFailure(String),

    /// Lookup miss where an entity id was required to exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed or empty input rejected before it reaches the store.
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV encoding failure while finalizing a capture.
    #[error("encode error: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, LecternError>;
