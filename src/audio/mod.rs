//! Audio capture
//!
//! This module provides the capture engine and its hardware seam:
//! - `AudioHost` / `InputStream`: injected device access (simulated or real)
//! - `AudioCaptureEngine`: state machine owning the one active input stream
//! - telemetry: scheduler-owned periodic sampling for meter/waveform display

mod device;
mod engine;
mod telemetry;

pub use device::{AudioHost, InputStream, SimulatedHost};
pub use engine::{
    AudioCaptureEngine, CaptureState, FinalizedRecording, WAVEFORM_BINS, WAVEFORM_MIDPOINT,
};
pub use telemetry::{spawn_telemetry, Telemetry};
