use crate::error::{LecternError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Access to audio input hardware.
///
/// Implementations:
/// - Simulated: deterministic sine generator (tests, demo binary)
/// - Platform backends (cpal, CoreAudio) plug in behind the same trait
pub trait AudioHost: Send + Sync {
    /// Open an exclusive input stream on the named device.
    ///
    /// Fails with `DeviceUnavailable` if the device does not exist, permission
    /// is denied, or another stream already holds it.
    fn open(&self, device_id: &str) -> Result<Box<dyn InputStream>>;
}

/// An open, exclusively-held input stream.
///
/// Dropping the stream releases the device.
pub trait InputStream: Send {
    /// Drain the samples the device buffered since the last read (i16 PCM, mono).
    fn read(&mut self) -> Result<Vec<i16>>;

    /// Sample rate of the stream in Hz.
    fn sample_rate(&self) -> u32;
}

/// Deterministic audio host producing a sine tone.
///
/// Enforces the single-holder rule with an atomic busy flag so exclusivity
/// behaves like real hardware.
pub struct SimulatedHost {
    sample_rate: u32,
    /// Samples handed out per `read()` call
    chunk_len: usize,
    /// Peak amplitude of the generated tone, in i16 units
    amplitude: i16,
    known_devices: Vec<String>,
    busy: Arc<AtomicBool>,
}

impl SimulatedHost {
    pub fn new(sample_rate: u32, chunk_len: usize) -> Self {
        Self {
            sample_rate,
            chunk_len,
            amplitude: 12000,
            known_devices: vec!["default".to_string(), "sim".to_string()],
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_amplitude(mut self, amplitude: i16) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn with_devices(mut self, devices: Vec<String>) -> Self {
        self.known_devices = devices;
        self
    }
}

impl AudioHost for SimulatedHost {
    fn open(&self, device_id: &str) -> Result<Box<dyn InputStream>> {
        if !self.known_devices.iter().any(|d| d == device_id) {
            return Err(LecternError::DeviceUnavailable(format!(
                "no such input device: {}",
                device_id
            )));
        }

        // Claim the device; only one stream may hold it at a time.
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(LecternError::DeviceUnavailable(format!(
                "device {} is busy",
                device_id
            )));
        }

        Ok(Box::new(SimulatedStream {
            sample_rate: self.sample_rate,
            chunk_len: self.chunk_len,
            amplitude: self.amplitude,
            phase: 0,
            busy: Arc::clone(&self.busy),
        }))
    }
}

struct SimulatedStream {
    sample_rate: u32,
    chunk_len: usize,
    amplitude: i16,
    phase: u64,
    busy: Arc<AtomicBool>,
}

impl InputStream for SimulatedStream {
    fn read(&mut self) -> Result<Vec<i16>> {
        let mut samples = Vec::with_capacity(self.chunk_len);
        // 440 Hz tone
        let step = 440.0 * 2.0 * std::f64::consts::PI / self.sample_rate as f64;
        for i in 0..self.chunk_len {
            let t = (self.phase + i as u64) as f64;
            samples.push(((t * step).sin() * self.amplitude as f64) as i16);
        }
        self.phase += self.chunk_len as u64;
        Ok(samples)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for SimulatedStream {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}
