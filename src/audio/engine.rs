use super::device::{AudioHost, InputStream};
use crate::error::{LecternError, Result};
use std::io::Cursor;
use std::sync::Arc;
use tracing::info;

/// Number of peak bins returned by `waveform()`.
pub const WAVEFORM_BINS: usize = 64;

/// Neutral waveform value returned while paused (visual midpoint).
pub const WAVEFORM_MIDPOINT: f32 = 0.5;

/// Capture state machine: Idle -> Recording <-> Paused -> Idle (via stop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Paused,
}

impl CaptureState {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Recording => "recording",
            CaptureState::Paused => "paused",
        }
    }
}

/// Result of a finished capture: one encoded WAV artifact plus its
/// active duration (time spent recording, pauses excluded).
#[derive(Debug, Clone)]
pub struct FinalizedRecording {
    pub wav_bytes: Vec<u8>,
    pub duration_secs: f64,
    pub sample_rate: u32,
}

/// Owns the single active input stream and accumulates samples until `stop()`.
///
/// Duration accounting is sample-based: samples accrue only while the state is
/// `Recording`, so pauses never count toward the final duration. The engine is
/// driven by `poll()`, called from the telemetry scheduler.
pub struct AudioCaptureEngine {
    host: Arc<dyn AudioHost>,
    state: CaptureState,
    stream: Option<Box<dyn InputStream>>,
    samples: Vec<i16>,
    sample_rate: u32,
    meter: f32,
    peaks: Vec<f32>,
}

impl AudioCaptureEngine {
    pub fn new(host: Arc<dyn AudioHost>) -> Self {
        Self {
            host,
            state: CaptureState::Idle,
            stream: None,
            samples: Vec::new(),
            sample_rate: 0,
            meter: 0.0,
            peaks: Vec::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Acquire the named device and begin accumulating samples.
    ///
    /// Fails fast with `DeviceUnavailable` if this engine already holds a
    /// stream; the in-flight capture is left untouched.
    pub fn start(&mut self, device_id: &str) -> Result<()> {
        if self.state != CaptureState::Idle {
            return Err(LecternError::DeviceUnavailable(format!(
                "capture already active (state: {})",
                self.state.name()
            )));
        }

        // Nothing is allocated until open succeeds, so a failed open
        // leaves the engine fully idle.
        let stream = self.host.open(device_id)?;

        info!("Capture started on device: {}", device_id);

        self.sample_rate = stream.sample_rate();
        self.stream = Some(stream);
        self.samples.clear();
        self.peaks.clear();
        self.meter = 0.0;
        self.state = CaptureState::Recording;

        Ok(())
    }

    /// Suspend accumulation. The stream stays held so `resume()` is cheap.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != CaptureState::Recording {
            return Err(LecternError::InvalidTransition {
                from: self.state.name(),
                to: "paused",
            });
        }
        self.state = CaptureState::Paused;
        info!("Capture paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.state != CaptureState::Paused {
            return Err(LecternError::InvalidTransition {
                from: self.state.name(),
                to: "recording",
            });
        }
        self.state = CaptureState::Recording;
        info!("Capture resumed");
        Ok(())
    }

    /// Drain the device buffer. While recording the samples are accumulated
    /// and telemetry updated; while paused the read is discarded so the
    /// device buffer never backs up.
    pub fn poll(&mut self) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };

        let buf = stream.read()?;

        if self.state != CaptureState::Recording || buf.is_empty() {
            return Ok(());
        }

        let peak = buf
            .iter()
            .map(|&s| (s as i32).unsigned_abs())
            .max()
            .unwrap_or(0) as f32
            / i16::MAX as f32;
        self.meter = peak.clamp(0.0, 1.0);

        self.peaks.push(self.meter);
        if self.peaks.len() > WAVEFORM_BINS {
            let drop = self.peaks.len() - WAVEFORM_BINS;
            self.peaks.drain(..drop);
        }

        self.samples.extend_from_slice(&buf);
        Ok(())
    }

    /// Current input level in [0, 1]. Paused captures report a fixed 0
    /// rather than the last live sample.
    pub fn meter(&self) -> f32 {
        match self.state {
            CaptureState::Recording => self.meter,
            _ => 0.0,
        }
    }

    /// Fixed-length sequence of recent peak amplitudes for visualization.
    /// Paused captures report a flat midpoint line.
    pub fn waveform(&self) -> Vec<f32> {
        match self.state {
            CaptureState::Recording => {
                let mut wave = vec![0.0; WAVEFORM_BINS - self.peaks.len().min(WAVEFORM_BINS)];
                wave.extend_from_slice(&self.peaks);
                wave
            }
            CaptureState::Paused => vec![WAVEFORM_MIDPOINT; WAVEFORM_BINS],
            CaptureState::Idle => vec![0.0; WAVEFORM_BINS],
        }
    }

    /// Seconds of audio accumulated so far (active recording time only).
    pub fn elapsed_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Release the device, encode everything accumulated into one WAV
    /// artifact, and return to `Idle`.
    ///
    /// The stream is dropped before encoding, so the device is released on
    /// every exit path including encode failure.
    pub fn stop(&mut self) -> Result<FinalizedRecording> {
        if self.state == CaptureState::Idle {
            return Err(LecternError::InvalidTransition {
                from: "idle",
                to: "stopped",
            });
        }

        drop(self.stream.take());
        self.state = CaptureState::Idle;
        self.meter = 0.0;
        self.peaks.clear();

        let samples = std::mem::take(&mut self.samples);
        let sample_rate = self.sample_rate;
        let duration_secs = samples.len() as f64 / sample_rate as f64;

        let wav_bytes = encode_wav(&samples, sample_rate)?;

        info!(
            "Capture stopped: {:.1}s of audio, {} bytes encoded",
            duration_secs,
            wav_bytes.len()
        );

        Ok(FinalizedRecording {
            wav_bytes,
            duration_secs,
            sample_rate,
        })
    }
}

/// Encode mono i16 samples as an in-memory WAV file.
fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| LecternError::Encode(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| LecternError::Encode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| LecternError::Encode(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
