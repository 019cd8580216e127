use super::engine::{AudioCaptureEngine, CaptureState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// One telemetry sample pushed to listeners each scheduler tick.
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub state: CaptureState,
    /// Input level in [0, 1]
    pub meter: f32,
    /// Recent peak amplitudes, fixed length
    pub waveform: Vec<f32>,
    /// Active recording time so far, pauses excluded
    pub elapsed_secs: f64,
}

impl Telemetry {
    fn idle() -> Self {
        Self {
            state: CaptureState::Idle,
            meter: 0.0,
            waveform: Vec::new(),
            elapsed_secs: 0.0,
        }
    }
}

/// Drive the engine at a fixed cadence and publish telemetry to listeners.
///
/// The scheduler owns the periodic `poll()`; listeners only ever see data,
/// never the engine itself. The task ends when the engine returns to `Idle`
/// (capture stopped) or every listener is gone.
pub fn spawn_telemetry(
    engine: Arc<Mutex<AudioCaptureEngine>>,
    period: Duration,
) -> (JoinHandle<()>, watch::Receiver<Telemetry>) {
    let (tx, rx) = watch::channel(Telemetry::idle());

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        info!("Telemetry task started ({}ms period)", period.as_millis());

        loop {
            ticker.tick().await;

            let sample = {
                let mut engine = engine.lock().await;
                if let Err(e) = engine.poll() {
                    warn!("Telemetry poll failed: {}", e);
                }
                Telemetry {
                    state: engine.state(),
                    meter: engine.meter(),
                    waveform: engine.waveform(),
                    elapsed_secs: engine.elapsed_secs(),
                }
            };

            let stopped = sample.state == CaptureState::Idle;
            if tx.send(sample).is_err() || stopped {
                break;
            }
        }

        info!("Telemetry task stopped");
    });

    (handle, rx)
}
