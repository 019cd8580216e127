// Tests for the capture engine state machine, duration accounting,
// and telemetry neutrality while paused.
//
// The simulated host hands out one second of audio per poll, so driving
// `poll()` N times while recording accumulates exactly N seconds.

use lectern::audio::{
    spawn_telemetry, AudioCaptureEngine, AudioHost, CaptureState, SimulatedHost, WAVEFORM_BINS,
    WAVEFORM_MIDPOINT,
};
use lectern::error::LecternError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const RATE: u32 = 16000;

fn one_second_host() -> Arc<SimulatedHost> {
    Arc::new(SimulatedHost::new(RATE, RATE as usize))
}

#[test]
fn duration_counts_recording_time_only() {
    let host = one_second_host();
    let mut engine = AudioCaptureEngine::new(host);

    engine.start("sim").unwrap();

    // 5 seconds recording
    for _ in 0..5 {
        engine.poll().unwrap();
    }

    // 3 seconds paused: reads are drained but discarded
    engine.pause().unwrap();
    for _ in 0..3 {
        engine.poll().unwrap();
    }

    // 4 more seconds recording
    engine.resume().unwrap();
    for _ in 0..4 {
        engine.poll().unwrap();
    }

    let recording = engine.stop().unwrap();
    assert!((recording.duration_secs - 9.0).abs() < 1e-9);
    assert_eq!(recording.sample_rate, RATE);
    assert_eq!(&recording.wav_bytes[..4], b"RIFF");
}

#[test]
fn paused_telemetry_is_neutral() {
    let host = one_second_host();
    let mut engine = AudioCaptureEngine::new(host);

    engine.start("sim").unwrap();
    engine.poll().unwrap();
    assert!(engine.meter() > 0.0, "live meter should register the tone");

    engine.pause().unwrap();
    assert_eq!(engine.meter(), 0.0);
    assert_eq!(engine.waveform(), vec![WAVEFORM_MIDPOINT; WAVEFORM_BINS]);

    // A poll while paused must not leak live samples into telemetry
    engine.poll().unwrap();
    assert_eq!(engine.meter(), 0.0);
    assert_eq!(engine.waveform(), vec![WAVEFORM_MIDPOINT; WAVEFORM_BINS]);

    engine.resume().unwrap();
    engine.poll().unwrap();
    assert!(engine.meter() > 0.0);
}

#[test]
fn waveform_has_fixed_length_in_every_state() {
    let host = one_second_host();
    let mut engine = AudioCaptureEngine::new(host);

    assert_eq!(engine.waveform().len(), WAVEFORM_BINS);

    engine.start("sim").unwrap();
    engine.poll().unwrap();
    assert_eq!(engine.waveform().len(), WAVEFORM_BINS);

    engine.pause().unwrap();
    assert_eq!(engine.waveform().len(), WAVEFORM_BINS);
}

#[test]
fn second_start_fails_busy_and_first_is_untouched() {
    let host = one_second_host();
    let mut first = AudioCaptureEngine::new(Arc::clone(&host) as Arc<dyn AudioHost>);
    let mut second = AudioCaptureEngine::new(host as Arc<dyn AudioHost>);

    first.start("sim").unwrap();
    first.poll().unwrap();

    let err = second.start("sim").unwrap_err();
    assert!(matches!(err, LecternError::DeviceUnavailable(_)));
    assert_eq!(second.state(), CaptureState::Idle);

    // First capture keeps recording as if nothing happened
    assert_eq!(first.state(), CaptureState::Recording);
    first.poll().unwrap();
    let recording = first.stop().unwrap();
    assert!((recording.duration_secs - 2.0).abs() < 1e-9);
}

#[test]
fn start_while_already_recording_fails_fast() {
    let host = one_second_host();
    let mut engine = AudioCaptureEngine::new(host);

    engine.start("sim").unwrap();
    let err = engine.start("sim").unwrap_err();
    assert!(matches!(err, LecternError::DeviceUnavailable(_)));
    assert_eq!(engine.state(), CaptureState::Recording);
}

#[test]
fn unknown_device_leaves_engine_idle() {
    let host = one_second_host();
    let mut engine = AudioCaptureEngine::new(host);

    let err = engine.start("no-such-mic").unwrap_err();
    assert!(matches!(err, LecternError::DeviceUnavailable(_)));
    assert_eq!(engine.state(), CaptureState::Idle);

    // A failed start held nothing, so a valid start still works
    engine.start("sim").unwrap();
}

#[test]
fn pause_and_resume_valid_only_in_their_states() {
    let host = one_second_host();
    let mut engine = AudioCaptureEngine::new(host);

    assert!(matches!(
        engine.pause().unwrap_err(),
        LecternError::InvalidTransition { .. }
    ));
    assert!(matches!(
        engine.resume().unwrap_err(),
        LecternError::InvalidTransition { .. }
    ));
    assert!(matches!(
        engine.stop().unwrap_err(),
        LecternError::InvalidTransition { .. }
    ));

    engine.start("sim").unwrap();
    assert!(engine.resume().is_err(), "resume is invalid while recording");
    engine.pause().unwrap();
    assert!(engine.pause().is_err(), "pause is invalid while paused");
}

#[tokio::test]
async fn telemetry_task_publishes_samples_and_ends_with_the_capture() {
    // Small chunks so several polls land within the test window
    let host = Arc::new(SimulatedHost::new(RATE, 160));
    let engine = Arc::new(Mutex::new(AudioCaptureEngine::new(host)));

    engine.lock().await.start("sim").unwrap();
    let (task, mut telemetry) = spawn_telemetry(Arc::clone(&engine), Duration::from_millis(5));

    // The scheduler pushes live samples: recording state, a non-zero meter,
    // and elapsed time that advances with accumulation
    let mut saw_live_sample = false;
    for _ in 0..50 {
        telemetry.changed().await.unwrap();
        let sample = telemetry.borrow().clone();
        if sample.state == CaptureState::Recording
            && sample.meter > 0.0
            && sample.elapsed_secs > 0.0
        {
            assert_eq!(sample.waveform.len(), WAVEFORM_BINS);
            saw_live_sample = true;
            break;
        }
    }
    assert!(saw_live_sample, "expected a live telemetry sample");

    // Stopping the capture ends the task; its final sample reports Idle
    engine.lock().await.stop().unwrap();
    task.await.unwrap();
    assert_eq!(telemetry.borrow().state, CaptureState::Idle);
}

#[test]
fn stop_from_paused_finalizes_and_releases() {
    let host = one_second_host();
    let mut engine = AudioCaptureEngine::new(Arc::clone(&host) as Arc<dyn AudioHost>);

    engine.start("sim").unwrap();
    engine.poll().unwrap();
    engine.pause().unwrap();

    let recording = engine.stop().unwrap();
    assert!((recording.duration_secs - 1.0).abs() < 1e-9);
    assert_eq!(engine.state(), CaptureState::Idle);

    // Device released: a fresh capture can reacquire it
    let mut next = AudioCaptureEngine::new(host as Arc<dyn AudioHost>);
    next.start("sim").unwrap();
}
