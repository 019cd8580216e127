use anyhow::Result;
use clap::{Parser, Subcommand};
use lectern::audio::{spawn_telemetry, AudioCaptureEngine, SimulatedHost};
use lectern::store::{DomainStore, Event, JsonStateStore};
use lectern::sync::{HttpBackendClient, RetryPolicy, SessionUploadCoordinator};
use lectern::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Parser)]
#[command(name = "lectern", about = "Capture and reconcile academic recordings")]
struct Cli {
    /// Config file path (without extension, per the config crate)
    #[arg(long, default_value = "config/lectern")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a simulated capture end to end
    Record {
        /// Input device to open
        #[arg(long, default_value = "sim")]
        device: String,

        /// Seconds of audio to capture
        #[arg(long, default_value_t = 10)]
        seconds: u64,

        /// Pause after this many seconds (optional)
        #[arg(long)]
        pause_at: Option<u64>,

        /// How long to stay paused
        #[arg(long, default_value_t = 3)]
        pause_for: u64,

        /// Event to file the session under (created if missing)
        #[arg(long, default_value = "Demo Course")]
        event: String,

        /// Session title
        #[arg(long, default_value = "Demo capture")]
        title: String,

        /// Skip the upload; keep the session local
        #[arg(long)]
        offline: bool,
    },

    /// Print stored sessions
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load_or_default(&cli.config);

    let store = Arc::new(Mutex::new(DomainStore::with_persistence(Box::new(
        JsonStateStore::new(&cfg.persistence.state_path),
    ))));

    match cli.command {
        Command::Record {
            device,
            seconds,
            pause_at,
            pause_for,
            event,
            title,
            offline,
        } => {
            record(
                &cfg, store, &device, seconds, pause_at, pause_for, &event, &title, offline,
            )
            .await
        }
        Command::List => list(store).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn record(
    cfg: &Config,
    store: Arc<Mutex<DomainStore>>,
    device: &str,
    seconds: u64,
    pause_at: Option<u64>,
    pause_for: u64,
    event_name: &str,
    title: &str,
    offline: bool,
) -> Result<()> {
    let event_id = ensure_event(&store, event_name).await?;

    let host = Arc::new(SimulatedHost::new(
        cfg.audio.sample_rate,
        (cfg.audio.sample_rate as u64 * cfg.audio.telemetry_period_ms / 1000) as usize,
    ));
    let engine = Arc::new(Mutex::new(AudioCaptureEngine::new(host)));

    engine.lock().await.start(device)?;
    let (telemetry_task, mut telemetry) = spawn_telemetry(
        Arc::clone(&engine),
        Duration::from_millis(cfg.audio.telemetry_period_ms),
    );

    let progress = tokio::spawn(async move {
        while telemetry.changed().await.is_ok() {
            let t = telemetry.borrow().clone();
            info!(
                "[{}] {:>5.1}s  level {:.2}",
                t.state.name(),
                t.elapsed_secs,
                t.meter
            );
        }
    });

    match pause_at {
        Some(at) if at < seconds => {
            tokio::time::sleep(Duration::from_secs(at)).await;
            engine.lock().await.pause()?;
            tokio::time::sleep(Duration::from_secs(pause_for)).await;
            engine.lock().await.resume()?;
            tokio::time::sleep(Duration::from_secs(seconds - at)).await;
        }
        _ => tokio::time::sleep(Duration::from_secs(seconds)).await,
    }

    let recording = engine.lock().await.stop()?;
    telemetry_task.await.ok();
    progress.abort();

    info!(
        "Captured {:.1}s ({} bytes encoded)",
        recording.duration_secs,
        recording.wav_bytes.len()
    );

    if offline {
        info!("Offline mode: skipping upload");
        return Ok(());
    }

    let backend = Arc::new(HttpBackendClient::new(&cfg.backend.base_url));
    let coordinator = SessionUploadCoordinator::new(
        Arc::clone(&store),
        backend,
        RetryPolicy::from_config(&cfg.backend),
        "recordings",
    );

    let session_id = coordinator.submit(recording, &event_id, title).await?;
    info!("Session {} submitted; reconciling in background", session_id);

    // Give reconciliation a chance to finish before the process exits.
    let deadline = Duration::from_millis(
        cfg.backend.poll_interval_ms * (cfg.backend.max_poll_attempts as u64 + 2),
    );
    tokio::time::sleep(deadline).await;

    let store = store.lock().await;
    if let Some(session) = store.session(&session_id) {
        info!("Final status: {:?}", session.status);
    }

    Ok(())
}

async fn ensure_event(store: &Arc<Mutex<DomainStore>>, name: &str) -> Result<String> {
    let mut store = store.lock().await;
    if let Some(event) = store.events().iter().find(|e| e.name == name) {
        return Ok(event.id.clone());
    }
    let event = Event::new(name, "#FF385C");
    let id = event.id.clone();
    store.add_event(event)?;
    Ok(id)
}

async fn list(store: Arc<Mutex<DomainStore>>) -> Result<()> {
    let store = store.lock().await;
    for session in store.sessions() {
        let event_name = store
            .event(&session.event_id)
            .map(|e| e.name.as_str())
            .unwrap_or("?");
        println!(
            "{}  [{:?}] {:>6.1}s  {}  ({})",
            session.id, session.status, session.duration_secs, session.title, event_name
        );
    }
    Ok(())
}
