//! # Position Uplink Entry Point
//!
//! Wires the sampling pipeline to a simulated session layer so the whole
//! system can run on a workstation without position hardware or a broker.
//!
//! ## Usage
//! `track_uplink [config.json]`. Every field of the JSON file is optional;
//! missing fields keep their build-time defaults. Log level follows `RUST_LOG`
//! (default `info`).
//!
//! ## Threads
//! - **ProduceSamples:** time sync + gate once, then fixed-period sampling.
//! - **PublishSamples:** peek → gate → publish → commit, forever.
//! - **link_agent:** simulated connection/maintenance events; serves the agent
//!   transport or drives the standalone transport's link flag (`transport`).
//! - **control_surface:** console keys (only with `ui_enabled`).
//!
//! ## Outputs
//! - `trace_csv`: per-sample enqueue/drop/delivery events (optional).
//! - `summary_csv`: counters at the end of a bounded run (optional).

use std::{
    env,
    io::{self, BufReader},
    path::PathBuf,
    process,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};
use crossbeam::channel::{Sender, bounded};
use log::{error, info, warn};

use track_uplink::{
    config::TrackerConfig,
    error::TrackerError,
    sim::{LinkSimSettings, spawn_session},
    spawn_producer, spawn_publisher,
    tracking::{
        buffer::SampleBuffer,
        clock::{ClockSync, SignalledSync, SystemClock, SystemClockSync, TimeSource},
        controls::RuntimeControls,
        generator::{SampleGenerator, SimulatedTilt},
        producer::{Producer, ProducerSettings},
    },
    ui::{
        console::spawn_control_surface,
        display::{ConsoleDisplay, ControlLabels, HeadlessDisplay, StatusDisplay},
    },
    uplink::{
        gate::SignalGate,
        publisher::{Publisher, PublisherSettings},
    },
    utils::{
        export::export_summary,
        metrics::{EventRecorder, SharedStats, TrackerStats},
    },
};

const CLIENT_ID_ENV: &str = "TRACKER_CLIENT_ID";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("=== POSITION UPLINK START ===");

    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
}

fn load_config() -> Result<TrackerConfig, TrackerError> {
    match env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Ok(TrackerConfig::load(&path)?)
        }
        None => {
            let cfg = TrackerConfig::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }
}

fn client_id() -> String {
    env::var(CLIENT_ID_ENV).unwrap_or_else(|_| format!("tracker-{:06x}", rand::random::<u32>() & 0xff_ffff))
}

fn run() -> Result<(), TrackerError> {
    let cfg = load_config()?;
    let client_id = client_id();
    let capacity = cfg.buffer_capacity();

    info!(
        "Sample buffer depth: {} items ({} minutes at {} ms)",
        capacity, cfg.buffer_duration_min, cfg.period_ms
    );

    // ========================================================================
    // Shared state
    // ========================================================================
    let gate = Arc::new(SignalGate::new());
    let controls = Arc::new(RuntimeControls::new(cfg.mock_default, cfg.scale_default, cfg.paused_default));
    let buffer = Arc::new(SampleBuffer::new(capacity));
    let stats: SharedStats = Arc::new(TrackerStats::default());
    let recorder = EventRecorder::new();

    let exporter = match &cfg.trace_csv {
        Some(path) => match recorder.start_exporter(path.clone()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Event trace disabled, cannot create {:?}: {}", path, e);
                None
            }
        },
        None => None,
    };

    // ========================================================================
    // Session layer (simulated)
    // ========================================================================
    let (clock_sync, time_signal): (Box<dyn ClockSync>, Option<Sender<()>>) = match cfg.time_source {
        TimeSource::System => (Box::new(SystemClockSync), None),
        TimeSource::Session => {
            let (tx, rx) = bounded(1);
            (Box::new(SignalledSync::new(rx)), Some(tx))
        }
    };

    info!("[Main] transport: {:?}, time source: {:?}", cfg.transport, cfg.time_source);
    let (transport, _session) = spawn_session(
        cfg.transport,
        &client_id,
        gate.clone(),
        LinkSimSettings::default(),
        time_signal,
    )
    .map_err(|source| TrackerError::Spawn { name: "link_agent", source })?;

    // ========================================================================
    // Status display and controls
    // ========================================================================
    let display: Arc<dyn StatusDisplay> = if cfg.ui_enabled {
        Arc::new(ConsoleDisplay::stdout())
    } else {
        Arc::new(HeadlessDisplay)
    };
    display.set_header(&format!("ID: {}", client_id));
    display.add_line("Device Tracking");
    display.set_labels(ControlLabels::from_controls(&controls));

    if cfg.ui_enabled {
        spawn_control_surface(BufReader::new(io::stdin()), controls.clone(), display.clone())
            .map_err(|source| TrackerError::Spawn { name: "control_surface", source })?;
    }

    // ========================================================================
    // Pipeline
    // ========================================================================
    let generator = SampleGenerator::new(
        cfg.generator_params(),
        Box::new(SimulatedTilt::new()),
        Box::new(SystemClock),
        controls.clone(),
    );
    let producer = Producer::new(
        generator,
        buffer.clone(),
        gate.clone(),
        controls.clone(),
        clock_sync,
        ProducerSettings {
            period: cfg.period(),
            oversampling: cfg.oversampling_factor(),
            time_sync_wait: Duration::from_secs(cfg.time_sync_wait_secs),
        },
        stats.clone(),
        recorder.clone(),
    );
    let publisher = Publisher::new(
        buffer.clone(),
        gate.clone(),
        transport,
        PublisherSettings {
            topic: cfg.topic_for(&client_id),
            qos: cfg.qos,
            peek_timeout: Duration::from_millis(cfg.peek_timeout_ms),
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
        },
        stats.clone(),
        recorder.clone(),
    );

    let producer_handle = spawn_producer(producer, &cfg)?;
    let publisher_handle = spawn_publisher(publisher, &cfg)?;
    info!("[Main] publishing to {}", cfg.topic_for(&client_id));

    match cfg.run_for_secs {
        Some(secs) => {
            info!("[Main] running for {} seconds...", secs);
            thread::sleep(Duration::from_secs(secs));

            let snap = stats.snapshot();
            info!(
                "[Main] generated={} enqueued={} dropped={} delivered={} failed_attempts={} buffered={}",
                snap.generated, snap.enqueued, snap.dropped, snap.delivered, snap.failed_attempts, buffer.len()
            );
            if let Some(path) = &cfg.summary_csv {
                export_summary(path, &snap, buffer.len(), capacity);
            }
            recorder.stop_exporter();
            if let Some(handle) = exporter {
                let _ = handle.join();
            }
            info!("=== POSITION UPLINK FINISHED ===");
            // The sampling loops are not cancellable; process exit tears them down.
            process::exit(0);
        }
        None => {
            join_logged(producer_handle);
            join_logged(publisher_handle);
            Ok(())
        }
    }
}

fn join_logged(handle: JoinHandle<()>) {
    let name = handle.thread().name().unwrap_or("worker").to_string();
    if handle.join().is_err() {
        error!("[Main] {} thread join failed", name);
    }
}
