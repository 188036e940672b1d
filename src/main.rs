//! PlcWatch - Main Entry Point
//!
//! Command-line monitor that connects to an acquisition service, arms a tag
//! list and prints live values until stopped.

use anyhow::{bail, Context};
use clap::Parser;
use plcwatch_rs::{
    clock::SystemClock,
    config::{AppConfig, AppState, SinkMode},
    session::{trend_capacity, SampleSink, Session, SessionEvent, SessionState, TrendBuffer},
    transport::{Transport, WebSocketTransport},
    types::TagValue,
    worker::{SessionHandle, SessionWorker, WorkerMessage},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "plcwatch", version, about = "Live PLC tag monitor")]
struct Args {
    /// Config file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// PLC IP address (defaults to the config, then the last used target)
    #[arg(long)]
    host: Option<String>,

    /// Controller slot
    #[arg(long)]
    slot: Option<String>,

    /// Acquisition service URL
    #[arg(long)]
    url: Option<String>,

    /// Tag to watch (repeat for several tags)
    #[arg(short, long = "tag")]
    tags: Vec<String>,

    /// Refresh rate in milliseconds
    #[arg(long)]
    rate: Option<u64>,

    /// Trend window in milliseconds
    #[arg(long)]
    duration: Option<u64>,

    /// Keep only the latest value instead of a trend window
    #[arg(long)]
    latest_only: bool,

    /// Use the built-in simulated service instead of connecting to one
    #[cfg(feature = "mock-service")]
    #[arg(long)]
    simulate: bool,

    /// Stop after this many seconds
    #[arg(long)]
    run_for: Option<u64>,

    /// Write the final trend window to a CSV file
    #[arg(long)]
    export: Option<PathBuf>,
}

impl Args {
    fn simulate(&self) -> bool {
        #[cfg(feature = "mock-service")]
        {
            self.simulate
        }
        #[cfg(not(feature = "mock-service"))]
        {
            false
        }
    }

    /// Command-line values win over the config file
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.connection.host = host.clone();
        }
        if let Some(slot) = &self.slot {
            config.connection.slot = slot.clone();
        }
        if let Some(url) = &self.url {
            config.connection.server_url = url.clone();
        }
        if !self.tags.is_empty() {
            config.acquisition.tags = self.tags.clone();
        }
        if let Some(rate) = self.rate {
            config.acquisition.refresh_rate_ms = rate;
        }
        if let Some(duration) = self.duration {
            config.acquisition.duration_ms = duration;
        }
        if self.latest_only {
            config.acquisition.sink = SinkMode::LatestOnly;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {:?}", path))?,
        None => AppConfig::default(),
    };
    args.apply_to(&mut config);
    config.validate()?;

    // Initialize logging
    let _log_guard = init_logging(&config);

    tracing::info!("Starting PlcWatch");

    let mut app_state = AppState::load_or_default();
    if config.connection.host.is_empty() {
        if let Some(last) = app_state.last_target() {
            tracing::info!("Using last connection target {}", last);
            config.connection.host = last.host;
            config.connection.slot = last.slot;
        } else if args.simulate() {
            config.connection.host = "127.0.0.1".to_string();
        } else {
            bail!("no PLC host given; pass --host or set connection.host in the config");
        }
    }

    if args.simulate() && config.acquisition.tags.is_empty() {
        config.acquisition.tags = ["Motor_Speed", "Tank_Level", "Pump_Running"]
            .into_iter()
            .map(String::from)
            .collect();
    }

    let target = config.connection.target();
    let (transport, simulator) = build_transport(&args, &config);
    let session = Session::from_config(&config, transport, Arc::new(SystemClock));
    let (worker, handle) = SessionWorker::new(session);
    let worker_thread = std::thread::spawn(move || worker.run());

    handle.connect(target.clone());
    let outcome = monitor(&handle, &config, args.run_for.map(Duration::from_secs));

    tracing::info!("Shutting down...");
    handle.shutdown();
    if worker_thread.join().is_err() {
        tracing::error!("Session worker panicked");
    }
    drop(simulator);

    let outcome = outcome?;
    if outcome.connected {
        app_state.add_recent_target(&target);
        if let Err(e) = app_state.save() {
            tracing::warn!("Failed to save app state: {}", e);
        }
    }

    if let (Some(path), Some(trend)) = (&args.export, &outcome.trend) {
        std::fs::write(path, trend.to_csv()).with_context(|| format!("writing {:?}", path))?;
        println!("Wrote {} samples to {}", trend.len(), path.display());
    }

    Ok(())
}

fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default_filter = config
        .logging
        .filter
        .clone()
        .unwrap_or_else(|| "info,plcwatch_rs=debug".to_string());

    let (file_layer, guard) = match config.logging.resolved_log_dir() {
        Some(dir) if config.logging.log_to_file => {
            let appender = tracing_appender::rolling::daily(dir, "plcwatch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

#[cfg(feature = "mock-service")]
type Simulator = Option<plcwatch_rs::transport::SimulatedServiceHandle>;
#[cfg(not(feature = "mock-service"))]
type Simulator = Option<()>;

fn build_transport(args: &Args, config: &AppConfig) -> (Box<dyn Transport>, Simulator) {
    #[cfg(feature = "mock-service")]
    {
        if args.simulate() {
            use plcwatch_rs::transport::{channel_pair, SimulatedService};

            tracing::info!("Using simulated acquisition service");
            let (transport, endpoint) = channel_pair();
            let handle = SimulatedService::new(endpoint).with_demo_tags().spawn();
            return (Box::new(transport), Some(handle));
        }
    }

    let _ = args;
    (
        Box::new(WebSocketTransport::new(config.connection.server_url.clone())),
        None,
    )
}

struct Outcome {
    connected: bool,
    trend: Option<TrendBuffer>,
}

/// Print session activity until the run ends
fn monitor(
    handle: &SessionHandle,
    config: &AppConfig,
    run_for: Option<Duration>,
) -> anyhow::Result<Outcome> {
    let started = Instant::now();
    let mut connected = false;
    let mut tag_names: Vec<String> = Vec::new();
    // Local mirror of the window for export
    let mut trend: Option<TrendBuffer> = None;

    loop {
        if run_for.is_some_and(|limit| started.elapsed() >= limit) {
            return Ok(Outcome { connected, trend });
        }

        let Some(msg) = handle.recv_timeout(Duration::from_millis(200)) else {
            continue;
        };

        match msg {
            WorkerMessage::Event(SessionEvent::StateChanged { from, to }) => {
                println!("[{}] {} -> {}", stamp(), from, to);
                match (from, to) {
                    (SessionState::Connecting, SessionState::Connected) => {
                        connected = true;
                        handle.start(config.acquisition.params());
                    }
                    (SessionState::Connecting, SessionState::Idle) => {
                        bail!("could not connect to {}", config.connection.target());
                    }
                    (SessionState::Arming, SessionState::Connected) => {
                        bail!("could not arm tag list");
                    }
                    (SessionState::Streaming, SessionState::Stopped) => {
                        return Ok(Outcome { connected, trend });
                    }
                    _ => {}
                }
            }
            WorkerMessage::Event(SessionEvent::Status(Some(status))) => {
                println!("[{}] status: {}", stamp(), status);
            }
            WorkerMessage::Event(SessionEvent::Status(None)) => {}
            WorkerMessage::Event(SessionEvent::KnownTags(tags)) => {
                tracing::info!("Controller exposes {} tags", tags.len());
            }
            WorkerMessage::Event(SessionEvent::TagsArmed(descriptors)) => {
                tag_names = descriptors.iter().map(|d| d.name.clone()).collect();
                for d in &descriptors {
                    println!(
                        "  {:>3} {:<24} {:<8} {}",
                        d.index,
                        d.name,
                        d.data_type.as_deref().unwrap_or("?"),
                        d.value
                    );
                }
                if config.acquisition.sink == SinkMode::Trend {
                    let capacity = trend_capacity(
                        config.acquisition.duration_ms,
                        config.acquisition.refresh_rate_ms,
                    );
                    trend = Some(TrendBuffer::new(&tag_names, capacity));
                }
            }
            WorkerMessage::Event(SessionEvent::Sample {
                timestamp_ms,
                values,
            }) => {
                println!("[{}] {}", stamp(), format_sample(&tag_names, &values));
                if let Some(trend) = trend.as_mut() {
                    trend.push(timestamp_ms, &values);
                }
            }
            WorkerMessage::Event(SessionEvent::TagsCleared) => {}
            WorkerMessage::Event(SessionEvent::Stats(stats)) => {
                tracing::debug!(
                    "{} samples, {:.1} Hz, {:.1}% ok",
                    stats.samples_applied,
                    stats.effective_sample_rate,
                    stats.success_rate()
                );
            }
            WorkerMessage::CommandError { command, error } => {
                bail!("{} failed: {}", command, error);
            }
            WorkerMessage::TransportError(error) => {
                eprintln!("[{}] transport: {}", stamp(), error);
            }
            WorkerMessage::Shutdown => return Ok(Outcome { connected, trend }),
        }
    }
}

fn stamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

fn format_sample(names: &[String], values: &[TagValue]) -> String {
    names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("  ")
}
