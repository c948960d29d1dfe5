//! agritrace - field terminal for verified product journeys
//!
//! Resolves a product identifier - decoded from the camera feed or typed
//! manually - into its supply-chain journey and renders the transitions.
//!
//! Module structure:
//! - `domain/` - Core value types (ProductJourney, JourneyStep, RasterFrame)
//! - `io/` - Capability seams (Camera, SymbolDecoder, JourneyStore)
//! - `services/` - Scan loop, resolver, and session state machine
//! - `infra/` - Infrastructure (Config)
//!
//! Terminal usage: type a product id to track it manually, type `!scan`
//! to re-arm the camera loop after a result, Ctrl+C to quit.

use agritrace::infra::{Config, RepositoryMode};
use agritrace::io::camera::{CameraScript, ScriptedCamera};
use agritrace::io::decoder::TaggedFrameDecoder;
use agritrace::io::repository::{HttpJourneyStore, JourneyStore, StaticJourneyStore};
use agritrace::services::{ScanSession, ScanSessionState, SessionCommand, SessionSnapshot};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// agritrace - product journey verification terminal
#[derive(Parser, Debug)]
#[command(name = "agritrace", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-frame visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "agritrace starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        camera_facing = %config.camera_facing().as_str(),
        frame_interval_ms = %config.frame_interval_ms(),
        repository_mode = %config.repository_mode().as_str(),
        repository_timeout_ms = %config.repository_timeout_ms(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let store: Arc<dyn JourneyStore> = match config.repository_mode() {
        RepositoryMode::Static => Arc::new(
            StaticJourneyStore::with_demo_journeys()
                .with_lookup_delay(Duration::from_millis(config.static_lookup_delay_ms())),
        ),
        RepositoryMode::Http => Arc::new(HttpJourneyStore::new(
            config.repository_http_base_url(),
            Duration::from_millis(config.repository_timeout_ms()),
        )?),
    };

    // No hardware binding in this terminal build: the camera capability is
    // a scripted feed that eventually presents the configured payload
    let camera = Arc::new(ScriptedCamera::new(CameraScript {
        warmup_ticks: config.camera_warmup_frames(),
        blank_ticks: config.camera_blank_frames(),
        payload: config.camera_script_payload().map(str::to_string),
    }));

    let (session, snapshot_rx) =
        ScanSession::new(&config, camera, Arc::new(TaggedFrameDecoder), store);
    let (command_tx, command_rx) = mpsc::channel(64);

    // Render snapshot transitions (stand-in for the presentation layer)
    let mut render_rx = snapshot_rx;
    tokio::spawn(async move {
        while render_rx.changed().await.is_ok() {
            let snapshot = render_rx.borrow_and_update().clone();
            render(&snapshot);
        }
    });

    // stdin lines are manual identifier submissions
    let stdin_tx = command_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.is_empty() {
                continue;
            }
            let cmd = if line == "!scan" {
                SessionCommand::ScanAnother
            } else {
                SessionCommand::ManualSubmit(line)
            };
            if stdin_tx.send(cmd).await.is_err() {
                break;
            }
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    // Run the session - consumes commands until shutdown
    session.run(command_rx, shutdown_rx).await;

    info!("agritrace shutdown complete");
    Ok(())
}

/// Print one snapshot the way the dashboard would render it
fn render(snapshot: &SessionSnapshot) {
    match &snapshot.state {
        ScanSessionState::Idle => match &snapshot.last_error {
            Some(error) => println!("Lookup failed: {error}. Enter the id again to retry."),
            None => println!("Ready. Enter a product id to track."),
        },
        ScanSessionState::Scanning => {
            println!("Scanning... point the camera at the product QR code.");
        }
        ScanSessionState::Resolving => println!("Looking up journey..."),
        ScanSessionState::Found(journey) => {
            println!("{} - verified journey:", journey.product.name);
            for step in &journey.steps {
                let marker = match step.status {
                    agritrace::domain::StepStatus::Completed => "*",
                    agritrace::domain::StepStatus::Current => ">",
                    agritrace::domain::StepStatus::Pending => ".",
                };
                println!("  {marker} {} - {} ({})", step.title, step.location, step.date);
            }
            println!("Type another id, or !scan to scan the next product.");
        }
        ScanSessionState::NotFound => {
            println!("No journey information found for that product id.");
        }
        ScanSessionState::PermissionDenied => {
            println!("Camera access denied. You can still track by id.");
        }
    }
}
