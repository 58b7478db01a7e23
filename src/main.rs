//! Propagation Monitoring Service - Main Daemon
//!
//! Periodically fetches the solar-terrestrial XML feed and:
//! 1. Parses it into a snapshot of band and VHF conditions
//! 2. Compares it with the previous snapshot
//! 3. Notifies about changes in the slots the user tracks
//! 4. Optionally serves the state over HTTP
//!
//! Usage:
//!   cargo run --release                          # Start with settings from propmon.toml
//!   cargo run --release -- --endpoint 8080       # Also serve the HTTP endpoint
//!   cargo run --release -- --once                # One refresh, print the state, exit
//!
//! Environment:
//!   PROPMON_FEED_URL, PROPMON_REFRESH_MINUTES, PROPMON_ENDPOINT_PORT
//!   RUST_LOG - log filter (default: info)

use clap::Parser;
use propmon_service::config::{self, Settings};
use propmon_service::daemon::{CycleOutcome, RefreshScheduler};
use propmon_service::endpoint;
use propmon_service::ingest::feed::HttpFetcher;
use propmon_service::model::format_local;
use propmon_service::monitor::{RefreshState, StateStore};
use propmon_service::notify::{DesktopNotifier, LogNotifier, Notifier};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "propmon", version, about = "Propagation feed monitor")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Serve the HTTP endpoint on this port
    #[arg(long)]
    endpoint: Option<u16>,

    /// Refresh interval in minutes (10-1440)
    #[arg(long)]
    interval_minutes: Option<u64>,

    /// Run a single refresh, print the result and exit
    #[arg(long)]
    once: bool,

    /// Log notifications instead of showing desktop notifications
    #[arg(long)]
    no_desktop: bool,
}

fn main() {
    let cli = Cli::parse();

    println!("📡 Propagation Monitoring Service");
    println!("=================================\n");

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match load(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("\n❌ Configuration error: {}\n", e);
            process::exit(1);
        }
    };

    let fetcher = match HttpFetcher::new(settings.request_timeout()) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            eprintln!("\n❌ Failed to build HTTP client: {}\n", e);
            process::exit(1);
        }
    };

    let notifier: Arc<dyn Notifier> = if settings.desktop_notifications {
        Arc::new(DesktopNotifier::new(settings.notification_timeout_ms))
    } else {
        Arc::new(LogNotifier)
    };

    let store = Arc::new(StateStore::new());
    let scheduler = Arc::new(RefreshScheduler::new(
        store.clone(),
        Arc::new(fetcher),
        notifier,
        Arc::new(settings.clone()),
    ));

    if cli.once {
        let outcome = scheduler.run_cycle();
        print_state(&store.state());
        if let CycleOutcome::Failure { .. } = outcome {
            process::exit(1);
        }
        return;
    }

    // Start HTTP endpoint if requested (in background thread)
    if let Some(port) = settings.endpoint_port {
        let endpoint_scheduler = scheduler.clone();
        std::thread::spawn(move || {
            if let Err(e) = endpoint::start_endpoint_server(port, endpoint_scheduler) {
                log::error!("Endpoint server error: {}", e);
            }
        });
    }

    let updates = store.subscribe();

    println!("🔄 Starting refresh loop...");
    println!("   Feed: {}", settings.feed_url);
    println!("   Refresh interval: {} minutes", settings.refresh_interval_minutes);
    println!("   Press Ctrl+C to stop\n");

    scheduler.trigger_immediate_fetch();
    if let Err(e) = scheduler.start(scheduler.refresh_interval()) {
        eprintln!("\n❌ Failed to start refresh timer: {}\n", e);
        process::exit(1);
    }

    for state in updates {
        if state.is_loading {
            continue;
        }
        match (&state.last_error, state.last_success) {
            (Some(error), _) => log::warn!("Feed unavailable: {}", error),
            (None, Some(at)) => log::info!("State updated, last success {}", format_local(at)),
            (None, None) => {}
        }
    }
}

/// Settings from file and environment, then command-line overrides.
fn load(cli: &Cli) -> Result<Settings, config::ConfigError> {
    let mut settings = config::load_settings(&cli.config)?;

    if let Some(port) = cli.endpoint {
        settings.endpoint_port = Some(port);
    }
    if let Some(minutes) = cli.interval_minutes {
        settings.refresh_interval_minutes = minutes;
    }
    if cli.no_desktop {
        settings.desktop_notifications = false;
    }

    settings.validate()?;
    Ok(settings)
}

fn print_state(state: &RefreshState) {
    if let Some(error) = &state.last_error {
        println!("✗ Refresh failed: {}", error);
        return;
    }

    let Some(snapshot) = &state.current_snapshot else {
        println!("No snapshot available");
        return;
    };

    println!("✓ Feed updated: {}", snapshot.updated);
    println!(
        "   Solar flux: {}   A: {}   K: {}   Sunspots: {}",
        snapshot.solar_flux, snapshot.a_index, snapshot.k_index, snapshot.sunspots
    );
    println!("   Geomagnetic field: {}   Signal noise: {}", snapshot.geomag_field, snapshot.signal_noise);

    println!("\n   HF bands:");
    for band in &snapshot.band_conditions {
        let time = band.time_of_day().map_or(band.time.as_str(), |t| t.as_str());
        println!("     {:<10} {:<6} {}", band.band, time, band.condition);
    }

    println!("\n   VHF phenomena:");
    for vhf in &snapshot.vhf_conditions {
        println!("     {:<12} {:<22} {}", vhf.phenomenon, vhf.location, vhf.condition);
    }
}
