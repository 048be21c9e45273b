//! Walletcore - wallet and peer subsystems on per-subsystem event handlers.
//!
//! Main entry point: loads configuration, installs logging, runs the
//! handlers against a synthetic event stream and reports their metrics.

mod cli;
mod settings;
mod subsystems;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use walletcore_event::AlarmClock;

use crate::cli::Cli;
use crate::settings::AppConfig;
use crate::subsystems::{PeerEvent, Subsystems, WalletEvent};

/// Initialize tracing: console output, plus daily log files when a log
/// directory is given.
fn init_tracing(log_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("walletcore")
                .filename_suffix("log")
                .max_log_files(7)
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Flushes pending lines at exit.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .with(file_layer)
        .init();

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_dir.as_deref())?;

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(run_ms) = cli.run_ms {
        config.demo.run_ms = run_ms;
    }

    info!("Starting walletcore v{}", env!("CARGO_PKG_VERSION"));
    if !AlarmClock::configure_global(config.events.alarm_clock.clone()) {
        warn!("Alarm clock already created; keeping its configuration");
    }

    let subsystems = Subsystems::new(
        &config.events,
        Duration::from_millis(config.demo.timeout_ms),
    );
    subsystems.start()?;

    let running = Arc::new(AtomicBool::new(true));
    let producer = spawn_producer(&subsystems, &config, running.clone())?;

    thread::sleep(Duration::from_millis(config.demo.run_ms));
    running.store(false, Ordering::Relaxed);
    if producer.join().is_err() {
        warn!("Event producer panicked");
    }

    subsystems.stop();
    report(&subsystems, cli.json)?;
    subsystems.destroy();
    AlarmClock::global().stop();

    info!("Walletcore stopped");
    Ok(())
}

/// Feed both handlers a mix of events until `running` clears or the
/// configured count is reached.
fn spawn_producer(
    subsystems: &Subsystems,
    config: &AppConfig,
    running: Arc<AtomicBool>,
) -> std::io::Result<thread::JoinHandle<()>> {
    let wallet = subsystems.wallet.clone();
    let peers = subsystems.peers.clone();
    let events = config.demo.events;
    let pause = Duration::from_millis(config.demo.run_ms) / (events.max(1) as u32);

    thread::Builder::new()
        .name("event-producer".to_string())
        .spawn(move || {
            for n in 0..events {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                let peer = (n % 8) as u32;
                let result = match n % 5 {
                    0 => wallet.signal_event(WalletEvent::Deposit(100 + n)),
                    1 => wallet.signal_event(WalletEvent::Withdrawal(40 + n % 90)),
                    2 => peers.signal_event(PeerEvent::Connected(peer)),
                    3 => peers.signal_event(PeerEvent::Disconnected(peer)),
                    _ => peers.signal_event(PeerEvent::NewBlock(n)),
                };
                if let Err(e) = result {
                    warn!("Event {} not signalled: {}", n, e);
                }
                thread::sleep(pause);
            }
        })
}

fn report(subsystems: &Subsystems, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let wallet = subsystems.wallet.metrics().snapshot();
    let peers = subsystems.peers.metrics().snapshot();
    let wallet_state = &subsystems.wallet_state;
    let peer_state = &subsystems.peer_state;

    if json {
        let summary = serde_json::json!({
            "wallet": {
                "metrics": wallet,
                "balance": wallet_state.balance.load(Ordering::Relaxed),
                "rejected": wallet_state.rejected.load(Ordering::Relaxed),
                "rescans": wallet_state.rescans.load(Ordering::Relaxed),
                "ticks": wallet_state.ticks.load(Ordering::Relaxed),
            },
            "peers": {
                "metrics": peers,
                "connected": peer_state.connected.lock().len(),
                "height": peer_state.height.load(Ordering::Relaxed),
            },
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for (name, snapshot) in [
        (subsystems.wallet.name(), &wallet),
        (subsystems.peers.name(), &peers),
    ] {
        info!(
            "{}: {} dispatched, {} timeouts, {} cleared, avg {:.1}us",
            name,
            snapshot.events_dispatched,
            snapshot.timeouts_dispatched,
            snapshot.events_cleared,
            snapshot.avg_dispatch_time_us()
        );
    }
    info!(
        "Wallet balance {} after {} rescans and {} ticks; {} peers connected at height {}",
        wallet_state.balance.load(Ordering::Relaxed),
        wallet_state.rescans.load(Ordering::Relaxed),
        wallet_state.ticks.load(Ordering::Relaxed),
        peer_state.connected.lock().len(),
        peer_state.height.load(Ordering::Relaxed)
    );
    Ok(())
}
