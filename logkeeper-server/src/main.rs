// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Logkeeper: access-log ingestion, Kafka → Elasticsearch
//
//  Architecture: one consumer thread + N worker threads around a
//                bounded job queue, upsert-by-ID for idempotence
//  Admin:        axum on dedicated tokio thread (/health, /metrics)
//  Config:       TOML / YAML file + LOGKEEPER_* env overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Context;
use clap::Parser;
use logkeeper_admin::AdminState;
use logkeeper_core::LogkeeperConfig;
use logkeeper_core::config::BrokerConfig;
use logkeeper_observability::PipelineMetrics;
use logkeeper_pipeline::{Broker, Pipeline, PipelineSettings};
use logkeeper_store::{ElasticsearchSink, Sink};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

/// Set by the signal handler.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(name = "logkeeper", version, about = "Logkeeper: access-log ingestion into Elasticsearch")]
struct Cli {
    /// Path to configuration file (.toml, otherwise YAML)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level, overrides `log_level` from the config file
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Config ──
    let config = LogkeeperConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    // ── Tracing ──
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_names(true)
        .init();

    // Installed before any client or thread exists, so an early SIGTERM
    // still goes through the drain below.
    setup_signal_handler();

    info!(version = env!("CARGO_PKG_VERSION"), "Logkeeper starting");
    if cli.config.exists() {
        info!(path = %cli.config.display(), "Config file loaded");
    } else {
        info!(path = %cli.config.display(), "No config file found, using defaults and environment");
    }

    config.validate()?;

    // ── Clients ──
    let sink: Arc<dyn Sink> = Arc::new(
        ElasticsearchSink::new(&config.sink).context("failed to build Elasticsearch sink")?,
    );
    let broker = connect_broker(&config.broker)?;

    // ── Metrics ──
    let metrics = Arc::new(PipelineMetrics::new(config.metrics.enabled)?);

    // ── Pipeline ──
    let settings = PipelineSettings::from_config(&config);
    let pipeline = Pipeline::start(settings, broker, sink, Arc::clone(&metrics))?;

    // ── Admin endpoint on a dedicated tokio thread ──
    if config.admin.enabled {
        let admin_config = config.admin.clone();
        let admin_state = Arc::new(AdminState {
            metrics: Arc::clone(&metrics),
            signal: pipeline.signal(),
        });
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime for admin")?;

        std::thread::Builder::new()
            .name("logkeeper-admin".to_string())
            .spawn(move || {
                rt.block_on(async {
                    if let Err(e) = logkeeper_admin::start_admin(admin_config, admin_state).await {
                        error!(error = %e, "Admin endpoint failed");
                    }
                });
            })
            .context("failed to spawn admin thread")?;
    }

    info!(
        topic = %config.broker.topic,
        index = %config.sink.index,
        "Logkeeper is ready, consuming"
    );

    // ── Graceful shutdown: wait for SIGTERM/SIGINT ──
    while !SHUTDOWN.load(Ordering::Relaxed) {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    info!("Shutdown signal received, draining...");
    pipeline.shutdown();
    let stats = pipeline.wait();

    info!(
        processed = stats.processed,
        indexed = stats.indexed,
        dropped = stats.decode_failures + stats.sink_failures,
        "Logkeeper stopped"
    );
    Ok(())
}

#[cfg(feature = "kafka")]
fn connect_broker(config: &BrokerConfig) -> anyhow::Result<Box<dyn Broker>> {
    let broker = logkeeper_pipeline::KafkaBroker::connect(config)
        .context("failed to create Kafka consumer")?;
    Ok(Box::new(broker))
}

#[cfg(not(feature = "kafka"))]
fn connect_broker(_config: &BrokerConfig) -> anyhow::Result<Box<dyn Broker>> {
    anyhow::bail!("no broker client available: rebuild logkeeper with `--features kafka`")
}

fn setup_signal_handler() {
    // SIGTERM (docker stop) + SIGINT (Ctrl+C)
    for sig in [libc::SIGTERM, libc::SIGINT] {
        unsafe {
            libc::signal(sig, signal_handler as libc::sighandler_t);
        }
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigterm_sets_shutdown_flag_instead_of_terminating() {
        setup_signal_handler();
        assert!(!SHUTDOWN.load(Ordering::Relaxed));

        let rc = unsafe { libc::raise(libc::SIGTERM) };
        assert_eq!(rc, 0);
        assert!(SHUTDOWN.load(Ordering::Relaxed));
    }

    #[test]
    fn cli_defaults_to_config_toml() {
        let cli = Cli::parse_from(["logkeeper"]);
        assert_eq!(cli.config, PathBuf::from("config.toml"));
        assert!(cli.log_level.is_none());
    }
}
