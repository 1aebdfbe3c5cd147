//! Daemon orchestration -- assembly and lifecycle management.
//!
//! The [`Orchestrator`] loads configuration, opens the database, builds the
//! pattern registry and the collector, and runs until a shutdown signal.
//!
//! # Startup Order
//!
//! 1. Metrics recorder (if enabled)
//! 2. Database (schema setup)
//! 3. Pattern registry (built-ins, `routers_file`, `[routers]`)
//! 4. Collector (receivers, message loop, flush and scan tickers)
//!
//! # Shutdown
//!
//! The collector stops its receivers first and then stores whatever is
//! still buffered, so no accepted event is lost on SIGTERM/SIGINT.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::time::MissedTickBehavior;

use dnsstats_collector::{
    AddressResolver, Collector, CollectorSettings, PatternRegistry, PingProber, SystemNeighbors,
};
use dnsstats_core::config::DnsStatsConfig;
use dnsstats_core::pipeline::{HealthStatus, Pipeline};
use dnsstats_storage::Database;

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status};
use crate::metrics_server;

/// Interval between health log entries while running.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: DnsStatsConfig,
    /// Shared database handle (also the collector's query store).
    database: Database,
    /// `None` when `[collector] enabled = false`.
    collector: Option<Collector>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from `config_path` and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read, parsed or validated
    /// - The database cannot be opened
    /// - A source references an unknown pattern
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = DnsStatsConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: DnsStatsConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let database = Database::open(&config.database.path)
            .map_err(|e| anyhow::anyhow!("failed to open database: {}", e))?;

        let collector = if config.collector.enabled {
            Some(build_collector(&config, &database)?)
        } else {
            tracing::warn!("collector disabled in configuration");
            None
        };

        tracing::info!(
            database = %config.database.path,
            collector = collector.is_some(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            database,
            collector,
            start_time: Instant::now(),
        })
    }

    /// Start the collector and block until a shutdown signal is received.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let shutdown = wait_for_shutdown_signal();
        tokio::pin!(shutdown);

        let mut health_interval = tokio::time::interval(HEALTH_LOG_INTERVAL);
        health_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("entering main event loop");
        let signal = loop {
            tokio::select! {
                signal = &mut shutdown => break signal?,
                _ = health_interval.tick() => self.log_health().await,
            }
        };
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown().await
    }

    /// Start the collector if it is enabled.
    pub async fn start(&mut self) -> Result<()> {
        if let Some(collector) = self.collector.as_mut() {
            collector
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start collector: {}", e))?;
        }
        Ok(())
    }

    /// Stop the collector and store the remaining buffered events.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(collector) = self.collector.as_mut() {
            tracing::info!("stopping collector");
            collector
                .stop()
                .await
                .map_err(|e| anyhow::anyhow!("failed to stop collector: {}", e))?;
        }
        tracing::info!("dns-stats shut down");
        Ok(())
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let collector_status = match &self.collector {
            Some(collector) => collector.health_check().await,
            None => HealthStatus::Healthy,
        };
        let storage_status = match self.database.count("queries") {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        };

        let modules = vec![
            ModuleHealth {
                name: "collector".to_owned(),
                enabled: self.collector.is_some(),
                status: collector_status,
            },
            ModuleHealth {
                name: "storage".to_owned(),
                enabled: true,
                status: storage_status,
            },
        ];

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs: self.start_time.elapsed().as_secs(),
            modules,
        }
    }

    async fn log_health(&self) {
        let health = self.health().await;
        match &health.status {
            HealthStatus::Healthy => {
                tracing::debug!(uptime_secs = health.uptime_secs, "daemon healthy");
            }
            HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
                tracing::warn!(
                    uptime_secs = health.uptime_secs,
                    reason = %reason,
                    "daemon health check failed"
                );
            }
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &DnsStatsConfig {
        &self.config
    }

    /// Get a reference to the database handle.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Get the collector, if enabled.
    pub fn collector(&self) -> Option<&Collector> {
        self.collector.as_ref()
    }
}

/// Build the pattern registry: built-ins, then `routers_file`, then `[routers]`.
///
/// Later sources override earlier ones with the same name.
pub fn build_registry(config: &DnsStatsConfig) -> Result<PatternRegistry> {
    let mut registry = PatternRegistry::with_builtins();

    if let Some(path) = &config.routers_file {
        registry
            .load_json_file(path)
            .map_err(|e| anyhow::anyhow!("failed to load routers file: {}", e))?;
    }

    let inline = registry.register_all(&config.routers);
    if !config.routers.is_empty() {
        tracing::info!(
            registered = inline,
            total = config.routers.len(),
            "registered inline patterns"
        );
    }

    tracing::info!(patterns = %registry.registered(), "pattern registry ready");
    Ok(registry)
}

fn build_collector(config: &DnsStatsConfig, database: &Database) -> Result<Collector> {
    let settings = CollectorSettings::from_core(config)
        .map_err(|e| anyhow::anyhow!("invalid collector settings: {}", e))?;
    let registry = build_registry(config)?;

    let builder = Collector::builder()
        .settings(settings)
        .registry(Arc::new(registry))
        .store(Arc::new(database.clone()));

    let builder = if config.arp.enabled {
        let resolver = AddressResolver::new(
            SystemNeighbors::new(&config.arp.table_path),
            PingProber::new(Duration::from_secs(config.arp.probe_timeout_secs)),
        );
        builder.resolver(Arc::new(resolver))
    } else {
        tracing::info!("address resolution disabled, hardware addresses will be zero");
        builder
    };

    builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build collector: {}", e))
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
