use anyhow::Result;
use chrono::Utc;
use clap::Parser;

use dnsstats_core::config::DnsStatsConfig;
use dnsstats_daemon::cli::DaemonCli;
use dnsstats_daemon::logging::init_tracing;
use dnsstats_daemon::orchestrator::Orchestrator;
use dnsstats_daemon::report;
use dnsstats_storage::Database;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = DnsStatsConfig::from_file(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    config.apply_env_overrides();

    // CLI 오버라이드가 파일과 환경변수보다 우선
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    init_tracing(&config.general)?;

    if let Some(period) = cli.report {
        let db = Database::open(&config.database.path)
            .map_err(|e| anyhow::anyhow!("failed to open database: {}", e))?;
        let output = report::render(&db, &config.report, &period, Utc::now())
            .map_err(|e| anyhow::anyhow!("failed to render report: {}", e))?;
        println!("{output}");
        return Ok(());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "dns-stats starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await
}
