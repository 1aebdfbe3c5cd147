//! CLI argument definitions for the dns-stats daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// DNS query statistics collector.
///
/// Receives firewall syslog messages from home routers, records which
/// device queried which domain, and prints periodic reports.
#[derive(Parser, Debug)]
#[command(name = "dns-stats")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to dns-stats.toml configuration file.
    #[arg(short, long, default_value = "/etc/dns-stats/dns-stats.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Print a report to stdout and exit.
    ///
    /// PERIOD is one of day, week, month, year or a duration such as 6h.
    #[arg(long, value_name = "PERIOD")]
    pub report: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::try_parse_from(["dns-stats"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/dns-stats/dns-stats.toml"));
        assert!(!cli.validate);
        assert!(cli.report.is_none());
    }

    #[test]
    fn report_and_overrides() {
        let cli = DaemonCli::try_parse_from([
            "dns-stats",
            "-c",
            "./dns-stats.toml",
            "--log-format",
            "pretty",
            "--report",
            "week",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("./dns-stats.toml"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert_eq!(cli.report.as_deref(), Some("week"));
    }

    #[test]
    fn report_requires_period() {
        assert!(DaemonCli::try_parse_from(["dns-stats", "--report"]).is_err());
    }
}
