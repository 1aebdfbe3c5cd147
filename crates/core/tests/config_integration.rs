//! dns-stats.toml 통합 설정 테스트
//!
//! - dns-stats.toml.example 파싱 테스트
//! - 파일 로딩 + 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use std::io::Write;
use std::time::Duration;

use dnsstats_core::config::DnsStatsConfig;
use dnsstats_core::error::{ConfigError, DnsStatsError};
use serial_test::serial;

fn example() -> DnsStatsConfig {
    let content = include_str!("../../../dns-stats.toml.example");
    DnsStatsConfig::parse(content).expect("example config should parse")
}

#[test]
fn example_config_parses_and_validates() {
    let config = example();
    config
        .validate()
        .expect("example config should pass validation");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.collector.sources, vec!["192.168.0.1:thomson-dwg850-4b"]);
    assert_eq!(config.storage_interval().unwrap(), Duration::from_secs(60));
    assert_eq!(config.scan_interval().unwrap(), Duration::from_secs(300));
    assert!(config.routers_file.is_none());
    assert!(config.routers.is_empty());
}

#[test]
fn empty_file_uses_defaults() {
    let config = DnsStatsConfig::parse("").expect("empty config should parse");
    assert_eq!(config.collector.syslog_bind, "0.0.0.0:1514");
    assert_eq!(config.database.path, "./dns-stats.sqlite3");
}

#[test]
fn wrong_type_is_parse_error() {
    let err = DnsStatsConfig::parse("[collector]\nsources = 5\n").unwrap_err();
    assert!(matches!(
        err,
        DnsStatsError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[tokio::test]
#[serial]
async fn load_applies_env_over_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[collector]\nsources = [\"gw:test\"]\nstorage_interval = \"2m\"\n"
    )
    .unwrap();

    // SAFETY: serial 테스트로 환경변수 동시 접근을 막습니다.
    unsafe { std::env::set_var("DNSSTATS_COLLECTOR_STORAGE_INTERVAL", "15s") };
    let result = DnsStatsConfig::load(file.path()).await;
    unsafe { std::env::remove_var("DNSSTATS_COLLECTOR_STORAGE_INTERVAL") };

    let config = result.expect("config should load");
    assert_eq!(config.storage_interval().unwrap(), Duration::from_secs(15));
}

#[tokio::test]
#[serial]
async fn load_rejects_invalid_env_interval() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[collector]\nsources = [\"gw:test\"]\n").unwrap();

    // SAFETY: serial 테스트로 환경변수 동시 접근을 막습니다.
    unsafe { std::env::set_var("DNSSTATS_COLLECTOR_STORAGE_INTERVAL", "later") };
    let result = DnsStatsConfig::load(file.path()).await;
    unsafe { std::env::remove_var("DNSSTATS_COLLECTOR_STORAGE_INTERVAL") };

    let err = result.unwrap_err();
    assert!(err.to_string().contains("collector.storage_interval"));
}
