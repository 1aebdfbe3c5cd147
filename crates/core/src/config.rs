//! 설정 관리 -- dns-stats.toml 파싱 및 런타임 설정
//!
//! [`DnsStatsConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DNSSTATS_COLLECTOR_SYSLOG_BIND=0.0.0.0:514` 형식)
//! 3. 설정 파일 (`dns-stats.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), dnsstats_core::error::DnsStatsError> {
//! use dnsstats_core::config::DnsStatsConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DnsStatsConfig::load("dns-stats.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DnsStatsConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DnsStatsError};

/// 알려진 리포트 조회 이름
pub const REPORT_FETCHERS: &[&str] = &["top", "recent"];

/// 지원하는 syslog 전송 방식
pub const TRANSPORTS: &[&str] = &["udp", "tcp"];

/// dns-stats 통합 설정
///
/// `dns-stats.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsStatsConfig {
    /// 추가 패턴 JSON 파일 경로 (`{ "<name>": "<pattern>" }`)
    #[serde(default)]
    pub routers_file: Option<String>,
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집기 설정
    #[serde(default)]
    pub collector: CollectorConfig,
    /// ARP 해석기 설정
    #[serde(default)]
    pub arp: ArpConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 리포트 설정
    #[serde(default)]
    pub report: ReportConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 인라인 패턴 (`name = "pattern"`)
    #[serde(default)]
    pub routers: BTreeMap<String, String>,
}

impl DnsStatsConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DnsStatsError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DnsStatsError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DnsStatsError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DnsStatsError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DnsStatsError> {
        toml::from_str(toml_str).map_err(|e| {
            DnsStatsError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DNSSTATS_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        override_optional_string(&mut self.routers_file, "DNSSTATS_ROUTERS_FILE");

        // General
        override_string(&mut self.general.log_level, "DNSSTATS_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DNSSTATS_GENERAL_LOG_FORMAT");

        // Collector
        override_bool(&mut self.collector.enabled, "DNSSTATS_COLLECTOR_ENABLED");
        override_string(
            &mut self.collector.syslog_bind,
            "DNSSTATS_COLLECTOR_SYSLOG_BIND",
        );
        override_csv(
            &mut self.collector.transports,
            "DNSSTATS_COLLECTOR_TRANSPORTS",
        );
        override_csv(&mut self.collector.sources, "DNSSTATS_COLLECTOR_SOURCES");
        override_string(
            &mut self.collector.storage_interval,
            "DNSSTATS_COLLECTOR_STORAGE_INTERVAL",
        );
        override_usize(
            &mut self.collector.channel_capacity,
            "DNSSTATS_COLLECTOR_CHANNEL_CAPACITY",
        );
        override_usize(
            &mut self.collector.max_message_size,
            "DNSSTATS_COLLECTOR_MAX_MESSAGE_SIZE",
        );

        // ARP
        override_bool(&mut self.arp.enabled, "DNSSTATS_ARP_ENABLED");
        override_string(&mut self.arp.scan_interval, "DNSSTATS_ARP_SCAN_INTERVAL");
        override_string(&mut self.arp.table_path, "DNSSTATS_ARP_TABLE_PATH");
        override_u64(
            &mut self.arp.probe_timeout_secs,
            "DNSSTATS_ARP_PROBE_TIMEOUT_SECS",
        );

        // Database
        override_string(&mut self.database.path, "DNSSTATS_DATABASE_PATH");

        // Report
        override_usize(&mut self.report.lines, "DNSSTATS_REPORT_LINES");
        override_csv(&mut self.report.fetchers, "DNSSTATS_REPORT_FETCHERS");
        override_string(&mut self.report.network, "DNSSTATS_REPORT_NETWORK");

        // Metrics
        override_bool(&mut self.metrics.enabled, "DNSSTATS_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "DNSSTATS_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "DNSSTATS_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DnsStatsError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.collector.enabled {
            if self.collector.sources.is_empty() {
                return Err(invalid(
                    "collector.sources",
                    "at least one source must be configured".to_owned(),
                ));
            }
            for entry in &self.collector.sources {
                SourceSpec::parse(entry).map_err(|reason| invalid("collector.sources", reason))?;
            }

            if self.collector.transports.is_empty() {
                return Err(invalid(
                    "collector.transports",
                    "at least one transport must be enabled".to_owned(),
                ));
            }
            for transport in &self.collector.transports {
                if !TRANSPORTS.contains(&transport.as_str()) {
                    return Err(invalid(
                        "collector.transports",
                        format!(
                            "unknown transport '{transport}', must be one of: {}",
                            TRANSPORTS.join(", ")
                        ),
                    ));
                }
            }

            positive_duration("collector.storage_interval", &self.collector.storage_interval)?;

            if self.collector.channel_capacity == 0 {
                return Err(invalid(
                    "collector.channel_capacity",
                    "must be greater than 0".to_owned(),
                ));
            }
            if self.collector.max_message_size == 0 {
                return Err(invalid(
                    "collector.max_message_size",
                    "must be greater than 0".to_owned(),
                ));
            }
        }

        if self.arp.enabled {
            positive_duration("arp.scan_interval", &self.arp.scan_interval)?;
            if self.arp.probe_timeout_secs == 0 {
                return Err(invalid(
                    "arp.probe_timeout_secs",
                    "must be greater than 0".to_owned(),
                ));
            }
        }

        if self.database.path.is_empty() {
            return Err(invalid("database.path", "must not be empty".to_owned()));
        }

        for fetcher in &self.report.fetchers {
            if !REPORT_FETCHERS.contains(&fetcher.as_str()) {
                return Err(invalid(
                    "report.fetchers",
                    format!(
                        "unknown fetcher '{fetcher}', must be one of: {}",
                        REPORT_FETCHERS.join(", ")
                    ),
                ));
            }
        }

        Ok(())
    }

    /// 수집기 저장 주기를 [`Duration`]으로 반환합니다.
    pub fn storage_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.collector.storage_interval)
    }

    /// ARP 테이블 갱신 주기를 [`Duration`]으로 반환합니다.
    pub fn scan_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.arp.scan_interval)
    }
}

fn invalid(field: &str, reason: String) -> DnsStatsError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

fn positive_duration(field: &str, value: &str) -> Result<Duration, DnsStatsError> {
    let duration = parse_duration(value).map_err(|e| match e {
        ConfigError::InvalidValue { reason, .. } => invalid(field, reason),
        other => other.into(),
    })?;
    if duration.is_zero() {
        return Err(invalid(field, "duration must be positive".to_owned()));
    }
    Ok(duration)
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 수집기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// Syslog 수신 주소
    pub syslog_bind: String,
    /// 활성화할 전송 방식 (udp, tcp)
    pub transports: Vec<String>,
    /// 로그 출처 목록 (`"<address>:<pattern-name>"`)
    pub sources: Vec<String>,
    /// 버퍼 저장 주기 (Go 스타일 기간 문자열, 예: `1m`)
    pub storage_interval: String,
    /// 수신기 -> 수집기 채널 용량
    pub channel_capacity: usize,
    /// 최대 메시지 크기 (바이트)
    pub max_message_size: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            syslog_bind: "0.0.0.0:1514".to_owned(),
            transports: vec!["udp".to_owned()],
            sources: Vec::new(),
            storage_interval: "1m".to_owned(),
            channel_capacity: 4096,
            max_message_size: 64 * 1024,
        }
    }
}

/// ARP 해석기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArpConfig {
    /// 주기적 테이블 갱신 활성화 여부
    pub enabled: bool,
    /// 갱신 주기 (Go 스타일 기간 문자열)
    pub scan_interval: String,
    /// 커널 ARP 테이블 파일 경로
    pub table_path: String,
    /// 능동 프로브 타임아웃 (초)
    pub probe_timeout_secs: u64,
}

impl Default for ArpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval: "5m".to_owned(),
            table_path: "/proc/net/arp".to_owned(),
            probe_timeout_secs: 1,
        }
    }
}

/// 데이터베이스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite 파일 경로
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./dns-stats.sqlite3".to_owned(),
        }
    }
}

/// 리포트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// 조회별 최대 행 수
    pub lines: usize,
    /// 사용할 조회 이름 (top, recent)
    pub fetchers: Vec<String>,
    /// 네트워크 전체 집계 행에 사용할 SQL LIKE 패턴
    pub network: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            lines: 10,
            fetchers: vec!["top".to_owned(), "recent".to_owned()],
            network: "192.168.0.%".to_owned(),
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

/// 로그 출처 항목 -- `"<address>:<pattern-name>"`
///
/// 주소에 `:`가 포함될 수 있으므로(IPv6) 마지막 `:`를 기준으로 나눕니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpec {
    /// 선언된 출처 식별자 (HOSTNAME 또는 송신 IP)
    pub address: String,
    /// 적용할 패턴 이름
    pub pattern: String,
}

impl SourceSpec {
    /// 출처 항목 문자열을 파싱합니다.
    pub fn parse(entry: &str) -> Result<Self, String> {
        let (address, pattern) = entry
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| format!("'{entry}' is not in '<address>:<name>' form"))?;

        let address = address.trim();
        let pattern = pattern.trim();
        if address.is_empty() || pattern.is_empty() {
            return Err(format!("'{entry}' is not in '<address>:<name>' form"));
        }

        Ok(Self {
            address: address.to_owned(),
            pattern: pattern.to_owned(),
        })
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.pattern)
    }
}

/// Go 스타일 기간 문자열을 파싱합니다.
///
/// 숫자와 단위(`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`)의 연속입니다.
/// 예: `90s`, `1m`, `1h30m`, `500ms`, `1.5h`. 단독 `0`은 0으로 취급합니다.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let fail = |reason: &str| ConfigError::InvalidValue {
        field: "duration".to_owned(),
        reason: format!("'{input}': {reason}"),
    };

    let s = input.trim();
    if s.is_empty() {
        return Err(fail("empty duration"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut nanos = 0f64;
    let mut rest = s;

    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !is_number(c))
            .ok_or_else(|| fail("missing unit"))?;
        if number_end == 0 {
            return Err(fail("expected a number"));
        }
        let value: f64 = rest[..number_end]
            .parse()
            .map_err(|_| fail("invalid number"))?;
        rest = &rest[number_end..];

        let unit_end = rest.find(is_number).unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(fail("unknown unit")),
        };
        nanos += value * scale;
        rest = &rest[unit_end..];
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(fail("duration out of range"));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_optional_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = if val.is_empty() { None } else { Some(val) };
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
