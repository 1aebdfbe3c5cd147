//! 수집기 설정
//!
//! [`CollectorSettings`]는 core의 [`DnsStatsConfig`]에서 파생되며, 문자열 설정을
//! 검증된 값(출처 목록, 기간, 전송 방식)으로 변환한 결과입니다.
//!
//! # 사용 예시
//! ```ignore
//! use dnsstats_core::config::DnsStatsConfig;
//! use dnsstats_collector::config::CollectorSettings;
//!
//! let core_config = DnsStatsConfig::default();
//! let settings = CollectorSettings::from_core(&core_config)?;
//! ```

use std::time::Duration;

use dnsstats_core::config::{DnsStatsConfig, SourceSpec, parse_duration};

use crate::error::CollectorError;
use crate::receiver::{ReceiverConfig, Transport};

/// 최대 TCP 동시 연결 수 상한
const MAX_TCP_CONNECTIONS: usize = 10_000;

/// 검증된 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// 수신기 설정 (바인드 주소, 메시지 크기, TCP 제한)
    pub receiver: ReceiverConfig,
    /// 활성화할 전송 방식
    pub transports: Vec<Transport>,
    /// 출처 -> 패턴 이름 목록
    pub sources: Vec<SourceSpec>,
    /// 버퍼 저장 주기
    pub storage_interval: Duration,
    /// 주소 테이블 갱신 주기
    pub scan_interval: Duration,
    /// 수신기 -> 메시지 루프 채널 용량
    pub channel_capacity: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            receiver: ReceiverConfig::default(),
            transports: vec![Transport::Udp],
            sources: Vec::new(),
            storage_interval: Duration::from_secs(60),
            scan_interval: Duration::from_secs(300),
            channel_capacity: 4096,
        }
    }
}

impl CollectorSettings {
    /// core 설정에서 수집기 설정을 생성하고 검증합니다.
    pub fn from_core(config: &DnsStatsConfig) -> Result<Self, CollectorError> {
        let collector = &config.collector;

        let sources = collector
            .sources
            .iter()
            .map(|entry| SourceSpec::parse(entry))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| CollectorError::config("collector.sources", reason))?;

        let transports = collector
            .transports
            .iter()
            .map(|name| {
                Transport::from_name(name).ok_or_else(|| {
                    CollectorError::config(
                        "collector.transports",
                        format!("unknown transport '{name}'"),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let storage_interval = config
            .storage_interval()
            .map_err(|e| CollectorError::config("collector.storage_interval", e.to_string()))?;
        let scan_interval = config
            .scan_interval()
            .map_err(|e| CollectorError::config("arp.scan_interval", e.to_string()))?;

        let settings = Self {
            receiver: ReceiverConfig {
                bind_addr: collector.syslog_bind.clone(),
                max_message_size: collector.max_message_size,
                ..ReceiverConfig::default()
            },
            transports,
            sources,
            storage_interval,
            scan_interval,
            channel_capacity: collector.channel_capacity,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// 빌더를 생성합니다.
    pub fn builder() -> CollectorSettingsBuilder {
        CollectorSettingsBuilder::new()
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// 출처가 하나 이상이고 저장 주기가 양수여야 합니다.
    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.sources.is_empty() {
            return Err(CollectorError::config(
                "collector.sources",
                "at least one source must be configured",
            ));
        }

        if self.storage_interval.is_zero() {
            return Err(CollectorError::config(
                "collector.storage_interval",
                "must be a positive duration",
            ));
        }

        if self.scan_interval.is_zero() {
            return Err(CollectorError::config(
                "arp.scan_interval",
                "must be a positive duration",
            ));
        }

        if self.transports.is_empty() {
            return Err(CollectorError::config(
                "collector.transports",
                "at least one transport must be enabled",
            ));
        }

        if self.channel_capacity == 0 {
            return Err(CollectorError::config(
                "collector.channel_capacity",
                "must be greater than 0",
            ));
        }

        if self.receiver.max_message_size == 0 {
            return Err(CollectorError::config(
                "collector.max_message_size",
                "must be greater than 0",
            ));
        }

        if self.receiver.max_connections == 0 || self.receiver.max_connections > MAX_TCP_CONNECTIONS
        {
            return Err(CollectorError::config(
                "max_connections",
                format!("must be 1-{MAX_TCP_CONNECTIONS}"),
            ));
        }

        Ok(())
    }
}

/// 수집기 설정 빌더
///
/// 기간은 설정 파일과 같은 문자열(`"1m"`, `"90s"`)로 받고 `build`에서 해석합니다.
#[derive(Default)]
pub struct CollectorSettingsBuilder {
    settings: CollectorSettings,
    storage_interval: Option<String>,
    scan_interval: Option<String>,
}

impl CollectorSettingsBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 수신 바인드 주소를 설정합니다.
    pub fn listen(mut self, bind_addr: impl Into<String>) -> Self {
        self.settings.receiver.bind_addr = bind_addr.into();
        self
    }

    /// 전송 방식을 설정합니다.
    pub fn transports(mut self, transports: Vec<Transport>) -> Self {
        self.settings.transports = transports;
        self
    }

    /// 출처를 추가합니다.
    pub fn source(mut self, address: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.settings.sources.push(SourceSpec {
            address: address.into(),
            pattern: pattern.into(),
        });
        self
    }

    /// 저장 주기를 설정합니다.
    pub fn storage_interval(mut self, interval: impl Into<String>) -> Self {
        self.storage_interval = Some(interval.into());
        self
    }

    /// 주소 테이블 갱신 주기를 설정합니다.
    pub fn scan_interval(mut self, interval: impl Into<String>) -> Self {
        self.scan_interval = Some(interval.into());
        self
    }

    /// 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.settings.channel_capacity = capacity;
        self
    }

    /// 최대 메시지 크기를 설정합니다.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.settings.receiver.max_message_size = size;
        self
    }

    /// TCP 유휴 타임아웃을 설정합니다.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.settings.receiver.idle_timeout = timeout;
        self
    }

    /// 기간 문자열을 해석하고 설정을 검증합니다.
    pub fn build(mut self) -> Result<CollectorSettings, CollectorError> {
        if let Some(interval) = &self.storage_interval {
            self.settings.storage_interval = parse_duration(interval)
                .map_err(|e| CollectorError::config("collector.storage_interval", e.to_string()))?;
        }
        if let Some(interval) = &self.scan_interval {
            self.settings.scan_interval = parse_duration(interval)
                .map_err(|e| CollectorError::config("arp.scan_interval", e.to_string()))?;
        }

        self.settings.validate()?;
        Ok(self.settings)
    }
}
