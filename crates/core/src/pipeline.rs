//! 파이프라인 trait -- 모듈 확장 포인트 정의

use std::future::Future;
use std::net::SocketAddr;

use serde::Serialize;

use crate::error::{DnsStatsError, ParseError};
use crate::types::SyslogMessage;

/// 모듈 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작하지만 일부 기능이 저하됨
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 생명주기를 가진 모듈
///
/// 데몬은 이 trait을 통해 모듈을 시작, 정지하고 상태를 조회합니다.
pub trait Pipeline: Send {
    /// 백그라운드 작업을 시작하고 즉시 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), DnsStatsError>> + Send;

    /// 백그라운드 작업을 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), DnsStatsError>> + Send;

    /// 현재 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 원시 syslog 페이로드 파서 trait
///
/// 새로운 전송 형식을 지원하려면 이 trait을 구현합니다.
pub trait LogParser: Send + Sync {
    /// 지원하는 형식 이름
    fn format_name(&self) -> &str;

    /// 원시 바이트와 송신 주소로부터 메시지를 만듭니다.
    fn parse(&self, raw: &[u8], source_addr: SocketAddr) -> Result<SyslogMessage, ParseError>;
}
