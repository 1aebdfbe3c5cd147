//! syslog 수신기 -- 라우터가 보낸 원시 메시지를 채널로 전달합니다.
//!
//! # 수신기 종류
//! - [`SyslogUdpReceiver`]: UDP 데이터그램 하나를 메시지 하나로 취급
//! - [`SyslogTcpReceiver`]: 개행 구분 프레이밍, 연결당 태스크
//!
//! 수신기는 파싱하지 않고 [`RawMessage`]를 그대로 전달합니다.
//! 파싱과 패턴 적용은 수집기의 메시지 루프가 담당합니다.

pub mod syslog_tcp;
pub mod syslog_udp;

pub use syslog_tcp::SyslogTcpReceiver;
pub use syslog_udp::SyslogUdpReceiver;

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// 전송 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// UDP 데이터그램
    Udp,
    /// TCP 스트림 (개행 구분)
    Tcp,
}

impl Transport {
    /// 설정 이름으로 전송 방식을 찾습니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "udp" => Some(Self::Udp),
            "tcp" => Some(Self::Tcp),
            _ => None,
        }
    }

    /// 메트릭 레이블과 설정에서 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 수신된 원시 메시지
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// 원시 바이트 (TCP는 개행 제거)
    pub data: Bytes,
    /// 전송 계층 송신 주소
    pub peer: SocketAddr,
    /// 수신 방식
    pub transport: Transport,
    /// 수신 시각
    pub received_at: DateTime<Utc>,
}

impl RawMessage {
    /// 현재 시각으로 원시 메시지를 생성합니다.
    pub fn new(data: Bytes, peer: SocketAddr, transport: Transport) -> Self {
        Self {
            data,
            peer,
            transport,
            received_at: Utc::now(),
        }
    }
}

/// 수신기 공통 설정
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// 바인드 주소 (예: "0.0.0.0:1514")
    pub bind_addr: String,
    /// 최대 메시지 크기 (바이트)
    pub max_message_size: usize,
    /// TCP 최대 동시 연결 수
    pub max_connections: usize,
    /// TCP 유휴 연결 타임아웃
    pub idle_timeout: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:1514".to_owned(),
            max_message_size: 64 * 1024,
            max_connections: 64,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_names() {
        assert_eq!(Transport::from_name("udp"), Some(Transport::Udp));
        assert_eq!(Transport::from_name("tcp"), Some(Transport::Tcp));
        assert_eq!(Transport::from_name("sctp"), None);
        assert_eq!(Transport::Tcp.to_string(), "tcp");
    }

    #[test]
    fn default_receiver_config() {
        let config = ReceiverConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:1514");
        assert_eq!(config.max_message_size, 65536);
    }
}
