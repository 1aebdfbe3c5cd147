//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 수집기, 스토리지, 데몬이 공유하는 데이터 구조를 정의합니다.
//!
//! - [`SyslogMessage`]: 수신 계층이 전달하는 원시 메시지 (출처, 본문, 시각, 전송 주소)
//! - [`QueryEvent`]: 추출되고 보강된 DNS 조회 이벤트 1건
//! - [`Machine`] / [`Host`]: 질의 주체(내부 장비)와 질의 대상(도메인)
//! - [`MacAddr`]: 하드웨어 주소

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

/// 48비트 하드웨어(MAC) 주소
///
/// `00:00:00:00:00:00`([`MacAddr::ZERO`])은 "조회를 시도했으나 알 수 없음"을 뜻하는
/// 센티널 값으로 사용됩니다. 표현과 파싱은 `pnet`의 주소 타입에 맡깁니다.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pnet::util::MacAddr);

impl MacAddr {
    /// 알 수 없는 하드웨어 주소 센티널
    pub const ZERO: MacAddr = MacAddr(pnet::util::MacAddr(0, 0, 0, 0, 0, 0));

    /// 바이트 배열로부터 주소를 생성합니다.
    pub const fn new(octets: [u8; 6]) -> Self {
        let [a, b, c, d, e, f] = octets;
        Self(pnet::util::MacAddr(a, b, c, d, e, f))
    }

    /// 주소의 6바이트를 반환합니다.
    pub fn octets(&self) -> [u8; 6] {
        let pnet::util::MacAddr(a, b, c, d, e, f) = self.0;
        [a, b, c, d, e, f]
    }

    /// 센티널(전부 0) 주소인지 확인합니다.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<pnet::util::MacAddr> for MacAddr {
    fn from(mac: pnet::util::MacAddr) -> Self {
        Self(mac)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({self})")
    }
}

impl FromStr for MacAddr {
    type Err = ParseError;

    /// `aa:bb:cc:dd:ee:ff` 또는 `aa-bb-cc-dd-ee-ff` 형식을 파싱합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = if s.contains(':') {
            s.to_owned()
        } else {
            s.replace('-', ":")
        };

        normalized
            .parse::<pnet::util::MacAddr>()
            .map(Self)
            .map_err(|e| ParseError::InvalidHardwareAddress {
                value: s.to_owned(),
                reason: e.to_string(),
            })
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// 질의 주체 -- DNS 조회를 보낸 내부 장비
///
/// 저장 시 `(address, mac)` 쌍이 자연 키입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    /// 장비 IP 주소
    pub address: IpAddr,
    /// 하드웨어 주소 (미해결이면 [`MacAddr::ZERO`])
    pub mac: MacAddr,
    /// 표시 이름 (있을 경우)
    pub name: Option<String>,
}

impl Machine {
    /// 하드웨어 주소가 아직 해결되지 않은 장비를 생성합니다.
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            mac: MacAddr::ZERO,
            name: None,
        }
    }

    /// 하드웨어 주소를 설정합니다.
    pub fn with_mac(mut self, mac: MacAddr) -> Self {
        self.mac = mac;
        self
    }
}

/// 질의 대상 -- 조회된 도메인
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host {
    /// 도메인 문자열 (저장 시 자연 키)
    pub address: String,
}

impl Host {
    /// 새 질의 대상을 생성합니다.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// DNS 조회 이벤트
///
/// 패턴 추출 단계에서 생성되고, 주소 해석기가 `origin.mac`을 채우며,
/// 수집기가 시각과 전송 주소를 기록한 뒤 버퍼에 추가됩니다.
/// 추출을 통과한 이벤트의 `origin`과 `destination`은 비어있지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEvent {
    /// 이벤트 발생 시각 (라우터가 보고한 시각). 추출 직후에는 `None`.
    pub at: Option<DateTime<Utc>>,
    /// 질의 주체
    pub origin: Machine,
    /// 질의 대상
    pub destination: Host,
    /// syslog 패킷이 도착한 전송 계층 주소 (진단용)
    pub source: Option<SocketAddr>,
}

impl QueryEvent {
    /// 시각과 전송 주소가 비어있는 이벤트를 생성합니다.
    pub fn new(origin: Machine, destination: Host) -> Self {
        Self {
            at: None,
            origin,
            destination,
            source: None,
        }
    }

    /// 보고 시각과 전송 주소를 기록합니다.
    pub fn stamp(&mut self, at: DateTime<Utc>, source: SocketAddr) {
        self.at = Some(at);
        self.source = Some(source);
    }
}

impl fmt::Display for QueryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) -> {}",
            self.origin.address, self.origin.mac, self.destination.address,
        )
    }
}

/// 수신 계층이 전달하는 syslog 메시지
///
/// 핵심 파이프라인은 이 네 필드만 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogMessage {
    /// 메시지 헤더의 HOSTNAME (없으면 빈 문자열)
    pub hostname: String,
    /// 메시지 본문
    pub content: String,
    /// 라우터가 보고한 시각 (없으면 수신 시각)
    pub timestamp: DateTime<Utc>,
    /// 전송 계층 송신 주소
    pub source_addr: SocketAddr,
}

impl SyslogMessage {
    /// 선언된 출처 식별자를 반환합니다.
    ///
    /// HOSTNAME이 비어있으면 송신 IP를 사용합니다.
    pub fn declared_source(&self) -> String {
        if self.hostname.is_empty() {
            self.source_addr.ip().to_string()
        } else {
            self.hostname.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_parse_and_display() {
        let mac: MacAddr = "AA:bb:CC:dd:ee:FF".parse().unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(mac.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn mac_parse_dash_separated() {
        let mac: MacAddr = "00-01-02-03-04-05".parse().unwrap();
        assert_eq!(mac.to_string(), "00:01:02:03:04:05");
    }

    #[test]
    fn mac_parse_rejects_garbage() {
        assert!("invalid-mac-address".parse::<MacAddr>().is_err());
        assert!("00:01:02:03:04".parse::<MacAddr>().is_err());
        assert!("00:01:02:03:04:zz".parse::<MacAddr>().is_err());
        assert!("00:01:02:03:04:05:06".parse::<MacAddr>().is_err());
    }

    #[test]
    fn mac_from_pnet_keeps_octets() {
        let mac = MacAddr::from(pnet::util::MacAddr(0x02, 0, 0, 0, 0, 0x01));
        assert_eq!(mac, MacAddr::new([0x02, 0, 0, 0, 0, 0x01]));
        assert_eq!(mac.to_string(), "02:00:00:00:00:01");
    }

    #[test]
    fn zero_mac_is_sentinel() {
        assert!(MacAddr::ZERO.is_zero());
        assert_eq!(MacAddr::ZERO.to_string(), "00:00:00:00:00:00");
        assert_eq!(MacAddr::default(), MacAddr::ZERO);
    }

    #[test]
    fn mac_serde_as_string() {
        let mac = MacAddr::new([0, 1, 2, 3, 4, 5]);
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"00:01:02:03:04:05\"");
        let back: MacAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }

    #[test]
    fn machine_defaults_to_zero_mac() {
        let machine = Machine::new("10.0.0.5".parse().unwrap());
        assert!(machine.mac.is_zero());
        assert!(machine.name.is_none());
    }

    #[test]
    fn query_event_stamp() {
        let mut event = QueryEvent::new(
            Machine::new("192.168.0.10".parse().unwrap()),
            Host::new("example.com"),
        );
        assert!(event.at.is_none());

        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        event.stamp(at, "192.168.0.1:514".parse().unwrap());
        assert_eq!(event.at, Some(at));
        assert_eq!(event.source.unwrap().port(), 514);
    }

    #[test]
    fn declared_source_falls_back_to_peer_ip() {
        let mut msg = SyslogMessage {
            hostname: String::new(),
            content: "x".to_owned(),
            timestamp: Utc::now(),
            source_addr: "192.168.0.1:40000".parse().unwrap(),
        };
        assert_eq!(msg.declared_source(), "192.168.0.1");

        msg.hostname = "router".to_owned();
        assert_eq!(msg.declared_source(), "router");
    }
}
