//! dns-stats 수집기
//!
//! 라우터가 syslog로 보내는 방화벽 로그에서 DNS 조회를 추출해 저장소에 기록합니다.
//!
//! # 아키텍처
//! ```text
//! router --syslog--> receiver --RawMessage--> Collector
//!                                              |- SyslogParser     (원시 바이트 -> SyslogMessage)
//!                                              |- PatternRegistry  (출처별 패턴 -> QueryEvent)
//!                                              |- AddressResolver  (IP -> MAC)
//!                                              `- EventBuffer      (주기 저장 -> QueryStore)
//! ```
//!
//! # 모듈
//! - [`pattern`]: 추출 패턴 컴파일과 레지스트리
//! - [`arp`]: 주소 테이블 스캔과 능동 프로브
//! - [`buffer`]: 트랜잭션 단위 저장을 하는 이벤트 버퍼
//! - [`parser`]: RFC 5424 / RFC 3164 syslog 파서
//! - [`receiver`]: UDP / TCP syslog 수신기
//! - [`collector`]: 위 구성 요소를 묶는 [`Pipeline`](dnsstats_core::pipeline::Pipeline) 구현

pub mod arp;
pub mod buffer;
pub mod collector;
pub mod config;
pub mod error;
pub mod parser;
pub mod pattern;
pub mod receiver;

// --- 주요 타입 re-export ---

pub use arp::{AddressResolver, NeighborSource, PingProber, Prober, SystemNeighbors};
pub use buffer::{EventBuffer, FlushOutcome};
pub use collector::{Collector, CollectorBuilder, MessageHandler};
pub use config::{CollectorSettings, CollectorSettingsBuilder};
pub use error::CollectorError;
pub use parser::SyslogParser;
pub use pattern::{Pattern, PatternRegistry};
pub use receiver::{RawMessage, ReceiverConfig, Transport};
