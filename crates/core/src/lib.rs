//! dns-stats 공통 크레이트
//!
//! 수집기, 스토리지, 데몬이 공유하는 도메인 타입, 에러, 설정, trait, 메트릭 이름을 제공합니다.
//!
//! - [`types`]: `QueryEvent`, `Machine`, `Host`, `MacAddr`, `SyslogMessage`
//! - [`error`]: `DnsStatsError`와 도메인별 하위 에러
//! - [`config`]: `dns-stats.toml` 로딩, 환경변수 오버라이드, 검증
//! - [`pipeline`]: 모듈 생명주기 trait
//! - [`storage`]: 수집기와 영속 계층 사이의 트랜잭션 trait
//! - [`metrics`]: Prometheus 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod storage;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, DnsStatsError, ParseError, PipelineError, StorageError};

// 설정
pub use config::{DnsStatsConfig, SourceSpec};

// 파이프라인 trait
pub use pipeline::{HealthStatus, LogParser, Pipeline};

// 스토리지 trait
pub use storage::{QueryStore, StoreTransaction};

// 도메인 타입
pub use types::{Host, MacAddr, Machine, QueryEvent, SyslogMessage};
