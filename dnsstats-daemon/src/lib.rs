//! dns-stats 데몬 라이브러리
//!
//! 통합 테스트를 위해 내부 모듈을 노출합니다.
//! 운영 환경에서는 `dns-stats` 바이너리(main.rs)로 사용됩니다.

pub mod cli;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
pub mod report;
