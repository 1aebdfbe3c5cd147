//! dns-stats SQLite 저장소
//!
//! [`Database`]는 core의 [`QueryStore`](dnsstats_core::storage::QueryStore)를 구현하여
//! 수집기의 트랜잭션 저장을 받습니다. 스키마는 [`schema::ENTITIES`]의 정적
//! 엔티티 기술자로부터 생성되고, [`report`]는 저장된 행을 요약합니다.

pub mod database;
pub mod report;
pub mod schema;

pub use database::{Database, SqliteTransaction};
pub use report::{ReportQuery, ReportRow, origins, period_start};
pub use schema::{ENTITIES, EntityDescriptor, setup_schema};
