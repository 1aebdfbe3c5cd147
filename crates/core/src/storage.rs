//! 스토리지 trait -- 수집기와 영속 계층 사이의 경계
//!
//! 수집기는 구체적인 데이터베이스를 알지 못하고 이 trait만 사용합니다.
//! 한 번의 저장(flush)은 [`QueryStore::begin`]으로 연 트랜잭션 하나 안에서
//! 차원 레코드 upsert와 사실 행 삽입을 수행한 뒤 커밋 또는 롤백합니다.

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::types::{Host, Machine};

/// 트랜잭션을 열 수 있는 저장소
///
/// 블로킹 구현을 허용합니다. 비동기 호출자는 `spawn_blocking` 안에서 사용해야 합니다.
pub trait QueryStore: Send + Sync + 'static {
    /// 새 트랜잭션을 시작합니다.
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StorageError>;
}

/// 저장 트랜잭션
///
/// `commit`이나 `rollback` 없이 drop되면 구현체는 롤백해야 합니다.
pub trait StoreTransaction {
    /// `(address, mac)` 자연 키로 장비 행을 찾거나 생성하고 id를 반환합니다.
    ///
    /// 이미 존재하는 키에 대한 중복 삽입은 에러가 아닙니다.
    fn find_or_create_machine(&mut self, machine: &Machine) -> Result<i64, StorageError>;

    /// 도메인 자연 키로 질의 대상 행을 찾거나 생성하고 id를 반환합니다.
    fn find_or_create_host(&mut self, host: &Host) -> Result<i64, StorageError>;

    /// 사실 행을 삽입하고 id를 반환합니다.
    fn insert_query(
        &mut self,
        at: DateTime<Utc>,
        origin_id: i64,
        destination_id: i64,
    ) -> Result<i64, StorageError>;

    /// 트랜잭션을 커밋합니다.
    ///
    /// 실패하더라도 트랜잭션은 닫혀야 하며, 저장소는 다음 `begin`을 받을 수 있어야 합니다.
    fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// 트랜잭션을 롤백합니다.
    fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
