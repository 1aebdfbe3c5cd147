//! 이벤트 버퍼 -- 조회 이벤트를 모아 주기적으로 한 트랜잭션에 저장합니다.
//!
//! # 상태 흐름
//! ```text
//! Empty -> Accumulating -> Draining -> (Committed | RolledBack) -> Empty
//! ```
//!
//! [`EventBuffer::drain_and_commit`]은 저장이 끝날 때까지 버퍼 잠금을 잡고 있으므로
//! 그동안 `append`는 대기합니다. 배치 중 하나라도 실패하면 전체를 롤백하고
//! 버퍼를 그대로 두어 다음 주기에 같은 이벤트를 다시 시도합니다.
//! 버퍼 크기 상한은 없습니다.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, gauge, histogram};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use dnsstats_core::error::StorageError;
use dnsstats_core::metrics as m;
use dnsstats_core::storage::{QueryStore, StoreTransaction};
use dnsstats_core::types::QueryEvent;

use crate::error::CollectorError;

/// 한 번의 저장 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// 버퍼가 비어 있어 트랜잭션을 열지 않음
    Empty,
    /// 커밋된 이벤트 수
    Committed(usize),
}

/// 조회 이벤트 버퍼
///
/// 복제본은 같은 버퍼를 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
    events: Arc<Mutex<Vec<QueryEvent>>>,
}

impl EventBuffer {
    /// 빈 버퍼를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 이벤트를 끝에 추가합니다.
    ///
    /// 저장이 진행 중이면 끝날 때까지 대기합니다.
    pub async fn append(&self, event: QueryEvent) {
        let mut events = self.events.lock().await;
        events.push(event);
        gauge!(m::COLLECTOR_EVENTS_BUFFERED).set(events.len() as f64);
    }

    /// 대기 중인 이벤트 수
    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    /// 비어있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }

    /// 대기 중인 이벤트의 복사본
    pub async fn snapshot(&self) -> Vec<QueryEvent> {
        self.events.lock().await.clone()
    }

    /// 버퍼 전체를 한 트랜잭션으로 저장합니다.
    ///
    /// 이벤트마다 장비와 도메인을 find-or-create한 뒤 조회 행을 삽입합니다.
    /// 성공하면 버퍼를 비우고, 실패하면 롤백한 뒤 버퍼를 그대로 둡니다.
    /// 저장 작업은 `spawn_blocking`에서 실행되며 잠금은 마지막에 해제됩니다.
    pub async fn drain_and_commit(
        &self,
        store: Arc<dyn QueryStore>,
    ) -> Result<FlushOutcome, CollectorError> {
        let guard = Arc::clone(&self.events).lock_owned().await;
        if guard.is_empty() {
            debug!("event buffer empty, nothing to store");
            return Ok(FlushOutcome::Empty);
        }

        let started = Instant::now();
        let (mut guard, result) = tokio::task::spawn_blocking(move || {
            let result = commit_batch(store.as_ref(), &guard);
            (guard, result)
        })
        .await
        .map_err(|e| CollectorError::Channel(format!("flush task failed: {e}")))?;

        histogram!(m::COLLECTOR_FLUSH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        let count = guard.len();

        match result {
            Ok(()) => {
                guard.clear();
                gauge!(m::COLLECTOR_EVENTS_BUFFERED).set(0.0);
                counter!(m::COLLECTOR_FLUSHES_TOTAL, m::LABEL_RESULT => "success").increment(1);
                info!(count, "stored buffered queries");
                Ok(FlushOutcome::Committed(count))
            }
            Err(e) => {
                counter!(m::COLLECTOR_FLUSHES_TOTAL, m::LABEL_RESULT => "failure").increment(1);
                error!(retained = count, error = %e, "failed to store buffered queries, retrying on next flush");
                Err(e.into())
            }
        }
    }
}

/// 한 트랜잭션 안에서 모든 이벤트를 저장합니다.
fn commit_batch(store: &dyn QueryStore, events: &[QueryEvent]) -> Result<(), StorageError> {
    let mut tx = store.begin()?;

    match insert_all(&mut tx, events) {
        Ok(()) => tx.commit(),
        Err(e) => {
            if let Err(rollback) = tx.rollback() {
                warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

fn insert_all(
    tx: &mut Box<dyn StoreTransaction + '_>,
    events: &[QueryEvent],
) -> Result<(), StorageError> {
    for event in events {
        let origin_id = tx.find_or_create_machine(&event.origin)?;
        let destination_id = tx.find_or_create_host(&event.destination)?;
        tx.insert_query(event.at.unwrap_or_else(Utc::now), origin_id, destination_id)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod mock {
    //! 테스트용 메모리 저장소

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::{DateTime, Utc};

    use dnsstats_core::types::{Host, Machine};

    use super::*;

    /// 커밋된 조회 행 (시각, 장비 주소, 도메인)
    pub type Row = (DateTime<Utc>, String, String);

    /// N번째 이벤트에서 실패하도록 설정할 수 있는 저장소
    #[derive(Default)]
    pub struct MockStore {
        pub begins: AtomicUsize,
        pub commits: AtomicUsize,
        pub rollbacks: AtomicUsize,
        /// 이 순번(0부터)의 조회 삽입에서 실패
        pub fail_at: Mutex<Option<usize>>,
        /// 트랜잭션 시작 시 지연
        pub begin_delay: Option<Duration>,
        pub rows: Mutex<Vec<Row>>,
    }

    impl MockStore {
        pub fn failing_at(index: usize) -> Self {
            Self {
                fail_at: Mutex::new(Some(index)),
                ..Default::default()
            }
        }

        pub fn begins(&self) -> usize {
            self.begins.load(Ordering::SeqCst)
        }

        pub fn rows(&self) -> Vec<Row> {
            self.rows.lock().unwrap().clone()
        }
    }

    struct MockTransaction<'a> {
        store: &'a MockStore,
        staged: Vec<Row>,
        machines: HashMap<i64, Machine>,
        hosts: HashMap<i64, Host>,
        finished: bool,
    }

    impl QueryStore for MockStore {
        fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StorageError> {
            if let Some(delay) = self.begin_delay {
                std::thread::sleep(delay);
            }
            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockTransaction {
                store: self,
                staged: Vec::new(),
                machines: HashMap::new(),
                hosts: HashMap::new(),
                finished: false,
            }))
        }
    }

    impl StoreTransaction for MockTransaction<'_> {
        fn find_or_create_machine(&mut self, machine: &Machine) -> Result<i64, StorageError> {
            let id = self.machines.len() as i64 + 1;
            self.machines.insert(id, machine.clone());
            Ok(id)
        }

        fn find_or_create_host(&mut self, host: &Host) -> Result<i64, StorageError> {
            let id = self.hosts.len() as i64 + 1;
            self.hosts.insert(id, host.clone());
            Ok(id)
        }

        fn insert_query(
            &mut self,
            at: DateTime<Utc>,
            origin_id: i64,
            destination_id: i64,
        ) -> Result<i64, StorageError> {
            if *self.store.fail_at.lock().unwrap() == Some(self.staged.len()) {
                return Err(StorageError::Query("disk I/O error".to_owned()));
            }
            self.staged.push((
                at,
                self.machines[&origin_id].address.to_string(),
                self.hosts[&destination_id].address.clone(),
            ));
            Ok(self.staged.len() as i64)
        }

        fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
            self.finished = true;
            self.store.commits.fetch_add(1, Ordering::SeqCst);
            self.store
                .rows
                .lock()
                .unwrap()
                .extend(std::mem::take(&mut self.staged));
            Ok(())
        }

        fn rollback(mut self: Box<Self>) -> Result<(), StorageError> {
            self.finished = true;
            self.store.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Drop for MockTransaction<'_> {
        fn drop(&mut self) {
            if !self.finished {
                self.store.rollbacks.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}
