//! SQLite 저장소 -- [`QueryStore`] 구현
//!
//! 연결 하나를 `Arc<Mutex<Connection>>`으로 공유합니다.
//! 트랜잭션은 `BEGIN IMMEDIATE`로 시작하며, 트랜잭션이 살아있는 동안
//! 연결 잠금을 보유합니다.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info, warn};

use dnsstats_core::error::StorageError;
use dnsstats_core::storage::{QueryStore, StoreTransaction};
use dnsstats_core::types::{Host, Machine};

use crate::schema::{ENTITIES, setup_schema};

/// 스레드 안전한 SQLite 핸들
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// 주어진 경로에 데이터베이스를 열거나 생성하고 스키마를 준비합니다.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Connection(format!("{}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| StorageError::Connection(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "opened database");
        Self::with_connection(conn)
    }

    /// 메모리 데이터베이스를 엽니다 (테스트용).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self, StorageError> {
        setup_schema(&mut conn, ENTITIES)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 연결 잠금을 획득합니다.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Connection("database mutex poisoned".to_owned()))
    }

    /// 테이블의 행 수를 반환합니다.
    pub fn count(&self, table: &str) -> Result<i64, StorageError> {
        if !ENTITIES.iter().any(|e| e.table == table) {
            return Err(StorageError::Query(format!("unknown table '{table}'")));
        }
        let conn = self.lock()?;
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })
        .map_err(|e| StorageError::Query(e.to_string()))
    }
}

impl QueryStore for Database {
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StorageError> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| StorageError::Transaction(format!("begin: {e}")))?;
        debug!("storage transaction started");
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }
}

/// 진행 중인 SQLite 트랜잭션
///
/// `commit`이나 `rollback` 없이 drop되면 롤백합니다.
pub struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SqliteTransaction<'_> {
    fn finish(&mut self, statement: &str) -> Result<(), StorageError> {
        self.conn
            .execute_batch(statement)
            .map_err(|e| StorageError::Transaction(format!("{}: {e}", statement.to_lowercase())))?;
        self.finished = true;
        Ok(())
    }

    /// 열린 트랜잭션이 남아 있으면 롤백합니다.
    ///
    /// `COMMIT`이 `SQLITE_BUSY`로 실패해도 SQLite는 트랜잭션을 유지하므로
    /// 여기서 닫지 않으면 이후 `BEGIN`이 모두 실패합니다.
    fn abort(&mut self) {
        self.finished = true;
        if self.conn.is_autocommit() {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => debug!("storage transaction rolled back"),
            Err(e) => warn!(error = %e, "failed to roll back transaction"),
        }
    }
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn find_or_create_machine(&mut self, machine: &Machine) -> Result<i64, StorageError> {
        let address = machine.address.to_string();
        let mac = machine.mac.to_string();

        // 자연 키 충돌은 성공으로 취급
        self.conn
            .prepare_cached(
                "INSERT INTO machines (address, mac, name, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (address, mac) DO UPDATE SET name = COALESCE(excluded.name, machines.name)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![address, mac, machine.name, Utc::now().timestamp()])
            })
            .map_err(|e| StorageError::Query(format!("upsert machine {address}: {e}")))?;

        self.conn
            .prepare_cached("SELECT id FROM machines WHERE address = ?1 AND mac = ?2")
            .and_then(|mut stmt| stmt.query_row(params![address, mac], |row| row.get(0)))
            .map_err(|e| StorageError::Query(format!("find machine {address}: {e}")))
    }

    fn find_or_create_host(&mut self, host: &Host) -> Result<i64, StorageError> {
        self.conn
            .prepare_cached(
                "INSERT INTO hosts (address, created_at) VALUES (?1, ?2)
                 ON CONFLICT (address) DO NOTHING",
            )
            .and_then(|mut stmt| stmt.execute(params![host.address, Utc::now().timestamp()]))
            .map_err(|e| StorageError::Query(format!("upsert host {}: {e}", host.address)))?;

        self.conn
            .prepare_cached("SELECT id FROM hosts WHERE address = ?1")
            .and_then(|mut stmt| stmt.query_row(params![host.address], |row| row.get(0)))
            .map_err(|e| StorageError::Query(format!("find host {}: {e}", host.address)))
    }

    fn insert_query(
        &mut self,
        at: DateTime<Utc>,
        origin_id: i64,
        destination_id: i64,
    ) -> Result<i64, StorageError> {
        self.conn
            .prepare_cached(
                "INSERT INTO queries (at, origin_id, destination_id) VALUES (?1, ?2, ?3)",
            )
            .and_then(|mut stmt| stmt.execute(params![at.timestamp(), origin_id, destination_id]))
            .map_err(|e| StorageError::Query(format!("insert query: {e}")))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        let result = self.finish("COMMIT");
        if result.is_err() {
            self.abort();
        }
        result
    }

    fn rollback(mut self: Box<Self>) -> Result<(), StorageError> {
        let result = self.finish("ROLLBACK");
        if result.is_err() {
            self.abort();
        }
        result
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnsstats_core::types::MacAddr;

    fn machine(ip: &str, mac: &str) -> Machine {
        Machine::new(ip.parse().unwrap()).with_mac(mac.parse().unwrap())
    }

    #[test]
    fn host_upsert_is_idempotent() {
        let db = Database::open_memory().unwrap();
        let mut tx = db.begin().unwrap();
        let first = tx.find_or_create_host(&Host::new("example.com")).unwrap();
        let second = tx.find_or_create_host(&Host::new("example.com")).unwrap();
        tx.commit().unwrap();

        assert_eq!(first, second);
        assert_eq!(db.count("hosts").unwrap(), 1);
    }

    #[test]
    fn machine_key_is_address_and_mac() {
        let db = Database::open_memory().unwrap();
        let mut tx = db.begin().unwrap();
        let a = tx
            .find_or_create_machine(&machine("192.168.0.10", "aa:bb:cc:dd:ee:ff"))
            .unwrap();
        let b = tx
            .find_or_create_machine(&machine("192.168.0.10", "00:00:00:00:00:00"))
            .unwrap();
        let c = tx
            .find_or_create_machine(&machine("192.168.0.10", "aa:bb:cc:dd:ee:ff"))
            .unwrap();
        tx.commit().unwrap();

        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(db.count("machines").unwrap(), 2);
    }

    #[test]
    fn machine_name_is_kept_on_conflict() {
        let db = Database::open_memory().unwrap();
        let mut named = Machine::new("10.0.0.5".parse().unwrap()).with_mac(MacAddr::ZERO);
        named.name = Some("laptop".to_owned());

        let mut tx = db.begin().unwrap();
        tx.find_or_create_machine(&named).unwrap();
        tx.find_or_create_machine(&Machine::new("10.0.0.5".parse().unwrap()))
            .unwrap();
        tx.commit().unwrap();

        let conn = db.lock().unwrap();
        let name: Option<String> = conn
            .query_row("SELECT name FROM machines", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name.as_deref(), Some("laptop"));
    }

    #[test]
    fn rollback_discards_rows() {
        let db = Database::open_memory().unwrap();
        let mut tx = db.begin().unwrap();
        let origin = tx
            .find_or_create_machine(&machine("192.168.0.10", "aa:bb:cc:dd:ee:ff"))
            .unwrap();
        let destination = tx.find_or_create_host(&Host::new("example.com")).unwrap();
        tx.insert_query(Utc::now(), origin, destination).unwrap();
        tx.rollback().unwrap();

        assert_eq!(db.count("queries").unwrap(), 0);
        assert_eq!(db.count("hosts").unwrap(), 0);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let db = Database::open_memory().unwrap();
        {
            let mut tx = db.begin().unwrap();
            tx.find_or_create_host(&Host::new("example.com")).unwrap();
        }
        assert_eq!(db.count("hosts").unwrap(), 0);

        // 연결은 다시 사용할 수 있어야 함
        let tx = db.begin().unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn busy_commit_leaves_connection_usable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dns-stats.sqlite3");
        let db = Database::open(&path).unwrap();
        db.lock()
            .unwrap()
            .busy_timeout(std::time::Duration::from_millis(100))
            .unwrap();

        // 다른 연결이 읽기 트랜잭션으로 공유 잠금을 보유
        let reader = Connection::open(&path).unwrap();
        reader.execute_batch("BEGIN").unwrap();
        let _: i64 = reader
            .query_row("SELECT COUNT(*) FROM hosts", [], |row| row.get(0))
            .unwrap();

        let mut tx = db.begin().unwrap();
        tx.find_or_create_host(&Host::new("busy.example")).unwrap();
        assert!(tx.commit().is_err());

        reader.execute_batch("COMMIT").unwrap();
        drop(reader);

        let mut tx = db.begin().unwrap();
        tx.find_or_create_host(&Host::new("retry.example")).unwrap();
        tx.commit().unwrap();
        assert_eq!(db.count("hosts").unwrap(), 1);
    }

    #[test]
    fn query_at_is_stored_in_unix_seconds() {
        let db = Database::open_memory().unwrap();
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let mut tx = db.begin().unwrap();
        let origin = tx
            .find_or_create_machine(&machine("192.168.0.10", "aa:bb:cc:dd:ee:ff"))
            .unwrap();
        let destination = tx.find_or_create_host(&Host::new("example.com")).unwrap();
        tx.insert_query(at, origin, destination).unwrap();
        tx.commit().unwrap();

        let conn = db.lock().unwrap();
        let stored: i64 = conn
            .query_row("SELECT at FROM queries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, 1_700_000_000);
    }

    #[test]
    fn count_rejects_unknown_table() {
        let db = Database::open_memory().unwrap();
        assert!(db.count("sqlite_master").is_err());
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dns-stats.sqlite3");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.count("queries").unwrap(), 0);
    }
}
