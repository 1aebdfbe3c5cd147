//! 엔티티 기술자와 스키마 생성
//!
//! 영속 엔티티는 [`ENTITIES`]에 정적으로 선언되며,
//! [`setup_schema`]가 이 목록으로부터 테이블과 인덱스를 생성합니다.

use rusqlite::Connection;
use tracing::debug;

use dnsstats_core::error::StorageError;

/// 컬럼 정의
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    /// 컬럼 이름
    pub name: &'static str,
    /// SQL 타입과 제약
    pub definition: &'static str,
}

/// 영속 엔티티 기술자
#[derive(Debug, Clone, Copy)]
pub struct EntityDescriptor {
    /// 테이블 이름
    pub table: &'static str,
    /// 컬럼 목록 (`id`는 자동 추가)
    pub columns: &'static [ColumnDef],
    /// 자연 키 컬럼 (비어있으면 고유 인덱스 없음)
    pub natural_key: &'static [&'static str],
    /// 일반 인덱스 (컬럼 묶음별)
    pub indexes: &'static [&'static [&'static str]],
}

const fn col(name: &'static str, definition: &'static str) -> ColumnDef {
    ColumnDef { name, definition }
}

/// 질의 대상 도메인
pub const HOSTS: EntityDescriptor = EntityDescriptor {
    table: "hosts",
    columns: &[
        col("address", "TEXT NOT NULL"),
        col("created_at", "INTEGER NOT NULL"),
    ],
    natural_key: &["address"],
    indexes: &[],
};

/// 질의 주체 장비
pub const MACHINES: EntityDescriptor = EntityDescriptor {
    table: "machines",
    columns: &[
        col("address", "TEXT NOT NULL"),
        col("mac", "TEXT NOT NULL"),
        col("name", "TEXT"),
        col("created_at", "INTEGER NOT NULL"),
    ],
    natural_key: &["address", "mac"],
    indexes: &[&["address"]],
};

/// DNS 조회 사실 행 (`at`은 unix 초)
pub const QUERIES: EntityDescriptor = EntityDescriptor {
    table: "queries",
    columns: &[
        col("at", "INTEGER NOT NULL"),
        col("origin_id", "INTEGER NOT NULL REFERENCES machines(id)"),
        col("destination_id", "INTEGER NOT NULL REFERENCES hosts(id)"),
    ],
    natural_key: &[],
    indexes: &[&["at"], &["origin_id"]],
};

/// 모든 영속 엔티티 (생성 순서)
pub const ENTITIES: &[EntityDescriptor] = &[HOSTS, MACHINES, QUERIES];

impl EntityDescriptor {
    /// 이 엔티티를 만드는 DDL 문장 목록을 반환합니다.
    pub fn statements(&self) -> Vec<String> {
        let mut columns = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_owned()];
        columns.extend(
            self.columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.definition)),
        );

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            columns.join(", ")
        )];

        if !self.natural_key.is_empty() {
            statements.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS ux_{table}_{name} ON {table} ({cols})",
                table = self.table,
                name = self.natural_key.join("_"),
                cols = self.natural_key.join(", "),
            ));
        }

        for index in self.indexes {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS ix_{table}_{name} ON {table} ({cols})",
                table = self.table,
                name = index.join("_"),
                cols = index.join(", "),
            ));
        }

        statements
    }
}

/// 엔티티 목록으로부터 스키마를 생성합니다.
///
/// 모든 문장은 하나의 트랜잭션 안에서 실행되며 여러 번 호출해도 안전합니다.
pub fn setup_schema(
    conn: &mut Connection,
    entities: &[EntityDescriptor],
) -> Result<(), StorageError> {
    let tx = conn
        .transaction()
        .map_err(|e| StorageError::Schema(e.to_string()))?;

    for entity in entities {
        for statement in entity.statements() {
            debug!(table = entity.table, %statement, "applying schema statement");
            tx.execute(&statement, [])
                .map_err(|e| StorageError::Schema(format!("{}: {e}", entity.table)))?;
        }
    }

    tx.commit()
        .map_err(|e| StorageError::Schema(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machines_statements_include_natural_key() {
        let statements = MACHINES.statements();
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS machines"));
        assert!(statements[0].contains("mac TEXT NOT NULL"));
        assert!(
            statements
                .iter()
                .any(|s| s.contains("UNIQUE INDEX") && s.contains("(address, mac)"))
        );
    }

    #[test]
    fn queries_have_no_unique_index() {
        let statements = QUERIES.statements();
        assert!(!statements.iter().any(|s| s.contains("UNIQUE")));
        assert!(statements.iter().any(|s| s.contains("ix_queries_at")));
    }

    #[test]
    fn setup_schema_is_repeatable() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_schema(&mut conn, ENTITIES).unwrap();
        setup_schema(&mut conn, ENTITIES).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('hosts', 'machines', 'queries')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn unique_index_rejects_duplicate_host() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_schema(&mut conn, ENTITIES).unwrap();
        conn.execute(
            "INSERT INTO hosts (address, created_at) VALUES ('example.com', 0)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO hosts (address, created_at) VALUES ('example.com', 0)",
            [],
        );
        assert!(dup.is_err());
    }
}
