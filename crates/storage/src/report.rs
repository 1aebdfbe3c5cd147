//! 리포트 조회
//!
//! 저장된 `queries`/`hosts`/`machines` 행을 읽어 출처(장비 주소 패턴)별
//! 요약을 만듭니다. 조회 종류는 [`ReportQuery`]로 선택합니다.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::warn;

use dnsstats_core::config::parse_duration;
use dnsstats_core::error::StorageError;

use crate::database::Database;

/// `Recent` 행의 시각 형식 (dd/mm/yy HH:MM:SS)
pub const RECENT_TIME_FORMAT: &str = "%d/%m/%y %H:%M:%S";

const DEFAULT_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// 리포트 조회 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportQuery {
    /// 가장 많이 조회된 도메인과 횟수
    Top,
    /// 최근 조회된 도메인과 시각
    Recent,
}

/// 리포트 행
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportRow {
    /// 조회 횟수와 도메인
    Top { count: i64, address: String },
    /// 조회 시각과 도메인
    Recent { at: DateTime<Utc>, address: String },
}

impl fmt::Display for ReportRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top { count, address } => write!(f, "{count} {address}"),
            Self::Recent { at, address } => {
                write!(f, "{} {address}", at.format(RECENT_TIME_FORMAT))
            }
        }
    }
}

impl ReportQuery {
    /// 설정 이름으로 조회 종류를 찾습니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "top" => Some(Self::Top),
            "recent" => Some(Self::Recent),
            _ => None,
        }
    }

    /// 설정 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Recent => "recent",
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            Self::Top => {
                "SELECT hosts.address, COUNT(*) AS c
                 FROM queries
                 JOIN hosts ON hosts.id = queries.destination_id
                 JOIN machines ON machines.id = queries.origin_id
                 WHERE queries.at >= ?1 AND machines.address LIKE ?2
                 GROUP BY hosts.address
                 ORDER BY c DESC, hosts.address ASC
                 LIMIT ?3"
            }
            Self::Recent => {
                "SELECT queries.at, hosts.address
                 FROM queries
                 JOIN hosts ON hosts.id = queries.destination_id
                 JOIN machines ON machines.id = queries.origin_id
                 WHERE queries.at >= ?1 AND machines.address LIKE ?2
                 ORDER BY queries.at DESC, queries.id DESC
                 LIMIT ?3"
            }
        }
    }

    /// 출처 패턴(SQL LIKE)과 시간 범위에 해당하는 행을 조회합니다.
    pub fn fetch(
        &self,
        db: &Database,
        origin: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReportRow>, StorageError> {
        let conn = db.lock()?;
        let mut stmt = conn
            .prepare_cached(self.sql())
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let from = since.timestamp();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let query = *self;

        let rows = stmt
            .query_map(params![from, origin, limit], move |row| match query {
                Self::Top => Ok(ReportRow::Top {
                    address: row.get(0)?,
                    count: row.get(1)?,
                }),
                Self::Recent => {
                    let at: i64 = row.get(0)?;
                    Ok(ReportRow::Recent {
                        at: DateTime::from_timestamp(at, 0).unwrap_or_default(),
                        address: row.get(1)?,
                    })
                }
            })
            .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Query(e.to_string()))
    }
}

/// `since` 이후 조회를 보낸 장비 주소 목록을 반환합니다.
///
/// IP 주소 기준 내림차순으로 정렬됩니다.
pub fn origins(db: &Database, since: DateTime<Utc>) -> Result<Vec<String>, StorageError> {
    let conn = db.lock()?;
    let mut stmt = conn
        .prepare_cached(
            "SELECT DISTINCT machines.address
             FROM queries
             JOIN machines ON machines.id = queries.origin_id
             WHERE queries.at >= ?1",
        )
        .map_err(|e| StorageError::Query(e.to_string()))?;

    let mut addresses = stmt
        .query_map(params![since.timestamp()], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|e| StorageError::Query(e.to_string()))?;

    addresses.sort_by(|a, b| {
        match (a.parse::<IpAddr>(), b.parse::<IpAddr>()) {
            (Ok(a), Ok(b)) => b.cmp(&a),
            _ => b.cmp(a),
        }
    });
    Ok(addresses)
}

/// 리포트 기간의 시작 시각을 계산합니다.
///
/// `day`, `week`, `month`, `year` 또는 Go 스타일 기간 문자열을 받습니다.
/// 해석할 수 없으면 경고를 남기고 24시간을 사용합니다.
pub fn period_start(period: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let span = match period {
        "day" => DEFAULT_PERIOD,
        "week" => DEFAULT_PERIOD * 7,
        "month" => DEFAULT_PERIOD * 30,
        "year" => DEFAULT_PERIOD * 365,
        other => match parse_duration(other) {
            Ok(span) if !span.is_zero() => span,
            _ => {
                warn!(period = other, "invalid report period, falling back to 24h");
                DEFAULT_PERIOD
            }
        },
    };

    chrono::Duration::from_std(span)
        .ok()
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
