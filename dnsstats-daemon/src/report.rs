//! 일회성 텍스트 리포트
//!
//! 네트워크 전체 집계 열과 장비별 열을 나란히 배치합니다.
//! 각 열은 설정된 조회(`top`, `recent`)마다 `lines`개의 행 구역을 가지므로
//! 모든 열에서 같은 조회 결과가 같은 높이에 놓입니다.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::warn;

use dnsstats_core::config::ReportConfig;
use dnsstats_core::error::StorageError;
use dnsstats_storage::report::RECENT_TIME_FORMAT;
use dnsstats_storage::{Database, ReportQuery, ReportRow, origins, period_start};

/// 열 사이 여백
const COLUMN_GAP: usize = 5;

/// 리포트 문자열을 생성합니다.
pub fn render(
    db: &Database,
    config: &ReportConfig,
    period: &str,
    now: DateTime<Utc>,
) -> Result<String, StorageError> {
    let started = Instant::now();
    let since = period_start(period, now);
    let queries = configured_queries(config);

    let mut targets = vec![config.network.clone()];
    targets.extend(origins(db, since)?);

    let mut columns = Vec::with_capacity(targets.len());
    for origin in &targets {
        columns.push(render_column(db, &queries, origin, since, config.lines)?);
    }

    let mut output = join_columns(&columns);
    output.push(format!(
        "{} ~ {} // took {:.6} seconds to generate",
        since.format(RECENT_TIME_FORMAT),
        now.format(RECENT_TIME_FORMAT),
        started.elapsed().as_secs_f64()
    ));
    Ok(output.join("\n"))
}

fn configured_queries(config: &ReportConfig) -> Vec<ReportQuery> {
    config
        .fetchers
        .iter()
        .filter_map(|name| {
            let query = ReportQuery::from_name(name);
            if query.is_none() {
                warn!(fetcher = %name, "unknown report fetcher skipped");
            }
            query
        })
        .collect()
}

/// 한 출처의 열: 머리글, 빈 행, 조회마다 `lines`개 행과 빈 행
fn render_column(
    db: &Database,
    queries: &[ReportQuery],
    origin: &str,
    since: DateTime<Utc>,
    lines: usize,
) -> Result<Vec<String>, StorageError> {
    let mut column = vec![origin.replace('%', "0"), String::new()];

    for query in queries {
        let rows = query.fetch(db, origin, since, lines)?;
        let mut section = format_rows(&rows);
        section.resize(lines, String::new());
        column.extend(section);
        column.push(String::new());
    }

    Ok(column)
}

/// 행을 출력 문자열로 변환합니다.
///
/// `Top` 행의 횟수는 가장 긴 횟수보다 한 칸 넓게 왼쪽 정렬합니다.
pub fn format_rows(rows: &[ReportRow]) -> Vec<String> {
    let count_width = rows
        .iter()
        .filter_map(|row| match row {
            ReportRow::Top { count, .. } => Some(count.to_string().len()),
            ReportRow::Recent { .. } => None,
        })
        .max()
        .unwrap_or(0)
        + 1;

    rows.iter()
        .map(|row| match row {
            ReportRow::Top { count, address } => {
                format!("{:<width$}{address}", count, width = count_width)
            }
            ReportRow::Recent { .. } => row.to_string(),
        })
        .collect()
}

fn join_columns(columns: &[Vec<String>]) -> Vec<String> {
    let height = columns.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = columns
        .iter()
        .map(|column| {
            column.iter().map(|cell| cell.chars().count()).max().unwrap_or(0) + COLUMN_GAP
        })
        .collect();

    (0..height)
        .map(|i| {
            let mut line = String::new();
            for (column, width) in columns.iter().zip(&widths) {
                let cell = column.get(i).map(String::as_str).unwrap_or_default();
                line.push_str(&format!("{cell:<width$}"));
            }
            line.trim_end().to_owned()
        })
        .collect()
}
