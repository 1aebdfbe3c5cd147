//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `dnsstats_`
//! - 모듈명: `collector_`, `arp_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(dnsstats_core::metrics::COLLECTOR_MESSAGES_RECEIVED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 드롭 사유 레이블 키 (unknown_source, no_match, parse_error, channel_full, too_large)
pub const LABEL_REASON: &str = "reason";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 전송 방식 레이블 키 (udp, tcp)
pub const LABEL_TRANSPORT: &str = "transport";

// ─── Collector 메트릭 ──────────────────────────────────────────────

/// Collector: 수신된 syslog 메시지 수 (counter, label: transport)
pub const COLLECTOR_MESSAGES_RECEIVED_TOTAL: &str = "dnsstats_collector_messages_received_total";

/// Collector: 드롭된 메시지 수 (counter, label: reason)
pub const COLLECTOR_MESSAGES_DROPPED_TOTAL: &str = "dnsstats_collector_messages_dropped_total";

/// Collector: 버퍼에 대기 중인 이벤트 수 (gauge)
pub const COLLECTOR_EVENTS_BUFFERED: &str = "dnsstats_collector_events_buffered";

/// Collector: 저장 시도 수 (counter, label: result)
pub const COLLECTOR_FLUSHES_TOTAL: &str = "dnsstats_collector_flushes_total";

/// Collector: 저장 소요 시간 (histogram, 초)
pub const COLLECTOR_FLUSH_DURATION_SECONDS: &str = "dnsstats_collector_flush_duration_seconds";

// ─── ARP 메트릭 ────────────────────────────────────────────────────

/// ARP: 주소 테이블 엔트리 수 (gauge)
pub const ARP_ENTRIES: &str = "dnsstats_arp_entries";

/// ARP: 능동 프로브 수 (counter, label: result)
pub const ARP_PROBES_TOTAL: &str = "dnsstats_arp_probes_total";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "dnsstats_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 저장 소요 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 30s 범위 (SQLite 트랜잭션은 디스크 fsync 포함)
pub const FLUSH_DURATION_BUCKETS: [f64; 9] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Collector
    describe_counter!(
        COLLECTOR_MESSAGES_RECEIVED_TOTAL,
        "Total number of syslog messages received per transport"
    );
    describe_counter!(
        COLLECTOR_MESSAGES_DROPPED_TOTAL,
        "Messages dropped before buffering (unknown source, no match, channel full)"
    );
    describe_gauge!(
        COLLECTOR_EVENTS_BUFFERED,
        "Query events waiting for the next storage flush"
    );
    describe_counter!(
        COLLECTOR_FLUSHES_TOTAL,
        "Storage flush attempts by result (success, failure)"
    );
    describe_histogram!(
        COLLECTOR_FLUSH_DURATION_SECONDS,
        "Duration of a storage flush transaction in seconds"
    );

    // ARP
    describe_gauge!(ARP_ENTRIES, "Number of entries in the address table");
    describe_counter!(
        ARP_PROBES_TOTAL,
        "Active probes issued for unknown addresses by result"
    );

    // Daemon
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
