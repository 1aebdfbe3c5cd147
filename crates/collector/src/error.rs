//! 수집기 에러 타입
//!
//! [`CollectorError`]는 수집기 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<CollectorError> for DnsStatsError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use dnsstats_core::error::{ConfigError, DnsStatsError, ParseError, PipelineError, StorageError};

/// 수집기 도메인 에러
///
/// 수집 경로의 에러(추출 실패, 알 수 없는 출처, 프로브 실패)는 메시지 단위로
/// 처리되고 버려집니다. 시작 시점의 설정 에러만 상위로 전파됩니다.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// 패턴이 메시지와 일치하지 않음
    #[error("message does not match pattern '{pattern}'")]
    NoMatch {
        /// 패턴 이름
        pattern: String,
    },

    /// 이름 그룹이 비어있음
    #[error("pattern '{pattern}' captured an empty '{group}'")]
    EmptyCapture {
        /// 패턴 이름
        pattern: String,
        /// 그룹 이름 (origin, destination)
        group: &'static str,
    },

    /// origin이 IP 주소가 아님
    #[error("invalid origin address '{value}'")]
    InvalidOrigin {
        /// 캡처된 값
        value: String,
    },

    /// 패턴 등록 거부
    #[error("pattern '{name}' rejected: {reason}")]
    PatternRejected {
        /// 패턴 이름
        name: String,
        /// 거부 사유
        reason: String,
    },

    /// 설정되지 않은 출처
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    /// syslog 파싱 실패
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 주소 테이블 갱신 실패
    #[error("resolver error: {0}")]
    Resolver(String),

    /// 능동 프로브 실패
    #[error("probe of {ip} failed: {reason}")]
    Probe {
        /// 대상 IP
        ip: String,
        /// 실패 사유
        reason: String,
    },

    /// 저장 실패
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 수신기 에러 (바인드, accept 등)
    #[error("receiver error: {transport}: {reason}")]
    Receiver {
        /// 전송 방식 (udp, tcp)
        transport: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl CollectorError {
    /// 설정 에러를 생성합니다.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<CollectorError> for DnsStatsError {
    fn from(err: CollectorError) -> Self {
        match err {
            CollectorError::Config { field, reason } => {
                DnsStatsError::Config(ConfigError::InvalidValue { field, reason })
            }
            CollectorError::Storage(e) => DnsStatsError::Storage(e),
            CollectorError::Parse(e) => DnsStatsError::Parse(e),
            CollectorError::Io(e) => DnsStatsError::Io(e),
            other => DnsStatsError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_display() {
        let err = CollectorError::NoMatch {
            pattern: "test".to_owned(),
        };
        assert_eq!(err.to_string(), "message does not match pattern 'test'");
    }

    #[test]
    fn config_error_maps_to_config() {
        let err: DnsStatsError = CollectorError::config("sources", "empty").into();
        assert!(matches!(
            err,
            DnsStatsError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn storage_error_keeps_kind() {
        let err: DnsStatsError =
            CollectorError::Storage(StorageError::Transaction("locked".to_owned())).into();
        assert!(matches!(err, DnsStatsError::Storage(_)));
    }

    #[test]
    fn receiver_error_maps_to_pipeline() {
        let err: DnsStatsError = CollectorError::Receiver {
            transport: "udp".to_owned(),
            reason: "address in use".to_owned(),
        }
        .into();
        assert!(matches!(err, DnsStatsError::Pipeline(_)));
        assert!(err.to_string().contains("address in use"));
    }
}
