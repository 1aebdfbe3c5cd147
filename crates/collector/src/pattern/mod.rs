//! 추출 패턴 -- 라우터 로그 한 줄을 DNS 조회 이벤트로 변환합니다.
//!
//! 각 패턴은 정확히 두 개의 이름 그룹 `origin`(질의 장비 IP)과
//! `destination`(질의 도메인)을 가져야 합니다. 그룹은 위치가 아닌 이름으로 해석되므로
//! 이름 없는 그룹이나 다른 이름 그룹(`source` 등)이 섞여 있어도 됩니다.
//!
//! - [`Pattern`]: 컴파일된 패턴과 그룹 인덱스
//! - [`PatternRegistry`]: 이름 -> 패턴 조회
//! - [`catalog`]: 내장 펌웨어 패턴

pub mod catalog;
pub mod registry;

pub use registry::PatternRegistry;

use std::collections::HashSet;
use std::net::IpAddr;

use regex::Regex;

use dnsstats_core::types::{Host, Machine, QueryEvent};

use crate::error::CollectorError;

/// 질의 장비 그룹 이름
pub const ORIGIN_GROUP: &str = "origin";

/// 질의 도메인 그룹 이름
pub const DESTINATION_GROUP: &str = "destination";

/// 컴파일된 추출 패턴
///
/// 그룹 인덱스는 컴파일 시 한 번 계산됩니다.
#[derive(Debug, Clone)]
pub struct Pattern {
    name: String,
    regex: Regex,
    origin: usize,
    destination: usize,
}

impl Pattern {
    /// 패턴을 컴파일하고 이름 그룹을 검증합니다.
    pub fn compile(name: &str, text: &str) -> Result<Self, CollectorError> {
        let rejected = |reason: String| CollectorError::PatternRejected {
            name: name.to_owned(),
            reason,
        };

        let regex = Regex::new(text).map_err(|e| rejected(e.to_string()))?;

        let recognized: HashSet<&str> = regex
            .capture_names()
            .flatten()
            .filter(|group| *group == ORIGIN_GROUP || *group == DESTINATION_GROUP)
            .collect();
        if recognized.len() != 2 {
            return Err(rejected(format!(
                "expected named groups '{ORIGIN_GROUP}' and '{DESTINATION_GROUP}', found {}",
                recognized.len()
            )));
        }

        let index_of = |group: &str| {
            regex
                .capture_names()
                .position(|n| n == Some(group))
                .ok_or_else(|| rejected(format!("missing group '{group}'")))
        };
        let origin = index_of(ORIGIN_GROUP)?;
        let destination = index_of(DESTINATION_GROUP)?;

        Ok(Self {
            name: name.to_owned(),
            regex,
            origin,
            destination,
        })
    }

    /// 패턴 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 원본 정규식 문자열
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// 메시지에서 조회 이벤트를 추출합니다.
    ///
    /// 부수 효과가 없으며, 반환된 이벤트의 시각과 전송 주소는 비어있습니다.
    pub fn extract(&self, message: &str) -> Result<QueryEvent, CollectorError> {
        let no_match = || CollectorError::NoMatch {
            pattern: self.name.clone(),
        };

        let captures = self.regex.captures(message).ok_or_else(no_match)?;
        if captures.len() <= self.origin.max(self.destination) {
            return Err(no_match());
        }

        let origin = captures
            .get(self.origin)
            .map(|m| m.as_str().trim())
            .ok_or_else(no_match)?;
        let destination = captures
            .get(self.destination)
            .map(|m| m.as_str().trim())
            .ok_or_else(no_match)?;

        if origin.is_empty() {
            return Err(self.empty(ORIGIN_GROUP));
        }
        if destination.is_empty() {
            return Err(self.empty(DESTINATION_GROUP));
        }

        let address: IpAddr = origin.parse().map_err(|_| CollectorError::InvalidOrigin {
            value: origin.to_owned(),
        })?;

        Ok(QueryEvent::new(Machine::new(address), Host::new(destination)))
    }

    fn empty(&self, group: &'static str) -> CollectorError {
        CollectorError::EmptyCapture {
            pattern: self.name.clone(),
            group,
        }
    }
}
