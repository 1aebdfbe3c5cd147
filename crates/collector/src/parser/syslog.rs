//! Syslog 파서 (RFC 5424 / RFC 3164)
//!
//! # 지원 형식
//! ```text
//! <PRI>1 TIMESTAMP HOSTNAME APP-NAME PROCID MSGID STRUCTURED-DATA MSG   (RFC 5424)
//! <PRI>MMM DD HH:MM:SS HOSTNAME MSG                                   (RFC 3164)
//! ```
//!
//! 라우터 펌웨어가 보내는 메시지는 형식이 제각각이므로 최선 노력으로 파싱합니다.
//! PRI가 없으면 전체를 본문으로, 타임스탬프가 없으면 수신 시각을 사용합니다.
//!
//! # 사용 예시
//! ```ignore
//! use dnsstats_collector::parser::SyslogParser;
//! use dnsstats_core::pipeline::LogParser;
//!
//! let parser = SyslogParser::new();
//! let msg = parser.parse(b"<134>Jan 15 12:00:00 gw dns-stats gw,10.0.0.7,example.net", peer)?;
//! assert_eq!(msg.hostname, "gw");
//! ```

use std::net::SocketAddr;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Utc};

use dnsstats_core::error::ParseError;
use dnsstats_core::pipeline::LogParser;
use dnsstats_core::types::SyslogMessage;

/// 유효한 최대 PRI 값 (facility 23 * 8 + severity 7)
const MAX_SYSLOG_PRI: u8 = 191;

/// 기본 최대 입력 크기
const DEFAULT_MAX_INPUT_SIZE: usize = 64 * 1024;

/// RFC 5424 / RFC 3164 syslog 파서
pub struct SyslogParser {
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl SyslogParser {
    /// 기본 설정으로 새 파서를 생성합니다.
    pub fn new() -> Self {
        Self {
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
        }
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// 수신 시각을 지정하여 파싱합니다.
    ///
    /// 메시지에 시각이 없거나 해석할 수 없으면 `received_at`이 사용됩니다.
    /// RFC 3164 타임스탬프의 연도도 `received_at`에서 가져옵니다.
    pub fn parse_at(
        &self,
        raw: &[u8],
        source_addr: SocketAddr,
        received_at: DateTime<Utc>,
    ) -> Result<SyslogMessage, ParseError> {
        if raw.len() > self.max_input_size {
            return Err(ParseError::TooLarge {
                size: raw.len(),
                max: self.max_input_size,
            });
        }

        let input = String::from_utf8_lossy(raw);
        let input = input.trim();

        if input.is_empty() {
            return Err(failed(0, "empty input"));
        }

        let message = |hostname: &str, content: &str, timestamp| SyslogMessage {
            hostname: hostname.to_owned(),
            content: content.to_owned(),
            timestamp,
            source_addr,
        };

        // PRI 없는 메시지는 전체를 본문으로 취급
        let Some(after_bracket) = input.strip_prefix('<') else {
            return Ok(message("", input, received_at));
        };

        let pri_end = after_bracket
            .find('>')
            .ok_or_else(|| failed(0, "unterminated PRI field"))?;
        let pri_str = &after_bracket[..pri_end];
        if pri_str.is_empty() || pri_str.len() > 3 {
            return Err(failed(1, format!("invalid PRI value: '{pri_str}'")));
        }
        let pri: u8 = pri_str
            .parse()
            .map_err(|_| failed(1, format!("invalid PRI value: '{pri_str}'")))?;
        if pri > MAX_SYSLOG_PRI {
            return Err(failed(
                1,
                format!("PRI value {pri} out of valid range (0-{MAX_SYSLOG_PRI})"),
            ));
        }

        let remainder = &after_bracket[pri_end + 1..];

        let (hostname, content, timestamp) = match remainder.strip_prefix("1 ") {
            Some(body) => Self::parse_rfc5424_body(body, received_at)?,
            None => Self::parse_rfc3164_body(remainder, received_at),
        };

        Ok(message(hostname, content, timestamp))
    }

    /// RFC 5424 본문: `TIMESTAMP HOSTNAME APP-NAME PROCID MSGID [SD] MSG`
    fn parse_rfc5424_body(
        body: &str,
        received_at: DateTime<Utc>,
    ) -> Result<(&str, &str, DateTime<Utc>), ParseError> {
        let parts: Vec<&str> = body.splitn(6, ' ').collect();
        if parts.len() < 5 {
            return Err(failed(
                0,
                format!(
                    "RFC 5424 requires at least 5 header fields after version, got {}",
                    parts.len()
                ),
            ));
        }

        let timestamp = match nilvalue_to_empty(parts[0]) {
            "" => received_at,
            value => DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| failed(0, format!("invalid RFC 3339 timestamp '{value}': {e}")))?,
        };
        let hostname = nilvalue_to_empty(parts[1]);

        let sd_and_msg = parts.get(5).copied().unwrap_or_default();
        let content = if sd_and_msg.starts_with('[') {
            skip_structured_data(sd_and_msg)
        } else if let Some(msg) = sd_and_msg.strip_prefix("- ") {
            msg
        } else if sd_and_msg == "-" {
            ""
        } else {
            sd_and_msg
        };

        Ok((
            hostname,
            content.trim_start_matches('\u{feff}'),
            timestamp,
        ))
    }

    /// RFC 3164 본문: `MMM DD HH:MM:SS HOSTNAME MSG`
    ///
    /// 타임스탬프를 해석할 수 없으면 전체를 본문으로 취급합니다.
    /// HOSTNAME 자리의 토큰이 `:`로 끝나면 태그로 보고 HOSTNAME을 비웁니다.
    fn parse_rfc3164_body(body: &str, received_at: DateTime<Utc>) -> (&str, &str, DateTime<Utc>) {
        let Some((timestamp, rest)) = Self::parse_bsd_timestamp(body, received_at) else {
            return ("", body.trim_start(), received_at);
        };

        match next_token(rest) {
            Some((token, _)) if token.ends_with(':') => ("", rest.trim_start(), timestamp),
            Some((hostname, content)) => (hostname, content.trim_start(), timestamp),
            None => ("", "", timestamp),
        }
    }

    /// `MMM DD HH:MM:SS` 타임스탬프와 나머지를 반환합니다.
    ///
    /// 연도 정보가 없으므로 수신 시각의 연도를 가정합니다.
    fn parse_bsd_timestamp(
        body: &str,
        received_at: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, &str)> {
        let (month, rest) = next_token(body)?;
        let (day, rest) = next_token(rest)?;
        let (time, rest) = next_token(rest)?;

        let at_year = |year: i32| {
            let text = format!("{year} {month} {day:0>2} {time}");
            NaiveDateTime::parse_from_str(&text, "%Y %b %d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        };

        // 연도가 없으므로 수신 시각보다 하루 이상 미래면 작년 메시지로 봅니다 (12/31 -> 1/1)
        let year = received_at.year();
        let mut timestamp = at_year(year)?;
        if timestamp - received_at > Duration::days(1) {
            timestamp = at_year(year - 1)?;
        }
        Some((timestamp, rest))
    }
}

impl Default for SyslogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser for SyslogParser {
    fn format_name(&self) -> &str {
        "syslog"
    }

    fn parse(&self, raw: &[u8], source_addr: SocketAddr) -> Result<SyslogMessage, ParseError> {
        self.parse_at(raw, source_addr, Utc::now())
    }
}

fn failed(offset: usize, reason: impl Into<String>) -> ParseError {
    ParseError::Failed {
        offset,
        reason: reason.into(),
    }
}

/// NILVALUE (`-`)를 빈 문자열로 변환합니다.
fn nilvalue_to_empty(value: &str) -> &str {
    if value == "-" { "" } else { value }
}

/// 앞쪽 공백을 건너뛰고 다음 토큰과 나머지를 반환합니다.
fn next_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start_matches(' ');
    if input.is_empty() {
        return None;
    }
    Some(input.split_once(' ').unwrap_or((input, "")))
}

/// 하나 이상의 `[...]` SD 요소를 건너뛰고 MSG 부분을 반환합니다.
///
/// 닫히지 않은 SD는 MSG가 없는 것으로 취급합니다.
fn skip_structured_data(input: &str) -> &str {
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut escaped = false;

    for (idx, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quote => escaped = true,
            '"' if depth > 0 => in_quote = !in_quote,
            '[' if !in_quote => depth += 1,
            ']' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let rest = &input[idx + 1..];
                    if !rest.starts_with('[') {
                        return rest.trim_start();
                    }
                }
            }
            _ => {}
        }
    }

    ""
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn peer() -> SocketAddr {
        "192.168.0.1:514".parse().unwrap()
    }

    fn received() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap()
    }

    fn parse(raw: &str) -> Result<SyslogMessage, ParseError> {
        SyslogParser::new().parse_at(raw.as_bytes(), peer(), received())
    }

    #[test]
    fn format_name_is_syslog() {
        assert_eq!(SyslogParser::new().format_name(), "syslog");
    }

    #[test]
    fn parse_rfc5424_basic() {
        let msg = parse("<134>1 2024-01-15T12:00:00Z gw dnsmasq 1234 - - query example.com").unwrap();
        assert_eq!(msg.hostname, "gw");
        assert_eq!(msg.content, "query example.com");
        assert_eq!(
            msg.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
        );
        assert_eq!(msg.source_addr, peer());
    }

    #[test]
    fn parse_rfc5424_with_offset_timestamp() {
        let msg = parse("<134>1 2024-01-15T21:00:00+09:00 gw app - - - hello").unwrap();
        assert_eq!(
            msg.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn parse_rfc5424_nil_timestamp_uses_arrival_time() {
        let msg = parse("<134>1 - gw app - - - hello").unwrap();
        assert_eq!(msg.timestamp, received());
    }

    #[test]
    fn parse_rfc5424_skips_structured_data() {
        let msg = parse(
            r#"<134>1 2024-01-15T12:00:00Z gw app - - [meta seq="1"][origin ip="10.0.0.1"] the message"#,
        )
        .unwrap();
        assert_eq!(msg.content, "the message");
    }

    #[test]
    fn parse_rfc5424_structured_data_with_escaped_bracket() {
        let msg = parse(
            r#"<134>1 2024-01-15T12:00:00Z gw app - - [meta note="a \"]\" b"] done"#,
        )
        .unwrap();
        assert_eq!(msg.content, "done");
    }

    #[test]
    fn parse_rfc5424_multibyte_structured_data() {
        let msg = parse(r#"<134>1 2024-01-15T12:00:00Z gw app - - [meta 이름="값"] 본문"#).unwrap();
        assert_eq!(msg.content, "본문");
    }

    #[test]
    fn parse_rfc5424_nil_hostname_falls_back_to_peer() {
        let msg = parse("<134>1 2024-01-15T12:00:00Z - app - - - hello").unwrap();
        assert_eq!(msg.hostname, "");
        assert_eq!(msg.declared_source(), "192.168.0.1");
    }

    #[test]
    fn parse_rfc5424_invalid_timestamp_fails() {
        assert!(parse("<134>1 yesterday gw app - - - hello").is_err());
    }

    #[test]
    fn parse_rfc5424_too_few_fields_fails() {
        assert!(parse("<134>1 2024-01-15T12:00:00Z gw").is_err());
    }

    #[test]
    fn parse_rfc3164_basic() {
        let msg = parse("<13>Jan 15 12:00:00 gw dns-stats gw,10.0.0.7,example.net").unwrap();
        assert_eq!(msg.hostname, "gw");
        assert_eq!(msg.content, "dns-stats gw,10.0.0.7,example.net");
        assert_eq!(
            msg.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn parse_rfc3164_single_digit_day() {
        let msg = parse("<13>Feb  5 07:08:09 192.168.0.1 FW: [Host ...]").unwrap();
        assert_eq!(msg.hostname, "192.168.0.1");
        assert_eq!(msg.content, "FW: [Host ...]");
        assert_eq!(
            msg.timestamp,
            Utc.with_ymd_and_hms(2024, 2, 5, 7, 8, 9).unwrap()
        );
    }

    #[test]
    fn parse_rfc3164_december_received_in_january_is_last_year() {
        let received = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 10).unwrap();
        let msg = SyslogParser::new()
            .parse_at(b"<13>Dec 31 23:59:59 gw dnsmasq: query", peer(), received)
            .unwrap();
        assert_eq!(
            msg.timestamp,
            Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn parse_rfc3164_slightly_ahead_clock_keeps_current_year() {
        let received = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 10).unwrap();
        let msg = SyslogParser::new()
            .parse_at(b"<13>Jan  1 00:05:00 gw dnsmasq: query", peer(), received)
            .unwrap();
        assert_eq!(
            msg.timestamp,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 5, 0).unwrap()
        );
    }

    #[test]
    fn parse_rfc3164_tag_without_hostname() {
        let msg = parse("<13>Jan 15 12:00:00 kernel: link up").unwrap();
        assert_eq!(msg.hostname, "");
        assert_eq!(msg.content, "kernel: link up");
    }

    #[test]
    fn parse_rfc3164_bad_timestamp_keeps_whole_body() {
        let msg = parse("<13>not a timestamp at all").unwrap();
        assert_eq!(msg.hostname, "");
        assert_eq!(msg.content, "not a timestamp at all");
        assert_eq!(msg.timestamp, received());
    }

    #[test]
    fn parse_missing_pri_is_lenient() {
        let msg = parse("dns-stats gw,10.0.0.7,example.net\n").unwrap();
        assert_eq!(msg.hostname, "");
        assert_eq!(msg.content, "dns-stats gw,10.0.0.7,example.net");
        assert_eq!(msg.timestamp, received());
    }

    #[test]
    fn parse_empty_input_fails() {
        assert!(parse("").is_err());
        assert!(parse("   \n").is_err());
    }

    #[test]
    fn parse_invalid_pri_fails() {
        assert!(parse("<abc>1 - - - - - -").is_err());
        assert!(parse("<>hello").is_err());
        assert!(parse("<1234>hello").is_err());
        assert!(parse("<34 no close").is_err());
    }

    #[test]
    fn parse_pri_out_of_range_fails() {
        assert!(parse("<192>Jan 15 12:00:00 gw hello").is_err());
        assert!(parse("<191>Jan 15 12:00:00 gw hello").is_ok());
    }

    #[test]
    fn parse_too_large_fails() {
        let parser = SyslogParser::new().with_max_input_size(16);
        let err = parser
            .parse_at(b"<13>Jan 15 12:00:00 gw hello world", peer(), received())
            .unwrap_err();
        assert!(matches!(err, ParseError::TooLarge { max: 16, .. }));
    }

    #[test]
    fn skip_structured_data_unterminated() {
        assert_eq!(skip_structured_data("[meta a=\"1\" hello"), "");
    }

    mod proptest_parser {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_panics_on_arbitrary_bytes(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
                let _ = SyslogParser::new().parse_at(&raw, peer(), received());
            }

            #[test]
            fn never_panics_on_syslog_like_text(
                pri in 0u16..300,
                body in "[ -~\\[\\]\"\\\\가-힣]{0,120}",
            ) {
                let raw = format!("<{pri}>{body}");
                let _ = SyslogParser::new().parse_at(raw.as_bytes(), peer(), received());
                let raw = format!("<{pri}>1 {body}");
                let _ = SyslogParser::new().parse_at(raw.as_bytes(), peer(), received());
            }
        }
    }
}
