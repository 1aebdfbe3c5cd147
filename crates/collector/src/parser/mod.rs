//! syslog 파서
//!
//! 수신기가 받은 원시 바이트를 [`SyslogMessage`](dnsstats_core::types::SyslogMessage)로
//! 변환합니다. 파서는 core의 [`LogParser`](dnsstats_core::pipeline::LogParser) trait을
//! 구현하므로 다른 전송 형식도 같은 자리에 꽂을 수 있습니다.

pub mod syslog;

pub use syslog::SyslogParser;
