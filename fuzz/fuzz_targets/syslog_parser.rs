#![no_main]

use std::net::SocketAddr;

use chrono::DateTime;
use dnsstats_collector::SyslogParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let parser = SyslogParser::new();
    let peer = SocketAddr::from(([192, 168, 0, 1], 514));
    let received_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default();

    // 크래시나 패닉 없이 Ok 또는 Err을 반환해야 한다
    let _ = parser.parse_at(data, peer, received_at);
});
