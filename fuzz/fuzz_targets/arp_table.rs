#![no_main]

use dnsstats_collector::arp::neighbor::parse_arp_table;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let _ = parse_arp_table(content);
    }
});
