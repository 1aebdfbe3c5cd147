//! 내장 펌웨어 패턴
//!
//! 설정 파일의 `routers_file`과 `[routers]` 패턴은 이 목록 이후에 등록되어
//! 같은 이름의 내장 패턴을 덮어씁니다.

/// Thomson DWG850 (펌웨어 4b): `[Host <src> UDP <origin>,<port> --> ... [DNS query for <domain>]`
pub const THOMSON_DWG850_4B: &str = r"\[Host (?P<source>[^\[\]]+) (UD|TC)P (?P<origin>.*),.* --> .* ALLOW: Outbound access request \[DNS query for (?P<destination>[^\[\]]+)";

/// Thomson DWG850 (펌웨어 8b): 호스트 접두어 없음
pub const THOMSON_DWG850_8B: &str = r"(UD|TC)P (?P<origin>.*),.* --> .* ALLOW: Outbound access request \[DNS query for (?P<destination>[^\[\]]+)";

/// 시험용 콤마 구분 형식: `dns-stats <source>,<origin>,<destination>`
pub const TEST: &str = r"dns-stats (?P<source>.*),(?P<origin>.*),(?P<destination>.*)";

/// (이름, 패턴) 목록
pub const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("thomson-dwg850-4b", THOMSON_DWG850_4B),
    ("thomson-dwg850-8b", THOMSON_DWG850_8B),
    ("test", TEST),
];
