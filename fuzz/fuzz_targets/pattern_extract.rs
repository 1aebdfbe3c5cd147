#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use dnsstats_collector::{Pattern, PatternRegistry};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 사용자 정의 패턴 텍스트
    pattern: String,
    /// 추출 대상 로그 본문
    message: String,
}

fuzz_target!(|input: FuzzInput| {
    // 내장 패턴은 임의 입력에서 패닉 없이 Ok 또는 Err을 반환해야 한다
    let registry = PatternRegistry::with_builtins();
    for name in ["thomson-dwg850-4b", "thomson-dwg850-8b", "test"] {
        if let Some(pattern) = registry.find(name) {
            let _ = pattern.extract(&input.message);
        }
    }

    // 임의 패턴은 컴파일 단계에서 거부되거나 추출 시 빈 값 없이 동작해야 한다
    if input.pattern.len() > 256 {
        return;
    }
    if let Ok(pattern) = Pattern::compile("fuzz", &input.pattern) {
        if let Ok(event) = pattern.extract(&input.message) {
            assert!(!event.destination.address.is_empty());
        }
    }
});
