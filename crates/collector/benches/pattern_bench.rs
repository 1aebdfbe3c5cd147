//! 패턴 추출 벤치마크
//!
//! 내장 패턴으로 방화벽 로그에서 DNS 조회 이벤트를 추출하는 처리량을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use dnsstats_collector::PatternRegistry;

/// thomson-dwg850-4b 펌웨어 로그
const DWG850_4B: &str = "[Host 192.168.0.1 UDP 192.168.0.23,52311 --> 192.168.0.1,53 ALLOW: Outbound access request [DNS query for www.example.com]";

/// thomson-dwg850-8b 펌웨어 로그
const DWG850_8B: &str = "UDP 192.168.0.42,40112 --> 192.168.0.1,53 ALLOW: Outbound access request [DNS query for cdn.example.net]";

/// test 패턴 로그
const TEST_LINE: &str = "dns-stats gw,192.168.0.7,api.example.org";

/// 어떤 패턴과도 맞지 않는 로그
const UNRELATED: &str = "kernel: eth0: link up, 1000Mbps, full-duplex, lpa 0xC1E1";

fn bench_extract(c: &mut Criterion) {
    let registry = PatternRegistry::with_builtins();
    let mut group = c.benchmark_group("pattern_extract");
    group.throughput(Throughput::Elements(1));

    for (name, line) in [
        ("thomson-dwg850-4b", DWG850_4B),
        ("thomson-dwg850-8b", DWG850_8B),
        ("test", TEST_LINE),
    ] {
        let pattern = registry.find(name).unwrap();
        group.bench_with_input(BenchmarkId::new("match", name), line, |b, line| {
            b.iter(|| pattern.extract(black_box(line)).unwrap())
        });
    }

    let pattern = registry.find("thomson-dwg850-4b").unwrap();
    group.bench_function("no_match", |b| {
        b.iter(|| pattern.extract(black_box(UNRELATED)).is_err())
    });

    group.finish();
}

fn bench_throughput(c: &mut Criterion) {
    let registry = PatternRegistry::with_builtins();
    let pattern = registry.find("thomson-dwg850-8b").unwrap();

    let mut group = c.benchmark_group("pattern_throughput");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("extract_1000", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                pattern.extract(black_box(DWG850_8B)).unwrap();
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_extract, bench_throughput);
criterion_main!(benches);
