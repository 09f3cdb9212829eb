//! Performance benchmarks for affinity resolution.
//!
//! Run with: `cargo bench`
//!
//! Performance targets:
//! - Resolution over 100 rules: <10us
//! - Discard-only pass over 1000 rules: <50us
//! - Hot reload: <1ms

use affinity_router::rules::{
    AffinityEngine, AffinityResolver, AttributeKey, AttributeOperator, AttributePriority, Packet,
    RoutingRule, RuleIdSequence, RuleSnapshot, RuleSnapshotBuilder,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const RULE_COUNTS: [usize; 3] = [10, 100, 1000];

// ============================================================================
// Helper Functions
// ============================================================================

/// Build `rule_count` rules, roughly half of which match the ranked packet.
fn build_rules(rule_count: usize) -> Vec<RoutingRule> {
    let ids = RuleIdSequence::new();
    (0..rule_count)
        .map(|i| {
            let dst = if i % 2 == 0 {
                "10.2.0.0/16".to_string()
            } else {
                format!("10.2.{}.0/24", i % 256)
            };
            let ports = if i % 3 == 0 { "443" } else { "1-1024" };

            let mut builder = RoutingRule::builder()
                .src_addresses([format!("192.168.{}.0/24", i % 256), "10.0.0.0/8".to_string()])
                .dst_address(dst)
                .protocol("TCP")
                .dst_port(ports)
                .tag(format!("rule-{i}"));
            if i % 5 == 0 {
                builder = builder.operator(AttributeKey::Protocol, AttributeOperator::Any);
            }
            builder.build(&ids).expect("valid rule")
        })
        .collect()
}

fn build_snapshot(rule_count: usize, version: u64) -> RuleSnapshot {
    let mut builder = RuleSnapshotBuilder::new();
    builder.add_rules(build_rules(rule_count));
    builder.version(version).build().expect("valid snapshot")
}

fn ranked_packet() -> Packet {
    "10.1.1.1,10.2.1.1,443,TCP".parse().expect("valid packet")
}

fn discarded_packet() -> Packet {
    "10.1.1.1,10.2.1.1,443,ICMP".parse().expect("valid packet")
}

// ============================================================================
// Resolver Benchmarks
// ============================================================================

fn bench_resolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolver");
    let resolver = AffinityResolver::new();
    let priority = AttributePriority::default();
    let src_first = AttributePriority::parse("src,dst,port,protocol").expect("valid priority");
    let ranked = ranked_packet();
    let discarded = discarded_packet();

    for count in RULE_COUNTS {
        let rules = build_rules(count);

        group.bench_with_input(BenchmarkId::new("ranked", count), &rules, |b, rules| {
            b.iter(|| black_box(resolver.resolve(rules, &priority, &ranked)));
        });

        group.bench_with_input(
            BenchmarkId::new("ranked_src_first", count),
            &rules,
            |b, rules| {
                b.iter(|| black_box(resolver.resolve(rules, &src_first, &ranked)));
            },
        );

        // every rule fails the protocol check
        group.bench_with_input(BenchmarkId::new("discard_only", count), &rules, |b, rules| {
            b.iter(|| black_box(resolver.resolve(rules, &priority, &discarded)));
        });
    }

    group.finish();
}

// ============================================================================
// Engine Benchmarks
// ============================================================================

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");

    let engine = AffinityEngine::new(build_snapshot(1000, 1));
    let ranked = ranked_packet();

    group.bench_function("resolve", |b| {
        b.iter(|| black_box(engine.resolve(&ranked)));
    });

    // Benchmark hot reload
    group.bench_function("hot_reload", |b| {
        b.iter(|| {
            let new_snapshot = build_snapshot(100, 2);
            engine.reload(black_box(new_snapshot));
        });
    });

    // Benchmark snapshot load (lock-free read)
    group.bench_function("load_snapshot", |b| {
        b.iter(|| {
            let _ = black_box(engine.load());
        });
    });

    group.finish();
}

// ============================================================================
// Parsing Benchmarks
// ============================================================================

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");

    group.bench_function("packet", |b| {
        b.iter(|| black_box("192.168.1.1,10.2.1.1,21,UDP".parse::<Packet>()));
    });

    group.bench_function("rule", |b| {
        let ids = RuleIdSequence::new();
        b.iter(|| {
            black_box(
                RoutingRule::builder()
                    .src_addresses(["192.168.1.0/24", "10.1.0.0/16", "172.0.0.0/8", "8.8.8.8/32"])
                    .dst_address("10.2.1.1/32")
                    .protocol("UDP")
                    .dst_port("1-1024")
                    .build(&ids),
            )
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_resolver, bench_engine, bench_parsing);
criterion_main!(benches);
