/// Sequence Matching Benchmarks
///
/// Measures the exhaustive per-offset scan of the sequence matcher and a full
/// `generic` substitution pass over synthetic traces of increasing length.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dostrace::record::{Address, Instruction};
use dostrace::sequence::{PatternStep, SequenceMatcher};
use dostrace::substitution::{RuleOptions, RuleRegistry, SubstitutionEngine, MUL32_ENTRY};
use dostrace::TraceStore;
use std::time::Duration;

const BLOCK: [&str; 12] = [
    "push dx",
    "push ax",
    "push cx",
    "push bx",
    "call 2A74:363C",
    "mov  ax,[bp+06]",
    "mul  word [bp+0A]",
    "retf 0008",
    "mov  ax,5678",
    "mov  dx,1234",
    "xor  si,si",
    "add  ax,[bp-04]",
];

fn synthetic_trace(len: usize) -> TraceStore {
    let mut store = TraceStore::new();
    for n in 0..len {
        store.push(Instruction::new(
            Address::new(0x1000, n as u32),
            BLOCK[n % BLOCK.len()],
        ));
    }
    store
}

fn bench_find_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_all");
    group.measurement_time(Duration::from_secs(5));

    let matcher = SequenceMatcher::new(vec![
        PatternStep::new(r"push (?P<p1>.*)").unwrap(),
        PatternStep::new(r"push (?P<p2>.*)").unwrap(),
        PatternStep::new(r"push (?P<p3>.*)").unwrap(),
        PatternStep::new(r"push (?P<p4>.*)").unwrap(),
        PatternStep::new(r"call\s+2A74:363C").unwrap(),
        PatternStep::with_options(r"ret.*", 0, 30, true).unwrap(),
        PatternStep::new(r"ret.*").unwrap(),
    ]);

    for len in [1_000usize, 10_000, 100_000] {
        let store = synthetic_trace(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("mul32", len), &store, |b, store| {
            b.iter(|| black_box(matcher.find_all(store).count()));
        });
    }

    group.finish();
}

fn bench_generic_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("generic_rules");
    group.measurement_time(Duration::from_secs(5));

    let mut options = RuleOptions::new();
    options.set(MUL32_ENTRY, "2A74:363C");
    let engine = SubstitutionEngine::new(RuleRegistry::with_builtin(), options);

    for len in [1_000usize, 10_000] {
        let store = synthetic_trace(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("run", len), &store, |b, store| {
            b.iter_batched(
                || store.clone(),
                |mut store| black_box(engine.run(&mut store, &["generic"]).unwrap().total()),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_find_all, bench_generic_rules);
criterion_main!(benches);
