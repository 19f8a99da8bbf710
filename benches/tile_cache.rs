//! Benchmarks for tile pulls through operator chains.
//!
//! Run with: cargo bench --bench tile_cache

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rastergraph::prelude::*;

fn build_chain(engine: &Engine, size: u32) -> Arc<Raster> {
    let mut params = ParameterMap::new();
    params.insert("width".to_string(), Value::Integer(size as i64));
    params.insert("height".to_string(), Value::Integer(size as i64));
    params.insert("value".to_string(), Value::Float(1.5));
    let constant = engine
        .create_product("Constant", params, Sources::new())
        .unwrap();

    let mut params = ParameterMap::new();
    params.insert("factor".to_string(), Value::Float(2.0));
    engine
        .create_product("Scale", params, Sources::from(constant))
        .unwrap()
}

fn bench_cached_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("scale_chain");

    for tile_size in [64u32, 256, 512] {
        let rect = Rectangle::new(0, 0, tile_size, tile_size);
        group.throughput(Throughput::Elements(rect.area()));

        let engine = Engine::with_builtins();
        let target = build_chain(&engine, 1024);
        let band = target.band("band_1").unwrap();
        band.read_tile(rect).unwrap();
        group.bench_with_input(BenchmarkId::new("cache_hit", tile_size), &rect, |b, rect| {
            b.iter(|| black_box(band.read_tile(*rect).unwrap()));
        });

        let engine = Engine::with_builtins()
            .with_config(EngineConfig::new().with_tile_cache_disabled(true));
        let target = build_chain(&engine, 1024);
        let band = target.band("band_1").unwrap();
        group.bench_with_input(BenchmarkId::new("uncached", tile_size), &rect, |b, rect| {
            b.iter(|| black_box(band.read_tile(*rect).unwrap()));
        });
    }

    group.finish();
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");
    group.sample_size(20);

    for size in [512u32, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let engine = Engine::with_builtins();
                let target = build_chain(&engine, size);
                let monitor = ProgressMonitor::new();
                black_box(materialize(&target, 256, 256, &monitor).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cached_reads, bench_materialize);
criterion_main!(benches);
