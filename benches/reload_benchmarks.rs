//! Performance benchmarks for hot reloading
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Initial load of a dependency chain
//! - Propagating a leaf change up a deep chain and re-requiring it
//! - Patching a class with a long identity history

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quickreload::{FileWatcher, HotReloader, MemoryLoader, PatchHistory, Value};
use std::path::Path;
use std::rc::Rc;

/// Modules /bench/m0.js .. m{depth-1}.js, each requiring the next
fn chain_loader(depth: usize) -> Rc<MemoryLoader> {
    let loader = Rc::new(MemoryLoader::new());
    for i in 0..depth {
        let next = (i + 1 < depth).then(|| format!("./m{}.js", i + 1));
        loader.define(&format!("/bench/m{}.js", i), move |scope| {
            if let Some(next) = &next {
                scope.require(next)?;
            }
            scope.export("index", Value::Number(i as f64))
        });
    }
    loader
}

fn bench_initial_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    for depth in [10usize, 100, 500].iter() {
        group.throughput(Throughput::Elements(*depth as u64));
        group.bench_with_input(BenchmarkId::new("chain", depth), depth, |b, &depth| {
            let loader = chain_loader(depth);
            b.iter(|| {
                let reloader = HotReloader::new(Rc::clone(&loader), FileWatcher::default());
                black_box(reloader.require("/bench/m0.js").unwrap())
            })
        });
    }
    group.finish();
}

fn bench_leaf_change(c: &mut Criterion) {
    let mut group = c.benchmark_group("reload");
    for depth in [10usize, 100, 500].iter() {
        group.throughput(Throughput::Elements(*depth as u64));
        group.bench_with_input(BenchmarkId::new("leaf_change", depth), depth, |b, &depth| {
            let reloader = HotReloader::new(chain_loader(depth), FileWatcher::default());
            reloader.require("/bench/m0.js").unwrap();
            let leaf = format!("/bench/m{}.js", depth - 1);
            b.iter(|| black_box(reloader.handle_change(Path::new(&leaf)).unwrap()))
        });
    }
    group.finish();
}

fn bench_patch_history(c: &mut Criterion) {
    c.bench_function("patch_with_100_identities", |b| {
        let mut history = PatchHistory::new();
        for _ in 0..100 {
            let class = Value::new_class("Widget");
            class.define_method("render", |_, _| Ok(Value::Undefined)).unwrap();
            history.patch(&[class]).unwrap();
        }
        b.iter(|| {
            let class = Value::new_class("Widget");
            class.define_method("render", |_, _| Ok(Value::Undefined)).unwrap();
            black_box(history.patch(&[class]).unwrap())
        })
    });
}

criterion_group!(benches, bench_initial_load, bench_leaf_change, bench_patch_history);
criterion_main!(benches);
