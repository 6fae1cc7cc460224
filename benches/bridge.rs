use std::time::{Duration, Instant};

use criterion::{Criterion, Throughput, criterion_group, criterion_main};

use fiber_await::prelude::*;

fn bench_bridges(c: &mut Criterion) {
    let mut group = c.benchmark_group("bridge");
    group.warm_up_time(Duration::from_millis(500));
    group.throughput(Throughput::Elements(1));

    let ev = EventLoop::new();

    group.bench_function("add_task_roundtrip", |b| {
        b.iter(|| {
            ev.fiber_manager()
                .add_task(|| 1u32)
                .unwrap()
                .get_via(&ev)
                .unwrap()
        });
    });

    group.bench_function("promise_wait_fulfilled_inline", |b| {
        b.iter_custom(|iters| {
            ev.fiber_manager()
                .add_task(move || {
                    let start = Instant::now();
                    for i in 0..iters {
                        let v = init_await(promise_wait(|p: Promise<u64>| p.set_value(i)));
                        std::hint::black_box(v.unwrap());
                    }
                    start.elapsed()
                })
                .unwrap()
                .get_via(&ev)
                .unwrap()
        });
    });

    // Unbound stages hop through the main context before the fiber resumes.
    group.bench_function("deferred_wait_one_stage", |b| {
        b.iter_custom(|iters| {
            ev.fiber_manager()
                .add_task(move || {
                    let start = Instant::now();
                    for i in 0..iters {
                        let work = Deferred::ready(i).defer_value(|v| v + 1);
                        std::hint::black_box(init_await(deferred_wait(work)).unwrap());
                    }
                    start.elapsed()
                })
                .unwrap()
                .get_via(&ev)
                .unwrap()
        });
    });

    group.bench_function("task_wait_ready_future", |b| {
        b.iter_custom(|iters| {
            ev.fiber_manager()
                .add_task(move || {
                    let start = Instant::now();
                    for i in 0..iters {
                        std::hint::black_box(init_await(task_wait(async move { i })));
                    }
                    start.elapsed()
                })
                .unwrap()
                .get_via(&ev)
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_bridges);
criterion_main!(benches);
