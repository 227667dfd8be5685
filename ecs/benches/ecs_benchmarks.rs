use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use ember_ecs::{JobSystem, Phase, SystemScheduler};

// ---------------------------------------------------------------------------
// Job system
// ---------------------------------------------------------------------------

fn bench_independent_jobs(c: &mut Criterion) {
    let mut group = c.benchmark_group("independent_jobs");
    for threads in [1, 4] {
        let jobs = JobSystem::new(threads);
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, _| {
            b.iter(|| {
                let counter = Arc::new(AtomicU64::new(0));
                let handles: Vec<_> = (0..256)
                    .map(|i| {
                        let counter = Arc::clone(&counter);
                        jobs.schedule(move || {
                            counter.fetch_add(black_box(i), Ordering::Relaxed);
                        })
                    })
                    .collect();
                jobs.wait_all(&handles);
                counter.load(Ordering::Relaxed)
            });
        });
    }
    group.finish();
}

fn bench_dependency_chain(c: &mut Criterion) {
    let jobs = JobSystem::new(4);
    c.bench_function("dependency_chain_128", |b| {
        b.iter(|| {
            let mut previous = jobs.schedule(|| {});
            for _ in 0..127 {
                previous = jobs.schedule_after(|| {}, std::slice::from_ref(&previous));
            }
            jobs.wait(&previous);
        });
    });
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

fn bench_scheduler_tick(c: &mut Criterion) {
    let mut scheduler = SystemScheduler::new(JobSystem::new(4));
    let total = Arc::new(AtomicU64::new(0));
    for phase in Phase::ALL {
        for task in 0..8 {
            let total = Arc::clone(&total);
            scheduler.schedule(phase, &format!("task{task}"), move |ctx| {
                for job in 0..4u64 {
                    let total = Arc::clone(&total);
                    ctx.spawn(move || {
                        total.fetch_add(job, Ordering::Relaxed);
                    });
                }
            });
        }
    }

    c.bench_function("scheduler_tick_3x8x4", |b| b.iter(|| scheduler.run()));
}

criterion_group!(
    benches,
    bench_independent_jobs,
    bench_dependency_chain,
    bench_scheduler_tick
);
criterion_main!(benches);
