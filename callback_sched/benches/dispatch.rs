use callback_sched::{ManualClock, Scheduler, SchedulerConfig, Timing, microseconds, milliseconds};
use criterion::{Criterion, criterion_group, criterion_main};
use std::sync::Arc;

fn scheduler(capacity: usize) -> (Arc<ManualClock>, Scheduler) {
    let clock = Arc::new(ManualClock::new());
    let s = Scheduler::new(
        clock.clone(),
        SchedulerConfig { capacity, ..SchedulerConfig::default() },
    );
    (clock, s)
}

// Post a burst with scattered delays, then drain it (the hot path of the loop)
fn bench_post_and_drain(c: &mut Criterion) {
    c.bench_function("post_drain_10_callbacks", |b| {
        let (clock, s) = scheduler(16);
        b.iter(|| {
            for i in 0..10 {
                s.post_with(Timing::after(microseconds((i * 37) % 100)), || {}).unwrap();
            }
            clock.advance(microseconds(100));
            std::hint::black_box(s.dispatch_due());
        });
    });

    c.bench_function("post_drain_100_callbacks", |b| {
        let (clock, s) = scheduler(128);
        b.iter(|| {
            for i in 0..100 {
                s.post_with(Timing::after(microseconds((i * 37) % 1_000)), || {}).unwrap();
            }
            clock.advance(microseconds(1_000));
            std::hint::black_box(s.dispatch_due());
        });
    });
}

// Post + cancel against a queue that already holds periodic work
fn bench_cancel(c: &mut Criterion) {
    c.bench_function("post_cancel_with_64_pending", |b| {
        let (_clock, s) = scheduler(128);
        for i in 0..64 {
            s.post_with(Timing::every(milliseconds(10 + i)), || {}).unwrap();
        }
        b.iter(|| {
            let h = s.post_with(Timing::after(milliseconds(5)), || {}).unwrap();
            s.cancel(h);
            std::hint::black_box(h);
        });
    });
}

criterion_group!(benches, bench_post_and_drain, bench_cancel);
criterion_main!(benches);
