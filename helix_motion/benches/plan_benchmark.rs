//! Planner throughput benchmarks: queue-and-backplan, and the full
//! exec/load/run pipeline against the simulation driver.

use criterion::{criterion_group, criterion_main, Criterion};

use helix_hal::SimDriver;
use helix_motion::config::LoadedConfig;
use helix_motion::Machine;

fn bench_queue_and_backplan(c: &mut Criterion) {
    let config = LoadedConfig::default();
    c.bench_function("queue_zigzag_24_blocks", |b| {
        b.iter(|| {
            let mut m = Machine::new(config.clone());
            m.set_feed_rate(8000.0).unwrap();
            let mut x = 0.0;
            let mut y = 0.0;
            for i in 0..24 {
                if i % 2 == 0 {
                    x += 2.0;
                } else {
                    y += 1.5;
                }
                m.straight_feed(&[Some(x), Some(y), None, None, None, None])
                    .unwrap();
            }
            m
        })
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let config = LoadedConfig::default();
    c.bench_function("execute_10mm_feed", |b| {
        b.iter(|| {
            let mut m = Machine::new(config.clone());
            let mut drv = SimDriver::new();
            m.set_feed_rate(6000.0).unwrap();
            m.straight_feed(&[Some(10.0), None, None, None, None, None])
                .unwrap();
            m.run_to_idle(&mut drv).unwrap();
            drv.pulses[0]
        })
    });
}

criterion_group!(benches, bench_queue_and_backplan, bench_full_pipeline);
criterion_main!(benches);
