/*
This benchmark measures the cost of moving one sample through the SampleBuffer
(enqueue → peek → commit) alone and while a second thread keeps enqueueing,
the same contention the producer and publisher see during a backlog drain.
*/

use criterion::{
    criterion_group,
    criterion_main,
    Criterion,
    BenchmarkId,
};

use std::{
    hint::black_box,
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    thread,
    time::Duration,
};

use track_uplink::tracking::{buffer::SampleBuffer, sample::Sample};

const CAPACITY: usize = 60;

fn sample(t: i64) -> Sample {
    Sample::new(t, -93.63705, 44.81584)
}

fn bench_buffer_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_buffer_cycle");

    group.bench_function(BenchmarkId::new("uncontended", CAPACITY), |b| {
        let buffer = SampleBuffer::new(CAPACITY);
        let mut t = 0;
        b.iter(|| {
            t += 1;
            buffer.try_enqueue(black_box(sample(t)));
            let head = buffer.peek_oldest(Duration::ZERO);
            buffer.commit_dequeue();
            black_box(head);
        });
    });

    // Producer-side pressure: the buffer stays near full, so many enqueues drop.
    group.bench_function(BenchmarkId::new("contended", CAPACITY), |b| {
        let buffer = Arc::new(SampleBuffer::new(CAPACITY));
        let running = Arc::new(AtomicBool::new(true));

        let filler = {
            let buffer = buffer.clone();
            let running = running.clone();
            thread::spawn(move || {
                let mut t = 0;
                while running.load(Ordering::Relaxed) {
                    t += 1;
                    buffer.try_enqueue(sample(t));
                    thread::yield_now();
                }
            })
        };

        b.iter(|| {
            if let Some(head) = buffer.peek_oldest(Duration::from_millis(1)) {
                buffer.commit_dequeue();
                black_box(head);
            }
        });

        running.store(false, Ordering::Relaxed);
        let _ = filler.join();
    });

    group.finish();
}

criterion_group!(benches, bench_buffer_cycle);
criterion_main!(benches);
