//! # Protocol Benchmark
//!
//! Encode and decode throughput for a typical tick's worth of CRDT traffic.
//!
//! Run with: `cargo bench --package tessera_shared`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_shared::{read_message, ByteBuffer, ComponentId, CrdtMessage, Entity};

fn batch(count: u16, payload: usize) -> Vec<CrdtMessage> {
    (0..count)
        .map(|i| {
            let entity = Entity::new(512 + i, 0);
            if i % 8 == 0 {
                CrdtMessage::delete(entity, ComponentId(1), u32::from(i))
            } else {
                CrdtMessage::put(entity, ComponentId(1), u32::from(i), vec![0xAA; payload])
            }
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for count in [100u16, 1_000, 10_000] {
        let messages = batch(count, 64);
        group.bench_with_input(BenchmarkId::from_parameter(count), &messages, |b, messages| {
            b.iter(|| {
                let mut buf = ByteBuffer::with_capacity(messages.len() * 96);
                for message in messages {
                    message.write_to(&mut buf);
                }
                black_box(buf.write_offset())
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for count in [100u16, 1_000, 10_000] {
        let mut encoded = ByteBuffer::new();
        for message in batch(count, 64) {
            message.write_to(&mut encoded);
        }
        let bytes = encoded.into_vec();

        group.bench_with_input(BenchmarkId::from_parameter(count), &bytes, |b, bytes| {
            b.iter(|| {
                let mut buf = ByteBuffer::from(bytes.as_slice());
                let mut decoded = 0usize;
                while let Ok(Some(frame)) = read_message(&mut buf) {
                    decoded += frame.raw.len();
                }
                black_box(decoded)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
