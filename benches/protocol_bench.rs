//! Benchmarks for wirekv protocol operations

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wirekv::protocol::{decode_frame, decode_request, encode_request, Framer, Request};

fn protocol_benchmarks(c: &mut Criterion) {
    let set = Request::Set {
        key: b"benchmark-key".to_vec(),
        value: vec![0xAB; 1024],
    };
    let encoded = encode_request(1, &set);

    c.bench_function("encode_set_1k", |b| {
        b.iter(|| encode_request(black_box(1), black_box(&set)))
    });

    c.bench_function("decode_set_1k", |b| {
        b.iter(|| {
            let frame = decode_frame(black_box(&encoded)).unwrap();
            decode_request(&frame).unwrap()
        })
    });

    // 64 frames per push, the shape a busy connection produces
    let wire: Vec<u8> = (0..64).flat_map(|i| encode_request(i, &set)).collect();
    c.bench_function("framer_reassemble_64", |b| {
        b.iter(|| {
            let mut framer = Framer::new();
            let frames = framer.push(black_box(&wire)).unwrap();
            assert_eq!(frames.len(), 64);
        })
    });
}

criterion_group!(benches, protocol_benchmarks);
criterion_main!(benches);
