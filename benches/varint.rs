use bytes::Buf;
use criterion::{criterion_group, criterion_main, Criterion};

use wireproto::encoding::{decode_varint, encode_varint};

fn encode_100(values: impl Iterator<Item = u64>, buf: &mut Vec<u8>) {
    buf.clear();
    for value in values {
        encode_varint(value, buf);
    }
}

fn decode_100(mut buf: &[u8], values: &mut [u64; 100]) {
    for value in values.iter_mut() {
        *value = decode_varint(&mut buf).unwrap();
    }
    assert!(!buf.has_remaining());
}

fn mixed_width_values() -> impl Iterator<Item = u64> {
    (0..10).flat_map(|width| {
        let exponent = width * 7;
        (0..10).map(move |offset| offset + (1u64 << exponent))
    })
}

fn small_values() -> impl Iterator<Item = u64> {
    0..100
}

fn medium_values() -> impl Iterator<Item = u64> {
    let start = 1u64 << 28;
    start..start + 100
}

fn large_values() -> impl Iterator<Item = u64> {
    let start = 1u64 << 63;
    start..start + 100
}

macro_rules! varint_bench {
    ($criterion:expr, $name:literal, $values:expr) => {
        let mut buf = Vec::with_capacity(100 * 10);
        encode_100($values, &mut buf);

        $criterion.bench_function(concat!("encode_varint_", $name), |b| {
            b.iter(|| {
                encode_100($values, &mut buf);
                criterion::black_box(&buf[..]);
            });
        });

        let mut decoded = [0u64; 100];
        $criterion.bench_function(concat!("decode_varint_", $name), |b| {
            b.iter(|| {
                decode_100(&buf, &mut decoded);
                criterion::black_box(&decoded[..]);
            });
        });
    };
}

fn varint(criterion: &mut Criterion) {
    varint_bench!(criterion, "mixed", mixed_width_values());
    varint_bench!(criterion, "small", small_values());
    varint_bench!(criterion, "medium", medium_values());
    varint_bench!(criterion, "large", large_values());
}

criterion_group!(benches, varint);
criterion_main!(benches);
