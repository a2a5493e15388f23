use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use meshgate_core::checksum::crc16;
use meshgate_core::framing::hdlc::{hdlc_frame, hdlc_unframe};
use meshgate_core::framing::stream::{stream_frame, stream_unframe};
use meshgate_core::{Address, CryptoIdentity, Frame, MessageId, RadioNodeId};

fn make_radio_frame() -> Frame {
    Frame::data(
        MessageId::new(0x1234_5678),
        0,
        3,
        Address::Radio(RadioNodeId::new(0xAABB_CCDD)),
        Address::Radio(RadioNodeId::new(0x1122_3344)),
        vec![0xBB; 201],
    )
}

fn make_crypto_frame() -> Frame {
    Frame::data(
        MessageId::new(0x1234_5678),
        0,
        1,
        Address::Crypto(CryptoIdentity::new([0xCC; 16])),
        Address::Crypto(CryptoIdentity::new([0xDD; 16])),
        vec![0xEE; 457],
    )
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for (label, frame) in [("radio", make_radio_frame()), ("crypto", make_crypto_frame())] {
        let raw = frame.encode();
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", label), &frame, |b, f| {
            b.iter(|| f.encode());
        });
        group.bench_with_input(BenchmarkId::new("decode", label), &raw, |b, r| {
            b.iter(|| Frame::decode(r));
        });
    }

    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum");

    for size in [32usize, 201, 457] {
        let data = vec![0x5Au8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("crc16", size), &data, |b, d| {
            b.iter(|| crc16(d));
        });
    }

    group.finish();
}

fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("framing");
    let raw = make_radio_frame().encode();

    let hdlc = hdlc_frame(&raw);
    group.bench_function("hdlc_frame", |b| b.iter(|| hdlc_frame(&raw)));
    group.bench_function("hdlc_unframe", |b| b.iter(|| hdlc_unframe(&hdlc)));

    let stream = stream_frame(&raw).unwrap();
    group.bench_function("stream_frame", |b| b.iter(|| stream_frame(&raw)));
    group.bench_function("stream_unframe", |b| b.iter(|| stream_unframe(&stream)));

    group.finish();
}

criterion_group!(benches, bench_frame, bench_checksum, bench_framing);
criterion_main!(benches);
