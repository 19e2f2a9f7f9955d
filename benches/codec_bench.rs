use bytes::{Bytes, BytesMut};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use netmem::protocol::frame::{encode_fetch, encode_sync_header};
use netmem::protocol::{RequestCodec, Response};
use tokio_util::codec::{Decoder, Encoder};

#[allow(clippy::unwrap_used)]
fn bench_fetch_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_frame_decode");
    let frame = encode_fetch(0x3000);

    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("decode_9b", |b| {
        b.iter_batched(
            || (RequestCodec::new(), BytesMut::from(&frame[..])),
            |(mut codec, mut buf)| {
                let decoded = codec.decode(&mut buf).unwrap();
                assert!(decoded.is_some());
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_sync_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_frame_decode");
    let page_sizes = [4096usize, 16384, 65536];

    for &page_size in &page_sizes {
        // Full sync frame: opcode, offset, one page of data.
        let mut frame = BytesMut::new();
        frame.extend_from_slice(&encode_sync_header(0x3000));
        frame.extend_from_slice(&vec![0xABu8; page_size]);
        let frame = frame.freeze();

        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_function(format!("decode_{page_size}b"), |b| {
            b.iter_batched(
                || {
                    let mut codec = RequestCodec::new();
                    codec.set_page_size(page_size as u64);
                    (codec, BytesMut::from(&frame[..]))
                },
                |(mut codec, mut buf)| {
                    let decoded = codec.decode(&mut buf).unwrap();
                    assert!(decoded.is_some());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_page_response_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_response_encode");
    let page_sizes = [4096usize, 16384, 65536];

    for &page_size in &page_sizes {
        let page = Bytes::from(vec![0x5Au8; page_size]);

        group.throughput(Throughput::Bytes(page_size as u64));
        group.bench_function(format!("encode_{page_size}b"), |b| {
            b.iter_batched(
                || {
                    (
                        RequestCodec::new(),
                        page.clone(),
                        BytesMut::with_capacity(page_size + 16),
                    )
                },
                |(mut codec, page, mut buf)| {
                    codec.encode(Response::Page(page), &mut buf).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_fetch_frame_decode,
    bench_sync_frame_decode,
    bench_page_response_encode
);
criterion_main!(benches);
