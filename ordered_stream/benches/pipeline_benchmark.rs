use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ordered_stream::{CancellationToken, Codec, EncodedWriter, Pipeline};
use pprof::criterion::{Output, PProfProfiler};
use std::io::{self, Cursor};

const INPUT_SIZE: usize = 16 * 1024 * 1024;

fn generate_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| ((i * 31 + i / 4096) % 253) as u8).collect()
}

/// Raw ordered copy: measures ticketing and lock overhead only.
fn bench_ordered_copy(c: &mut Criterion) {
    let data = generate_data(INPUT_SIZE);

    let mut group = c.benchmark_group("ordered_copy");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for workers in [1, 2, 4, 8] {
        for block_size in [64 * 1024, 1024 * 1024] {
            let id = BenchmarkId::new(format!("workers_{}", workers), block_size);
            group.bench_with_input(id, &block_size, |b, &block_size| {
                b.iter(|| {
                    Pipeline::new(CancellationToken::new())
                        .with_workers(workers)
                        .with_block_size(block_size)
                        .run(Cursor::new(&data[..]), io::sink())
                        .unwrap()
                        .stats
                })
            });
        }
    }

    group.finish();
}

/// Full compress path into memory for each codec.
fn bench_compress(c: &mut Criterion) {
    let data = generate_data(INPUT_SIZE / 4);

    let mut group = c.benchmark_group("compress");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(10);

    for codec in Codec::ALL {
        group.bench_function(codec.name(), |b| {
            b.iter(|| {
                let encoder = EncodedWriter::new(codec, Vec::new(), None).unwrap();
                let output = Pipeline::new(CancellationToken::new())
                    .run(Cursor::new(&data[..]), encoder)
                    .unwrap();
                output.writer.finish().unwrap().len()
            })
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)));
    targets = bench_ordered_copy, bench_compress
}
criterion_main!(benches);
