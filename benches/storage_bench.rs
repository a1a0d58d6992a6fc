//! Benchmarks for sndo storage operations

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use sndo::{BlockType, Config, MemRecord, Mmfile, PackedRecord};
use tempfile::TempDir;

const TYPE: BlockType = match BlockType::new(1) {
    Some(t) => t,
    None => panic!(),
};

fn open(temp: &TempDir, max_chunks_mapped: usize) -> Mmfile {
    let config = Config::builder()
        .chunk_size(64 * 1024)
        .max_chunks_mapped(max_chunks_mapped)
        .build()
        .unwrap();
    Mmfile::open_with(temp.path().join("bench.sndo"), &config).unwrap()
}

fn sample_record() -> MemRecord {
    ["user:000042", "Ada Lovelace", "ada@example.com", "1815-12-10"]
        .into_iter()
        .collect()
}

fn alloc_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc");
    let payload = vec![0x5a; 100];
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("append_100b", |b| {
        b.iter_batched_ref(
            || {
                let temp = TempDir::new().unwrap();
                let file = open(&temp, 16);
                (temp, file)
            },
            |(_temp, file)| {
                for _ in 0..1000 {
                    black_box(file.append(TYPE, &payload).unwrap());
                }
            },
            BatchSize::PerIteration,
        )
    });
    group.finish();
}

fn view_benchmarks(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    // Small working set so random access keeps evicting
    let file = open(&temp, 4);
    let addresses: Vec<u64> = (0..20_000u32)
        .map(|i| file.append(TYPE, &i.to_le_bytes()).unwrap())
        .collect();

    c.bench_function("view_strided", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 7919) % addresses.len();
            black_box(file.view(addresses[i]).unwrap()[0])
        })
    });

    c.bench_function("scan_all_blocks", |b| {
        b.iter(|| black_box(file.blocks().filter_map(Result::ok).count()))
    });
}

fn record_benchmarks(c: &mut Criterion) {
    let record = sample_record();
    let mut buf = vec![0u8; record.bufsize()];
    record.store(&mut buf).unwrap();

    c.bench_function("record_store", |b| {
        let mut out = vec![0u8; record.bufsize()];
        b.iter(|| {
            record.store(&mut out).unwrap();
        })
    });

    c.bench_function("record_parse_get", |b| {
        b.iter(|| {
            let packed = PackedRecord::parse(black_box(&buf)).unwrap();
            black_box(packed.get(2).len())
        })
    });
}

criterion_group!(benches, alloc_benchmarks, view_benchmarks, record_benchmarks);
criterion_main!(benches);
