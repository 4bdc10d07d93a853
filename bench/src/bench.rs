use criterion::{BenchmarkId, Criterion, Throughput};
use std::io::Write;

fn eocd(c: &mut Criterion) {
    let mut group = c.benchmark_group("eocd-locator");
    for size in &[1, 4, 16, 64, 256, 1024, 4096, 16384, 65536] {
        let data = vec![4; *size];
        let input = data.as_slice();
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _size| {
            b.iter(|| zipfix::EocdLocator::new().locate(input));
        });
    }
    group.finish();
}

fn create_streamed_zip(count: usize) -> Vec<u8> {
    let mut archive = zipfix::StreamingZipWriter::new(Vec::new());

    for i in 0..count {
        let filename = format!("file{:06}.txt", i);
        let mut file = archive
            .new_file(&filename)
            .compression_method(zipfix::CompressionMethod::Store)
            .create()
            .unwrap();
        let mut writer = zipfix::ZipDataWriter::new(&mut file);
        writer.write_all(b"x").unwrap();
        let (_, descriptor) = writer.finish().unwrap();
        file.finish(descriptor).unwrap();
    }

    archive.finish().unwrap()
}

fn rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite");
    for count in &[1, 100, 10_000, 60_000] {
        let zip_data = create_streamed_zip(*count);
        group.throughput(Throughput::Bytes(zip_data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, count| {
            b.iter(|| {
                let (_, summary) = zipfix::rewrite_with_summary(&zip_data).unwrap();
                assert_eq!(summary.descriptors_removed, *count);
            });
        });
    }
    group.finish();
}

criterion::criterion_group!(benches, eocd, rewrite);
criterion::criterion_main!(benches);
