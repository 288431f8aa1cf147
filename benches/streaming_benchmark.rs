use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use excelkit::{BigExcelWriter, CellValue, ExcelReader, ExcelWriter, SaxReader, SheetSelector};

fn sample_bytes(size: usize) -> Vec<u8> {
    let mut writer = ExcelWriter::new();
    writer.write_head_row(["ID", "Name", "Value"]).unwrap();
    for i in 0..size {
        writer
            .write_row([
                CellValue::Int(i as i64),
                CellValue::String(format!("Name_{}", i)),
                CellValue::Float(i as f64 * 1.5),
            ])
            .unwrap();
    }
    let mut buf = Vec::new();
    writer.flush_to(&mut buf).unwrap();
    buf
}

fn benchmark_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");
    group.sample_size(10);

    for size in [100, 1000, 5000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(sample_bytes(size)));
        });
    }

    group.finish();
}

fn benchmark_streaming_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("streaming_write");
    group.sample_size(10);

    for size in [1000, 10000, 50000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut writer = BigExcelWriter::new();
                writer.write_head_row(["ID", "Name", "Value"]).unwrap();
                for i in 0..size {
                    writer
                        .write_row([
                            CellValue::Int(i as i64),
                            CellValue::String(format!("Name_{}", i)),
                            CellValue::Int(i as i64 * 100),
                        ])
                        .unwrap();
                }
                let mut buf = Vec::new();
                writer.flush_to(&mut buf).unwrap();
                writer.close().unwrap();
                black_box(buf);
            });
        });
    }

    group.finish();
}

fn benchmark_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    group.sample_size(10);

    for size in [1000, 5000, 10000].iter() {
        let bytes = sample_bytes(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let reader = ExcelReader::from_reader(Cursor::new(bytes.as_slice())).unwrap();
                for row in reader.read() {
                    black_box(row);
                }
            });
        });
    }

    group.finish();
}

fn benchmark_sax_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("sax_read");
    group.sample_size(10);

    for size in [1000, 5000, 10000].iter() {
        let bytes = sample_bytes(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut reader = SaxReader::new(|_: usize, _: usize, row: &[CellValue]| {
                    black_box(row);
                });
                reader
                    .read(Cursor::new(bytes.as_slice()), SheetSelector::First)
                    .unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_write,
    benchmark_streaming_write,
    benchmark_read,
    benchmark_sax_read
);
criterion_main!(benches);
