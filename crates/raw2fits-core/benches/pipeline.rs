//! Benchmarks for the raw2fits conversion pipeline.
//!
//! Run with: cargo bench -p raw2fits-core

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use raw2fits_core::fits::{build_header, ImagePlane};
use raw2fits_core::naming::Channel;
use raw2fits_core::pipeline::extract_plane;
use raw2fits_core::pool::partition;
use raw2fits_core::{FileMetadata, FitsEncoder, FitsioEncoder};

const WIDTH: usize = 2736;
const HEIGHT: usize = 1824;

fn synthetic_rgb() -> Vec<u16> {
    (0..WIDTH * HEIGHT * 3).map(|i| (i % 65536) as u16).collect()
}

fn benchmark_partition(c: &mut Criterion) {
    c.bench_function("partition_10k_files_16_workers", |b| {
        b.iter(|| partition(black_box(10_000), black_box(16)))
    });
}

fn benchmark_extract_plane(c: &mut Criterion) {
    let rgb = synthetic_rgb();

    c.bench_function("extract_plane_red", |b| {
        b.iter(|| extract_plane(black_box(&rgb), Channel::Red))
    });
    c.bench_function("extract_plane_gray", |b| {
        b.iter(|| extract_plane(black_box(&rgb), Channel::Gray))
    });
}

fn benchmark_fits_write(c: &mut Criterion) {
    let rgb = synthetic_rgb();
    let plane = extract_plane(&rgb, Channel::Gray);
    let meta = FileMetadata {
        object: "M31".to_string(),
        ..Default::default()
    };
    let header = build_header(&meta, WIDTH, HEIGHT, Channel::Gray.comment(), &Utc::now());
    let dir = tempfile::tempdir().expect("temp dir");
    let encoder = FitsioEncoder::new();

    c.bench_function("fits_write_gray", |b| {
        b.iter(|| {
            let path = dir.path().join("bench.fits");
            let _ = std::fs::remove_file(&path);
            let mut stream = encoder.create(&path).expect("create");
            let image = ImagePlane {
                name: Channel::Gray.extname(),
                width: WIDTH,
                height: HEIGHT,
                bits: 16,
                data: black_box(&plane),
            };
            stream.write_image(&header, image).expect("write");
            stream.finish().expect("finish");
        })
    });
}

criterion_group!(
    benches,
    benchmark_partition,
    benchmark_extract_plane,
    benchmark_fits_write,
);
criterion_main!(benches);
