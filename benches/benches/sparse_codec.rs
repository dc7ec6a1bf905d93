//! Benchmark suite for the sparse (run-length encoded) image codec
//!
//! Measures compression, decompression and pairwise z-buffer compositing
//! across a range of tile sizes and active-pixel fractions, to track the
//! hot path a display node runs once per incoming fragment.
//!
//! Run with: cargo bench --manifest-path benches/Cargo.toml

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use icet_benches::{fractions, generate_test_image, sizes};
use icet_types::image::{CompositeMode, SparseImage};
use std::hint::black_box;

fn bench_compress(c: &mut Criterion) {
	let mut group = c.benchmark_group("sparse_compress");

	for &(width, height) in &[sizes::SMALL, sizes::MEDIUM, sizes::LARGE] {
		for &fraction in &[fractions::SPARSE, fractions::HALF, fractions::FULL] {
			let (image, background) = generate_test_image(width, height, fraction);
			let pixels = (width as u64) * (height as u64);
			group.throughput(Throughput::Elements(pixels));
			group.bench_with_input(
				BenchmarkId::new(format!("{width}x{height}"), format!("active={fraction}")),
				&image,
				|b, image| {
					b.iter(|| {
						let result = SparseImage::compress_image(black_box(image), background);
						black_box(result)
					});
				},
			);
		}
	}

	group.finish();
}

fn bench_decompress(c: &mut Criterion) {
	let mut group = c.benchmark_group("sparse_decompress");

	for &(width, height) in &[sizes::SMALL, sizes::MEDIUM, sizes::LARGE] {
		let (image, background) = generate_test_image(width, height, fractions::HALF);
		let sparse = SparseImage::compress_image(&image, background);
		let pixels = (width as u64) * (height as u64);
		group.throughput(Throughput::Elements(pixels));
		group.bench_with_input(BenchmarkId::new("decompress", format!("{width}x{height}")), &sparse, |b, sparse| {
			b.iter(|| {
				let result = black_box(sparse).decompress(background);
				black_box(result)
			});
		});
	}

	group.finish();
}

fn bench_composite(c: &mut Criterion) {
	let mut group = c.benchmark_group("sparse_composite");

	for &(width, height) in &[sizes::SMALL, sizes::MEDIUM, sizes::LARGE] {
		let (image_a, background) = generate_test_image(width, height, fractions::HALF);
		let (image_b, _) = generate_test_image(width, height, fractions::HALF);
		let sparse_a = SparseImage::compress_image(&image_a, background);
		let sparse_b = SparseImage::compress_image(&image_b, background);
		let pixels = (width as u64) * (height as u64);
		group.throughput(Throughput::Elements(pixels));
		group.bench_with_input(
			BenchmarkId::new("z_buffer", format!("{width}x{height}")),
			&(sparse_a, sparse_b),
			|b, (a, other)| {
				b.iter(|| {
					let result = black_box(a).composite_compressed(black_box(other), CompositeMode::ZBuffer);
					black_box(result)
				});
			},
		);
	}

	group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress, bench_composite);
criterion_main!(benches);
