//! End-to-end coverage of sparse sub-range equivalence (property 2) over two
//! triangular active-pixel patterns, at the pairwise ranges named in S1/S2.

use icet_rs::prelude::*;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 64;

fn build_triangle(active: impl Fn(u32, u32) -> bool) -> Image {
	let format = PixelFormat::new(ColorFormat::Rgba8, DepthFormat::None).unwrap();
	let mut image = Image::assign_buffer(WIDTH, HEIGHT, format);
	image.clear(BackgroundColor::transparent_black(ColorFormat::Rgba8));
	for y in 0..HEIGHT {
		for x in 0..WIDTH {
			if active(x, y) {
				let index = (y * WIDTH + x) as usize;
				image.set_color_rgba8(index, [x as u8, y as u8, 0x80, 0xFF]);
			}
		}
	}
	image
}

/// The seven named offsets, in ascending order for `W=64, H=64`: every
/// unordered pair among them is exercised as a `[start, end)` range.
fn named_offsets() -> Vec<usize> {
	let w = WIDTH as usize;
	let h = HEIGHT as usize;
	vec![0, 10 * w, 10 * w + w / 2, w * h / 2 + h / 2, w * (h - 10), w * (h - 10) + w / 2, w * h]
}

fn assert_pairwise_copy_matches_direct_compress(image: &Image) {
	let bg = BackgroundColor::transparent_black(ColorFormat::Rgba8);
	let full = SparseImage::compress_image(image, bg);
	let offsets = named_offsets();

	for i in 0..offsets.len() {
		for j in (i + 1)..offsets.len() {
			let start = offsets[i];
			let end = offsets[j];
			let length = end - start;
			let via_copy = full.copy_pixels(start, length).unwrap();
			let via_direct = SparseImage::compress_sub_image(image, start, length, bg).unwrap();
			assert_eq!(via_copy, via_direct, "mismatch for range [{start}, {end})");
		}
	}
}

#[test]
fn s1_lower_triangle_sparse_copy_matches_direct_compress_everywhere() {
	let image = build_triangle(|x, y| x < HEIGHT - y);
	assert_pairwise_copy_matches_direct_compress(&image);
}

#[test]
fn s2_upper_triangle_sparse_copy_matches_direct_compress_everywhere() {
	let image = build_triangle(|x, y| HEIGHT - y < x);
	assert_pairwise_copy_matches_direct_compress(&image);
}
