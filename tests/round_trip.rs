//! Property 1 (encode/decode round trip, inactive pixels normalized) and S5
//! (the same property for a depth-bearing diagonal gradient).

use icet_rs::prelude::*;

#[test]
fn property1_round_trip_normalizes_raw_inactive_pixels_to_background() {
	let format = PixelFormat::new(ColorFormat::Rgba8, DepthFormat::None).unwrap();
	let bg = BackgroundColor::transparent_black(ColorFormat::Rgba8);
	let width = 16;
	let height = 16;

	let mut image = Image::assign_buffer(width, height, format);
	image.clear(bg);
	for y in 0..height {
		for x in 0..width {
			let index = (y * width + x) as usize;
			if (x + y) % 3 == 0 {
				image.set_color_rgba8(index, [x as u8 * 7, y as u8 * 11, 200, 255]);
			}
		}
	}

	let sparse = SparseImage::compress_image(&image, bg);
	let round_tripped = sparse.decompress(bg);
	assert_eq!(round_tripped, image, "every pixel in this image is either active or already at background");
}

#[test]
fn s5_round_trip_under_z_buffer_normalizes_noise_in_inactive_pixels() {
	let format = PixelFormat::new(ColorFormat::Rgba8, DepthFormat::Float).unwrap();
	let bg = BackgroundColor::transparent_black(ColorFormat::Rgba8);
	let width = 64;
	let height = 64;

	let mut image = Image::assign_buffer(width, height, format);
	image.clear(bg);

	// Diagonal gradient: only pixels on the main diagonal carry a fragment.
	for i in 0..width.min(height) {
		let index = (i * width + i) as usize;
		let depth = i as f32 / width as f32;
		image.set_color_rgba8(index, [i as u8 * 4, 255 - i as u8 * 4, 128, 255]);
		image.set_depth_bits(index, depth.to_bits());
	}

	// Stamp color noise onto a handful of off-diagonal (still depth-inactive)
	// pixels; the codec must not treat these as contributing fragments, since
	// activity for a depth-bearing format is decided by depth alone.
	let noisy_indices = [1usize, 5, 100, 777, 4000];
	let mut expected = image.clone();
	for &index in &noisy_indices {
		image.set_color_rgba8(index, [123, 45, 67, 255]);
		assert!(image.is_inactive(index, bg), "noise must not flip the pixel active");
		// The expected round trip normalizes this pixel back to the background
		// color, since the codec never stored the noise in the first place.
		expected.set_color_rgba8(index, [0, 0, 0, 0]);
	}

	let sparse = SparseImage::compress_image(&image, bg);
	let round_tripped = sparse.decompress(bg);
	assert_eq!(round_tripped, expected);
}
