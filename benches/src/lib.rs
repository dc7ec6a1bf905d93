//! Benchmark helper utilities for icet-rs
//!
//! Generates synthetic dense images with a controllable active-pixel
//! fraction, standing in for a rendered fragment's visibility pattern, for
//! the sparse codec benchmark suite.

use icet_types::format::{BackgroundColor, ColorFormat, DepthFormat, PixelFormat};
use icet_types::image::Image;

/// Builds a dense RGBA8+depth image of `width x height` where roughly
/// `active_fraction` of pixels (by periodic stripe, not randomly, so the run
/// count is deterministic and comparable across runs) carry color/depth and
/// the rest sit at the background/far-depth sentinel.
pub fn generate_test_image(width: u32, height: u32, active_fraction: f32) -> (Image, BackgroundColor) {
	let format = PixelFormat::new(ColorFormat::Rgba8, DepthFormat::Float).expect("rgba8+depth is a valid format");
	let background = BackgroundColor::transparent_black(ColorFormat::Rgba8);
	let mut image = Image::assign_buffer(width, height, format);
	image.clear(background);

	let active_fraction = active_fraction.clamp(0.0, 1.0);
	let period = 100u32;
	let active_run = ((period as f32) * active_fraction).round() as u32;

	for row in 0..height {
		for col in 0..width {
			if col % period < active_run {
				let index = (row * width + col) as usize;
				image.set_color_rgba8(index, [120, 60, 200, 255]);
				image.set_depth_bits(index, 0.5f32.to_bits());
			}
		}
	}
	(image, background)
}

/// Common benchmark sizes, mirroring typical tile dimensions.
pub mod sizes {
	/// A small tile: 128x128 (16,384 pixels)
	pub const SMALL: (u32, u32) = (128, 128);
	/// A medium tile: 512x512 (262,144 pixels)
	pub const MEDIUM: (u32, u32) = (512, 512);
	/// A large tile: 1920x1080 (2,073,600 pixels), HD resolution
	pub const LARGE: (u32, u32) = (1920, 1080);
}

/// Active-pixel fractions worth benchmarking: a mostly-empty fragment, a
/// half-covered one, and a fully covered one (the worst case for RLE).
pub mod fractions {
	/// Sparse fragment: 10% active.
	pub const SPARSE: f32 = 0.1;
	/// Half-covered fragment.
	pub const HALF: f32 = 0.5;
	/// Fully covered fragment: the worst case for run-length encoding.
	pub const FULL: f32 = 1.0;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generated_image_has_expected_dimensions() {
		let (image, _) = generate_test_image(64, 32, fractions::HALF);
		assert_eq!(image.width(), 64);
		assert_eq!(image.height(), 32);
	}

	#[test]
	fn full_fraction_activates_every_pixel() {
		let (image, background) = generate_test_image(16, 16, fractions::FULL);
		for i in 0..image.num_pixels() {
			assert!(!image.is_inactive(i, background));
		}
	}

	#[test]
	fn zero_fraction_leaves_every_pixel_inactive() {
		let (image, background) = generate_test_image(16, 16, 0.0);
		for i in 0..image.num_pixels() {
			assert!(image.is_inactive(i, background));
		}
	}
}
