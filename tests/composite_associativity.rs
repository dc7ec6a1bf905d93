//! Property 3: z_buffer composite is associative (and commutative up to the
//! deterministic tie-break) across a realistic multi-pixel fragment, not just
//! the single-pixel cases the unit tests already cover.

use icet_rs::prelude::*;

fn fragment(width: u32, height: u32, format: PixelFormat, bg: BackgroundColor, seed: u8) -> SparseImage {
	let mut image = Image::assign_buffer(width, height, format);
	image.clear(bg);
	for i in 0..image.num_pixels() {
		// Every fragment is active at every pixel, with a depth that never
		// exactly ties another fragment's (13 and 97 are coprime), so every
		// pixel forces a genuine three-way minimum-depth comparison.
		let depth = ((i * 7 + seed as usize * 13) % 97) as f32 / 97.0;
		image.set_color_rgba8(i, [seed.wrapping_add(i as u8), seed.wrapping_mul(3), 200, 255]);
		image.set_depth_bits(i, depth.to_bits());
	}
	SparseImage::compress_image(&image, bg)
}

#[test]
fn property3_z_buffer_composite_is_associative() {
	let format = PixelFormat::new(ColorFormat::Rgba8, DepthFormat::Float).unwrap();
	let bg = BackgroundColor::transparent_black(ColorFormat::Rgba8);

	let a = fragment(16, 16, format, bg, 1);
	let b = fragment(16, 16, format, bg, 2);
	let c = fragment(16, 16, format, bg, 3);

	let ab_c = a.composite_compressed(&b, CompositeMode::ZBuffer).unwrap().composite_compressed(&c, CompositeMode::ZBuffer).unwrap();
	let a_bc = a.composite_compressed(&b.composite_compressed(&c, CompositeMode::ZBuffer).unwrap(), CompositeMode::ZBuffer).unwrap();

	assert_eq!(ab_c.decompress(bg), a_bc.decompress(bg));
}
