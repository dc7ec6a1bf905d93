//! Composite modes and their per-pixel merge rules.

use crate::format::ColorFormat;

/// How two overlapping fragments are merged into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeMode {
	/// Per-pixel minimum-depth selection. Commutative and associative up to
	/// the deterministic tie-break (the first operand wins on exact ties).
	ZBuffer,
	/// Front-to-back over-operator alpha blend. Requires a color-only format
	/// (no depth) and is order-dependent: the caller must supply operands in
	/// the composite order.
	Blend,
}

/// Returns `true` if the first operand's depth wins a z-buffer comparison
/// against the second (smaller depth wins; ties favor the first operand).
pub fn z_buffer_first_wins(depth_a: u32, depth_b: u32) -> bool {
	f32::from_bits(depth_a) <= f32::from_bits(depth_b)
}

/// Applies the over operator to two RGBA8 pixels, `front` composited over `back`.
pub fn blend_rgba8(front: [u8; 4], back: [u8; 4]) -> [u8; 4] {
	let front_alpha = front[3] as f32 / 255.0;
	let back_weight = 1.0 - front_alpha;
	let mut out = [0u8; 4];
	for c in 0..4 {
		let value = front[c] as f32 + back_weight * back[c] as f32;
		out[c] = value.round().clamp(0.0, 255.0) as u8;
	}
	out
}

/// Applies the over operator to two RGBA float pixels, `front` composited over `back`.
pub fn blend_rgba_f32(front: [f32; 4], back: [f32; 4]) -> [f32; 4] {
	let back_weight = 1.0 - front[3];
	let mut out = [0.0f32; 4];
	for c in 0..4 {
		out[c] = front[c] + back_weight * back[c];
	}
	out
}

/// Dispatches to the float- or byte-scaled blend based on color format.
/// Both inputs and the output are carried as raw little-endian bytes so the
/// sparse-image merge loop does not need to branch on format beyond this call.
pub fn blend_bytes(front: &[u8], back: &[u8], format: ColorFormat) -> Vec<u8> {
	match format {
		ColorFormat::Rgba8 => {
			let f = [front[0], front[1], front[2], front[3]];
			let b = [back[0], back[1], back[2], back[3]];
			blend_rgba8(f, b).to_vec()
		}
		ColorFormat::RgbaFloat => {
			let decode = |bytes: &[u8]| -> [f32; 4] {
				let mut out = [0.0f32; 4];
				for (c, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
					*c = f32::from_le_bytes(chunk.try_into().expect("4 bytes"));
				}
				out
			};
			let f = decode(front);
			let b = decode(back);
			let merged = blend_rgba_f32(f, b);
			merged.iter().flat_map(|v| v.to_le_bytes()).collect()
		}
		ColorFormat::None => Vec::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn opaque_front_fully_occludes_back() {
		let front = [10, 20, 30, 255];
		let back = [255, 255, 255, 255];
		assert_eq!(blend_rgba8(front, back), front);
	}

	#[test]
	fn transparent_front_is_fully_occluded() {
		let front = [10, 20, 30, 0];
		let back = [255, 0, 0, 255];
		assert_eq!(blend_rgba8(front, back), back);
	}

	#[test]
	fn z_buffer_tie_prefers_first_operand() {
		let depth = 0.5f32.to_bits();
		assert!(z_buffer_first_wins(depth, depth));
	}

	#[test]
	fn z_buffer_picks_smaller_depth() {
		let near = 0.1f32.to_bits();
		let far = 0.9f32.to_bits();
		assert!(z_buffer_first_wins(near, far));
		assert!(!z_buffer_first_wins(far, near));
	}

	#[test]
	fn blend_order_matters() {
		let a = [200, 0, 0, 128];
		let b = [0, 200, 0, 128];
		assert_ne!(blend_rgba8(a, b), blend_rgba8(b, a));
	}
}
