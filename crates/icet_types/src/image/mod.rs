//! Dense pixel buffers: header-prefixed color/depth image storage.

pub mod composite;
pub mod sparse;

pub use composite::CompositeMode;
pub use sparse::SparseImage;

use crate::error::{IcetError, Result};
use crate::format::{BackgroundColor, ColorFormat, DepthFormat, FAR_DEPTH_BITS, PixelFormat};

/// Magic number stamped into every dense image header.
pub const IMAGE_MAGIC: u32 = 0x1C37_1A6E;

/// Size in bytes of the dense image header.
///
/// Layout: magic(4) + color_fmt(1) + depth_fmt(1) + reserved(2) + width(4) +
/// height(4) + byte_size(4) = 20 bytes.
pub const HEADER_SIZE: usize = 20;

/// Computes the exact buffer size (header + color plane + depth plane) for a
/// dense image of the given dimensions and pixel format.
pub fn image_buffer_size(width: u32, height: u32, format: PixelFormat) -> usize {
	HEADER_SIZE + (width as usize) * (height as usize) * format.pixel_bytes()
}

/// A dense, header-prefixed color/depth image.
///
/// The buffer is laid out as `[header][color plane][depth plane]`, tightly
/// packed and row-major. Either plane may be zero-length depending on format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
	buffer: Vec<u8>,
}

impl Image {
	/// Interprets a caller-owned buffer as an `Image` of the given dimensions
	/// and format, writing the header but leaving pixel contents
	/// uninitialized (zeroed, since the buffer is a fresh `Vec`). Callers
	/// must write or [`clear`](Self::clear) before reading pixels.
	pub fn assign_buffer(width: u32, height: u32, format: PixelFormat) -> Self {
		let size = image_buffer_size(width, height, format);
		let mut buffer = vec![0u8; size];
		write_header(&mut buffer, IMAGE_MAGIC, format, width, height, size as u32);
		Self {
			buffer,
		}
	}

	/// Interprets a caller-owned buffer as an `Image` of the given dimensions
	/// and format, reusing its existing allocation: the buffer grows only if
	/// it is smaller than required, and is truncated (not deallocated) if
	/// larger, so a buffer recycled from a [`crate::state::StateStore`]
	/// scratch slot never reallocates once it has reached its steady-state
	/// tile size. Pixel contents are left as whatever the buffer already
	/// held; callers must [`clear`](Self::clear) or fully overwrite before
	/// reading.
	pub fn assign_reusing(mut buffer: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
		let size = image_buffer_size(width, height, format);
		if buffer.len() < size {
			buffer.resize(size, 0);
		} else {
			buffer.truncate(size);
		}
		write_header(&mut buffer, IMAGE_MAGIC, format, width, height, size as u32);
		Self {
			buffer,
		}
	}

	/// Interprets an existing byte buffer as an `Image`, validating the
	/// header against the expected dimensions/format.
	pub fn from_buffer(buffer: Vec<u8>) -> Result<Self> {
		let header = read_header(&buffer, IMAGE_MAGIC)?;
		let expected = image_buffer_size(header.width, header.height, header.format);
		if buffer.len() < expected {
			return Err(IcetError::SanityCheckFail(format!(
				"image buffer too small: expected at least {expected} bytes, got {}",
				buffer.len()
			)));
		}
		Ok(Self {
			buffer,
		})
	}

	fn header(&self) -> Header {
		read_header(&self.buffer, IMAGE_MAGIC).expect("buffer was validated at construction")
	}

	/// Image width in pixels.
	pub fn width(&self) -> u32 {
		self.header().width
	}

	/// Image height in pixels.
	pub fn height(&self) -> u32 {
		self.header().height
	}

	/// Total number of pixels (`width * height`).
	pub fn num_pixels(&self) -> usize {
		self.width() as usize * self.height() as usize
	}

	/// The image's pixel format.
	pub fn format(&self) -> PixelFormat {
		self.header().format
	}

	fn color_plane_range(&self) -> std::ops::Range<usize> {
		let start = HEADER_SIZE;
		let end = start + self.num_pixels() * self.format().color_bytes();
		start..end
	}

	fn depth_plane_range(&self) -> std::ops::Range<usize> {
		let start = HEADER_SIZE + self.num_pixels() * self.format().color_bytes();
		let end = start + self.num_pixels() * self.format().depth_bytes();
		start..end
	}

	/// Raw bytes of the color plane.
	pub fn color_bytes(&self) -> &[u8] {
		&self.buffer[self.color_plane_range()]
	}

	/// Mutable raw bytes of the color plane.
	pub fn color_bytes_mut(&mut self) -> &mut [u8] {
		let range = self.color_plane_range();
		&mut self.buffer[range]
	}

	/// Raw bytes of the depth plane.
	pub fn depth_bytes(&self) -> &[u8] {
		&self.buffer[self.depth_plane_range()]
	}

	/// Mutable raw bytes of the depth plane.
	pub fn depth_bytes_mut(&mut self) -> &mut [u8] {
		let range = self.depth_plane_range();
		&mut self.buffer[range]
	}

	/// Reads pixel `index`'s color channel as RGBA8, if the format carries one.
	pub fn color_rgba8(&self, index: usize) -> Option<[u8; 4]> {
		if self.format().color != ColorFormat::Rgba8 {
			return None;
		}
		let bytes = self.color_bytes();
		let off = index * 4;
		Some([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
	}

	/// Writes pixel `index`'s color channel as RGBA8.
	pub fn set_color_rgba8(&mut self, index: usize, value: [u8; 4]) {
		debug_assert_eq!(self.format().color, ColorFormat::Rgba8);
		let bytes = self.color_bytes_mut();
		let off = index * 4;
		bytes[off..off + 4].copy_from_slice(&value);
	}

	/// Reads pixel `index`'s color channel as RGBA float, if the format carries one.
	pub fn color_rgba_f32(&self, index: usize) -> Option<[f32; 4]> {
		if self.format().color != ColorFormat::RgbaFloat {
			return None;
		}
		let bytes = self.color_bytes();
		let off = index * 16;
		let mut out = [0.0f32; 4];
		for (channel, chunk) in out.iter_mut().zip(bytes[off..off + 16].chunks_exact(4)) {
			*channel = f32::from_le_bytes(chunk.try_into().expect("chunk is 4 bytes"));
		}
		Some(out)
	}

	/// Writes pixel `index`'s color channel as RGBA float.
	pub fn set_color_rgba_f32(&mut self, index: usize, value: [f32; 4]) {
		debug_assert_eq!(self.format().color, ColorFormat::RgbaFloat);
		let bytes = self.color_bytes_mut();
		let off = index * 16;
		for (channel, chunk) in value.iter().zip(bytes[off..off + 16].chunks_exact_mut(4)) {
			chunk.copy_from_slice(&channel.to_le_bytes());
		}
	}

	/// Reads pixel `index`'s depth bit pattern, if the format carries a depth channel.
	pub fn depth_bits(&self, index: usize) -> Option<u32> {
		if self.format().depth != DepthFormat::Float {
			return None;
		}
		let bytes = self.depth_bytes();
		let off = index * 4;
		Some(u32::from_le_bytes(bytes[off..off + 4].try_into().expect("chunk is 4 bytes")))
	}

	/// Writes pixel `index`'s depth bit pattern.
	pub fn set_depth_bits(&mut self, index: usize, bits: u32) {
		debug_assert_eq!(self.format().depth, DepthFormat::Float);
		let bytes = self.depth_bytes_mut();
		let off = index * 4;
		bytes[off..off + 4].copy_from_slice(&bits.to_le_bytes());
	}

	/// Fills the color plane with the packed background and the depth plane
	/// with the far-depth sentinel.
	pub fn clear(&mut self, background: BackgroundColor) {
		let format = self.format();
		match format.color {
			ColorFormat::Rgba8 => {
				let packed = background.packed.to_le_bytes();
				let n = self.num_pixels();
				let bytes = self.color_bytes_mut();
				for i in 0..n {
					bytes[i * 4..i * 4 + 4].copy_from_slice(&packed);
				}
			}
			ColorFormat::RgbaFloat => {
				let rgba = background.rgba;
				let n = self.num_pixels();
				for i in 0..n {
					self.set_color_rgba_f32(i, rgba);
				}
			}
			ColorFormat::None => {}
		}
		if format.depth == DepthFormat::Float {
			let n = self.num_pixels();
			let bytes = self.depth_bytes_mut();
			for i in 0..n {
				bytes[i * 4..i * 4 + 4].copy_from_slice(&FAR_DEPTH_BITS.to_le_bytes());
			}
		}
	}

	/// Whether pixel `index` is inactive: matches the background color (for
	/// color-only formats) or carries the far-depth sentinel (for formats
	/// with depth).
	pub fn is_inactive(&self, index: usize, background: BackgroundColor) -> bool {
		let format = self.format();
		if format.has_depth() {
			self.depth_bits(index) == Some(FAR_DEPTH_BITS)
		} else {
			match format.color {
				ColorFormat::Rgba8 => {
					self.color_rgba8(index) == Some(background.packed.to_le_bytes())
				}
				ColorFormat::RgbaFloat => self.color_rgba_f32(index) == Some(background.rgba),
				ColorFormat::None => true,
			}
		}
	}

	/// Total buffer size in bytes.
	pub fn buffer_len(&self) -> usize {
		self.buffer.len()
	}

	/// Borrows the raw underlying buffer (header included).
	pub fn as_bytes(&self) -> &[u8] {
		&self.buffer
	}

	/// Consumes the image, returning the raw underlying buffer.
	pub fn into_bytes(self) -> Vec<u8> {
		self.buffer
	}
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
	pub format: PixelFormat,
	pub width: u32,
	pub height: u32,
}

pub(crate) fn write_header(
	buffer: &mut [u8],
	magic: u32,
	format: PixelFormat,
	width: u32,
	height: u32,
	byte_size: u32,
) {
	buffer[0..4].copy_from_slice(&magic.to_le_bytes());
	buffer[4] = format.color as u8;
	buffer[5] = format.depth as u8;
	buffer[6..8].copy_from_slice(&0u16.to_le_bytes());
	buffer[8..12].copy_from_slice(&width.to_le_bytes());
	buffer[12..16].copy_from_slice(&height.to_le_bytes());
	buffer[16..20].copy_from_slice(&byte_size.to_le_bytes());
}

pub(crate) fn read_header(buffer: &[u8], expected_magic: u32) -> Result<Header> {
	if buffer.len() < HEADER_SIZE {
		return Err(IcetError::SanityCheckFail(format!(
			"buffer too small for header: expected at least {HEADER_SIZE} bytes, got {}",
			buffer.len()
		)));
	}
	let magic = u32::from_le_bytes(buffer[0..4].try_into().expect("4 bytes"));
	if magic != expected_magic {
		return Err(IcetError::SanityCheckFail(format!(
			"magic mismatch: expected 0x{expected_magic:08X}, got 0x{magic:08X}"
		)));
	}
	let color = ColorFormat::from_tag(buffer[4])?;
	let depth = DepthFormat::from_tag(buffer[5])?;
	let format = PixelFormat::new(color, depth)?;
	let width = u32::from_le_bytes(buffer[8..12].try_into().expect("4 bytes"));
	let height = u32::from_le_bytes(buffer[12..16].try_into().expect("4 bytes"));
	Ok(Header {
		format,
		width,
		height,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rgba8_no_depth() -> PixelFormat {
		PixelFormat::new(ColorFormat::Rgba8, DepthFormat::None).unwrap()
	}

	#[test]
	fn buffer_size_is_header_plus_planes() {
		let format = rgba8_no_depth();
		assert_eq!(image_buffer_size(4, 3, format), HEADER_SIZE + 4 * 3 * 4);
	}

	#[test]
	fn assign_buffer_round_trips_header_fields() {
		let format = rgba8_no_depth();
		let image = Image::assign_buffer(8, 4, format);
		assert_eq!(image.width(), 8);
		assert_eq!(image.height(), 4);
		assert_eq!(image.num_pixels(), 32);
		assert_eq!(image.format(), format);
	}

	#[test]
	fn clear_fills_background_and_far_depth() {
		let format = PixelFormat::new(ColorFormat::Rgba8, DepthFormat::Float).unwrap();
		let mut image = Image::assign_buffer(2, 2, format);
		let bg = BackgroundColor::new([0.2, 0.4, 0.6, 1.0], ColorFormat::Rgba8);
		image.clear(bg);
		for i in 0..image.num_pixels() {
			assert_eq!(image.depth_bits(i), Some(FAR_DEPTH_BITS));
			assert!(image.is_inactive(i, bg));
		}
	}

	#[test]
	fn assign_reusing_grows_small_buffers_and_truncates_large_ones() {
		let format = rgba8_no_depth();
		let small = Image::assign_reusing(Vec::new(), 4, 4, format);
		assert_eq!(small.buffer_len(), image_buffer_size(4, 4, format));

		let oversized = vec![0xAAu8; image_buffer_size(8, 8, format)];
		let reused = Image::assign_reusing(oversized, 2, 2, format);
		assert_eq!(reused.buffer_len(), image_buffer_size(2, 2, format));
		assert_eq!(reused.width(), 2);
	}

	#[test]
	fn from_buffer_rejects_bad_magic() {
		let format = rgba8_no_depth();
		let mut image = Image::assign_buffer(2, 2, format).into_bytes();
		image[0] ^= 0xFF;
		assert!(Image::from_buffer(image).is_err());
	}
}
