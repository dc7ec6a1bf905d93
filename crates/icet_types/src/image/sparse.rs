//! Run-length encoded sparse images: wire format, codec and merge.

use bytes::{BufMut, Bytes, BytesMut};

use super::composite::{CompositeMode, blend_bytes};
use super::{Image, Header, read_header};
use crate::error::{IcetError, Result};
use crate::format::{BackgroundColor, ColorFormat, FAR_DEPTH_BITS, PixelFormat};

/// Magic number stamped into every sparse image header.
pub const SPARSE_MAGIC: u32 = 0x1C37_5A5E;

/// Size in bytes of the sparse image header.
///
/// Layout: magic(4) + color_fmt(1) + depth_fmt(1) + reserved(2) + width(4) +
/// height(4) + active_pixels(4) + byte_size(4) = 24 bytes.
pub const HEADER_SIZE: usize = 24;

/// Size in bytes of one run header: `[inactive_count, active_count]`, both `u32`.
pub const RUN_HEADER_SIZE: usize = 8;

/// Deterministic upper bound on the encoded size of a sparse image of the
/// given dimensions and format: the header, plus the worst case where every
/// pixel is active (full payload, one run), plus the worst case where every
/// pixel alternates active/inactive (one run header per pixel). Buffer
/// under-provisioning is a bug; this bound is intentionally generous.
pub fn sparse_image_buffer_size(width: u32, height: u32, format: PixelFormat) -> usize {
	let num_pixels = width as usize * height as usize;
	HEADER_SIZE + num_pixels * format.pixel_bytes() + (num_pixels + 1) * RUN_HEADER_SIZE
}

/// A run-length encoded image: alternating spans of inactive (background)
/// pixels and active pixel payloads.
#[derive(Debug, Clone)]
pub struct SparseImage {
	data: Bytes,
}

impl PartialEq for SparseImage {
	fn eq(&self, other: &Self) -> bool {
		self.data == other.data
	}
}

impl SparseImage {
	fn header(&self) -> Header {
		read_header(&self.data, SPARSE_MAGIC).expect("sparse buffer was validated at construction")
	}

	/// Width stamped in the header (for a sub-range compression, this is the
	/// sub-range's length and height is 1).
	pub fn width(&self) -> u32 {
		self.header().width
	}

	/// Height stamped in the header.
	pub fn height(&self) -> u32 {
		self.header().height
	}

	/// Total number of pixels this sparse image covers (active + inactive).
	pub fn num_pixels(&self) -> usize {
		self.width() as usize * self.height() as usize
	}

	/// Pixel format.
	pub fn format(&self) -> PixelFormat {
		self.header().format
	}

	/// Number of active (non-background) pixels, as stamped in the header.
	pub fn active_pixel_count(&self) -> u32 {
		u32::from_le_bytes(self.data[16..20].try_into().expect("4 bytes"))
	}

	/// Total encoded length in bytes.
	pub fn buffer_len(&self) -> usize {
		self.data.len()
	}

	/// Exposes the wire representation for a zero-copy send: cloning a
	/// `Bytes` only bumps a refcount, it does not copy the underlying
	/// storage. The receiver owns its own clone and may hold it
	/// indefinitely; the sender's copy remains valid and unaffected.
	pub fn package_for_send(&self) -> Bytes {
		self.data.clone()
	}

	/// Wraps a received wire buffer as a `SparseImage` without copying,
	/// validating the header.
	pub fn unpackage(data: Bytes) -> Result<Self> {
		let _header = read_header(&data, SPARSE_MAGIC)?;
		Ok(Self {
			data,
		})
	}

	fn body(&self) -> &[u8] {
		&self.data[HEADER_SIZE..]
	}

	fn runs(&self) -> RunIter<'_> {
		RunIter {
			body: self.body(),
			format: self.format(),
			pos: 0,
		}
	}

	/// Builds an empty sparse image (all pixels inactive) covering
	/// `width * height` pixels of the given format — the representation used
	/// for a tile a process does not contribute to.
	pub fn empty(width: u32, height: u32, format: PixelFormat) -> Self {
		let num_pixels = width as usize * height as usize;
		let mut body = BytesMut::with_capacity(RUN_HEADER_SIZE);
		body.put_u32_le(num_pixels as u32);
		body.put_u32_le(0);
		Self::assemble(format, width, height, 0, &body)
	}

	/// Encodes a full dense image.
	pub fn compress_image(image: &Image, background: BackgroundColor) -> Self {
		Self::compress_range(image, 0, image.num_pixels(), background, image.width(), image.height())
	}

	/// Encodes a linear pixel sub-range of `image` as if it were a 1-row
	/// image of width `length`.
	pub fn compress_sub_image(
		image: &Image,
		start: usize,
		length: usize,
		background: BackgroundColor,
	) -> Result<Self> {
		if start + length > image.num_pixels() {
			return Err(IcetError::InvalidValue(format!(
				"sub-range [{start}, {}) exceeds image of {} pixels",
				start + length,
				image.num_pixels()
			)));
		}
		Ok(Self::compress_range(image, start, length, background, length as u32, 1))
	}

	fn compress_range(
		image: &Image,
		start: usize,
		length: usize,
		background: BackgroundColor,
		out_width: u32,
		out_height: u32,
	) -> Self {
		let format = image.format();
		let mut body = BytesMut::with_capacity(sparse_image_buffer_size(out_width, out_height, format));
		let mut active_total = 0u32;
		let mut i = 0usize;
		while i < length {
			let mut inactive = 0u32;
			while i < length && image.is_inactive(start + i, background) {
				inactive += 1;
				i += 1;
			}
			let active_start = i;
			let mut active = 0u32;
			while i < length && !image.is_inactive(start + i, background) {
				active += 1;
				i += 1;
			}
			active_total += active;
			body.put_u32_le(inactive);
			body.put_u32_le(active);
			write_pixel_payload(&mut body, image, start + active_start, active as usize, format);
		}
		Self::assemble(format, out_width, out_height, active_total, &body)
	}

	fn assemble(format: PixelFormat, width: u32, height: u32, active_total: u32, body: &[u8]) -> Self {
		// The sparse header shares its first 16 bytes with the dense header
		// (magic, color/depth format, width, height) but diverges after that:
		// dense stores `byte_size` at offset 16, sparse stores `active_pixels`
		// at 16 and `byte_size` at 20. `read_header` only reads the shared
		// prefix, but the header is assembled here by hand rather than via
		// the dense `write_header`.
		let total_len = HEADER_SIZE + body.len();
		let mut buffer = BytesMut::with_capacity(total_len);
		buffer.put_u32_le(SPARSE_MAGIC);
		buffer.put_u8(format.color as u8);
		buffer.put_u8(format.depth as u8);
		buffer.put_u16_le(0);
		buffer.put_u32_le(width);
		buffer.put_u32_le(height);
		buffer.put_u32_le(active_total);
		buffer.put_u32_le(total_len as u32);
		buffer.extend_from_slice(body);
		Self {
			data: buffer.freeze(),
		}
	}

	/// Extracts a sub-range `[start, start+length)` from an already-sparse
	/// image without decompressing. The result is byte-identical to
	/// `compress_sub_image` of the underlying dense image over the same
	/// range, because both follow the same maximal alternating-run
	/// partition — slicing a contiguous subrange of that partition can only
	/// ever clip its two boundary runs, never change interior boundaries.
	pub fn copy_pixels(&self, start: usize, length: usize) -> Result<Self> {
		let num_pixels = self.num_pixels();
		if start + length > num_pixels {
			return Err(IcetError::InvalidValue(format!(
				"sub-range [{start}, {}) exceeds sparse image of {num_pixels} pixels",
				start + length
			)));
		}
		let format = self.format();
		let mut body = BytesMut::with_capacity(sparse_image_buffer_size(length as u32, 1, format));
		let mut active_total = 0u32;
		let mut cursor = 0usize;
		let end = start + length;

		// Accumulated inactive count carried into the next emitted run; used
		// when a source run is entirely skipped or clipped away before `start`
		// or the emission needs to merge a clipped leading inactive span.
		let mut pending_inactive: u32 = 0;
		let mut have_pending_run = false;

		for run in self.runs() {
			let run_start = cursor;
			let inactive_end = run_start + run.inactive as usize;
			let active_end = inactive_end + run.active as usize;
			cursor = active_end;

			if active_end <= start || run_start >= end {
				continue;
			}

			// Portion of this run's inactive span that falls in [start, end).
			let inactive_lo = run_start.max(start);
			let inactive_hi = inactive_end.min(end);
			let inactive_in_range = inactive_hi.saturating_sub(inactive_lo) as u32;

			// Portion of this run's active span that falls in [start, end).
			let active_lo = inactive_end.max(start);
			let active_hi = active_end.min(end);
			let active_in_range = active_hi.saturating_sub(active_lo) as u32;

			if inactive_in_range == 0 && active_in_range == 0 {
				continue;
			}

			if active_in_range == 0 {
				// Pure inactive contribution: fold into the pending run.
				pending_inactive += inactive_in_range;
				have_pending_run = true;
				continue;
			}

			let payload_offset_pixels = active_lo - inactive_end;
			let payload = slice_pixel_payload(
				run.color,
				run.depth,
				format,
				payload_offset_pixels,
				active_in_range as usize,
			);

			active_total += active_in_range;
			body.put_u32_le(pending_inactive + inactive_in_range);
			body.put_u32_le(active_in_range);
			body.extend_from_slice(&payload);
			pending_inactive = 0;
			have_pending_run = false;
		}

		if have_pending_run || (body.is_empty() && length > 0) {
			// Tail of inactive pixels with nothing active left to emit.
			body.put_u32_le(pending_inactive);
			body.put_u32_le(0);
		}

		Ok(Self::assemble(format, length as u32, 1, active_total, &body))
	}

	/// Decodes into a dense image: background for inactive runs, stored
	/// pixels for active runs.
	pub fn decompress(&self, background: BackgroundColor) -> Image {
		let format = self.format();
		let mut image = Image::assign_buffer(self.width(), self.height(), format);
		image.clear(background);
		let mut cursor = 0usize;
		for run in self.runs() {
			cursor += run.inactive as usize;
			write_run_into_image(&mut image, cursor, run.color, run.depth, format, run.active as usize);
			cursor += run.active as usize;
		}
		image
	}

	/// Merges two sparse images of identical dimensions/format under `mode`.
	pub fn composite_compressed(&self, other: &Self, mode: CompositeMode) -> Result<Self> {
		let format = self.format();
		if format != other.format() {
			return Err(IcetError::BadCast("composite operands have different pixel formats".into()));
		}
		if self.num_pixels() != other.num_pixels() {
			return Err(IcetError::InvalidValue(
				"composite operands cover different pixel counts".into(),
			));
		}
		validate_mode_format(mode, format)?;

		let num_pixels = self.num_pixels();
		let mut body = BytesMut::with_capacity(sparse_image_buffer_size(self.width(), self.height(), format));
		let mut active_total = 0u32;

		let mut a = PixelWalker::new(self);
		let mut b = PixelWalker::new(other);

		let mut builder = RunBuilder::new();
		for _ in 0..num_pixels {
			let (active_a, color_a, depth_a) = a.next();
			let (active_b, color_b, depth_b) = b.next();

			let (merged_active, merged_color, merged_depth) = merge_pixel(
				mode,
				format,
				active_a,
				color_a,
				depth_a,
				active_b,
				color_b,
				depth_b,
			);

			if merged_active {
				active_total += 1;
			}
			builder.push(&mut body, format, merged_active, &merged_color, merged_depth);
		}
		builder.finish(&mut body);

		Ok(Self::assemble(format, self.width(), self.height(), active_total, &body))
	}

	/// Merges this sparse image onto a dense accumulator in place, under `mode`.
	pub fn composite_onto_dense(
		&self,
		dense: &mut Image,
		mode: CompositeMode,
		background: BackgroundColor,
	) -> Result<()> {
		let format = self.format();
		if format != dense.format() {
			return Err(IcetError::BadCast("composite operands have different pixel formats".into()));
		}
		if self.num_pixels() != dense.num_pixels() {
			return Err(IcetError::InvalidValue(
				"composite operands cover different pixel counts".into(),
			));
		}
		validate_mode_format(mode, format)?;

		let mut cursor = 0usize;
		for run in self.runs() {
			cursor += run.inactive as usize;
			for k in 0..run.active as usize {
				let idx = cursor + k;
				let color_a = pixel_color_at(run.color, format, k);
				let depth_a = pixel_depth_at(run.depth, format, k);
				let active_b = !dense.is_inactive(idx, background);
				let color_b = dense_color_bytes(dense, idx, format);
				let depth_b = dense.depth_bits(idx).unwrap_or(FAR_DEPTH_BITS);

				let (merged_active, merged_color, merged_depth) =
					merge_pixel(mode, format, true, color_a, depth_a, active_b, color_b, depth_b);
				debug_assert!(merged_active);
				write_dense_pixel(dense, idx, format, &merged_color, merged_depth);
			}
			cursor += run.active as usize;
		}
		Ok(())
	}
}

fn validate_mode_format(mode: CompositeMode, format: PixelFormat) -> Result<()> {
	match mode {
		CompositeMode::ZBuffer if !format.has_depth() => {
			Err(IcetError::BadCast("z_buffer composite requires a depth channel".into()))
		}
		CompositeMode::Blend if format.has_depth() => {
			Err(IcetError::BadCast("blend composite requires a color-only format".into()))
		}
		_ => Ok(()),
	}
}

fn merge_pixel(
	mode: CompositeMode,
	format: PixelFormat,
	active_a: bool,
	color_a: Vec<u8>,
	depth_a: u32,
	active_b: bool,
	color_b: Vec<u8>,
	depth_b: u32,
) -> (bool, Vec<u8>, u32) {
	match mode {
		CompositeMode::ZBuffer => match (active_a, active_b) {
			(false, false) => (false, Vec::new(), FAR_DEPTH_BITS),
			(true, false) => (true, color_a, depth_a),
			(false, true) => (true, color_b, depth_b),
			(true, true) => {
				if super::composite::z_buffer_first_wins(depth_a, depth_b) {
					(true, color_a, depth_a)
				} else {
					(true, color_b, depth_b)
				}
			}
		},
		CompositeMode::Blend => match (active_a, active_b) {
			(false, false) => (false, Vec::new(), FAR_DEPTH_BITS),
			(true, false) => (true, color_a, FAR_DEPTH_BITS),
			(false, true) => (true, color_b, FAR_DEPTH_BITS),
			(true, true) => {
				let merged = blend_bytes(&color_a, &color_b, format.color);
				(true, merged, FAR_DEPTH_BITS)
			}
		},
	}
}

fn write_pixel_payload(
	body: &mut BytesMut,
	image: &Image,
	start: usize,
	count: usize,
	format: PixelFormat,
) {
	if format.has_color() {
		for i in 0..count {
			match format.color {
				ColorFormat::Rgba8 => {
					body.extend_from_slice(&image.color_rgba8(start + i).expect("rgba8 format"));
				}
				ColorFormat::RgbaFloat => {
					for channel in image.color_rgba_f32(start + i).expect("float format") {
						body.put_f32_le(channel);
					}
				}
				ColorFormat::None => {}
			}
		}
	}
	if format.has_depth() {
		for i in 0..count {
			body.put_u32_le(image.depth_bits(start + i).expect("depth format"));
		}
	}
}

fn write_run_into_image(
	image: &mut Image,
	start: usize,
	color: &[u8],
	depth: &[u8],
	format: PixelFormat,
	count: usize,
) {
	for i in 0..count {
		match format.color {
			ColorFormat::Rgba8 => {
				let off = i * 4;
				let pixel = [color[off], color[off + 1], color[off + 2], color[off + 3]];
				image.set_color_rgba8(start + i, pixel);
			}
			ColorFormat::RgbaFloat => {
				let off = i * 16;
				let mut pixel = [0.0f32; 4];
				for (c, chunk) in pixel.iter_mut().zip(color[off..off + 16].chunks_exact(4)) {
					*c = f32::from_le_bytes(chunk.try_into().expect("4 bytes"));
				}
				image.set_color_rgba_f32(start + i, pixel);
			}
			ColorFormat::None => {}
		}
		if format.has_depth() {
			let off = i * 4;
			let bits = u32::from_le_bytes(depth[off..off + 4].try_into().expect("4 bytes"));
			image.set_depth_bits(start + i, bits);
		}
	}
}

fn slice_pixel_payload(
	color: &[u8],
	depth: &[u8],
	format: PixelFormat,
	offset_pixels: usize,
	count: usize,
) -> Vec<u8> {
	let mut out = Vec::new();
	if format.has_color() {
		let cb = format.color_bytes();
		out.extend_from_slice(&color[offset_pixels * cb..(offset_pixels + count) * cb]);
	}
	if format.has_depth() {
		let db = format.depth_bytes();
		out.extend_from_slice(&depth[offset_pixels * db..(offset_pixels + count) * db]);
	}
	out
}

fn pixel_color_at(color: &[u8], format: PixelFormat, index: usize) -> Vec<u8> {
	if !format.has_color() {
		return Vec::new();
	}
	let cb = format.color_bytes();
	color[index * cb..(index + 1) * cb].to_vec()
}

fn pixel_depth_at(depth: &[u8], format: PixelFormat, index: usize) -> u32 {
	if !format.has_depth() {
		return FAR_DEPTH_BITS;
	}
	u32::from_le_bytes(depth[index * 4..index * 4 + 4].try_into().expect("4 bytes"))
}

fn dense_color_bytes(image: &Image, index: usize, format: PixelFormat) -> Vec<u8> {
	match format.color {
		ColorFormat::Rgba8 => image.color_rgba8(index).expect("rgba8 format").to_vec(),
		ColorFormat::RgbaFloat => {
			image.color_rgba_f32(index).expect("float format").iter().flat_map(|v| v.to_le_bytes()).collect()
		}
		ColorFormat::None => Vec::new(),
	}
}

fn write_dense_pixel(image: &mut Image, index: usize, format: PixelFormat, color: &[u8], depth_bits: u32) {
	match format.color {
		ColorFormat::Rgba8 => {
			image.set_color_rgba8(index, [color[0], color[1], color[2], color[3]]);
		}
		ColorFormat::RgbaFloat => {
			let mut pixel = [0.0f32; 4];
			for (c, chunk) in pixel.iter_mut().zip(color.chunks_exact(4)) {
				*c = f32::from_le_bytes(chunk.try_into().expect("4 bytes"));
			}
			image.set_color_rgba_f32(index, pixel);
		}
		ColorFormat::None => {}
	}
	if format.has_depth() {
		image.set_depth_bits(index, depth_bits);
	}
}

/// Accumulates a run of pixels fed one at a time, flushing a run header plus
/// its color-then-depth payload whenever the active/inactive state changes
/// (or at the end), so consecutive same-state pixels coalesce into one run.
struct RunBuilder {
	inactive: u32,
	active: u32,
	color: BytesMut,
	depth: BytesMut,
}

impl RunBuilder {
	fn new() -> Self {
		Self {
			inactive: 0,
			active: 0,
			color: BytesMut::new(),
			depth: BytesMut::new(),
		}
	}

	fn push(&mut self, body: &mut BytesMut, format: PixelFormat, active: bool, color: &[u8], depth_bits: u32) {
		if active {
			self.active += 1;
			if format.has_color() {
				self.color.extend_from_slice(color);
			}
			if format.has_depth() {
				self.depth.put_u32_le(depth_bits);
			}
		} else {
			if self.active > 0 {
				self.flush(body);
			}
			self.inactive += 1;
		}
	}

	fn flush(&mut self, body: &mut BytesMut) {
		body.put_u32_le(self.inactive);
		body.put_u32_le(self.active);
		body.extend_from_slice(&self.color);
		body.extend_from_slice(&self.depth);
		self.inactive = 0;
		self.active = 0;
		self.color.clear();
		self.depth.clear();
	}

	fn finish(&mut self, body: &mut BytesMut) {
		self.flush(body);
	}
}

struct PixelWalker<'a> {
	image: &'a SparseImage,
	runs: RunIter<'a>,
	current: Option<ActiveRun<'a>>,
	remaining_inactive: u32,
}

struct ActiveRun<'a> {
	color: &'a [u8],
	depth: &'a [u8],
	remaining: u32,
	next_index: usize,
}

impl<'a> PixelWalker<'a> {
	fn new(image: &'a SparseImage) -> Self {
		Self {
			image,
			runs: image.runs(),
			current: None,
			remaining_inactive: 0,
		}
	}

	fn next(&mut self) -> (bool, Vec<u8>, u32) {
		loop {
			if let Some(run) = &mut self.current {
				if run.remaining > 0 {
					let format = self.image.format();
					let color = pixel_color_at(run.color, format, run.next_index);
					let depth = pixel_depth_at(run.depth, format, run.next_index);
					run.remaining -= 1;
					run.next_index += 1;
					return (true, color, depth);
				}
				self.current = None;
			}
			if self.remaining_inactive > 0 {
				self.remaining_inactive -= 1;
				return (false, Vec::new(), FAR_DEPTH_BITS);
			}
			match self.runs.next() {
				Some(run) => {
					self.remaining_inactive = run.inactive;
					self.current = Some(ActiveRun {
						color: run.color,
						depth: run.depth,
						remaining: run.active,
						next_index: 0,
					});
				}
				None => return (false, Vec::new(), FAR_DEPTH_BITS),
			}
		}
	}
}

/// One decoded run: a count of inactive pixels followed by a count of active
/// pixels, plus byte slices of that run's color/depth payload.
struct RunRef<'a> {
	inactive: u32,
	active: u32,
	color: &'a [u8],
	depth: &'a [u8],
}

struct RunIter<'a> {
	body: &'a [u8],
	format: PixelFormat,
	pos: usize,
}

impl<'a> Iterator for RunIter<'a> {
	type Item = RunRef<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.pos + RUN_HEADER_SIZE > self.body.len() {
			return None;
		}
		let inactive = u32::from_le_bytes(self.body[self.pos..self.pos + 4].try_into().expect("4 bytes"));
		let active = u32::from_le_bytes(self.body[self.pos + 4..self.pos + 8].try_into().expect("4 bytes"));
		self.pos += RUN_HEADER_SIZE;

		let color_len = active as usize * self.format.color_bytes();
		let color = &self.body[self.pos..self.pos + color_len];
		self.pos += color_len;

		let depth_len = active as usize * self.format.depth_bytes();
		let depth = &self.body[self.pos..self.pos + depth_len];
		self.pos += depth_len;

		Some(RunRef {
			inactive,
			active,
			color,
			depth,
		})
	}
}

/// Returns `true` if the sparse image's runs account for exactly
/// `width * height` pixels and every active run has a positive count (except
/// possibly a trailing zero-active sentinel), i.e. the image is well-formed.
pub fn is_well_formed(image: &SparseImage) -> bool {
	let expected = image.num_pixels() as u64;
	let mut total = 0u64;
	let mut runs: Vec<(u32, u32)> = Vec::new();
	for run in image.runs() {
		total += run.inactive as u64 + run.active as u64;
		runs.push((run.inactive, run.active));
	}
	if total != expected {
		return false;
	}
	for (i, (_, active)) in runs.iter().enumerate() {
		let is_last = i + 1 == runs.len();
		if *active == 0 && !is_last {
			return false;
		}
	}
	true
}
