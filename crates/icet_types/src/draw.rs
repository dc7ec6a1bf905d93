//! The draw callback trait: how the engine asks client code to rasterize a
//! view into a dense image.

use crate::error::Result;
use crate::format::BackgroundColor;
use crate::image::Image;

/// A 4x4 matrix in column-major order, matching the layout OpenGL-style
/// projection/modelview matrices already use; the engine never
/// constructs or inverts these itself, only passes them through.
pub type Matrix4 = [f32; 16];

/// An axis-aligned pixel rectangle a tile occupies within the full
/// composited frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
	/// Left edge, in pixels.
	pub x: i32,
	/// Bottom edge, in pixels.
	pub y: i32,
	/// Width in pixels.
	pub width: u32,
	/// Height in pixels.
	pub height: u32,
}

impl Viewport {
	/// Builds a viewport from its rectangle.
	pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
		Self {
			x,
			y,
			width,
			height,
		}
	}

	/// Total pixel count.
	pub const fn num_pixels(&self) -> usize {
		self.width as usize * self.height as usize
	}
}

/// Client-supplied rendering hook. The engine calls [`Self::draw`] once per
/// tile this process contributes to, passing the tile's projection and
/// modelview matrices and the viewport it must fill; the callback rasterizes
/// into `out_image`, which arrives already sized and formatted for that
/// viewport.
pub trait DrawCallback {
	/// Rasterizes one tile into `out_image`.
	fn draw(
		&self,
		projection: &Matrix4,
		modelview: &Matrix4,
		background: BackgroundColor,
		viewport: Viewport,
		out_image: &mut Image,
	) -> Result<()>;
}
