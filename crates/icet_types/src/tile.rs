//! Tile layout: how the full composited frame is divided across display
//! surfaces, and which process displays which tile.

use crate::draw::Viewport;
use crate::error::{IcetError, Result};

/// One tile's geometry and display assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
	/// The tile's pixel rectangle within the full frame.
	pub viewport: Viewport,
	/// Rank of the process that displays this tile (owns its final image).
	pub display_node: i32,
}

/// The full set of tiles composing one frame, plus per-process bookkeeping
/// the direct-send strategy needs: which ranks render non-empty pixels into
/// each tile (the "rank-to-tile mask" of §4.4), so a process knows whether
/// to call the draw callback for a given tile and a display node knows
/// exactly which ranks it must hear from.
#[derive(Debug, Clone)]
pub struct TileLayout {
	tiles: Vec<Tile>,
	contributors: Vec<Vec<i32>>,
	max_width: u32,
	max_height: u32,
}

impl TileLayout {
	/// Builds a layout from its tiles and each tile's contributing ranks.
	/// `contributors` must have one entry per tile.
	pub fn new(tiles: Vec<Tile>, contributors: Vec<Vec<i32>>) -> Result<Self> {
		if tiles.len() != contributors.len() {
			return Err(IcetError::InvalidValue(format!(
				"tile count {} does not match contributor-list length {}",
				tiles.len(),
				contributors.len()
			)));
		}
		let max_width = tiles.iter().map(|t| t.viewport.width).max().unwrap_or(0);
		let max_height = tiles.iter().map(|t| t.viewport.height).max().unwrap_or(0);
		Ok(Self {
			tiles,
			contributors,
			max_width,
			max_height,
		})
	}

	/// A single full-screen tile, the common single-display case, rendered
	/// by exactly the given set of ranks.
	pub fn single(width: u32, height: u32, display_node: i32, contributors: Vec<i32>) -> Self {
		Self {
			tiles: vec![Tile {
				viewport: Viewport::new(0, 0, width, height),
				display_node,
			}],
			contributors: vec![contributors],
			max_width: width,
			max_height: height,
		}
	}

	/// A single full-screen tile that every rank `0..num_ranks` contributes
	/// to — the common "everyone renders the whole frame" case.
	pub fn single_all_contribute(width: u32, height: u32, display_node: i32, num_ranks: i32) -> Self {
		Self::single(width, height, display_node, (0..num_ranks).collect())
	}

	/// Number of tiles in this layout.
	pub fn num_tiles(&self) -> usize {
		self.tiles.len()
	}

	/// All tiles, in layout order.
	pub fn tiles(&self) -> &[Tile] {
		&self.tiles
	}

	/// One tile's geometry, by index.
	pub fn tile(&self, index: usize) -> Result<Tile> {
		self.tiles.get(index).copied().ok_or_else(|| {
			IcetError::InvalidValue(format!("tile index {index} out of range (0..{})", self.tiles.len()))
		})
	}

	/// The ranks contributing (rendering non-empty pixels) to tile `index`.
	pub fn contributors(&self, index: usize) -> Result<&[i32]> {
		self.contributors
			.get(index)
			.map(Vec::as_slice)
			.ok_or_else(|| IcetError::InvalidValue(format!("tile index {index} out of range")))
	}

	/// Number of processes contributing to tile `index`.
	pub fn contrib_count(&self, index: usize) -> Result<i32> {
		Ok(self.contributors(index)?.len() as i32)
	}

	/// The widest tile's width across the whole layout.
	pub fn max_width(&self) -> u32 {
		self.max_width
	}

	/// The tallest tile's height across the whole layout.
	pub fn max_height(&self) -> u32 {
		self.max_height
	}

	/// Index of the tile `rank` displays, or `None` if it displays none.
	pub fn tile_displayed_by(&self, rank: i32) -> Option<usize> {
		self.tiles.iter().position(|t| t.display_node == rank)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn single_tile_layout_reports_its_own_dimensions() {
		let layout = TileLayout::single_all_contribute(800, 600, 0, 4);
		assert_eq!(layout.num_tiles(), 1);
		assert_eq!(layout.max_width(), 800);
		assert_eq!(layout.max_height(), 600);
		assert_eq!(layout.tile_displayed_by(0), Some(0));
		assert_eq!(layout.tile_displayed_by(1), None);
		assert_eq!(layout.contrib_count(0).unwrap(), 4);
	}

	#[test]
	fn rejects_mismatched_contributor_lists() {
		let tiles = vec![Tile {
			viewport: Viewport::new(0, 0, 10, 10),
			display_node: 0,
		}];
		assert!(TileLayout::new(tiles, vec![vec![0], vec![1]]).is_err());
	}

	#[test]
	fn max_dimensions_are_the_largest_across_tiles() {
		let tiles = vec![
			Tile {
				viewport: Viewport::new(0, 0, 100, 50),
				display_node: 0,
			},
			Tile {
				viewport: Viewport::new(100, 0, 60, 90),
				display_node: 1,
			},
		];
		let layout = TileLayout::new(tiles, vec![vec![0, 1], vec![0, 1]]).unwrap();
		assert_eq!(layout.max_width(), 100);
		assert_eq!(layout.max_height(), 90);
	}

	#[test]
	fn contributors_lists_tiles_rank_set() {
		let layout = TileLayout::single(4, 4, 0, vec![0, 2]);
		assert_eq!(layout.contributors(0).unwrap(), &[0, 2]);
		assert_eq!(layout.contrib_count(0).unwrap(), 2);
	}
}
