//! The direct-send compositing strategy: every contributing process renders
//! and sends its fragment straight to the tile's display node, which
//! composites as fragments arrive.

use crate::comm::{ANY_SOURCE, Communicator};
use crate::context::Context;
use crate::draw::{DrawCallback, Matrix4};
use crate::error::Result;
use crate::format::{BackgroundColor, ColorFormat, DepthFormat, PixelFormat};
use crate::image::{CompositeMode, Image, SparseImage};
use crate::state::{EnableBit, StateName, StateValue};
use crate::tile::TileLayout;

/// Strategy scratch slot for the per-tile dense render target: reused across
/// every tile this process renders into within a frame, and across frames,
/// via [`crate::state::StateStore::take_strategy_buffer`]/`put_strategy_buffer`.
const DENSE_SCRATCH_SLOT: u8 = 0;

fn current_format(ctx: &Context) -> Result<PixelFormat> {
	let color = ColorFormat::from_tag(ctx.state.get_i32(StateName::ColorFormat)? as u8)?;
	let depth = DepthFormat::from_tag(ctx.state.get_i32(StateName::DepthFormat)? as u8)?;
	PixelFormat::new(color, depth)
}

fn current_background(ctx: &Context) -> Result<BackgroundColor> {
	let packed = ctx.state.get_i32(StateName::BackgroundColorWord)? as u32;
	let rgba = match ctx.state.get(StateName::BackgroundColorRgba) {
		Some(StateValue::F32Vec(v)) if v.len() == 4 => [v[0], v[1], v[2], v[3]],
		_ => [0.0, 0.0, 0.0, 0.0],
	};
	Ok(BackgroundColor {
		rgba,
		packed,
	})
}

fn current_mode(ctx: &Context) -> Result<CompositeMode> {
	match ctx.state.get_i32(StateName::CompositeMode)? {
		tag if tag == CompositeMode::ZBuffer as i32 => Ok(CompositeMode::ZBuffer),
		tag if tag == CompositeMode::Blend as i32 => Ok(CompositeMode::Blend),
		other => Err(crate::error::IcetError::InvalidEnum(format!("unknown composite mode tag {other}"))),
	}
}

/// Mirrors the current frame's tile geometry into the state store's
/// introspectable slots (`NumTiles`, `TileMaxWidth/Height`, `TileDisplayed`,
/// `DisplayNodes`, `TileContribCounts`) so readers of §6's state parameter
/// surface see a consistent picture even though the strategy itself takes
/// `layout` as an explicit argument rather than reconstructing it from state
/// (see `DESIGN.md` for why).
fn sync_tile_layout_state(ctx: &mut Context, layout: &TileLayout) {
	let rank = ctx.comm().rank();
	let displayed = layout.tile_displayed_by(rank).map_or(-1, |index| index as i32);
	let display_nodes: Vec<i32> = layout.tiles().iter().map(|tile| tile.display_node).collect();
	let contrib_counts: Vec<i32> = (0..layout.num_tiles()).map(|index| layout.contrib_count(index).unwrap_or(0)).collect();

	ctx.state.set(StateName::NumTiles, StateValue::I32(layout.num_tiles() as i32));
	ctx.state.set(StateName::TileMaxWidth, StateValue::I32(layout.max_width() as i32));
	ctx.state.set(StateName::TileMaxHeight, StateValue::I32(layout.max_height() as i32));
	ctx.state.set(StateName::TileDisplayed, StateValue::I32(displayed));
	ctx.state.set(StateName::DisplayNodes, StateValue::I32Vec(display_nodes));
	ctx.state.set(StateName::TileContribCounts, StateValue::I32Vec(contrib_counts));
}

/// Renders and composites one frame across the whole process group using the
/// direct-send strategy, returning the dense image for the tile this process
/// displays, or `None` if it displays none.
///
/// Mirrors `icetDirectCompose`: a process renders only into the tiles it is
/// marked as a contributor for, compresses each such fragment, and sends it
/// straight to that tile's display node (or keeps it, if it is the display
/// node itself). Each display node composites incoming fragments — in
/// arbitrary arrival order, or strictly by the composite-order permutation
/// when ordered-composite is enabled — and, for a tile nobody contributes
/// to, clears its image to the background instead of waiting on fragments
/// that will never come.
pub fn compose(
	ctx: &mut Context,
	layout: &TileLayout,
	draw: &dyn DrawCallback,
	projection: &Matrix4,
	modelview: &Matrix4,
) -> Result<Option<Image>> {
	sync_tile_layout_state(ctx, layout);

	let format = current_format(ctx)?;
	let background = current_background(ctx)?;
	let mode = current_mode(ctx)?;
	let rank = ctx.comm().rank();
	let ordered = ctx.state.is_enabled(EnableBit::OrderedComposite);
	let composite_order = ctx.state.get_i32_vec(StateName::CompositeOrder)?.to_vec();

	let mut displayed_image = None;

	for (tile_index, tile) in layout.tiles().iter().enumerate() {
		let contributors = layout.contributors(tile_index)?;
		let viewport = tile.viewport;
		let tag = tile_index as i32;
		let i_contribute = contributors.contains(&rank);

		let mut local_fragment = if i_contribute {
			let scratch = ctx.state.take_strategy_buffer(DENSE_SCRATCH_SLOT)?;
			let mut dense = Image::assign_reusing(scratch, viewport.width, viewport.height, format);
			dense.clear(background);
			if let Err(err) = draw.draw(projection, modelview, background, viewport, &mut dense) {
				return Err(ctx.record_error(err));
			}
			let sparse = SparseImage::compress_image(&dense, background);
			ctx.state.put_strategy_buffer(DENSE_SCRATCH_SLOT, dense.into_bytes())?;

			if rank != tile.display_node {
				if let Err(err) = ctx.comm().send(tile.display_node, tag, sparse.package_for_send()) {
					return Err(ctx.record_error(err));
				}
				None
			} else {
				Some(sparse)
			}
		} else {
			None
		};

		if rank != tile.display_node {
			continue;
		}

		let accumulated = if ordered {
			let order: Vec<i32> = composite_order.iter().copied().filter(|r| contributors.contains(r)).collect();
			let mut acc: Option<SparseImage> = None;
			for src in order {
				let fragment = if src == rank {
					local_fragment.take().ok_or_else(|| {
						ctx.record_error(crate::error::IcetError::SanityCheckFail(format!(
							"rank {rank} is its own contributor to tile {tile_index} but produced no local fragment"
						)))
					})?
				} else {
					let payload = match ctx.comm().recv(src, tag) {
						Ok(payload) => payload,
						Err(err) => return Err(ctx.record_error(err)),
					};
					SparseImage::unpackage(payload).map_err(|err| ctx.record_error(err))?
				};
				acc = Some(match acc {
					Some(existing) => existing.composite_compressed(&fragment, mode).map_err(|err| ctx.record_error(err))?,
					None => fragment,
				});
			}
			acc
		} else {
			let remote_count = contributors.len() as i32 - i32::from(local_fragment.is_some());
			let mut acc = local_fragment.take();
			for _ in 0..remote_count.max(0) {
				let payload = match ctx.comm().recv(ANY_SOURCE, tag) {
					Ok(payload) => payload,
					Err(err) => return Err(ctx.record_error(err)),
				};
				let incoming = SparseImage::unpackage(payload).map_err(|err| ctx.record_error(err))?;
				acc = Some(match acc {
					Some(existing) => existing.composite_compressed(&incoming, mode).map_err(|err| ctx.record_error(err))?,
					None => incoming,
				});
			}
			acc
		};

		let dense_out = match accumulated {
			Some(acc) => acc.decompress(background),
			None => {
				let mut blank = Image::assign_buffer(viewport.width, viewport.height, format);
				blank.clear(background);
				blank
			}
		};
		displayed_image = Some(dense_out);
	}

	let frame_count = ctx.state.get_i32(StateName::FrameCount).unwrap_or(0);
	ctx.state.set(StateName::FrameCount, StateValue::I32(frame_count + 1));
	Ok(displayed_image)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::comm::MockCommunicator;
	use crate::context::create_context;

	struct SolidColor(u8);

	impl DrawCallback for SolidColor {
		fn draw(
			&self,
			_projection: &Matrix4,
			_modelview: &Matrix4,
			_background: BackgroundColor,
			_viewport: crate::draw::Viewport,
			out_image: &mut Image,
		) -> Result<()> {
			for i in 0..out_image.num_pixels() {
				out_image.set_color_rgba8(i, [self.0, self.0, self.0, 255]);
			}
			Ok(())
		}
	}

	#[test]
	fn single_tile_three_ranks_all_fragments_reach_the_display_node() {
		// `ContextHandle` is an `Rc`, so ranks run on one thread here rather
		// than across real threads; the mock communicator delivers a send
		// into its destination's inbox immediately, so driving the two
		// non-display-node ranks to completion before the display node calls
		// `compose` (which then only ever finds already-delivered messages)
		// is enough to exercise the full direct-send fan-in without needing
		// concurrent rendezvous.
		let comms = MockCommunicator::group(3);
		let layout = TileLayout::single_all_contribute(4, 4, 0, 3);
		let identity = [0.0f32; 16];

		let handles: Vec<_> = comms.iter().map(|comm| create_context(comm).unwrap()).collect();

		let mut results = Vec::new();
		for rank in [1usize, 2, 0] {
			let draw = SolidColor(rank as u8 * 10 + 1);
			let mut ctx = handles[rank].borrow_mut();
			let result = compose(&mut ctx, &layout, &draw, &identity, &identity).unwrap();
			results.push((rank, result));
		}

		let by_rank: std::collections::HashMap<_, _> = results.into_iter().collect();
		assert!(by_rank[&0].is_some());
		assert!(by_rank[&1].is_none());
		assert!(by_rank[&2].is_none());
	}

	#[test]
	fn blank_tile_clears_to_background_without_waiting() {
		let comms = MockCommunicator::group(1);
		let layout = TileLayout::single(2, 2, 0, Vec::new());
		let identity = [0.0f32; 16];
		let handle = create_context(&comms[0]).unwrap();
		let mut ctx = handle.borrow_mut();
		let draw = SolidColor(99);
		let result = compose(&mut ctx, &layout, &draw, &identity, &identity).unwrap().unwrap();
		assert!(result.is_inactive(0, current_background(&ctx).unwrap()));
	}

	#[test]
	fn only_contributing_ranks_render() {
		// Rank 1 is not in the contributor set; it must neither send nor be
		// waited on, and the display node's result must come solely from
		// rank 0's fragment.
		let comms = MockCommunicator::group(2);
		let layout = TileLayout::single(2, 2, 0, vec![0]);
		let identity = [0.0f32; 16];
		let handles: Vec<_> = comms.iter().map(|comm| create_context(comm).unwrap()).collect();

		{
			let mut ctx = handles[1].borrow_mut();
			let draw = SolidColor(200);
			// Rank 1 is not a contributor, so it must return no image and
			// must not attempt to send anything the display node would wait on.
			assert!(compose(&mut ctx, &layout, &draw, &identity, &identity).unwrap().is_none());
		}

		let mut ctx = handles[0].borrow_mut();
		let draw = SolidColor(5);
		let result = compose(&mut ctx, &layout, &draw, &identity, &identity).unwrap().unwrap();
		assert_eq!(result.color_rgba8(0), Some([5, 5, 5, 255]));
	}

	#[test]
	fn ordered_composite_honors_the_composite_order_permutation() {
		use crate::state::EnableBit;

		let comms = MockCommunicator::group(2);
		let layout = TileLayout::single_all_contribute(1, 1, 0, 2);
		let identity = [0.0f32; 16];
		let handles: Vec<_> = comms.iter().map(|comm| create_context(comm).unwrap()).collect();

		for handle in &handles {
			let mut ctx = handle.borrow_mut();
			ctx.state.set(StateName::CompositeMode, StateValue::I32(CompositeMode::Blend as i32));
			ctx.state.set(StateName::DepthFormat, StateValue::I32(DepthFormat::None as i32));
			ctx.state.enable(EnableBit::OrderedComposite);
		}

		struct Translucent(u8, u8, u8);
		impl DrawCallback for Translucent {
			fn draw(
				&self,
				_p: &Matrix4,
				_m: &Matrix4,
				_bg: BackgroundColor,
				_vp: crate::draw::Viewport,
				out: &mut Image,
			) -> Result<()> {
				out.set_color_rgba8(0, [self.0, self.1, self.2, 128]);
				Ok(())
			}
		}

		// Rank 1 first, rank 0 second: rank 1 ends up on the back under the
		// composite-order permutation, so its rendering must be present in
		// the final blend even though rank 0 (the display node) composes last.
		{
			let mut ctx = handles[1].borrow_mut();
			ctx.state.set(StateName::CompositeOrder, StateValue::I32Vec(vec![1, 0]));
			let draw = Translucent(0, 255, 0);
			assert!(compose(&mut ctx, &layout, &draw, &identity, &identity).unwrap().is_none());
		}

		let mut ctx = handles[0].borrow_mut();
		ctx.state.set(StateName::CompositeOrder, StateValue::I32Vec(vec![1, 0]));
		let draw = Translucent(255, 0, 0);
		let result = compose(&mut ctx, &layout, &draw, &identity, &identity).unwrap().unwrap();

		// Composite order [1, 0]: rank 1 (green) ends up composited as the
		// front operand over rank 0 (red) as the back operand.
		let expected = crate::image::composite::blend_rgba8([0, 255, 0, 128], [255, 0, 0, 128]);
		assert_eq!(result.color_rgba8(0), Some(expected));
	}
}
