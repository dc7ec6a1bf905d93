//! Core types for a sort-last parallel image compositing engine: dense and
//! sparse image codecs, the typed state store, contexts, the communicator
//! and draw-callback interfaces, tile layout, and the direct-send
//! compositing strategy.

pub mod comm;
pub mod context;
pub mod draw;
pub mod error;
pub mod format;
pub mod image;
pub mod state;
pub mod strategy;
pub mod tile;

pub mod prelude {
	//! Curated re-exports for downstream crates.

	pub use crate::comm::{Communicator, MockCommunicator, Request};
	pub use crate::context::{Context, ContextHandle, copy_state, create_context, destroy_context};
	pub use crate::draw::{DrawCallback, Matrix4, Viewport};
	pub use crate::error::{IcetError, Result};
	pub use crate::format::{BackgroundColor, ColorFormat, DepthFormat, FAR_DEPTH_BITS, PixelFormat, is_far_depth};
	pub use crate::image::{CompositeMode, Image, SparseImage};
	pub use crate::state::{EnableBit, StateName, StateStore, StateValue};
	pub use crate::strategy::compose;
	pub use crate::tile::{Tile, TileLayout};
}
