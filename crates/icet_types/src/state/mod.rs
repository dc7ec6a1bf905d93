//! Typed key-value state store: the engine's single source of configuration
//! and working state, mirroring the "state" concept every context owns.

mod value;

pub use value::StateValue;

use std::collections::HashMap;

use crate::error::{IcetError, Result};
use crate::format::{BackgroundColor, ColorFormat, DepthFormat};
use crate::image::CompositeMode;

/// Identifies one slot in the [`StateStore`]. Grouped the way `state.c`
/// groups its `ICET_*` parameter identifiers: tile geometry, process
/// topology, format/background, composite configuration, scratch buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateName {
	/// Maximum tile width in pixels across all tiles.
	TileMaxWidth,
	/// Maximum tile height in pixels across all tiles.
	TileMaxHeight,
	/// Number of tiles in the current layout.
	NumTiles,
	/// Index of the tile this process displays, or `None` if it displays none.
	TileDisplayed,
	/// Per-tile count of contributing processes.
	TileContribCounts,
	/// Per-tile display node rank.
	DisplayNodes,
	/// This process's rank within the communicator.
	Rank,
	/// Total number of processes in the communicator.
	NumProcesses,
	/// Ranks sharing this process's data replica.
	DataReplicationGroup,
	/// Size of [`Self::DataReplicationGroup`].
	DataReplicationGroupSize,
	/// Compositing order: a permutation of `[0, num_processes)`.
	CompositeOrder,
	/// Inverse permutation of [`Self::CompositeOrder`].
	ProcessOrders,
	/// Color channel format.
	ColorFormat,
	/// Depth channel format.
	DepthFormat,
	/// Background color, as floating point RGBA.
	BackgroundColorRgba,
	/// Background color, packed for the current color format.
	BackgroundColorWord,
	/// Compositing mode (`z_buffer` or `blend`).
	CompositeMode,
	/// Whether tile display boundaries float to the used viewport.
	FloatingViewport,
	/// Whether a globally-agreed visibility order drives the strategy.
	OrderedComposite,
	/// Whether the background color is corrected across color spaces.
	CorrectColoredBackground,
	/// Whether compositing operates on a single combined buffer.
	CompositeOneBuffer,
	/// Monotonic count of composited frames.
	FrameCount,
	/// Opaque pointer slot for the registered draw callback.
	DrawFunction,
	/// Opaque pointer slot for the render-layer destructor.
	RenderLayerDestructor,
	/// Reusable scratch buffer `n` (`0..=3`) used by compositing strategies.
	StrategyBuffer(u8),
}

/// Number of reusable strategy scratch buffer slots (`direct.c` allocates
/// exactly this many: the working image, the two sparse compose buffers, and
/// the tile-destination buffer).
pub const NUM_STRATEGY_BUFFERS: u8 = 4;

/// One bit-range of the enable/disable flag space (`ICET_STATE_ENABLE_START`
/// to `_END`), keyed separately from [`StateName`] since it is a dense range
/// of boolean toggles rather than a typed value slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnableBit {
	/// Whether floating-point color channels are treated as linear.
	CorrectColoredBackground,
	/// Whether the composite-order permutation is honored strictly.
	OrderedComposite,
	/// Whether compositing accumulates into a single shared buffer.
	CompositeOneBuffer,
}

/// Whether `incoming` can overwrite `existing` in place: same vector/buffer
/// variant, same element count. Scalar and pointer slots are never aliased
/// by a live borrow elsewhere, so there is nothing to preserve by rewriting
/// them in place; only the heap-backed variants matter here.
fn same_shape(existing: &StateValue, incoming: &StateValue) -> bool {
	match (existing, incoming) {
		(StateValue::I32Vec(a), StateValue::I32Vec(b)) => a.len() == b.len(),
		(StateValue::F32Vec(a), StateValue::F32Vec(b)) => a.len() == b.len(),
		(StateValue::Bytes(a), StateValue::Bytes(b)) => a.len() == b.len(),
		_ => false,
	}
}

/// Overwrites `existing`'s backing allocation with `incoming`'s contents.
/// Caller must have already confirmed [`same_shape`].
fn overwrite_in_place(existing: &mut StateValue, incoming: StateValue) {
	match (existing, incoming) {
		(StateValue::I32Vec(old), StateValue::I32Vec(new)) => old.copy_from_slice(&new),
		(StateValue::F32Vec(old), StateValue::F32Vec(new)) => old.copy_from_slice(&new),
		(StateValue::Bytes(old), StateValue::Bytes(new)) => old.copy_from_slice(&new),
		_ => unreachable!("same_shape guarantees a matching vector variant"),
	}
}

/// A fixed-capacity, typed, tagged-variant key-value store with a monotonic
/// modification timestamp, mirroring `icetStateCreate`/`icetStateSetDefaults`.
#[derive(Debug, Clone)]
pub struct StateStore {
	slots: HashMap<StateName, Slot>,
	enable_bits: HashMap<EnableBit, bool>,
	clock: u64,
}

#[derive(Debug, Clone)]
struct Slot {
	value: StateValue,
	mod_time: u64,
}

impl StateStore {
	/// Builds an empty store with no slots set and the clock at zero.
	pub fn new() -> Self {
		Self {
			slots: HashMap::new(),
			enable_bits: HashMap::new(),
			clock: 0,
		}
	}

	/// Builds a store populated with `icetStateSetDefaults`'s defaults for a
	/// communicator of the given rank and size.
	pub fn with_defaults(rank: i32, num_processes: i32) -> Self {
		let mut store = Self::new();
		store.set(StateName::Rank, StateValue::I32(rank));
		store.set(StateName::NumProcesses, StateValue::I32(num_processes));
		store.set(StateName::DataReplicationGroup, StateValue::I32(rank));
		store.set(StateName::DataReplicationGroupSize, StateValue::I32(1));

		store.set(StateName::TileMaxWidth, StateValue::I32(0));
		store.set(StateName::TileMaxHeight, StateValue::I32(0));
		store.set(StateName::NumTiles, StateValue::I32(0));
		store.set(StateName::TileDisplayed, StateValue::I32(-1));

		let identity: Vec<i32> = (0..num_processes).collect();
		store.set(StateName::CompositeOrder, StateValue::I32Vec(identity.clone()));
		store.set(StateName::ProcessOrders, StateValue::I32Vec(identity));

		store.set(StateName::ColorFormat, StateValue::I32(ColorFormat::Rgba8 as i32));
		store.set(StateName::DepthFormat, StateValue::I32(DepthFormat::Float as i32));
		let bg = BackgroundColor::transparent_black(ColorFormat::Rgba8);
		store.set(StateName::BackgroundColorRgba, StateValue::F32Vec(bg.rgba.to_vec()));
		store.set(StateName::BackgroundColorWord, StateValue::I32(bg.packed as i32));

		store.set(StateName::CompositeMode, StateValue::I32(CompositeMode::ZBuffer as i32));
		store.set(StateName::FrameCount, StateValue::I32(0));
		store.set(StateName::DrawFunction, StateValue::Pointer(None));
		store.set(StateName::RenderLayerDestructor, StateValue::Pointer(None));

		store.enable_bits.insert(EnableBit::CorrectColoredBackground, false);
		store.enable_bits.insert(EnableBit::OrderedComposite, false);
		store.enable_bits.insert(EnableBit::CompositeOneBuffer, true);

		store
	}

	fn tick(&mut self) -> u64 {
		self.clock += 1;
		self.clock
	}

	/// Sets a slot's value. When the incoming value has the same variant and
	/// element count as the slot's current value, the existing allocation is
	/// overwritten in place (`Vec::copy_from_slice`) rather than replaced, so
	/// a same-shape rewrite of a vector or byte-buffer slot never
	/// reallocates. A differently-shaped or differently-typed value replaces
	/// the slot outright. The modification timestamp advances by exactly one
	/// tick either way, regardless of whether the value actually changed.
	pub fn set(&mut self, name: StateName, value: StateValue) {
		let mod_time = self.tick();
		if let Some(slot) = self.slots.get_mut(&name) {
			if same_shape(&slot.value, &value) {
				overwrite_in_place(&mut slot.value, value);
				slot.mod_time = mod_time;
				return;
			}
		}
		self.slots.insert(
			name,
			Slot {
				value,
				mod_time,
			},
		);
	}

	/// Reads a slot's raw tagged value, if set.
	pub fn get(&self, name: StateName) -> Option<&StateValue> {
		self.slots.get(&name).map(|slot| &slot.value)
	}

	/// Reads a slot's modification timestamp, if set.
	pub fn mod_time(&self, name: StateName) -> Option<u64> {
		self.slots.get(&name).map(|slot| slot.mod_time)
	}

	/// Reads a slot as `i32`, numerically coercing from any non-pointer,
	/// non-vector scalar variant. Refuses pointer slots (`bad_cast`).
	pub fn get_i32(&self, name: StateName) -> Result<i32> {
		match self.get(name) {
			Some(StateValue::I16(v)) => Ok(*v as i32),
			Some(StateValue::I32(v)) => Ok(*v),
			Some(StateValue::F32(v)) => Ok(*v as i32),
			Some(StateValue::F64(v)) => Ok(*v as i32),
			Some(StateValue::Bool(v)) => Ok(i32::from(*v)),
			Some(StateValue::Pointer(_)) => {
				Err(IcetError::BadCast(format!("{name:?} is a pointer slot, cannot read as i32")))
			}
			Some(StateValue::I32Vec(_)) | Some(StateValue::F32Vec(_)) => {
				Err(IcetError::BadCast(format!("{name:?} is a vector slot, cannot read as scalar i32")))
			}
			Some(StateValue::None) | None => {
				Err(IcetError::InvalidEnum(format!("{name:?} has no value set")))
			}
		}
	}

	/// Reads a slot as `bool`. Refuses pointer and vector slots.
	pub fn get_bool(&self, name: StateName) -> Result<bool> {
		match self.get(name) {
			Some(StateValue::Bool(v)) => Ok(*v),
			Some(StateValue::I16(v)) => Ok(*v != 0),
			Some(StateValue::I32(v)) => Ok(*v != 0),
			Some(StateValue::F32(v)) => Ok(*v != 0.0),
			Some(StateValue::F64(v)) => Ok(*v != 0.0),
			Some(StateValue::Pointer(_)) => {
				Err(IcetError::BadCast(format!("{name:?} is a pointer slot, cannot read as bool")))
			}
			Some(StateValue::I32Vec(_)) | Some(StateValue::F32Vec(_)) => {
				Err(IcetError::BadCast(format!("{name:?} is a vector slot, cannot read as scalar bool")))
			}
			Some(StateValue::None) | None => {
				Err(IcetError::InvalidEnum(format!("{name:?} has no value set")))
			}
		}
	}

	/// Reads a slot as a vector of `i32`.
	pub fn get_i32_vec(&self, name: StateName) -> Result<&[i32]> {
		match self.get(name) {
			Some(StateValue::I32Vec(v)) => Ok(v),
			Some(_) => Err(IcetError::BadCast(format!("{name:?} is not an i32 vector slot"))),
			None => Err(IcetError::InvalidEnum(format!("{name:?} has no value set"))),
		}
	}

	/// Reads a slot as an opaque pointer handle. Refuses any non-pointer slot.
	pub fn get_pointer(&self, name: StateName) -> Result<Option<u64>> {
		match self.get(name) {
			Some(StateValue::Pointer(v)) => Ok(*v),
			Some(_) => Err(IcetError::BadCast(format!("{name:?} is not a pointer slot"))),
			None => Err(IcetError::InvalidEnum(format!("{name:?} has no value set"))),
		}
	}

	/// Enables the given bit, recording the change on the modification clock.
	pub fn enable(&mut self, bit: EnableBit) {
		self.tick();
		self.enable_bits.insert(bit, true);
	}

	/// Disables the given bit, recording the change on the modification clock.
	pub fn disable(&mut self, bit: EnableBit) {
		self.tick();
		self.enable_bits.insert(bit, false);
	}

	/// Reads whether the given bit is enabled (defaults to `false` if unset).
	pub fn is_enabled(&self, bit: EnableBit) -> bool {
		self.enable_bits.get(&bit).copied().unwrap_or(false)
	}

	/// Copies another store's slots into this one, as `icetStateCopy` does:
	/// every slot is copied except rank, process count, the data replication
	/// group and its size, the composite order and the process orders, which
	/// remain the destination's own (topology is a property of where a
	/// context runs, not of the state it was given).
	pub fn copy_from(&mut self, other: &Self) {
		const PRESERVED: &[StateName] = &[
			StateName::Rank,
			StateName::NumProcesses,
			StateName::DataReplicationGroup,
			StateName::DataReplicationGroupSize,
			StateName::CompositeOrder,
			StateName::ProcessOrders,
		];
		for (name, slot) in &other.slots {
			if PRESERVED.contains(name) {
				continue;
			}
			self.slots.insert(
				*name,
				Slot {
					value: slot.value.clone(),
					mod_time: slot.mod_time,
				},
			);
		}
		self.enable_bits.clone_from(&other.enable_bits);
	}

	/// Returns a scratch buffer for strategy slot `index`, growing it to at
	/// least `len` bytes and reusing the existing allocation when it already
	/// has enough capacity. Strategies pull their working buffers from here
	/// instead of allocating fresh `Vec`s every frame.
	pub fn strategy_buffer(&mut self, index: u8, len: usize) -> Result<&mut Vec<u8>> {
		if index >= NUM_STRATEGY_BUFFERS {
			return Err(IcetError::InvalidValue(format!(
				"strategy buffer index {index} out of range (0..{NUM_STRATEGY_BUFFERS})"
			)));
		}
		let name = StateName::StrategyBuffer(index);
		self.tick();
		let slot = self.slots.entry(name).or_insert_with(|| Slot {
			value: StateValue::Bytes(Vec::new()),
			mod_time: 0,
		});
		match &mut slot.value {
			StateValue::Bytes(buf) => {
				if buf.len() < len {
					buf.resize(len, 0);
				}
				Ok(buf)
			}
			_ => Err(IcetError::SanityCheckFail(format!("strategy buffer slot {index} has the wrong type"))),
		}
	}

	/// Takes ownership of strategy scratch buffer `index`'s backing `Vec`,
	/// leaving an empty one in its place, so a caller can build an
	/// [`crate::image::Image`] directly atop the existing allocation instead
	/// of copying into or out of it. Pair with [`Self::put_strategy_buffer`]
	/// to return the (possibly regrown) buffer once the caller is done with
	/// it within the same frame.
	pub fn take_strategy_buffer(&mut self, index: u8) -> Result<Vec<u8>> {
		if index >= NUM_STRATEGY_BUFFERS {
			return Err(IcetError::InvalidValue(format!(
				"strategy buffer index {index} out of range (0..{NUM_STRATEGY_BUFFERS})"
			)));
		}
		self.tick();
		let name = StateName::StrategyBuffer(index);
		match self.slots.get_mut(&name) {
			Some(Slot {
				value: StateValue::Bytes(buf),
				..
			}) => Ok(std::mem::take(buf)),
			Some(_) => Err(IcetError::SanityCheckFail(format!("strategy buffer slot {index} has the wrong type"))),
			None => Ok(Vec::new()),
		}
	}

	/// Returns a buffer previously obtained from [`Self::take_strategy_buffer`]
	/// to its scratch slot for reuse by a later call in the same frame or a
	/// later frame.
	pub fn put_strategy_buffer(&mut self, index: u8, buf: Vec<u8>) -> Result<()> {
		if index >= NUM_STRATEGY_BUFFERS {
			return Err(IcetError::InvalidValue(format!(
				"strategy buffer index {index} out of range (0..{NUM_STRATEGY_BUFFERS})"
			)));
		}
		let mod_time = self.tick();
		self.slots.insert(
			StateName::StrategyBuffer(index),
			Slot {
				value: StateValue::Bytes(buf),
				mod_time,
			},
		);
		Ok(())
	}

	/// Enumerates every set slot as `(name, value, mod_time)` triples, in an
	/// explicit, index-driven order rather than by walking storage via
	/// pointer arithmetic — a deliberate resolution of the upstream
	/// `icetStateDump` ambiguity around unset slots (see `DESIGN.md`).
	pub fn dump(&self) -> Vec<(StateName, &StateValue, u64)> {
		let mut entries: Vec<_> = self.slots.iter().map(|(name, slot)| (*name, &slot.value, slot.mod_time)).collect();
		entries.sort_by_key(|(_, _, mod_time)| *mod_time);
		entries
	}
}

impl Default for StateStore {
	fn default() -> Self {
		Self::new()
	}
}
