//! The tagged value stored in each [`super::StateStore`] slot.

use std::fmt;

/// A single state slot's value. Scalars cover the common parameter case;
/// `I32Vec`/`F32Vec` cover array-valued parameters (composite order, tile
/// contribution counts, background color channels); `Bytes` backs the
/// reusable strategy scratch buffers; `Pointer` is an opaque handle (the
/// draw callback and render-layer destructor registrations) that never
/// coerces to or from any numeric type.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
	/// No value; an explicitly cleared or never-set slot.
	None,
	/// 16-bit signed integer.
	I16(i16),
	/// 32-bit signed integer.
	I32(i32),
	/// 32-bit float.
	F32(f32),
	/// 64-bit float.
	F64(f64),
	/// Boolean flag.
	Bool(bool),
	/// Opaque handle, `None` if unset.
	Pointer(Option<u64>),
	/// Array of 32-bit signed integers.
	I32Vec(Vec<i32>),
	/// Array of 32-bit floats.
	F32Vec(Vec<f32>),
	/// Raw byte buffer (strategy scratch space).
	Bytes(Vec<u8>),
}

impl StateValue {
	/// Width in bytes of one element of this slot's scalar type, mirroring
	/// `typeWidth` in `state.c`. Vector and byte-buffer slots report the
	/// width of their element type, not their total length.
	pub const fn element_width(&self) -> usize {
		match self {
			Self::None => 0,
			Self::I16(_) => 2,
			Self::I32(_) | Self::F32(_) => 4,
			Self::F64(_) => 8,
			Self::Bool(_) => 1,
			Self::Pointer(_) => 8,
			Self::I32Vec(_) => 4,
			Self::F32Vec(_) => 4,
			Self::Bytes(_) => 1,
		}
	}
}

impl fmt::Display for StateValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::None => write!(f, "<none>"),
			Self::I16(v) => write!(f, "{v}"),
			Self::I32(v) => write!(f, "{v}"),
			Self::F32(v) => write!(f, "{v}"),
			Self::F64(v) => write!(f, "{v}"),
			Self::Bool(v) => write!(f, "{v}"),
			Self::Pointer(Some(v)) => write!(f, "0x{v:016X}"),
			Self::Pointer(None) => write!(f, "<null>"),
			Self::I32Vec(v) => write!(f, "{v:?}"),
			Self::F32Vec(v) => write!(f, "{v:?}"),
			Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn element_width_matches_scalar_type() {
		assert_eq!(StateValue::I16(0).element_width(), 2);
		assert_eq!(StateValue::I32(0).element_width(), 4);
		assert_eq!(StateValue::F64(0.0).element_width(), 8);
		assert_eq!(StateValue::Pointer(None).element_width(), 8);
	}

	#[test]
	fn display_renders_pointer_as_hex() {
		assert_eq!(StateValue::Pointer(Some(0xFF)).to_string(), "0x00000000000000FF");
		assert_eq!(StateValue::Pointer(None).to_string(), "<null>");
	}
}
