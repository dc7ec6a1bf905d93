//! Error taxonomy and diagnostics channel for the compositing engine.

use thiserror::Error;

/// Errors raised by the compositing engine.
///
/// Every error that passes through [`crate::context::Context::record_error`]
/// is published to that context's most-recent-error slot and to the `log`
/// facade, in addition to being returned to the caller; none are swallowed
/// internally.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IcetError {
	/// An unknown state parameter identifier was used.
	#[error("invalid enum: unknown state parameter {0:?}")]
	InvalidEnum(String),

	/// An out-of-range argument or an invalid handle was supplied.
	#[error("invalid value: {0}")]
	InvalidValue(String),

	/// A type conversion was refused (e.g. float read as an enum, or a pointer
	/// slot read as anything else).
	#[error("bad cast: {0}")]
	BadCast(String),

	/// A buffer or scratch arena could not be grown to the requested size.
	#[error("out of memory: {0}")]
	OutOfMemory(String),

	/// An internal invariant was violated (malformed header, mismatched magic,
	/// under-provisioned buffer).
	#[error("sanity check failed: {0}")]
	SanityCheckFail(String),
}

impl IcetError {
	/// Short machine-readable name of the error kind, used in diagnostics output.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::InvalidEnum(_) => "invalid_enum",
			Self::InvalidValue(_) => "invalid_value",
			Self::BadCast(_) => "bad_cast",
			Self::OutOfMemory(_) => "out_of_memory",
			Self::SanityCheckFail(_) => "sanity_check_fail",
		}
	}
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IcetError>;

/// Publishes an error to the `log` diagnostics channel at the appropriate
/// severity and returns it unchanged, for use at `?`-propagation sites that
/// want to guarantee the error is observed even if the caller discards it.
pub fn raise(err: IcetError) -> IcetError {
	match &err {
		IcetError::SanityCheckFail(_) | IcetError::OutOfMemory(_) => {
			log::error!("[{}] {}", err.kind(), err);
		}
		_ => {
			log::warn!("[{}] {}", err.kind(), err);
		}
	}
	err
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_names_are_stable() {
		assert_eq!(IcetError::InvalidEnum("x".into()).kind(), "invalid_enum");
		assert_eq!(IcetError::InvalidValue("x".into()).kind(), "invalid_value");
		assert_eq!(IcetError::BadCast("x".into()).kind(), "bad_cast");
		assert_eq!(IcetError::OutOfMemory("x".into()).kind(), "out_of_memory");
		assert_eq!(IcetError::SanityCheckFail("x".into()).kind(), "sanity_check_fail");
	}

	#[test]
	fn raise_returns_error_unchanged() {
		let err = IcetError::InvalidValue("bad tile index".into());
		let returned = raise(err.clone());
		assert_eq!(err, returned);
	}
}
