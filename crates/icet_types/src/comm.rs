//! The communicator trait: the engine's sole network abstraction.

use std::fmt;

use bytes::Bytes;

use crate::error::{IcetError, Result};

/// Wildcard matching any source rank in [`Communicator::recv`]/`irecv`.
pub const ANY_SOURCE: i32 = -1;
/// Wildcard matching any tag in [`Communicator::recv`]/`irecv`.
pub const ANY_TAG: i32 = -1;

/// An in-flight non-blocking send or receive, returned by [`Communicator::isend`]
/// and [`Communicator::irecv`] and resolved by [`Communicator::waitany`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Request(pub u64);

/// The external network interface the engine composites over.
///
/// A real implementation wraps a process group (MPI and the like); tests and
/// demos use [`crate::comm::mock::MockCommunicator`], an in-process
/// channel-based simulation of multiple ranks. Implementors drop their
/// underlying resources via `Drop` rather than an explicit `destroy` method.
pub trait Communicator: fmt::Debug {
	/// Creates an independent duplicate of this communicator, sharing the
	/// same process group but usable without interfering with the original's
	/// in-flight requests.
	fn duplicate(&self) -> Result<Box<dyn Communicator>>;

	/// Number of processes in the group.
	fn size(&self) -> i32;

	/// This process's rank within the group.
	fn rank(&self) -> i32;

	/// Blocking send to `dest`.
	fn send(&self, dest: i32, tag: i32, data: Bytes) -> Result<()>;

	/// Blocking receive from `source`.
	fn recv(&self, source: i32, tag: i32) -> Result<Bytes>;

	/// Non-blocking send; completion is observed via [`Self::waitany`].
	fn isend(&self, dest: i32, tag: i32, data: Bytes) -> Result<Request>;

	/// Non-blocking receive; completion is observed via [`Self::waitany`].
	fn irecv(&self, source: i32, tag: i32) -> Result<Request>;

	/// Blocks until any one of the given in-flight requests completes,
	/// returning its index into `requests` and, for a receive, its payload.
	fn waitany(&self, requests: &[Request]) -> Result<(usize, Option<Bytes>)>;
}

/// Validates a rank is within `[0, size)`, the check every send/recv target
/// and source must pass before being handed to a transport.
pub fn validate_rank(rank: i32, size: i32) -> Result<()> {
	if rank < 0 || rank >= size {
		return Err(IcetError::InvalidValue(format!("rank {rank} out of range [0, {size})")));
	}
	Ok(())
}

/// An in-process mock communicator, for tests and demos.
pub mod mock;
pub use mock::MockCommunicator;
