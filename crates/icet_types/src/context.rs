//! Contexts: a communicator plus its state, and the "current context" a
//! thread operates against.
//!
//! "Current" is tracked per thread via `thread_local!` rather than as a
//! single process-wide slot, since a process-global `static mut` would
//! require `unsafe` this workspace denies. Each thread gets its own notion
//! of "current", which still guarantees at most one context active at a
//! time within any one caller.

use std::cell::RefCell;
use std::rc::Rc;

use crate::comm::Communicator;
use crate::error::{IcetError, Result};
use crate::state::StateStore;

/// Sentinel stamped into every live context and cleared on destruction;
/// [`set_current`] and [`destroy_context`] both refuse a context whose magic
/// does not match, catching use of a stale handle.
const CONTEXT_MAGIC: u32 = 0x1CE7_C0DE;

/// A communicator plus the state store it owns.
pub struct Context {
	magic: u32,
	/// This context's state store.
	pub state: StateStore,
	comm: Box<dyn Communicator>,
	destructor: Option<Box<dyn FnOnce(&mut StateStore)>>,
	last_error: Option<IcetError>,
}

impl std::fmt::Debug for Context {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Context")
			.field("magic", &self.magic)
			.field("comm", &self.comm)
			.field("has_destructor", &self.destructor.is_some())
			.finish()
	}
}

/// A shared handle to a [`Context`]. Cheap to clone; all clones refer to the
/// same underlying context.
pub type ContextHandle = Rc<RefCell<Context>>;

thread_local! {
	static CURRENT: RefCell<Option<ContextHandle>> = const { RefCell::new(None) };
}

impl Context {
	/// This context's communicator.
	pub fn comm(&self) -> &dyn Communicator {
		self.comm.as_ref()
	}

	/// Registers a destructor run once, at [`destroy_context`], before the
	/// context's state and communicator are torn down. Replaces any
	/// previously registered destructor.
	pub fn set_render_layer_destructor(&mut self, destructor: impl FnOnce(&mut StateStore) + 'static) {
		self.destructor = Some(Box::new(destructor));
	}

	/// The most recent error raised against this context, if any. Every
	/// error returned from a compositing call is also published here (and
	/// to the `log` facade, at a severity matching its kind) before it
	/// reaches the caller, so diagnostics survive even if a caller discards
	/// a `Result` — the "most-recent-error slot plus severity-filtered log"
	/// reporting model.
	pub fn last_error(&self) -> Option<&IcetError> {
		self.last_error.as_ref()
	}

	/// Publishes `err` to this context's last-error slot and to the `log`
	/// facade, then returns it unchanged for `?`-propagation.
	pub fn record_error(&mut self, err: IcetError) -> IcetError {
		let err = crate::error::raise(err);
		self.last_error = Some(err.clone());
		err
	}

	fn validate(&self) -> Result<()> {
		if self.magic != CONTEXT_MAGIC {
			return Err(IcetError::InvalidValue("context handle is stale or already destroyed".into()));
		}
		Ok(())
	}
}

/// Creates a context over a duplicate of `comm`, populates its state with
/// the communicator's rank/size defaults, and makes it the current context
/// on this thread.
pub fn create_context(comm: &dyn Communicator) -> Result<ContextHandle> {
	let duplicated = comm.duplicate()?;
	let rank = duplicated.rank();
	let size = duplicated.size();
	let context = Context {
		magic: CONTEXT_MAGIC,
		state: StateStore::with_defaults(rank, size),
		comm: duplicated,
		destructor: None,
		last_error: None,
	};
	let handle: ContextHandle = Rc::new(RefCell::new(context));
	set_current(Some(handle.clone()))?;
	Ok(handle)
}

/// Runs `handle`'s registered destructor, invalidates its magic number, and
/// clears it from "current" on this thread if it was current.
pub fn destroy_context(handle: &ContextHandle) -> Result<()> {
	{
		let mut context = handle.borrow_mut();
		context.validate()?;
		if let Some(destructor) = context.destructor.take() {
			destructor(&mut context.state);
		}
		context.magic = 0;
	}
	CURRENT.with(|cell| {
		let mut current = cell.borrow_mut();
		if matches!(current.as_ref(), Some(existing) if Rc::ptr_eq(existing, handle)) {
			*current = None;
		}
	});
	Ok(())
}

/// Sets this thread's current context, validating its magic number first.
/// Passing `None` clears the current context without requiring one be set.
pub fn set_current(handle: Option<ContextHandle>) -> Result<()> {
	if let Some(ref h) = handle {
		h.borrow().validate()?;
	}
	CURRENT.with(|cell| {
		*cell.borrow_mut() = handle;
	});
	Ok(())
}

/// Returns this thread's current context, if any.
pub fn current() -> Option<ContextHandle> {
	CURRENT.with(|cell| cell.borrow().clone())
}

/// Copies `src`'s state into `dst`, preserving `dst`'s own topology slots
/// (rank, process count, replication group, composite/process orders), the
/// way `icetCopyState` delegates to `icetStateCopy`.
pub fn copy_state(dst: &ContextHandle, src: &ContextHandle) -> Result<()> {
	dst.borrow().validate()?;
	src.borrow().validate()?;
	let src_state = src.borrow().state.clone();
	dst.borrow_mut().state.copy_from(&src_state);
	Ok(())
}
