//! Internal crate for `icet-rs`.
//!
//! This module is separated into its own crate to enable simple dynamic
//! linking for `icet`, and should not be used directly.
//!
//! # Examples
//!
//! ```rust
//! use icet_internal::prelude::*;
//!
//! let comms = MockCommunicator::group(1);
//! let ctx = create_context(&comms[0]).unwrap();
//! ```

/// `use icet_internal::prelude::*;` to import commonly used items.
pub mod prelude;

pub use icet_types;
