//! Prelude module for `icet_internal`.
//!
//! This module provides a convenient way to import commonly used types and
//! traits.
//!
//! # Examples
//!
//! ```rust
//! use icet_internal::prelude::*;
//!
//! let comms = MockCommunicator::group(1);
//! let ctx = create_context(&comms[0]).unwrap();
//! ```

#[doc(inline)]
pub use icet_types::prelude::*;

#[doc(inline)]
pub use icet_types;
