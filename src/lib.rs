#![allow(clippy::single_component_path_imports)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! `icet-rs` is a sort-last parallel image compositing engine: given one
//! rendered fragment per process per tile, it composites them into the final
//! tile images using the direct-send strategy, over a pluggable
//! [`Communicator`](icet_internal::prelude::Communicator) transport.
//!
//! ```rust
//! use icet_rs::prelude::*;
//!
//! let comms = MockCommunicator::group(1);
//! let ctx = create_context(&comms[0]).unwrap();
//! ```
pub use icet_internal::*;
