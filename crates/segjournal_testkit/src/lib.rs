//! # segjournal testkit
//!
//! Test utilities for segjournal.
//!
//! This crate provides:
//! - Temporary journal fixtures with automatic cleanup
//! - Property-based test generators using proptest
//! - Crash simulation and on-disk corruption helpers
//! - A reference model for differential testing
//! - Fuzz harnesses for the frame reader and the journal API
//! - Stress testing utilities
//! - Byte-level format vectors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segjournal_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_journal() {
//!     with_temp_journal(|journal| {
//!         journal.append(b"entry".to_vec()).unwrap();
//!         assert_eq!(journal.last_index(), 1);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod integration;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use crash::*;
pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
pub use vectors::*;
