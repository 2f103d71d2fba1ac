//! # Tidemark Testkit
//!
//! Test utilities for tidemark.
//!
//! This crate provides:
//! - In-memory implementations of the engine's store ports
//! - Instrumented store wrappers (call counting, fault injection)
//! - Fixture builders for tracked replica pairs
//! - Property-based test generators using proptest

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stores;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stores::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stores::*;
