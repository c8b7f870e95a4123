//! trellis - orchestrates pluggable test engines behind one launcher
//!
//! The implementation lives in `trellis-core`; this package re-exports it
//! and hosts the cross-module integration tests.
pub use trellis_core::*;
