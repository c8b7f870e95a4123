//! trellis-core - Engine-agnostic test discovery and execution
//!
//! This crate provides:
//! - A stable identifier and descriptor model for discovered tests
//! - Discovery requests built from selectors, filters and configuration
//! - The `TestEngine` contract that pluggable engines implement
//! - A `Launcher` that fans one request out to many engines, merges their
//!   trees into a `TestPlan` and validates every execution event
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod execution;
pub mod launcher;
pub mod listeners;
pub mod testkit;
pub mod types;

// Re-export commonly used types and traits
pub use error::{Error, Result};
pub use types::*;

// Re-export main API components
pub use config::ConfigurationParameters;
pub use discovery::{DiscoverySelector, EngineDiscoveryRequest, LauncherDiscoveryRequestBuilder};
pub use engine::{EngineExecutionListener, ExecutionRequest, NoOpEngine, TestEngine};
pub use execution::{ExecutionEvent, FailureCause, TestExecutionResult};
pub use launcher::{ExecutionReport, Launcher, TestExecutionListener, TestIdentifier, TestPlan};
