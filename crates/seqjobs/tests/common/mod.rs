//! Shared test utilities for seqjobs integration tests.
//!
//! - `TestHarness` for isolated orchestrator runs in temp directories
//! - Stub analysts with scripted outcomes

pub mod harness;
pub mod stubs;

pub use harness::*;
pub use stubs::*;
