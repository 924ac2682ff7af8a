//! Report generation modules.
//!
//! This module provides text rendering for the menu and CSV/JSON output
//! for benchmark results.

pub mod generator;

pub use generator::*;
