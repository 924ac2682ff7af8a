//! Hash table storage.
//!
//! This module provides the open-addressing table that backs the registry.

pub mod open_addressing;

pub use open_addressing::{OpenAddressingMap, TableError};
