//! Analysis modules.
//!
//! Group statistics computed over the records held in the registry.

pub mod aggregator;

pub use aggregator::*;
