//! Lumen Core - Foundational types for the Lumen asset pipeline
//!
//! This crate provides the types every other Lumen crate depends on:
//! - `AssetHandle` - Opaque 64-bit asset identifiers
//! - `ContentHash` - Streaming 32-bit source fingerprints for staleness checks
//! - Error types and Result alias

mod error;
mod handle;
mod hash;

pub use error::{LumenError, Result};
pub use handle::AssetHandle;
pub use hash::ContentHash;
