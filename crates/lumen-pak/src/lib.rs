//! Lumen Pak - Sealed asset packages
//!
//! A package is one file holding the cooked bytes of many assets, addressed by
//! handle. Layout:
//!
//! ```text
//! [payload 0][payload 1]...[directory: {id, offset, size} x N][N]
//! ```
//!
//! Every integer is a fixed-width `u64` in the producing platform's native byte
//! order. The directory sits at the tail so the builder can stream payloads
//! without knowing the directory size up front, and the reader can enumerate
//! contents without touching the payload region.

mod builder;
mod entry;
mod reader;

pub use builder::{build_package, PakSummary};
pub use entry::{PakEntry, COUNT_SIZE, ENTRY_SIZE};
pub use reader::PakReader;
