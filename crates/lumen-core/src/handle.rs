//! Opaque asset identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 64-bit identifier for one logical asset.
///
/// The handle names the asset independently of where its bytes live: the same
/// value is the sidecar's `handle` field, the cooked file name in the cache
/// directory, and the directory id inside a package.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetHandle(pub u64);

impl AssetHandle {
    /// The reserved "no asset" value
    pub const INVALID: AssetHandle = AssetHandle(0);

    /// Generate a fresh random handle.
    ///
    /// Values are kept within 63 bits so they survive formats whose integers are
    /// signed. Uniqueness within a registry is enforced by the registry, which
    /// re-rolls on collision.
    pub fn generate() -> Self {
        loop {
            let (high, _) = uuid::Uuid::new_v4().as_u64_pair();
            let raw = high & (i64::MAX as u64);
            if raw != 0 {
                return Self(raw);
            }
        }
    }

    /// Create a handle from a raw value (for deserialization/testing)
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw u64 value
    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }

    /// Parse a cooked-asset file name (the decimal handle) into a handle
    pub fn from_file_name(name: &str) -> Option<Self> {
        name.parse::<u64>().ok().map(Self)
    }

    /// The cooked-asset file name for this handle
    pub fn file_name(&self) -> String {
        self.0.to_string()
    }
}

impl Default for AssetHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl FromStr for AssetHandle {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl From<u64> for AssetHandle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetHandle({})", self.0)
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
