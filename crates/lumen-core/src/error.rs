//! Error types for Lumen

use crate::handle::AssetHandle;
use thiserror::Error;

/// The main error type for Lumen operations
#[derive(Debug, Error)]
pub enum LumenError {
    #[error("Asset not found in registry: {0}")]
    AssetNotFound(AssetHandle),

    #[error("Asset not found in package: {0}")]
    NotInPackage(AssetHandle),

    #[error("Corrupt package: {0}")]
    CorruptPackage(String),

    #[error("Unsupported sidecar schema version: {0}")]
    UnsupportedSchema(f64),

    #[error("No loader registered for asset kind '{0}'")]
    LoaderMissing(String),

    #[error("Asset {handle} is not a {expected}")]
    TypeMismatch {
        handle: AssetHandle,
        expected: &'static str,
    },

    #[error("Source path {path} is already registered to {existing}")]
    DuplicateSourcePath {
        path: String,
        existing: AssetHandle,
    },

    #[error("Handle {handle} is already registered to {path}")]
    DuplicateHandle { handle: AssetHandle, path: String },

    #[error("Cook failed for {path}: {reason}")]
    CookFailed { path: String, reason: String },

    #[error("Sidecar error: {0}")]
    SidecarError(String),

    #[error("Load error: {0}")]
    LoadError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

/// Result type alias for Lumen operations
pub type Result<T> = std::result::Result<T, LumenError>;

impl LumenError {
    /// Whether this error means "nothing there" rather than "something broken"
    pub fn is_not_found(&self) -> bool {
        matches!(self, LumenError::AssetNotFound(_) | LumenError::NotInPackage(_))
    }
}

impl From<toml::de::Error> for LumenError {
    fn from(err: toml::de::Error) -> Self {
        LumenError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for LumenError {
    fn from(err: toml::ser::Error) -> Self {
        LumenError::TomlSerError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(LumenError::AssetNotFound(AssetHandle::from_raw(7)).is_not_found());
        assert!(LumenError::NotInPackage(AssetHandle::from_raw(7)).is_not_found());
        assert!(!LumenError::CorruptPackage("short".into()).is_not_found());
    }

    #[test]
    fn test_display_includes_handle() {
        let err = LumenError::NotInPackage(AssetHandle::from_raw(9999));
        assert_eq!(err.to_string(), "Asset not found in package: 9999");
    }
}
