//! Lumen Asset - Asset registry, loading and hot reload
//!
//! This crate maps opaque handles to assets on disk and in memory:
//! - Sidecar metadata and its TOML codec
//! - The registry, which scans a source tree and cooks stale assets
//! - Per-kind loaders, the loaded-asset cache and the reload queue
//! - `AssetSystem`, the context object consumers talk to

mod builtin;
mod cache;
pub mod codec;
mod config;
mod cook;
mod kinds;
mod loader;
mod registry;
mod reload;
mod system;
mod types;
mod watcher;

pub use builtin::{register_builtin_loaders, CookedBlob, TextDocument};
pub use cache::{AssetCache, AssetRef, AssetSlot, LoadedAsset};
pub use config::{ProjectConfig, ProjectConfigFile, ProjectSection, CONFIG_FILE_NAME};
pub use cook::{CommandCooker, CopyCooker, Cooker};
pub use kinds::KindTable;
pub use loader::{AssetStorage, BoxedAsset, LoadContext, LoaderTable};
pub use registry::{AssetRegistry, ScanReport, VerifyStatus};
pub use reload::ReloadQueue;
pub use system::AssetSystem;
pub use types::{
    AssetConfig, AssetKind, AssetMetadata, MeshConfig, TextureConfig, TextureFilter,
    TextureShape, TextureUsage, TextureWrap,
};
pub use watcher::AssetWatcher;
