//! Per-kind loader and reloader registrations

use crate::types::{AssetKind, AssetMetadata};
use lumen_core::{AssetHandle, LumenError, Result};
use lumen_pak::PakReader;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A loaded asset with its concrete type erased
pub type BoxedAsset = Box<dyn Any + Send + Sync>;

/// Where cooked bytes come from
pub enum AssetStorage {
    /// Individual files in the cache directory
    Loose,
    /// One sealed package
    Package(PakReader),
}

impl AssetStorage {
    pub fn is_package(&self) -> bool {
        matches!(self, AssetStorage::Package(_))
    }

    pub fn package(&self) -> Option<&PakReader> {
        match self {
            AssetStorage::Package(reader) => Some(reader),
            AssetStorage::Loose => None,
        }
    }

    /// Read the cooked bytes of `meta`
    pub fn read(&self, root: &Path, meta: &AssetMetadata) -> Result<Vec<u8>> {
        match self {
            AssetStorage::Loose => {
                if meta.cache_path.is_empty() {
                    return Err(LumenError::LoadError(format!(
                        "{} has no cooked file",
                        meta.source_path
                    )));
                }
                Ok(fs::read(root.join(&meta.cache_path))?)
            }
            AssetStorage::Package(reader) => reader.extract(package_id(meta)),
        }
    }
}

impl fmt::Debug for AssetStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetStorage::Loose => f.write_str("Loose"),
            AssetStorage::Package(reader) => f.debug_tuple("Package").field(&reader.path()).finish(),
        }
    }
}

/// Package id of an asset: its cooked file name, which is the handle
fn package_id(meta: &AssetMetadata) -> AssetHandle {
    meta.cache_path
        .rsplit('/')
        .next()
        .and_then(AssetHandle::from_file_name)
        .unwrap_or(meta.handle)
}

/// Everything a loader may look at
pub struct LoadContext<'a> {
    pub metadata: &'a AssetMetadata,
    root: &'a Path,
    storage: &'a AssetStorage,
}

impl<'a> LoadContext<'a> {
    pub fn new(metadata: &'a AssetMetadata, root: &'a Path, storage: &'a AssetStorage) -> Self {
        Self {
            metadata,
            root,
            storage,
        }
    }

    pub fn handle(&self) -> AssetHandle {
        self.metadata.handle
    }

    /// Absolute path of the cooked file (meaningless in package mode)
    pub fn cache_path(&self) -> PathBuf {
        self.root.join(&self.metadata.cache_path)
    }

    pub fn from_package(&self) -> bool {
        self.storage.is_package()
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        self.storage.read(self.root, self.metadata)
    }

    pub fn read_string(&self) -> Result<String> {
        String::from_utf8(self.read_bytes()?).map_err(|e| {
            LumenError::LoadError(format!("{} is not UTF-8: {}", self.metadata.source_path, e))
        })
    }
}

trait ErasedLoader: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn load(&self, ctx: &LoadContext<'_>) -> Result<BoxedAsset>;

    /// Returns `Ok(false)` if this kind has no reloader
    fn reload(&self, ctx: &LoadContext<'_>, existing: &mut (dyn Any + Send + Sync)) -> Result<bool>;

    fn supports_reload(&self) -> bool;
}

enum ReloadMode<R> {
    None,
    /// Load a fresh value and move it into the existing slot
    Swap,
    Custom(R),
}

struct TypedLoader<T, L, R> {
    load: L,
    reload: ReloadMode<R>,
    _asset: PhantomData<fn() -> T>,
}

impl<T, L, R> ErasedLoader for TypedLoader<T, L, R>
where
    T: Any + Send + Sync,
    L: Fn(&LoadContext<'_>) -> Result<T> + Send + Sync,
    R: Fn(&LoadContext<'_>, &mut T) -> Result<()> + Send + Sync,
{
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn load(&self, ctx: &LoadContext<'_>) -> Result<BoxedAsset> {
        (self.load)(ctx).map(|asset| Box::new(asset) as BoxedAsset)
    }

    fn reload(&self, ctx: &LoadContext<'_>, existing: &mut (dyn Any + Send + Sync)) -> Result<bool> {
        if matches!(self.reload, ReloadMode::None) {
            return Ok(false);
        }
        let typed = existing
            .downcast_mut::<T>()
            .ok_or(LumenError::TypeMismatch {
                handle: ctx.handle(),
                expected: type_name::<T>(),
            })?;
        match &self.reload {
            ReloadMode::None => return Ok(false),
            ReloadMode::Swap => *typed = (self.load)(ctx)?,
            ReloadMode::Custom(reload) => reload(ctx, typed)?,
        }
        Ok(true)
    }

    fn supports_reload(&self) -> bool {
        !matches!(self.reload, ReloadMode::None)
    }
}

type NoReload<T> = fn(&LoadContext<'_>, &mut T) -> Result<()>;

/// Maps each asset kind to the functions that load and reload it.
///
/// Populated once at startup. A reloader must leave the existing value
/// untouched when it fails.
#[derive(Default)]
pub struct LoaderTable {
    loaders: HashMap<AssetKind, Box<dyn ErasedLoader>>,
}

impl LoaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loader with no reload support
    pub fn register<T, L>(&mut self, kind: AssetKind, load: L) -> &mut Self
    where
        T: Any + Send + Sync,
        L: Fn(&LoadContext<'_>) -> Result<T> + Send + Sync + 'static,
    {
        self.insert::<T, L, NoReload<T>>(kind, load, ReloadMode::None)
    }

    /// Register a loader whose reload loads a fresh value and swaps it into
    /// the cached instance
    pub fn register_swapping<T, L>(&mut self, kind: AssetKind, load: L) -> &mut Self
    where
        T: Any + Send + Sync,
        L: Fn(&LoadContext<'_>) -> Result<T> + Send + Sync + 'static,
    {
        self.insert::<T, L, NoReload<T>>(kind, load, ReloadMode::Swap)
    }

    /// Register a loader with a custom in-place reloader
    pub fn register_with_reloader<T, L, R>(&mut self, kind: AssetKind, load: L, reload: R) -> &mut Self
    where
        T: Any + Send + Sync,
        L: Fn(&LoadContext<'_>) -> Result<T> + Send + Sync + 'static,
        R: Fn(&LoadContext<'_>, &mut T) -> Result<()> + Send + Sync + 'static,
    {
        self.insert(kind, load, ReloadMode::Custom(reload))
    }

    fn insert<T, L, R>(&mut self, kind: AssetKind, load: L, reload: ReloadMode<R>) -> &mut Self
    where
        T: Any + Send + Sync,
        L: Fn(&LoadContext<'_>) -> Result<T> + Send + Sync + 'static,
        R: Fn(&LoadContext<'_>, &mut T) -> Result<()> + Send + Sync + 'static,
    {
        let loader = TypedLoader {
            load,
            reload,
            _asset: PhantomData,
        };
        if self.loaders.insert(kind, Box::new(loader)).is_some() {
            log::debug!("Replaced loader for {}", kind);
        }
        self
    }

    pub fn has_loader(&self, kind: AssetKind) -> bool {
        self.loaders.contains_key(&kind)
    }

    pub fn supports_reload(&self, kind: AssetKind) -> bool {
        self.loaders
            .get(&kind)
            .map(|l| l.supports_reload())
            .unwrap_or(false)
    }

    /// Rust type name of the value produced for `kind`
    pub fn type_name(&self, kind: AssetKind) -> Option<&'static str> {
        self.loaders.get(&kind).map(|l| l.type_name())
    }

    pub fn load(&self, ctx: &LoadContext<'_>) -> Result<BoxedAsset> {
        let kind = ctx.metadata.kind;
        let loader = self
            .loaders
            .get(&kind)
            .ok_or_else(|| LumenError::LoaderMissing(kind.name().to_string()))?;
        loader.load(ctx)
    }

    /// Refresh `existing` in place. Returns `Ok(false)` when the kind has no
    /// reloader, leaving `existing` as it was.
    pub fn reload(&self, ctx: &LoadContext<'_>, existing: &mut (dyn Any + Send + Sync)) -> Result<bool> {
        match self.loaders.get(&ctx.metadata.kind) {
            Some(loader) => loader.reload(ctx, existing),
            None => Ok(false),
        }
    }
}

impl fmt::Debug for LoaderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.loaders.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("LoaderTable").field("kinds", &kinds).finish()
    }
}
