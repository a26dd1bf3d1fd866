//! Loaded-asset cache with identity-preserving reload

use crate::loader::{AssetStorage, BoxedAsset, LoadContext, LoaderTable};
use crate::registry::AssetRegistry;
use crate::types::AssetKind;
use lumen_core::AssetHandle;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

/// One loaded asset. The value is replaced on reload; the slot holding it is not.
pub struct LoadedAsset {
    handle: AssetHandle,
    kind: AssetKind,
    generation: u32,
    value: BoxedAsset,
}

impl LoadedAsset {
    pub fn handle(&self) -> AssetHandle {
        self.handle
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Number of successful reloads since the first load
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for LoadedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedAsset")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// The cache's owning pointer to a loaded asset
pub type AssetSlot = Arc<RwLock<LoadedAsset>>;

/// Non-owning, typed reference to a cached asset.
///
/// Stays valid across reloads, which swap the contents behind it. Once the
/// asset is evicted, reads return `None`.
pub struct AssetRef<T> {
    handle: AssetHandle,
    slot: Weak<RwLock<LoadedAsset>>,
    _asset: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> AssetRef<T> {
    pub(crate) fn new(handle: AssetHandle, slot: &AssetSlot) -> Self {
        Self {
            handle,
            slot: Arc::downgrade(slot),
            _asset: PhantomData,
        }
    }

    pub fn handle(&self) -> AssetHandle {
        self.handle
    }

    /// Run `f` against the current contents
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let slot = self.slot.upgrade()?;
        let loaded = slot.read();
        loaded.downcast_ref::<T>().map(f)
    }

    pub fn generation(&self) -> Option<u32> {
        let slot = self.slot.upgrade()?;
        let generation = slot.read().generation;
        Some(generation)
    }

    pub fn is_alive(&self) -> bool {
        self.slot.strong_count() > 0
    }

    /// Whether both references point at the same cached instance
    pub fn ptr_eq(&self, other: &AssetRef<T>) -> bool {
        Weak::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T> Clone for AssetRef<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle,
            slot: self.slot.clone(),
            _asset: PhantomData,
        }
    }
}

impl<T> fmt::Debug for AssetRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRef")
            .field("handle", &self.handle)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// Holds at most one loaded instance per handle
#[derive(Default)]
pub struct AssetCache {
    loaded: HashMap<AssetHandle, AssetSlot>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached instance, loading it on first access.
    ///
    /// Every failure (unknown handle, no loader, unreadable bytes) is logged
    /// and reported as `None`; failed loads are not cached.
    pub fn get(
        &mut self,
        handle: AssetHandle,
        registry: &AssetRegistry,
        loaders: &LoaderTable,
        storage: &AssetStorage,
    ) -> Option<AssetSlot> {
        if let Some(slot) = self.loaded.get(&handle) {
            return Some(Arc::clone(slot));
        }

        let Some(meta) = registry.get(handle) else {
            log::error!("Asset {} is not in the registry", handle);
            return None;
        };
        if !loaders.has_loader(meta.kind) {
            log::warn!("No loader registered for {} ({})", meta.kind, meta.source_path);
            return None;
        }

        let ctx = LoadContext::new(meta, registry.root(), storage);
        match loaders.load(&ctx) {
            Ok(value) => {
                log::debug!("Loaded {} ({})", meta.source_path, handle);
                let slot = Arc::new(RwLock::new(LoadedAsset {
                    handle,
                    kind: meta.kind,
                    generation: 0,
                    value,
                }));
                self.loaded.insert(handle, Arc::clone(&slot));
                Some(slot)
            }
            Err(e) => {
                log::error!("Failed to load {} ({}): {}", meta.source_path, handle, e);
                None
            }
        }
    }

    /// Refresh an already-loaded asset in place.
    ///
    /// Returns `None` if the asset was never loaded. On failure the previous
    /// contents stay in place and the same slot is returned.
    pub fn reload(
        &self,
        handle: AssetHandle,
        registry: &AssetRegistry,
        loaders: &LoaderTable,
        storage: &AssetStorage,
    ) -> Option<AssetSlot> {
        let Some(slot) = self.loaded.get(&handle) else {
            log::debug!("Skipping reload of {}: not loaded", handle);
            return None;
        };
        let Some(meta) = registry.get(handle) else {
            log::error!("Cannot reload {}: not in the registry", handle);
            return Some(Arc::clone(slot));
        };

        let ctx = LoadContext::new(meta, registry.root(), storage);
        let mut guard = slot.write();
        let loaded = &mut *guard;
        match loaders.reload(&ctx, loaded.value.as_mut()) {
            Ok(true) => {
                loaded.generation += 1;
                log::info!("Reloaded {} ({})", meta.source_path, handle);
            }
            Ok(false) => log::debug!("{} has no reloader", meta.kind),
            Err(e) => log::error!(
                "Reload of {} failed, keeping previous contents: {}",
                meta.source_path,
                e
            ),
        }
        drop(guard);
        Some(Arc::clone(slot))
    }

    /// The cached slot, without loading
    pub fn peek(&self, handle: AssetHandle) -> Option<AssetSlot> {
        self.loaded.get(&handle).cloned()
    }

    pub fn contains(&self, handle: AssetHandle) -> bool {
        self.loaded.contains_key(&handle)
    }

    /// Drop the cached instance; outstanding [`AssetRef`]s go dead
    pub fn evict(&mut self, handle: AssetHandle) -> bool {
        self.loaded.remove(&handle).is_some()
    }

    pub fn clear(&mut self) {
        self.loaded.clear();
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

impl fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetCache")
            .field("loaded", &self.loaded.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::TextDocument;
    use crate::types::AssetMetadata;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        dir: PathBuf,
        registry: AssetRegistry,
        loads: Arc<AtomicUsize>,
        loaders: LoaderTable,
        storage: AssetStorage,
        cache: AssetCache,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("lumen_cache_{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(dir.join("cache")).unwrap();

            let mut registry = AssetRegistry::new(&dir, "assets", "cache");
            for (handle, kind, source) in [
                (1, AssetKind::Material, "assets/wood.mat"),
                (2, AssetKind::Scene, "assets/level.sc"),
                (3, AssetKind::Folder, "assets/ui"),
            ] {
                let cache = if kind == AssetKind::Folder {
                    String::new()
                } else {
                    format!("cache/{}", handle)
                };
                registry
                    .insert(AssetMetadata::new(AssetHandle::from_raw(handle), kind, source, cache))
                    .unwrap();
            }
            fs::write(dir.join("cache/1"), "albedo = oak").unwrap();
            fs::write(dir.join("cache/2"), "entities = []").unwrap();

            let loads = Arc::new(AtomicUsize::new(0));
            let mut loaders = LoaderTable::new();
            let counter = Arc::clone(&loads);
            loaders.register_swapping(AssetKind::Material, move |ctx: &LoadContext<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
                TextDocument::load(ctx)
            });
            loaders.register(AssetKind::Scene, TextDocument::load);

            Self {
                dir,
                registry,
                loads,
                loaders,
                storage: AssetStorage::Loose,
                cache: AssetCache::new(),
            }
        }

        fn get(&mut self, raw: u64) -> Option<AssetSlot> {
            self.cache
                .get(AssetHandle::from_raw(raw), &self.registry, &self.loaders, &self.storage)
        }

        fn reload(&self, raw: u64) -> Option<AssetSlot> {
            self.cache
                .reload(AssetHandle::from_raw(raw), &self.registry, &self.loaders, &self.storage)
        }

        fn text(slot: &AssetSlot) -> String {
            slot.read().downcast_ref::<TextDocument>().unwrap().text.clone()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            fs::remove_dir_all(&self.dir).ok();
        }
    }

    #[test]
    fn test_loads_at_most_once() {
        let mut fx = Fixture::new();
        let first = fx.get(1).unwrap();
        let second = fx.get(1).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fx.loads.load(Ordering::SeqCst), 1);
        assert_eq!(Fixture::text(&first), "albedo = oak");
        assert_eq!(fx.cache.len(), 1);
    }

    #[test]
    fn test_unknown_handle_is_none() {
        let mut fx = Fixture::new();
        assert!(fx.get(99).is_none());
        assert!(fx.cache.is_empty());
    }

    #[test]
    fn test_missing_loader_is_none() {
        let mut fx = Fixture::new();
        assert!(fx.get(3).is_none());
        assert!(!fx.cache.contains(AssetHandle::from_raw(3)));
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let mut fx = Fixture::new();
        fs::remove_file(fx.dir.join("cache/2")).unwrap();
        assert!(fx.get(2).is_none());

        fs::write(fx.dir.join("cache/2"), "entities = [1]").unwrap();
        let slot = fx.get(2).unwrap();
        assert_eq!(Fixture::text(&slot), "entities = [1]");
    }

    #[test]
    fn test_reload_swaps_in_place() {
        let mut fx = Fixture::new();
        let slot = fx.get(1).unwrap();
        let reference = AssetRef::<TextDocument>::new(AssetHandle::from_raw(1), &slot);

        fs::write(fx.dir.join("cache/1"), "albedo = walnut").unwrap();
        let reloaded = fx.reload(1).unwrap();
        assert!(Arc::ptr_eq(&slot, &reloaded));
        assert_eq!(reference.with(|doc| doc.text.clone()).unwrap(), "albedo = walnut");
        assert_eq!(reference.generation(), Some(1));
        assert_eq!(fx.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reload_never_loaded_is_none() {
        let fx = Fixture::new();
        assert!(fx.reload(1).is_none());
        assert_eq!(fx.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reload_without_reloader_is_noop() {
        let mut fx = Fixture::new();
        let slot = fx.get(2).unwrap();
        fs::write(fx.dir.join("cache/2"), "entities = [7]").unwrap();
        fx.reload(2).unwrap();
        assert_eq!(Fixture::text(&slot), "entities = []");
        assert_eq!(slot.read().generation(), 0);
    }

    #[test]
    fn test_failed_reload_keeps_contents() {
        let mut fx = Fixture::new();
        let slot = fx.get(1).unwrap();
        fs::remove_file(fx.dir.join("cache/1")).unwrap();
        let same = fx.reload(1).unwrap();
        assert!(Arc::ptr_eq(&slot, &same));
        assert_eq!(Fixture::text(&slot), "albedo = oak");
        assert_eq!(slot.read().generation(), 0);
    }

    #[test]
    fn test_evict_kills_references() {
        let mut fx = Fixture::new();
        let slot = fx.get(1).unwrap();
        let reference = AssetRef::<TextDocument>::new(AssetHandle::from_raw(1), &slot);
        drop(slot);

        assert!(fx.cache.evict(AssetHandle::from_raw(1)));
        assert!(!reference.is_alive());
        assert!(reference.with(|doc| doc.text.len()).is_none());

        fx.get(1).unwrap();
        assert_eq!(fx.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_wrong_type_reference_reads_none() {
        let mut fx = Fixture::new();
        let slot = fx.get(1).unwrap();
        let wrong = AssetRef::<u32>::new(AssetHandle::from_raw(1), &slot);
        assert!(wrong.with(|v| *v).is_none());
        assert!(slot.read().is::<TextDocument>());
        assert_eq!(slot.read().kind(), AssetKind::Material);
    }
}
