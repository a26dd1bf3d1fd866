//! The asset system: one context object owning registry, loaders, cache and
//! reload queue

use crate::cache::{AssetCache, AssetRef};
use crate::config::{ProjectConfig, ProjectSection};
use crate::cook::Cooker;
use crate::loader::{AssetStorage, LoaderTable};
use crate::registry::{AssetRegistry, ScanReport};
use crate::reload::ReloadQueue;
use crate::types::AssetMetadata;
use crate::watcher::AssetWatcher;
use lumen_core::{AssetHandle, LumenError, Result};
use lumen_pak::PakReader;
use std::any::{type_name, Any};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Entry point for everything that consumes assets.
///
/// Built once at startup and passed to whoever needs assets. The cache is
/// only touched from the thread that owns the system; other threads interact
/// through [`ReloadQueue`].
pub struct AssetSystem {
    registry: AssetRegistry,
    loaders: LoaderTable,
    cache: AssetCache,
    reload_queue: Arc<ReloadQueue>,
    storage: AssetStorage,
    /// Present in editor mode, where changed sources are recooked
    cooker: Option<Box<dyn Cooker>>,
    registry_file: PathBuf,
    debounce: Duration,
}

impl AssetSystem {
    /// Editor mode: load the registry, scan the source tree (cooking what is
    /// stale) and save the registry back.
    pub fn editor(config: &ProjectConfig, loaders: LoaderTable) -> Result<(Self, ScanReport)> {
        let mut registry = AssetRegistry::new(
            &config.root,
            &config.project.assets_dir,
            &config.project.cache_dir,
        );
        let registry_file = config.registry_path();
        if !registry.load(&registry_file)? {
            log::info!("First run, scanning {}", config.assets_path().display());
        }

        let cooker = config.cooker();
        let report = registry.scan(cooker.as_ref())?;
        registry.save(&registry_file)?;

        let system = Self {
            registry,
            loaders,
            cache: AssetCache::new(),
            reload_queue: Arc::new(ReloadQueue::new()),
            storage: AssetStorage::Loose,
            cooker: Some(cooker),
            registry_file,
            debounce: config.watch_debounce(),
        };
        Ok((system, report))
    }

    /// Runtime mode: load the registry without scanning or cooking, and open
    /// the package if one is configured.
    ///
    /// A corrupt package falls back to loose cache files when the cache
    /// directory exists; otherwise it is fatal.
    pub fn runtime(config: &ProjectConfig, loaders: LoaderTable) -> Result<Self> {
        let mut registry = AssetRegistry::new(
            &config.root,
            &config.project.assets_dir,
            &config.project.cache_dir,
        );
        let registry_file = config.registry_path();
        if !registry.load(&registry_file)? {
            log::warn!("No registry at {}, no assets available", registry_file.display());
        }

        let storage = match config.package_path() {
            Some(path) => match PakReader::open(&path) {
                Ok(reader) => {
                    log::info!("Opened package {} ({} assets)", path.display(), reader.len());
                    AssetStorage::Package(reader)
                }
                Err(e @ LumenError::CorruptPackage(_)) if config.cache_path().is_dir() => {
                    log::warn!("{}; falling back to loose cache files", e);
                    AssetStorage::Loose
                }
                Err(e) => return Err(e),
            },
            None => AssetStorage::Loose,
        };

        Ok(Self::from_parts(registry, loaders, storage).with_registry_file(registry_file))
    }

    /// Assemble a system from already-built pieces
    pub fn from_parts(registry: AssetRegistry, loaders: LoaderTable, storage: AssetStorage) -> Self {
        let registry_file = registry.root().join(ProjectSection::default().registry_file);
        Self {
            registry,
            loaders,
            cache: AssetCache::new(),
            reload_queue: Arc::new(ReloadQueue::new()),
            storage,
            cooker: None,
            registry_file,
            debounce: Duration::from_millis(ProjectSection::default().watch_debounce_ms),
        }
    }

    fn with_registry_file(mut self, path: PathBuf) -> Self {
        self.registry_file = path;
        self
    }

    /// Recook changed sources during [`update`](Self::update)
    pub fn with_cooker(mut self, cooker: Box<dyn Cooker>) -> Self {
        self.cooker = Some(cooker);
        self
    }

    /// Typed, non-owning reference to an asset, loading it on first use.
    ///
    /// `None` when the handle is unknown, the kind has no loader, the bytes
    /// cannot be loaded, or the asset is not a `T`. Callers substitute a
    /// default.
    pub fn get_asset<T: Any + Send + Sync>(&mut self, handle: AssetHandle) -> Option<AssetRef<T>> {
        let slot = self
            .cache
            .get(handle, &self.registry, &self.loaders, &self.storage)?;
        if !slot.read().is::<T>() {
            log::error!("Asset {} is not a {}", handle, type_name::<T>());
            return None;
        }
        Some(AssetRef::new(handle, &slot))
    }

    /// Load an asset into the cache without naming its type.
    /// Returns whether it is now resident.
    pub fn preload(&mut self, handle: AssetHandle) -> bool {
        self.cache
            .get(handle, &self.registry, &self.loaders, &self.storage)
            .is_some()
    }

    pub fn metadata(&self, handle: AssetHandle) -> Option<&AssetMetadata> {
        self.registry.get(handle)
    }

    /// Request a reload on the next [`update`](Self::update)
    pub fn submit_reload(&self, handle: AssetHandle) -> bool {
        self.reload_queue.submit(handle)
    }

    /// Shared queue for producers on other threads
    pub fn reload_queue(&self) -> Arc<ReloadQueue> {
        Arc::clone(&self.reload_queue)
    }

    pub fn is_package_loaded(&self) -> bool {
        self.storage.is_package()
    }

    /// Raw cooked bytes from the open package
    pub fn retrieve_from_package(&self, handle: AssetHandle) -> Option<Vec<u8>> {
        let reader = self.storage.package()?;
        match reader.extract(handle) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }

    /// Per-tick work: drain the reload queue, recook stale sources (editor
    /// mode) and reload each loaded asset in place. Returns how many handles
    /// were drained.
    ///
    /// In editor mode a handle whose record and cooked file are already up
    /// to date is not reloaded, so the sidecar rewrite that follows a recook
    /// does not reload the asset a second time.
    pub fn update(&mut self) -> usize {
        let queue = Arc::clone(&self.reload_queue);
        let mut registry_changed = false;
        let drained = queue.drain_and_process(|handle| {
            let reload = match &self.cooker {
                Some(cooker) => match self.registry.refresh(handle, cooker.as_ref()) {
                    Ok(changed) => {
                        registry_changed |= changed;
                        changed
                    }
                    Err(e) => {
                        log::error!("Could not refresh {}: {}", handle, e);
                        false
                    }
                },
                None => true,
            };
            if reload {
                self.cache
                    .reload(handle, &self.registry, &self.loaders, &self.storage);
            } else {
                log::debug!("{} is up to date", handle);
            }
        });

        if registry_changed {
            if let Err(e) = self.save_registry() {
                log::error!("Failed to save registry: {}", e);
            }
        }
        drained
    }

    pub fn save_registry(&self) -> Result<()> {
        self.registry.save(&self.registry_file)
    }

    /// Watch the source tree and feed changes into this system's reload queue
    pub fn watch(&self) -> Result<AssetWatcher> {
        AssetWatcher::start(
            self.registry.root(),
            &self.registry.assets_path(),
            self.registry.source_index(),
            self.reload_queue(),
            self.debounce,
        )
    }

    /// Rescan the source tree (editor mode only)
    pub fn rescan(&mut self) -> Result<ScanReport> {
        let cooker = self
            .cooker
            .as_ref()
            .ok_or_else(|| LumenError::ConfigError("rescan needs a cooker".to_string()))?;
        let report = self.registry.scan(cooker.as_ref())?;
        for handle in &report.removed {
            self.cache.evict(*handle);
        }
        for handle in report.recooked.iter().chain(&report.reissued) {
            self.reload_queue.submit(*handle);
        }
        self.save_registry()?;
        Ok(report)
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn loaders(&self) -> &LoaderTable {
        &self.loaders
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Drop every loaded asset, saving the registry first in editor mode
    pub fn shutdown(mut self) -> Result<()> {
        if self.cooker.is_some() {
            self.save_registry()?;
        }
        log::debug!("Releasing {} loaded assets", self.cache.len());
        self.cache.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{CookedBlob, TextDocument};
    use crate::codec;
    use crate::cook::CopyCooker;
    use crate::types::AssetKind;
    use lumen_pak::build_package;
    use std::fs;

    fn project() -> ProjectConfig {
        let dir = std::env::temp_dir().join(format!("lumen_system_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(dir.join("assets/materials")).unwrap();
        fs::write(dir.join("assets/materials/wood.mat"), "albedo = oak").unwrap();
        fs::write(dir.join("assets/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        fs::write(dir.join("assets/intro.sc"), "entities = []").unwrap();
        ProjectConfig::with_defaults(dir)
    }

    fn handle(system: &AssetSystem, path: &str) -> AssetHandle {
        system.registry().handle_for_source(path).unwrap()
    }

    #[test]
    fn test_editor_scans_and_saves() {
        let config = project();
        let (system, report) = AssetSystem::editor(&config, LoaderTable::with_builtin()).unwrap();
        assert_eq!(report.created.len(), 4);
        assert!(config.registry_path().is_file());
        assert!(!system.is_package_loaded());

        let wood = handle(&system, "assets/materials/wood.mat");
        assert_eq!(system.metadata(wood).unwrap().kind, AssetKind::Material);

        fs::remove_dir_all(&config.root).ok();
    }

    #[test]
    fn test_get_asset_is_cached() {
        let config = project();
        let (mut system, _) = AssetSystem::editor(&config, LoaderTable::with_builtin()).unwrap();
        let wood = handle(&system, "assets/materials/wood.mat");

        let first = system.get_asset::<TextDocument>(wood).unwrap();
        let second = system.get_asset::<TextDocument>(wood).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(first.with(|doc| doc.text.clone()).unwrap(), "albedo = oak");
        assert_eq!(system.cache().len(), 1);

        assert!(system.get_asset::<CookedBlob>(wood).is_none());
        assert!(system.get_asset::<TextDocument>(AssetHandle::from_raw(1)).is_none());
        let folder = handle(&system, "assets/materials");
        assert!(system.get_asset::<TextDocument>(folder).is_none());
        assert!(!system.preload(folder));

        let logo = handle(&system, "assets/logo.png");
        assert!(system.preload(logo));
        assert_eq!(system.cache().len(), 2);

        fs::remove_dir_all(&config.root).ok();
    }

    #[test]
    fn test_hot_reload_round() {
        let config = project();
        let (mut system, _) = AssetSystem::editor(&config, LoaderTable::with_builtin()).unwrap();
        let wood = handle(&system, "assets/materials/wood.mat");
        let material = system.get_asset::<TextDocument>(wood).unwrap();

        fs::write(config.root.join("assets/materials/wood.mat"), "albedo = walnut").unwrap();
        for _ in 0..5 {
            system.submit_reload(wood);
        }
        assert_eq!(system.update(), 1);
        assert_eq!(system.update(), 0);

        assert_eq!(material.with(|doc| doc.text.clone()).unwrap(), "albedo = walnut");
        assert_eq!(material.generation(), Some(1));
        assert!(system.registry().verify(system.metadata(wood).unwrap()).is_ok());

        // The rewritten sidecar changes nothing, so the asset stays as is
        system.submit_reload(wood);
        assert_eq!(system.update(), 1);
        assert_eq!(material.generation(), Some(1));

        fs::remove_dir_all(&config.root).ok();
    }

    #[test]
    fn test_sidecar_edit_is_applied_on_reload() {
        let config = project();
        let (mut system, _) = AssetSystem::editor(&config, LoaderTable::with_builtin()).unwrap();
        let logo = handle(&system, "assets/logo.png");
        let texture = system.get_asset::<CookedBlob>(logo).unwrap();
        assert!(!system.metadata(logo).unwrap().config.texture().mip_maps);

        let sidecar = system.registry().sidecar_for(system.metadata(logo).unwrap());
        let text = fs::read_to_string(&sidecar)
            .unwrap()
            .replace("mip_maps = false", "mip_maps = true");
        fs::write(&sidecar, text).unwrap();

        system.submit_reload(logo);
        assert_eq!(system.update(), 1);
        assert!(system.metadata(logo).unwrap().config.texture().mip_maps);
        assert_eq!(texture.generation(), Some(1));

        let saved = fs::read_to_string(config.registry_path()).unwrap();
        assert!(saved.contains("mip_maps = true"));

        // A later source change keeps the edited config
        fs::write(config.root.join("assets/logo.png"), [7, 7]).unwrap();
        system.submit_reload(logo);
        system.update();
        assert!(system.metadata(logo).unwrap().config.texture().mip_maps);
        assert!(codec::read_sidecar(&sidecar).unwrap().config.texture().mip_maps);

        fs::remove_dir_all(&config.root).ok();
    }

    #[test]
    fn test_reload_from_other_thread() {
        let config = project();
        let (mut system, _) = AssetSystem::editor(&config, LoaderTable::with_builtin()).unwrap();
        let logo = handle(&system, "assets/logo.png");
        let texture = system.get_asset::<CookedBlob>(logo).unwrap();

        fs::write(config.root.join("assets/logo.png"), [1, 2, 3]).unwrap();
        let queue = system.reload_queue();
        std::thread::spawn(move || {
            queue.submit(logo);
        })
        .join()
        .unwrap();

        assert_eq!(system.update(), 1);
        assert_eq!(texture.with(|blob| blob.bytes.clone()).unwrap(), vec![1, 2, 3]);

        fs::remove_dir_all(&config.root).ok();
    }

    #[test]
    fn test_runtime_from_package() {
        let mut config = project();
        AssetSystem::editor(&config, LoaderTable::with_builtin()).unwrap();
        let pak = config.root.join("game.pak");
        build_package(config.cache_path(), &pak).unwrap();
        fs::remove_dir_all(config.cache_path()).unwrap();
        config.project.package_file = Some("game.pak".to_string());

        let mut system = AssetSystem::runtime(&config, LoaderTable::with_builtin()).unwrap();
        assert!(system.is_package_loaded());

        let intro = handle(&system, "assets/intro.sc");
        let scene = system.get_asset::<TextDocument>(intro).unwrap();
        assert_eq!(scene.with(|doc| doc.text.clone()).unwrap(), "entities = []");
        assert_eq!(system.retrieve_from_package(intro).unwrap(), b"entities = []");
        assert!(system.retrieve_from_package(AssetHandle::from_raw(9999)).is_none());

        fs::remove_dir_all(&config.root).ok();
    }

    #[test]
    fn test_runtime_falls_back_on_corrupt_package() {
        let mut config = project();
        AssetSystem::editor(&config, LoaderTable::with_builtin()).unwrap();
        fs::write(config.root.join("game.pak"), [1, 2, 3]).unwrap();
        config.project.package_file = Some("game.pak".to_string());

        let mut system = AssetSystem::runtime(&config, LoaderTable::with_builtin()).unwrap();
        assert!(!system.is_package_loaded());
        assert!(system.retrieve_from_package(AssetHandle::from_raw(1)).is_none());
        let wood = handle(&system, "assets/materials/wood.mat");
        assert!(system.get_asset::<TextDocument>(wood).is_some());

        fs::remove_dir_all(config.cache_path()).unwrap();
        assert!(matches!(
            AssetSystem::runtime(&config, LoaderTable::with_builtin()),
            Err(LumenError::CorruptPackage(_))
        ));

        fs::remove_dir_all(&config.root).ok();
    }

    #[test]
    fn test_rescan_picks_up_new_files() {
        let config = project();
        let (mut system, _) = AssetSystem::editor(&config, LoaderTable::with_builtin()).unwrap();
        fs::write(config.root.join("assets/stone.mat"), "albedo = granite").unwrap();

        let report = system.rescan().unwrap();
        assert_eq!(report.created.len(), 1);
        let stone = handle(&system, "assets/stone.mat");
        assert!(system.get_asset::<TextDocument>(stone).is_some());

        let mut runtime = AssetSystem::runtime(&config, LoaderTable::with_builtin()).unwrap();
        assert!(runtime.metadata(stone).is_some());
        assert!(matches!(runtime.rescan(), Err(LumenError::ConfigError(_))));

        fs::remove_dir_all(&config.root).ok();
    }
}
