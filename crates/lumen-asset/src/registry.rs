//! Asset registry: handle to metadata, with a reverse source-path index

use crate::codec::{self, CURRENT_SCHEMA_VERSION};
use crate::cook::Cooker;
use crate::kinds::KindTable;
use crate::types::{normalize_path, normalize_path_str, AssetKind, AssetMetadata};
use lumen_core::{AssetHandle, ContentHash, LumenError, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of checking one record against the files on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    Ok,
    StaleHash,
    MissingCache,
    MissingSidecar,
}

impl VerifyStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, VerifyStatus::Ok)
    }
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VerifyStatus::Ok => "ok",
            VerifyStatus::StaleHash => "stale",
            VerifyStatus::MissingCache => "missing cache",
            VerifyStatus::MissingSidecar => "missing sidecar",
        };
        f.write_str(label)
    }
}

/// What a [`AssetRegistry::scan`] did
#[derive(Debug, Default)]
pub struct ScanReport {
    /// New assets that received a sidecar and handle
    pub created: Vec<AssetHandle>,
    /// Existing assets cooked again because they were stale or uncooked
    pub recooked: Vec<AssetHandle>,
    /// Legacy sidecars rewritten at the current schema version
    pub migrated: Vec<AssetHandle>,
    /// Fresh handles issued for sidecars whose handle belonged to another path
    pub reissued: Vec<AssetHandle>,
    /// Entries whose source moved together with its sidecar
    pub moved: Vec<AssetHandle>,
    /// Entries dropped because their source disappeared
    pub removed: Vec<AssetHandle>,
    pub unchanged: usize,
    /// Source paths skipped because their sidecar could not be decoded
    pub rejected: Vec<String>,
    /// Source paths whose cook step failed
    pub failed: Vec<String>,
}

impl ScanReport {
    /// Whether the scan touched anything on disk
    pub fn has_changes(&self) -> bool {
        !(self.created.is_empty()
            && self.recooked.is_empty()
            && self.migrated.is_empty()
            && self.reissued.is_empty()
            && self.moved.is_empty()
            && self.removed.is_empty())
    }
}

enum Origin {
    Sidecar,
    Restored,
    Created,
}

/// In-memory index of every known asset
#[derive(Debug)]
pub struct AssetRegistry {
    root: PathBuf,
    assets_dir: String,
    cache_dir: String,
    kinds: KindTable,
    entries: HashMap<AssetHandle, AssetMetadata>,
    by_source: HashMap<String, AssetHandle>,
    /// Handles that were removed and must never be issued again
    retired: HashSet<AssetHandle>,
}

impl AssetRegistry {
    /// Create an empty registry for a project rooted at `root`.
    ///
    /// `assets_dir` and `cache_dir` are relative to the root.
    pub fn new(root: impl Into<PathBuf>, assets_dir: &str, cache_dir: &str) -> Self {
        Self {
            root: root.into(),
            assets_dir: normalize_path_str(assets_dir),
            cache_dir: normalize_path_str(cache_dir),
            kinds: KindTable::default(),
            entries: HashMap::new(),
            by_source: HashMap::new(),
            retired: HashSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn assets_path(&self) -> PathBuf {
        self.root.join(&self.assets_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.root.join(&self.cache_dir)
    }

    pub fn kinds(&self) -> &KindTable {
        &self.kinds
    }

    pub fn kinds_mut(&mut self) -> &mut KindTable {
        &mut self.kinds
    }

    pub fn get(&self, handle: AssetHandle) -> Option<&AssetMetadata> {
        self.entries.get(&handle)
    }

    pub fn contains(&self, handle: AssetHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Look up a handle by project-relative source path
    pub fn handle_for_source(&self, source_path: &str) -> Option<AssetHandle> {
        self.by_source
            .get(&normalize_path_str(source_path))
            .copied()
    }

    /// Look up a handle by filesystem path, absolute or relative to the root
    pub fn handle_for_path(&self, path: &Path) -> Option<AssetHandle> {
        self.by_source.get(&self.relative_path(path)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetMetadata> {
        self.entries.values()
    }

    /// All records ordered by handle
    pub fn sorted(&self) -> Vec<&AssetMetadata> {
        let mut records: Vec<_> = self.entries.values().collect();
        records.sort_by_key(|m| m.handle);
        records
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_retired(&self, handle: AssetHandle) -> bool {
        self.retired.contains(&handle)
    }

    /// Copy of the reverse index, for handing to another thread
    pub fn source_index(&self) -> HashMap<String, AssetHandle> {
        self.by_source.clone()
    }

    /// Issue a handle no live or removed entry has used
    pub fn allocate_handle(&self) -> AssetHandle {
        loop {
            let handle = AssetHandle::generate();
            if !self.entries.contains_key(&handle) && !self.retired.contains(&handle) {
                return handle;
            }
        }
    }

    /// Register a record. Fails if its source path or handle already belongs to
    /// a different entry, or if the handle was retired.
    pub fn insert(&mut self, mut meta: AssetMetadata) -> Result<()> {
        let path = normalize_path_str(&meta.source_path);
        if let Some(&existing) = self.by_source.get(&path) {
            if existing != meta.handle {
                return Err(LumenError::DuplicateSourcePath { path, existing });
            }
        }
        if let Some(current) = self.entries.get(&meta.handle) {
            if current.source_path != path {
                return Err(LumenError::DuplicateHandle {
                    handle: meta.handle,
                    path: current.source_path.clone(),
                });
            }
        }
        if self.retired.contains(&meta.handle) {
            return Err(LumenError::DuplicateHandle {
                handle: meta.handle,
                path: "(removed asset)".to_string(),
            });
        }

        meta.source_path = path.clone();
        self.by_source.insert(path, meta.handle);
        self.entries.insert(meta.handle, meta);
        Ok(())
    }

    /// Drop an entry and retire its handle
    pub fn remove(&mut self, handle: AssetHandle) -> Option<AssetMetadata> {
        let meta = self.forget(handle)?;
        self.retired.insert(handle);
        Some(meta)
    }

    /// Drop an entry but leave its handle free for the same sidecar
    fn forget(&mut self, handle: AssetHandle) -> Option<AssetMetadata> {
        let meta = self.entries.remove(&handle)?;
        if self.by_source.get(&meta.source_path) == Some(&handle) {
            self.by_source.remove(&meta.source_path);
        }
        Some(meta)
    }

    /// Check a record against its sidecar, source and cooked file
    pub fn verify(&self, meta: &AssetMetadata) -> VerifyStatus {
        if !self.sidecar_for(meta).is_file() {
            return VerifyStatus::MissingSidecar;
        }
        self.verify_cooked(meta)
    }

    fn verify_cooked(&self, meta: &AssetMetadata) -> VerifyStatus {
        let source = self.root.join(&meta.source_path);
        match ContentHash::from_file(&source) {
            Ok(hash) if hash == meta.source_hash => {}
            Ok(_) => return VerifyStatus::StaleHash,
            Err(e) => {
                log::debug!("Cannot hash {}: {}", source.display(), e);
                return VerifyStatus::StaleHash;
            }
        }
        if meta.kind.has_cache()
            && (meta.cache_path.is_empty() || !self.root.join(&meta.cache_path).is_file())
        {
            return VerifyStatus::MissingCache;
        }
        VerifyStatus::Ok
    }

    /// Sidecar location for a record
    pub fn sidecar_for(&self, meta: &AssetMetadata) -> PathBuf {
        codec::sidecar_path(&self.root.join(&meta.source_path))
    }

    /// Restore entries from an aggregate registry file.
    ///
    /// Returns `Ok(false)` when the file does not exist yet (first run).
    /// Records that fail to decode or conflict are logged and skipped.
    pub fn load(&mut self, path: &Path) -> Result<bool> {
        if !path.exists() {
            log::info!("No registry at {}, starting empty", path.display());
            return Ok(false);
        }
        let text = fs::read_to_string(path)?;
        let mut loaded = 0;
        for record in codec::decode_registry(&text)? {
            match record.and_then(|meta| self.insert(meta)) {
                Ok(()) => loaded += 1,
                Err(e) => log::warn!("Skipping registry record: {}", e),
            }
        }
        log::info!("Loaded {} assets from {}", loaded, path.display());
        Ok(true)
    }

    /// Write every entry to one aggregate registry file
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = codec::encode_registry(self.sorted())?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, text)?;
        log::debug!("Saved {} assets to {}", self.len(), path.display());
        Ok(())
    }

    /// Walk the assets directory, creating or refreshing a sidecar for every
    /// file and folder, cooking what is stale, and dropping entries whose
    /// source is gone.
    pub fn scan(&mut self, cooker: &dyn Cooker) -> Result<ScanReport> {
        let assets = self.assets_path();
        fs::create_dir_all(&assets)?;
        fs::create_dir_all(self.cache_path())?;

        let mut report = ScanReport::default();
        let mut seen = HashSet::new();
        self.scan_directory(&assets, cooker, &mut report, &mut seen)?;

        let mut gone: Vec<AssetHandle> = self
            .entries
            .keys()
            .filter(|h| !seen.contains(*h))
            .copied()
            .collect();
        gone.sort();
        for handle in gone {
            if let Some(meta) = self.remove(handle) {
                self.discard_files(&meta);
                report.removed.push(handle);
            }
        }

        log::info!(
            "Scan finished: {} created, {} recooked, {} migrated, {} moved, {} removed, {} unchanged",
            report.created.len(),
            report.recooked.len(),
            report.migrated.len(),
            report.moved.len(),
            report.removed.len(),
            report.unchanged
        );
        Ok(report)
    }

    fn scan_directory(
        &mut self,
        dir: &Path,
        cooker: &dyn Cooker,
        report: &mut ScanReport,
        seen: &mut HashSet<AssetHandle>,
    ) -> Result<()> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            paths.push(entry?.path());
        }
        paths.sort();

        for path in paths {
            if codec::is_sidecar(&path) {
                continue;
            }
            self.scan_path(&path, cooker, report, seen)?;
            if path.is_dir() {
                self.scan_directory(&path, cooker, report, seen)?;
            }
        }
        Ok(())
    }

    fn scan_path(
        &mut self,
        path: &Path,
        cooker: &dyn Cooker,
        report: &mut ScanReport,
        seen: &mut HashSet<AssetHandle>,
    ) -> Result<()> {
        let rel = self.relative_path(path);
        let sidecar = codec::sidecar_path(path);

        let (mut meta, origin) = if sidecar.exists() {
            match codec::read_sidecar(&sidecar) {
                Ok(meta) => (meta, Origin::Sidecar),
                Err(e) => {
                    log::warn!("Skipping {}: {}", rel, e);
                    // Forget any earlier record without touching its files or
                    // retiring its handle, so a fixed sidecar keeps it
                    if let Some(handle) = self.by_source.get(&rel).copied() {
                        self.forget(handle);
                    }
                    report.rejected.push(rel);
                    return Ok(());
                }
            }
        } else if let Some(existing) = self
            .by_source
            .get(&rel)
            .and_then(|h| self.entries.get(h))
        {
            log::info!("Restoring sidecar for {}", rel);
            (existing.clone(), Origin::Restored)
        } else {
            let kind = self.kinds.classify(path);
            let handle = self.allocate_handle();
            let meta = AssetMetadata::new(handle, kind, rel.clone(), self.cache_path_for(kind, handle));
            log::info!("New {} asset {} ({})", kind, rel, handle);
            report.created.push(handle);
            (meta, Origin::Created)
        };
        let mut dirty = !matches!(origin, Origin::Sidecar);

        if meta.schema_version != CURRENT_SCHEMA_VERSION {
            log::info!("Migrating sidecar for {}", rel);
            meta.schema_version = CURRENT_SCHEMA_VERSION;
            report.migrated.push(meta.handle);
            dirty = true;
        }
        if meta.source_path != rel {
            meta.source_path = rel.clone();
            dirty = true;
        }
        let moved_from = self
            .entries
            .get(&meta.handle)
            .filter(|owner| owner.source_path != rel)
            .map(|owner| owner.source_path.clone());
        if !self.can_own(meta.handle, &rel) {
            let handle = self.allocate_handle();
            log::warn!(
                "Handle {} of {} already belongs to another asset, issuing {}",
                meta.handle,
                rel,
                handle
            );
            meta.handle = handle;
            meta.cache_path = self.cache_path_for(meta.kind, handle);
            report.reissued.push(handle);
            dirty = true;
        } else if let Some(from) = moved_from {
            log::info!("{} moved from {} ({})", rel, from, meta.handle);
            report.moved.push(meta.handle);
            dirty = true;
        }
        if meta.kind.has_cache() && meta.cache_path.is_empty() {
            meta.cache_path = self.cache_path_for(meta.kind, meta.handle);
            dirty = true;
        }

        match self.verify_cooked(&meta) {
            VerifyStatus::Ok => {
                if !dirty {
                    report.unchanged += 1;
                }
            }
            _ => match self.cook(&meta, cooker) {
                Ok(hash) => {
                    meta.source_hash = hash;
                    if !matches!(origin, Origin::Created) {
                        report.recooked.push(meta.handle);
                    }
                    dirty = true;
                }
                Err(e) => {
                    log::error!("Failed to cook {}: {}", rel, e);
                    report.failed.push(rel.clone());
                }
            },
        }

        if dirty {
            codec::write_sidecar(&sidecar, &meta)?;
        }
        seen.insert(meta.handle);
        self.insert_replacing(meta);
        Ok(())
    }

    /// Re-check one entry against its sidecar and source.
    ///
    /// Name and config edited in the sidecar are taken over; a config change
    /// or a stale source is cooked again. The sidecar is only written when
    /// its contents differ from the record. Returns whether the record or
    /// its cooked file changed.
    pub fn refresh(&mut self, handle: AssetHandle, cooker: &dyn Cooker) -> Result<bool> {
        let current = self
            .entries
            .get(&handle)
            .cloned()
            .ok_or(LumenError::AssetNotFound(handle))?;
        let sidecar = self.sidecar_for(&current);

        let on_disk = if sidecar.is_file() {
            let found = codec::read_sidecar(&sidecar)?;
            if found.handle != handle {
                return Err(LumenError::SidecarError(format!(
                    "{} names {} instead of {}",
                    sidecar.display(),
                    found.handle,
                    handle
                )));
            }
            Some(found)
        } else {
            None
        };

        let mut meta = current.clone();
        if let Some(found) = &on_disk {
            meta.name = found.name.clone();
            meta.config = found.config;
        }
        let config_changed = meta.config != current.config;
        let status = self.verify_cooked(&meta);
        let recooked = config_changed || !status.is_ok();
        if recooked {
            meta.source_hash = self.cook(&meta, cooker)?;
            if config_changed {
                log::info!("Recooked {} (config changed)", meta.source_path);
            } else {
                log::info!("Recooked {} ({})", meta.source_path, status);
            }
        }
        meta.schema_version = CURRENT_SCHEMA_VERSION;

        if on_disk.as_ref() != Some(&meta) {
            codec::write_sidecar(&sidecar, &meta)?;
        }
        let changed = recooked || meta != current;
        self.entries.insert(handle, meta);
        Ok(changed)
    }

    /// Whether `rel` may keep `handle`. A handle whose current owner no
    /// longer exists on disk follows the file to its new path.
    fn can_own(&self, handle: AssetHandle, rel: &str) -> bool {
        handle.is_valid()
            && !self.retired.contains(&handle)
            && self.entries.get(&handle).map_or(true, |owner| {
                owner.source_path == rel || !self.root.join(&owner.source_path).exists()
            })
    }

    /// Insert a scanned record, displacing whatever held its handle or path
    fn insert_replacing(&mut self, meta: AssetMetadata) {
        if let Some(old) = self.entries.remove(&meta.handle) {
            if self.by_source.get(&old.source_path) == Some(&meta.handle) {
                self.by_source.remove(&old.source_path);
            }
        }
        if let Some(previous) = self.by_source.get(&meta.source_path).copied() {
            if previous != meta.handle {
                self.remove(previous);
            }
        }
        self.by_source.insert(meta.source_path.clone(), meta.handle);
        self.entries.insert(meta.handle, meta);
    }

    /// Hash the source and write its cooked form. Returns the source hash.
    fn cook(&self, meta: &AssetMetadata, cooker: &dyn Cooker) -> Result<ContentHash> {
        let source = self.root.join(&meta.source_path);
        let hash = ContentHash::from_file(&source)?;
        if !meta.kind.has_cache() {
            return Ok(hash);
        }

        let destination = self.root.join(&meta.cache_path);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        if meta.kind.requires_cook() {
            log::info!("Cooking {} with {} cooker", meta.source_path, cooker.name());
            cooker.cook(meta, &source, &destination)?;
        } else {
            fs::copy(&source, &destination)?;
        }
        Ok(hash)
    }

    /// Remove the sidecar and cooked file left behind by a deleted source
    fn discard_files(&self, meta: &AssetMetadata) {
        log::info!("Removing {} ({})", meta.source_path, meta.handle);
        let sidecar = self.sidecar_for(meta);
        if sidecar.is_file() {
            fs::remove_file(&sidecar).ok();
        }
        if !meta.cache_path.is_empty() {
            let cached = self.root.join(&meta.cache_path);
            if cached.is_file() {
                fs::remove_file(&cached).ok();
            }
        }
    }

    fn cache_path_for(&self, kind: AssetKind, handle: AssetHandle) -> String {
        if kind.has_cache() {
            format!("{}/{}", self.cache_dir, handle.file_name())
        } else {
            String::new()
        }
    }

    fn relative_path(&self, path: &Path) -> String {
        normalize_path(path.strip_prefix(&self.root).unwrap_or(path))
    }
}
