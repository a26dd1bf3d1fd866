//! Filesystem watcher feeding the reload queue

use crate::codec::{self, SIDECAR_SUFFIX};
use crate::reload::ReloadQueue;
use crate::types::normalize_path;
use lumen_core::{AssetHandle, LumenError, Result};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// Watches a source tree and submits the handle of every changed asset.
///
/// Paths are resolved against a snapshot of the registry's reverse index
/// taken at start; files added later are picked up by the next scan. Editing
/// a sidecar reloads the asset it describes. Dropping the watcher stops it.
pub struct AssetWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    watched: PathBuf,
}

impl AssetWatcher {
    /// Start watching `watched` (recursively). `root` is the directory the
    /// index paths are relative to.
    pub fn start(
        root: &Path,
        watched: &Path,
        index: HashMap<String, AssetHandle>,
        queue: Arc<ReloadQueue>,
        debounce: Duration,
    ) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| LumenError::WatchError(format!("{}: {}", root.display(), e)))?;
        let watched = watched
            .canonicalize()
            .map_err(|e| LumenError::WatchError(format!("{}: {}", watched.display(), e)))?;

        let (tx, rx) = mpsc::channel::<DebounceEventResult>();
        let mut debouncer =
            new_debouncer(debounce, tx).map_err(|e| LumenError::WatchError(e.to_string()))?;
        debouncer
            .watcher()
            .watch(&watched, RecursiveMode::Recursive)
            .map_err(|e| LumenError::WatchError(e.to_string()))?;

        std::thread::spawn(move || {
            for result in rx {
                match result {
                    Ok(events) => {
                        for event in events {
                            if let Some(handle) = handle_for_event(&root, &index, &event.path) {
                                if queue.submit(handle) {
                                    log::debug!("Queued reload of {} ({})", handle, event.path.display());
                                }
                            }
                        }
                    }
                    Err(e) => log::error!("Watch error: {:?}", e),
                }
            }
        });

        log::info!("Watching {}", watched.display());
        Ok(Self {
            _debouncer: debouncer,
            watched,
        })
    }

    pub fn watched(&self) -> &Path {
        &self.watched
    }
}

/// Resolve a changed path to the handle of the asset it belongs to
fn handle_for_event(
    root: &Path,
    index: &HashMap<String, AssetHandle>,
    path: &Path,
) -> Option<AssetHandle> {
    let source = if codec::is_sidecar(path) {
        let text = path.to_str()?;
        PathBuf::from(text.strip_suffix(SIDECAR_SUFFIX)?)
    } else {
        path.to_path_buf()
    };
    let relative = source.strip_prefix(root).ok()?;
    index.get(&normalize_path(relative)).copied()
}
