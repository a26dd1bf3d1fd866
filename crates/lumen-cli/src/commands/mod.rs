//! CLI command implementations

pub mod asset;
pub mod pak;
pub mod scan;
pub mod watch;

use anyhow::{Context, Result};
use lumen_asset::{AssetRegistry, ProjectConfig};

/// Load the project config and its saved registry without scanning
pub(crate) fn open_registry(root: &str) -> Result<(ProjectConfig, AssetRegistry)> {
    let config = ProjectConfig::load(root).context("Failed to load project config")?;
    let mut registry = AssetRegistry::new(
        &config.root,
        &config.project.assets_dir,
        &config.project.cache_dir,
    );
    let path = config.registry_path();
    let found = registry
        .load(&path)
        .with_context(|| format!("Failed to load registry {}", path.display()))?;
    if !found {
        anyhow::bail!("No registry at {}; run `lumen scan` first", path.display());
    }
    Ok((config, registry))
}
