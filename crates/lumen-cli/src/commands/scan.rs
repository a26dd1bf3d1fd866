//! `lumen scan`

use anyhow::{Context, Result};
use lumen_asset::{AssetSystem, LoaderTable, ProjectConfig};

pub fn run(root: &str) -> Result<()> {
    let config = ProjectConfig::load(root).context("Failed to load project config")?;
    let (system, report) = AssetSystem::editor(&config, LoaderTable::with_builtin())
        .context("Failed to scan assets")?;

    println!("Scanned {}", config.assets_path().display());
    println!("  {} asset(s) registered", system.registry().len());
    println!("  created:   {}", report.created.len());
    println!("  recooked:  {}", report.recooked.len());
    println!("  migrated:  {}", report.migrated.len());
    println!("  moved:     {}", report.moved.len());
    println!("  reissued:  {}", report.reissued.len());
    println!("  removed:   {}", report.removed.len());
    println!("  unchanged: {}", report.unchanged);

    for path in &report.rejected {
        println!("  rejected sidecar: {}", path);
    }
    for path in &report.failed {
        println!("  cook failed: {}", path);
    }

    if !report.failed.is_empty() {
        anyhow::bail!("{} asset(s) failed to cook", report.failed.len());
    }
    Ok(())
}
