//! `lumen watch`: headless editor loop with hot reload

use anyhow::{Context, Result};
use lumen_asset::{AssetSystem, LoaderTable, ProjectConfig};
use std::time::Duration;

pub fn run(root: &str, tick_ms: u64) -> Result<()> {
    let config = ProjectConfig::load(root).context("Failed to load project config")?;
    let (mut system, report) = AssetSystem::editor(&config, LoaderTable::with_builtin())
        .context("Failed to scan assets")?;
    if report.has_changes() {
        log::info!(
            "Initial scan: {} created, {} recooked, {} removed",
            report.created.len(),
            report.recooked.len(),
            report.removed.len()
        );
    }

    // Keep every loadable asset resident so changes have something to reload
    let handles: Vec<_> = system.registry().sorted().iter().map(|m| m.handle).collect();
    let resident = handles.into_iter().filter(|&h| system.preload(h)).count();

    let _watcher = system.watch().context("Failed to start file watcher")?;
    println!(
        "Watching {} ({} asset(s) loaded). Press Ctrl+C to stop.",
        config.assets_path().display(),
        resident
    );

    let tick = Duration::from_millis(tick_ms.max(1));
    loop {
        std::thread::sleep(tick);
        let processed = system.update();
        if processed > 0 {
            println!("Processed {} reload(s)", processed);
        }
    }
}
