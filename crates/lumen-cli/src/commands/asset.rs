//! Registry query commands

use super::open_registry;
use anyhow::Result;
use clap::Subcommand;
use lumen_asset::{codec, AssetConfig, AssetKind, AssetMetadata, AssetRegistry};
use lumen_core::AssetHandle;
use std::path::Path;

#[derive(Subcommand)]
pub enum AssetCommands {
    /// List registered assets
    List {
        /// Filter by asset kind (texture, mesh, material, script, ...)
        #[arg(long)]
        kind: Option<String>,

        /// Output format (json or toml)
        #[arg(long, default_value = "toml")]
        format: String,
    },

    /// Show asset info
    Info {
        /// Asset handle or source path
        asset: String,
    },

    /// Check every record against its sidecar, source and cooked file
    Verify,
}

pub fn run(root: &str, cmd: AssetCommands) -> Result<()> {
    match cmd {
        AssetCommands::List { kind, format } => run_list(root, kind.as_deref(), &format),
        AssetCommands::Info { asset } => run_info(root, &asset),
        AssetCommands::Verify => run_verify(root),
    }
}

fn run_list(root: &str, kind: Option<&str>, format: &str) -> Result<()> {
    let (_, registry) = open_registry(root)?;

    let kind = match kind {
        Some(name) => match AssetKind::from_name(name) {
            Some(kind) => Some(kind),
            None => anyhow::bail!("Unknown asset kind: {}", name),
        },
        None => None,
    };
    let assets: Vec<&AssetMetadata> = registry
        .sorted()
        .into_iter()
        .filter(|meta| kind.map_or(true, |k| meta.kind == k))
        .collect();

    match format {
        "json" => {
            let items: Vec<_> = assets
                .iter()
                .map(|meta| {
                    serde_json::json!({
                        "handle": meta.handle.raw(),
                        "name": meta.name,
                        "kind": meta.kind.name(),
                        "source": meta.source_path,
                        "cache": meta.cache_path,
                        "hash": meta.source_hash.to_hex(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        "toml" => {
            if assets.is_empty() {
                println!("No assets found.");
            } else {
                println!("{} asset(s):\n", assets.len());
                for meta in &assets {
                    println!("  {} ({}) [{}]", meta.name, meta.kind, meta.handle);
                    println!("    source: {}", meta.source_path);
                }
            }
        }
        other => anyhow::bail!("Unknown format: {} (expected json or toml)", other),
    }

    Ok(())
}

fn run_info(root: &str, asset: &str) -> Result<()> {
    let (_, registry) = open_registry(root)?;

    let meta = match find_asset(&registry, asset) {
        Some(meta) => meta,
        None => anyhow::bail!("Asset '{}' not found in registry", asset),
    };

    println!("Asset: {}", meta.name);
    println!("  Handle: {}", meta.handle);
    println!("  Kind: {}", meta.kind);
    println!("  Source: {}", meta.source_path);
    if !meta.cache_path.is_empty() {
        println!("  Cache: {}", meta.cache_path);
    }
    println!("  Hash: {}", meta.source_hash);
    println!("  Schema: {:.2}", meta.schema_version);
    match meta.config {
        AssetConfig::Texture(texture) => {
            println!("  Usage: {:?}", texture.usage);
            println!("  Shape: {:?}", texture.shape);
            println!("  sRGB: {}", texture.srgb);
            println!("  Mip maps: {}", texture.mip_maps);
            println!("  Wrap: {:?}", texture.wrap);
            println!("  Filter: {:?}", texture.filter);
        }
        AssetConfig::Mesh(mesh) => println!("  Skinned: {}", mesh.skinned),
        AssetConfig::Empty => {}
    }
    println!("  Status: {}", registry.verify(meta));

    let sidecar = registry.sidecar_for(meta);
    println!("\n{}", sidecar.display());
    print!("{}", codec::encode(meta)?);

    Ok(())
}

fn run_verify(root: &str) -> Result<()> {
    let (_, registry) = open_registry(root)?;

    let mut problems = 0;
    for meta in registry.sorted() {
        let status = registry.verify(meta);
        if !status.is_ok() {
            problems += 1;
            println!("  {} [{}]: {}", meta.source_path, meta.handle, status);
        }
    }

    if problems > 0 {
        anyhow::bail!(
            "{} of {} asset(s) need a rescan",
            problems,
            registry.len()
        );
    }
    println!("All {} asset(s) are up to date.", registry.len());
    Ok(())
}

/// Look an asset up by handle first, then by source path
fn find_asset<'a>(registry: &'a AssetRegistry, key: &str) -> Option<&'a AssetMetadata> {
    if let Ok(handle) = key.parse::<AssetHandle>() {
        if let Some(meta) = registry.get(handle) {
            return Some(meta);
        }
    }
    registry
        .handle_for_path(Path::new(key))
        .and_then(|handle| registry.get(handle))
}
