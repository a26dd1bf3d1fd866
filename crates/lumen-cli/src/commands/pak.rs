//! Package commands

use anyhow::{Context, Result};
use clap::Subcommand;
use lumen_asset::ProjectConfig;
use lumen_core::AssetHandle;
use lumen_pak::{build_package, PakReader};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum PakCommands {
    /// Build a package from the cooked cache directory
    Build {
        /// Directory of cooked assets (defaults to the project cache)
        #[arg(long)]
        input: Option<String>,

        /// Package file to write (defaults to the project's package_file)
        #[arg(long)]
        output: Option<String>,
    },

    /// List the entries of a package
    List {
        /// Path to the package
        file: String,

        /// Output format (json or toml)
        #[arg(long, default_value = "toml")]
        format: String,
    },

    /// Extract one asset's bytes from a package
    Extract {
        /// Path to the package
        file: String,

        /// Asset handle
        id: String,

        /// Where to write the bytes
        #[arg(long)]
        output: String,
    },
}

pub fn run(root: &str, cmd: PakCommands) -> Result<()> {
    match cmd {
        PakCommands::Build { input, output } => run_build(root, input, output),
        PakCommands::List { file, format } => run_list(&file, &format),
        PakCommands::Extract { file, id, output } => run_extract(&file, &id, &output),
    }
}

fn run_build(root: &str, input: Option<String>, output: Option<String>) -> Result<()> {
    let config = ProjectConfig::load(root).context("Failed to load project config")?;
    let input = input
        .map(PathBuf::from)
        .unwrap_or_else(|| config.cache_path());
    let output = match output.map(PathBuf::from).or_else(|| config.package_path()) {
        Some(path) => path,
        None => anyhow::bail!("No --output given and no package_file configured"),
    };

    let summary = build_package(&input, &output)
        .with_context(|| format!("Failed to build package from {}", input.display()))?;

    println!("Built {}", output.display());
    println!("  {} asset(s), {} payload byte(s)", summary.entries.len(), summary.payload_bytes);
    for path in &summary.skipped {
        println!("  skipped: {}", path.display());
    }
    Ok(())
}

fn run_list(file: &str, format: &str) -> Result<()> {
    let reader = PakReader::open(file).with_context(|| format!("Failed to open package {}", file))?;

    match format {
        "json" => {
            let items: Vec<_> = reader
                .entries()
                .iter()
                .map(|entry| {
                    serde_json::json!({
                        "id": entry.id.raw(),
                        "offset": entry.offset,
                        "size": entry.size,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        "toml" => {
            println!("{} entr(ies), {} payload byte(s):\n", reader.len(), reader.payload_len());
            for entry in reader.entries() {
                println!("  {} @ {} ({} bytes)", entry.id, entry.offset, entry.size);
            }
        }
        other => anyhow::bail!("Unknown format: {} (expected json or toml)", other),
    }

    Ok(())
}

fn run_extract(file: &str, id: &str, output: &str) -> Result<()> {
    let id: AssetHandle = id
        .parse()
        .with_context(|| format!("'{}' is not an asset handle", id))?;
    let reader = PakReader::open(file).with_context(|| format!("Failed to open package {}", file))?;
    let bytes = reader
        .extract(id)
        .with_context(|| format!("Failed to extract {} from {}", id, file))?;
    std::fs::write(output, &bytes).with_context(|| format!("Failed to write {}", output))?;

    println!("Extracted {} ({} bytes) to {}", id, bytes.len(), output);
    Ok(())
}
