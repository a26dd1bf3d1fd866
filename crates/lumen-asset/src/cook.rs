//! Offline cook step: turning a source file into its cached, engine-ready form

use crate::types::AssetMetadata;
use lumen_core::{LumenError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Produces the cooked file for one asset.
///
/// Only kinds that need compiling go through a cooker; the registry copies
/// everything else itself.
pub trait Cooker: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &str;

    /// Write the cooked form of `source` to `destination`
    fn cook(&self, meta: &AssetMetadata, source: &Path, destination: &Path) -> Result<()>;
}

/// Cooks by copying the source bytes unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyCooker;

impl Cooker for CopyCooker {
    fn name(&self) -> &str {
        "copy"
    }

    fn cook(&self, _meta: &AssetMetadata, source: &Path, destination: &Path) -> Result<()> {
        fs::copy(source, destination)?;
        Ok(())
    }
}

/// Runs an external compiler as `<program> <source> <destination>`
#[derive(Debug, Clone)]
pub struct CommandCooker {
    program: PathBuf,
}

impl CommandCooker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Cooker for CommandCooker {
    fn name(&self) -> &str {
        "command"
    }

    fn cook(&self, meta: &AssetMetadata, source: &Path, destination: &Path) -> Result<()> {
        let failed = |reason: String| LumenError::CookFailed {
            path: meta.source_path.clone(),
            reason,
        };

        log::debug!(
            "Running {} {} {}",
            self.program.display(),
            source.display(),
            destination.display()
        );
        let output = Command::new(&self.program)
            .arg(source)
            .arg(destination)
            .output()
            .map_err(|e| failed(format!("could not run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        if !destination.exists() {
            return Err(failed(format!(
                "{} produced no output at {}",
                self.program.display(),
                destination.display()
            )));
        }
        Ok(())
    }
}
