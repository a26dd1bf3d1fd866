//! Project configuration
//!
//! Loaded with two layers of precedence (highest wins):
//! 1. Environment variables: `LUMEN_ASSETS_DIR`, `LUMEN_CACHE_DIR`,
//!    `LUMEN_REGISTRY`, `LUMEN_PACKAGE`, `LUMEN_COMPILER`
//! 2. Project file: `<root>/lumen.toml`, `[project]` table

use crate::cook::{CommandCooker, CopyCooker, Cooker};
use lumen_core::{LumenError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the project root
pub const CONFIG_FILE_NAME: &str = "lumen.toml";

/// The `[project]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_registry_file")]
    pub registry_file: String,
    #[serde(default)]
    pub package_file: Option<String>,
    #[serde(default)]
    pub compiler: Option<String>,
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            cache_dir: default_cache_dir(),
            registry_file: default_registry_file(),
            package_file: None,
            compiler: None,
            watch_debounce_ms: default_watch_debounce_ms(),
        }
    }
}

fn default_assets_dir() -> String {
    "assets".to_string()
}
fn default_cache_dir() -> String {
    "cache".to_string()
}
fn default_registry_file() -> String {
    "AssetRegistry.toml".to_string()
}
fn default_watch_debounce_ms() -> u64 {
    250
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfigFile {
    #[serde(default)]
    pub project: ProjectSection,
}

/// Resolved configuration for one project root
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub project: ProjectSection,
}

impl ProjectConfig {
    /// Defaults for `root`, ignoring any config file or environment
    pub fn with_defaults(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            project: ProjectSection::default(),
        }
    }

    /// Load `<root>/lumen.toml` (if present) and apply environment overrides
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let path = root.join(CONFIG_FILE_NAME);
        let mut file = if path.exists() {
            Self::load_file(&path)?
        } else {
            ProjectConfigFile::default()
        };
        Self::apply_overrides(&mut file, |key| std::env::var(key).ok());
        Ok(Self {
            root,
            project: file.project,
        })
    }

    /// Load a specific file only, without environment overrides
    pub fn load_from_file(root: impl Into<PathBuf>, path: &Path) -> Result<Self> {
        let file = Self::load_file(path)?;
        Ok(Self {
            root: root.into(),
            project: file.project,
        })
    }

    pub fn assets_path(&self) -> PathBuf {
        self.root.join(&self.project.assets_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.root.join(&self.project.cache_dir)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join(&self.project.registry_file)
    }

    pub fn package_path(&self) -> Option<PathBuf> {
        self.project.package_file.as_ref().map(|p| self.root.join(p))
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.project.watch_debounce_ms)
    }

    /// The cook step this project uses: its external compiler if one is
    /// configured, otherwise a plain copy
    pub fn cooker(&self) -> Box<dyn Cooker> {
        match &self.project.compiler {
            Some(program) => {
                let program = PathBuf::from(program);
                let program = if program.components().count() > 1 && program.is_relative() {
                    self.root.join(program)
                } else {
                    program
                };
                Box::new(CommandCooker::new(program))
            }
            None => Box::new(CopyCooker),
        }
    }

    fn load_file(path: &Path) -> Result<ProjectConfigFile> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            LumenError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    fn apply_overrides(file: &mut ProjectConfigFile, lookup: impl Fn(&str) -> Option<String>) {
        let project = &mut file.project;
        if let Some(value) = lookup("LUMEN_ASSETS_DIR") {
            project.assets_dir = value;
        }
        if let Some(value) = lookup("LUMEN_CACHE_DIR") {
            project.cache_dir = value;
        }
        if let Some(value) = lookup("LUMEN_REGISTRY") {
            project.registry_file = value;
        }
        if let Some(value) = lookup("LUMEN_PACKAGE") {
            project.package_file = Some(value);
        }
        if let Some(value) = lookup("LUMEN_COMPILER") {
            project.compiler = Some(value);
        }
    }
}
