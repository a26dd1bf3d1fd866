//! Asset data model: kinds, per-kind configuration, and metadata records

use lumen_core::{AssetHandle, ContentHash};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// Closed set of asset kinds the engine knows how to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Texture,
    Mesh,
    SkinnedMesh,
    Animation,
    Material,
    Font,
    Script,
    BehaviorTree,
    Scene,
    Folder,
    Audio,
    Shader,
    Prefab,
    #[default]
    None,
}

impl AssetKind {
    pub const ALL: [AssetKind; 14] = [
        AssetKind::Texture,
        AssetKind::Mesh,
        AssetKind::SkinnedMesh,
        AssetKind::Animation,
        AssetKind::Material,
        AssetKind::Font,
        AssetKind::Script,
        AssetKind::BehaviorTree,
        AssetKind::Scene,
        AssetKind::Folder,
        AssetKind::Audio,
        AssetKind::Shader,
        AssetKind::Prefab,
        AssetKind::None,
    ];

    /// Name used in sidecar files
    pub fn name(&self) -> &'static str {
        match self {
            AssetKind::Texture => "texture",
            AssetKind::Mesh => "mesh",
            AssetKind::SkinnedMesh => "skinned_mesh",
            AssetKind::Animation => "animation",
            AssetKind::Material => "material",
            AssetKind::Font => "font",
            AssetKind::Script => "script",
            AssetKind::BehaviorTree => "behavior_tree",
            AssetKind::Scene => "scene",
            AssetKind::Folder => "folder",
            AssetKind::Audio => "audio",
            AssetKind::Shader => "shader",
            AssetKind::Prefab => "prefab",
            AssetKind::None => "none",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Parse a kind as written by old sidecars (`AssetType::Texture2D`).
    /// Modern names are accepted too.
    pub fn from_legacy_name(name: &str) -> Option<Self> {
        let bare = name.strip_prefix("AssetType::").unwrap_or(name);
        let kind = match bare {
            "Texture2D" | "Texture" => AssetKind::Texture,
            "Mesh" => AssetKind::Mesh,
            "SkinnedMesh" => AssetKind::SkinnedMesh,
            "Animation" => AssetKind::Animation,
            "Material" => AssetKind::Material,
            "Font" => AssetKind::Font,
            "Script" => AssetKind::Script,
            "BehaviourTree" | "BehaviorTree" => AssetKind::BehaviorTree,
            "Scene" => AssetKind::Scene,
            "Folder" => AssetKind::Folder,
            "Audio" => AssetKind::Audio,
            "Shader" => AssetKind::Shader,
            "Prefab" => AssetKind::Prefab,
            "None" => AssetKind::None,
            other => return Self::from_name(other),
        };
        Some(kind)
    }

    /// Kinds handed to the external compiler instead of being copied
    pub fn requires_cook(&self) -> bool {
        matches!(
            self,
            AssetKind::Texture | AssetKind::Mesh | AssetKind::SkinnedMesh | AssetKind::Font
        )
    }

    /// Kinds that produce a file in the cache directory
    pub fn has_cache(&self) -> bool {
        !matches!(self, AssetKind::Folder)
    }

    /// Kinds whose built-in loaders swap contents in place on reload
    pub fn supports_reload(&self) -> bool {
        matches!(
            self,
            AssetKind::Texture
                | AssetKind::Mesh
                | AssetKind::SkinnedMesh
                | AssetKind::Material
                | AssetKind::Script
                | AssetKind::Animation
        )
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureUsage {
    #[default]
    Default,
    NormalMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextureShape {
    #[default]
    #[serde(rename = "2d")]
    Flat,
    #[serde(rename = "cube")]
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureWrap {
    #[default]
    Repeat,
    Mirrored,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

/// Import settings for textures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureConfig {
    pub usage: TextureUsage,
    pub shape: TextureShape,
    pub srgb: bool,
    pub mip_maps: bool,
    pub wrap: TextureWrap,
    pub filter: TextureFilter,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            usage: TextureUsage::Default,
            shape: TextureShape::Flat,
            srgb: true,
            mip_maps: false,
            wrap: TextureWrap::Repeat,
            filter: TextureFilter::Linear,
        }
    }
}

/// Import settings for meshes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeshConfig {
    pub skinned: bool,
}

/// Kind-specific configuration block of a metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetConfig {
    Texture(TextureConfig),
    Mesh(MeshConfig),
    #[default]
    Empty,
}

impl AssetConfig {
    /// The configuration a freshly imported asset of `kind` starts with
    pub fn default_for(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Texture => AssetConfig::Texture(TextureConfig::default()),
            AssetKind::Mesh => AssetConfig::Mesh(MeshConfig::default()),
            AssetKind::SkinnedMesh => AssetConfig::Mesh(MeshConfig { skinned: true }),
            _ => AssetConfig::Empty,
        }
    }

    /// Texture settings, or defaults if this is not a texture config
    pub fn texture(&self) -> TextureConfig {
        match self {
            AssetConfig::Texture(config) => *config,
            _ => TextureConfig::default(),
        }
    }

    /// Mesh settings, or defaults if this is not a mesh config
    pub fn mesh(&self) -> MeshConfig {
        match self {
            AssetConfig::Mesh(config) => *config,
            _ => MeshConfig::default(),
        }
    }
}

/// Everything the engine records about one source asset
#[derive(Debug, Clone, PartialEq)]
pub struct AssetMetadata {
    pub handle: AssetHandle,
    pub name: String,
    pub kind: AssetKind,
    pub config: AssetConfig,
    /// Source file, relative to the project root, `/`-separated
    pub source_path: String,
    /// Cooked file, relative to the project root; empty for folders
    pub cache_path: String,
    /// Fingerprint of the source at last cook
    pub source_hash: ContentHash,
    pub schema_version: f64,
}

impl AssetMetadata {
    /// New record at the current schema version with the kind's default config
    pub fn new(
        handle: AssetHandle,
        kind: AssetKind,
        source_path: impl Into<String>,
        cache_path: impl Into<String>,
    ) -> Self {
        let source_path = normalize_path_str(&source_path.into());
        let name = display_name(&source_path);
        Self {
            handle,
            name,
            kind,
            config: AssetConfig::default_for(kind),
            source_path,
            cache_path: normalize_path_str(&cache_path.into()),
            source_hash: ContentHash::ZERO,
            schema_version: crate::codec::CURRENT_SCHEMA_VERSION,
        }
    }
}

/// File name without its final extension, used as the display name
pub fn display_name(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rfind('.') {
        Some(idx) if idx > 0 => file[..idx].to_string(),
        _ => file.to_string(),
    }
}

/// Render a relative path with `/` separators, dropping `.` components
pub fn normalize_path(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect();
    normalize_path_str(&parts.join("/"))
}

/// Same as [`normalize_path`] for paths already held as strings (which may
/// carry Windows separators)
pub fn normalize_path_str(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}
