//! File extension to asset kind mapping

use crate::types::AssetKind;
use std::collections::HashMap;
use std::path::Path;

/// Maps source file extensions to asset kinds.
///
/// Owned by the registry rather than held globally so tools can extend it
/// before scanning.
#[derive(Debug, Clone)]
pub struct KindTable {
    by_extension: HashMap<String, AssetKind>,
}

impl Default for KindTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (ext, kind) in [
            ("png", AssetKind::Texture),
            ("dds", AssetKind::Texture),
            ("fbx", AssetKind::Mesh),
            ("obj", AssetKind::Mesh),
            ("gltf", AssetKind::Mesh),
            ("glb", AssetKind::Mesh),
            ("anim", AssetKind::Animation),
            ("mat", AssetKind::Material),
            ("ttf", AssetKind::Font),
            ("otf", AssetKind::Font),
            ("cs", AssetKind::Script),
            ("btree", AssetKind::BehaviorTree),
            ("sc", AssetKind::Scene),
            ("mp3", AssetKind::Audio),
            ("wav", AssetKind::Audio),
            ("ogg", AssetKind::Audio),
            ("glsl", AssetKind::Shader),
            ("wgsl", AssetKind::Shader),
            ("prefab", AssetKind::Prefab),
        ] {
            table.insert(ext, kind);
        }
        table
    }
}

impl KindTable {
    /// A table with no extensions registered
    pub fn empty() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    /// Register (or override) an extension. A leading dot is ignored.
    pub fn insert(&mut self, extension: &str, kind: AssetKind) {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        self.by_extension.insert(ext, kind);
    }

    pub fn kind_for_extension(&self, extension: &str) -> AssetKind {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        self.by_extension
            .get(&ext)
            .copied()
            .unwrap_or(AssetKind::None)
    }

    /// Classify a path on disk; directories are always folders
    pub fn classify(&self, path: &Path) -> AssetKind {
        if path.is_dir() {
            return AssetKind::Folder;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.kind_for_extension(e))
            .unwrap_or(AssetKind::None)
    }

    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_extensions() {
        let table = KindTable::default();
        assert_eq!(table.kind_for_extension("png"), AssetKind::Texture);
        assert_eq!(table.kind_for_extension(".fbx"), AssetKind::Mesh);
        assert_eq!(table.kind_for_extension("wav"), AssetKind::Audio);
        assert_eq!(table.kind_for_extension("btree"), AssetKind::BehaviorTree);
        assert_eq!(table.kind_for_extension("txt"), AssetKind::None);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = KindTable::default();
        assert_eq!(table.kind_for_extension("PNG"), AssetKind::Texture);
        assert_eq!(
            table.classify(Path::new("assets/Hero.TTF")),
            AssetKind::Font
        );
    }

    #[test]
    fn test_insert_extension() {
        let mut table = KindTable::empty();
        assert!(table.is_empty());
        table.insert(".Tga", AssetKind::Texture);
        assert_eq!(table.len(), 1);
        assert_eq!(table.kind_for_extension("tga"), AssetKind::Texture);
    }

    #[test]
    fn test_classify_directory_and_extensionless() {
        let dir = std::env::temp_dir().join(format!("lumen_kinds_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(dir.join("textures")).unwrap();

        let table = KindTable::default();
        assert_eq!(table.classify(&dir.join("textures")), AssetKind::Folder);
        assert_eq!(table.classify(&dir.join("README")), AssetKind::None);

        fs::remove_dir_all(&dir).ok();
    }
}
