//! Asset types every project gets without registering its own loaders

use crate::loader::{LoadContext, LoaderTable};
use crate::types::AssetKind;
use lumen_core::Result;

/// Cooked bytes exactly as the cook step produced them
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CookedBlob {
    pub bytes: Vec<u8>,
}

impl CookedBlob {
    pub fn load(ctx: &LoadContext<'_>) -> Result<Self> {
        Ok(Self {
            bytes: ctx.read_bytes()?,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A text asset (materials, scripts, scenes and the like)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextDocument {
    pub text: String,
}

impl TextDocument {
    pub fn load(ctx: &LoadContext<'_>) -> Result<Self> {
        Ok(Self {
            text: ctx.read_string()?,
        })
    }
}

/// Register the default loader for every loadable kind.
///
/// Kinds that support live editing get a swapping reloader; folders and
/// unknown files get no loader at all.
pub fn register_builtin_loaders(table: &mut LoaderTable) {
    for kind in [AssetKind::Texture, AssetKind::Mesh, AssetKind::SkinnedMesh, AssetKind::Animation] {
        table.register_swapping(kind, CookedBlob::load);
    }
    for kind in [AssetKind::Font, AssetKind::Audio] {
        table.register(kind, CookedBlob::load);
    }
    for kind in [AssetKind::Material, AssetKind::Script] {
        table.register_swapping(kind, TextDocument::load);
    }
    for kind in [
        AssetKind::Scene,
        AssetKind::Prefab,
        AssetKind::Shader,
        AssetKind::BehaviorTree,
    ] {
        table.register(kind, TextDocument::load);
    }
}

impl LoaderTable {
    /// A table with the built-in loaders registered
    pub fn with_builtin() -> Self {
        let mut table = Self::new();
        register_builtin_loaders(&mut table);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_coverage() {
        let table = LoaderTable::with_builtin();
        for kind in AssetKind::ALL {
            let expected = !matches!(kind, AssetKind::Folder | AssetKind::None);
            assert_eq!(table.has_loader(kind), expected, "{}", kind);
            assert_eq!(table.supports_reload(kind), kind.supports_reload(), "{}", kind);
        }
    }

    #[test]
    fn test_builtin_types() {
        let table = LoaderTable::with_builtin();
        assert!(table
            .type_name(AssetKind::Texture)
            .unwrap()
            .ends_with("CookedBlob"));
        assert!(table
            .type_name(AssetKind::Material)
            .unwrap()
            .ends_with("TextDocument"));
    }
}
