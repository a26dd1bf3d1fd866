//! Sidecar and registry document encoding.
//!
//! A sidecar is a TOML file next to its source asset:
//!
//! ```toml
//! [asset]
//! schema_version = 0.01
//! name = "brick"
//! handle = 4611686018427387904
//! kind = "texture"
//! source_path = "assets/brick.png"
//! cache_path = "cache/4611686018427387904"
//! source_hash = 3735928559
//!
//! [asset.config]
//! srgb = true
//! ```
//!
//! Records without `schema_version` use the legacy layout: no hash, kind names
//! like `AssetType::Texture2D`, and paths that may start with a parent marker.

use crate::types::{
    display_name, normalize_path_str, AssetConfig, AssetKind, AssetMetadata, MeshConfig,
    TextureConfig,
};
use lumen_core::{AssetHandle, ContentHash, LumenError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Version written by [`encode`]
pub const CURRENT_SCHEMA_VERSION: f64 = 0.01;

/// Version assigned to records decoded from the unversioned layout
pub const LEGACY_SCHEMA_VERSION: f64 = 0.0;

/// Appended to a source file name to form its sidecar name
pub const SIDECAR_SUFFIX: &str = ".asset.toml";

const PARENT_MARKERS: [&str; 2] = ["..\\", "../"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum HandleField {
    Integer(i64),
    Text(String),
}

impl HandleField {
    fn from_handle(handle: AssetHandle) -> Self {
        match i64::try_from(handle.raw()) {
            Ok(value) => HandleField::Integer(value),
            Err(_) => HandleField::Text(handle.raw().to_string()),
        }
    }

    fn to_handle(&self) -> Result<AssetHandle> {
        match self {
            HandleField::Integer(value) => u64::try_from(*value)
                .map(AssetHandle::from_raw)
                .map_err(|_| LumenError::SidecarError(format!("negative handle {}", value))),
            HandleField::Text(text) => text
                .trim()
                .parse::<AssetHandle>()
                .map_err(|_| LumenError::SidecarError(format!("invalid handle '{}'", text))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SidecarRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_version: Option<f64>,
    #[serde(default)]
    name: String,
    handle: HandleField,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    source_path: String,
    #[serde(default)]
    cache_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_hash: Option<u32>,
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    config: toml::Table,
}

#[derive(Serialize)]
struct SidecarFileOut {
    asset: SidecarRecord,
}

#[derive(Serialize)]
struct RegistryDocumentOut {
    #[serde(rename = "Assets")]
    assets: Vec<SidecarRecord>,
}

#[derive(Deserialize)]
struct RegistryDocumentIn {
    #[serde(rename = "Assets", default)]
    assets: Vec<toml::Value>,
}

/// Encode one record as sidecar text. Always writes the current version.
pub fn encode(meta: &AssetMetadata) -> Result<String> {
    let file = SidecarFileOut {
        asset: to_record(meta)?,
    };
    Ok(toml::to_string_pretty(&file)?)
}

/// Decode sidecar text, migrating legacy records
pub fn decode(text: &str) -> Result<AssetMetadata> {
    let mut doc: toml::Table = toml::from_str(text)?;
    let record = doc
        .remove("asset")
        .ok_or_else(|| LumenError::SidecarError("missing [asset] table".to_string()))?;
    decode_record(record)
}

/// Encode an aggregate registry document holding every record under `Assets`
pub fn encode_registry<'a, I>(records: I) -> Result<String>
where
    I: IntoIterator<Item = &'a AssetMetadata>,
{
    let assets = records
        .into_iter()
        .map(to_record)
        .collect::<Result<Vec<_>>>()?;
    Ok(toml::to_string_pretty(&RegistryDocumentOut { assets })?)
}

/// Decode an aggregate registry document.
///
/// The outer error covers an unreadable document; each record carries its
/// own result so one bad entry does not discard the rest.
pub fn decode_registry(text: &str) -> Result<Vec<Result<AssetMetadata>>> {
    let doc: RegistryDocumentIn = toml::from_str(text)?;
    Ok(doc.assets.into_iter().map(decode_record).collect())
}

/// Path of the sidecar belonging to `source`
pub fn sidecar_path(source: &Path) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

pub fn is_sidecar(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(SIDECAR_SUFFIX))
        .unwrap_or(false)
}

pub fn read_sidecar(path: &Path) -> Result<AssetMetadata> {
    let text = fs::read_to_string(path)?;
    decode(&text).map_err(|e| match e {
        LumenError::UnsupportedSchema(_) => e,
        other => LumenError::SidecarError(format!("{}: {}", path.display(), other)),
    })
}

pub fn write_sidecar(path: &Path, meta: &AssetMetadata) -> Result<()> {
    fs::write(path, encode(meta)?)?;
    Ok(())
}

fn to_record(meta: &AssetMetadata) -> Result<SidecarRecord> {
    Ok(SidecarRecord {
        schema_version: Some(CURRENT_SCHEMA_VERSION),
        name: meta.name.clone(),
        handle: HandleField::from_handle(meta.handle),
        kind: meta.kind.name().to_string(),
        source_path: normalize_path_str(&meta.source_path),
        cache_path: normalize_path_str(&meta.cache_path),
        source_hash: Some(meta.source_hash.value()),
        config: encode_config(meta.kind, &meta.config)?,
    })
}

fn decode_record(value: toml::Value) -> Result<AssetMetadata> {
    let version = match value.get("schema_version") {
        None => None,
        Some(v) => Some(
            v.as_float()
                .or_else(|| v.as_integer().map(|i| i as f64))
                .ok_or_else(|| {
                    LumenError::SidecarError("schema_version is not a number".to_string())
                })?,
        ),
    };
    let record: SidecarRecord = value
        .try_into()
        .map_err(|e| LumenError::SidecarError(e.to_string()))?;

    match version {
        None => decode_legacy(record),
        Some(v) if (v - CURRENT_SCHEMA_VERSION).abs() < f64::EPSILON => decode_current(record),
        Some(v) => {
            log::warn!("Rejecting sidecar with schema version {}", v);
            Err(LumenError::UnsupportedSchema(v))
        }
    }
}

fn decode_current(record: SidecarRecord) -> Result<AssetMetadata> {
    let hash = record
        .source_hash
        .ok_or_else(|| LumenError::SidecarError("missing source_hash".to_string()))?;
    let kind = AssetKind::from_name(&record.kind).unwrap_or_else(|| {
        log::warn!("Unknown asset kind '{}', treating as none", record.kind);
        AssetKind::None
    });
    build(record, kind, ContentHash::from(hash), CURRENT_SCHEMA_VERSION, |p| {
        normalize_path_str(p)
    })
}

fn decode_legacy(record: SidecarRecord) -> Result<AssetMetadata> {
    let kind = AssetKind::from_legacy_name(&record.kind).unwrap_or_else(|| {
        log::warn!("Unknown legacy asset kind '{}', treating as none", record.kind);
        AssetKind::None
    });
    build(record, kind, ContentHash::ZERO, LEGACY_SCHEMA_VERSION, |p| {
        normalize_path_str(&strip_parent_marker(p))
    })
}

fn build(
    record: SidecarRecord,
    kind: AssetKind,
    source_hash: ContentHash,
    schema_version: f64,
    fix_path: impl Fn(&str) -> String,
) -> Result<AssetMetadata> {
    let handle = record.handle.to_handle()?;
    let source_path = fix_path(&record.source_path);
    let name = if record.name.is_empty() {
        display_name(&source_path)
    } else {
        record.name
    };
    Ok(AssetMetadata {
        handle,
        name,
        kind,
        config: decode_config(kind, &record.config),
        source_path,
        cache_path: fix_path(&record.cache_path),
        source_hash,
        schema_version,
    })
}

/// Remove the first parent-directory marker in `path`, once
fn strip_parent_marker(path: &str) -> String {
    let found = PARENT_MARKERS
        .iter()
        .filter_map(|marker| path.find(marker).map(|idx| (idx, marker.len())))
        .min_by_key(|(idx, _)| *idx);
    match found {
        Some((idx, len)) => {
            let mut stripped = path.to_string();
            stripped.replace_range(idx..idx + len, "");
            stripped
        }
        None => path.to_string(),
    }
}

fn encode_config(kind: AssetKind, config: &AssetConfig) -> Result<toml::Table> {
    let value = match kind {
        AssetKind::Texture => toml::Value::try_from(config.texture())?,
        AssetKind::Mesh | AssetKind::SkinnedMesh => toml::Value::try_from(config.mesh())?,
        _ => return Ok(toml::Table::new()),
    };
    match value {
        toml::Value::Table(table) => Ok(table),
        _ => Ok(toml::Table::new()),
    }
}

fn decode_config(kind: AssetKind, table: &toml::Table) -> AssetConfig {
    match kind {
        AssetKind::Texture => {
            let d = TextureConfig::default();
            AssetConfig::Texture(TextureConfig {
                usage: enum_field(table, "usage").unwrap_or(d.usage),
                shape: enum_field(table, "shape").unwrap_or(d.shape),
                srgb: bool_field(table, &["srgb", "sRGB"]).unwrap_or(d.srgb),
                mip_maps: bool_field(table, &["mip_maps", "mipmaps"]).unwrap_or(d.mip_maps),
                wrap: enum_field(table, "wrap").unwrap_or(d.wrap),
                filter: enum_field(table, "filter").unwrap_or(d.filter),
            })
        }
        AssetKind::Mesh | AssetKind::SkinnedMesh => AssetConfig::Mesh(MeshConfig {
            skinned: bool_field(table, &["skinned", "skinMesh"])
                .unwrap_or(kind == AssetKind::SkinnedMesh),
        }),
        _ => AssetConfig::Empty,
    }
}

fn bool_field(table: &toml::Table, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .find_map(|key| table.get(*key).and_then(toml::Value::as_bool))
}

/// Unrecognized strings fall back to the field default
fn enum_field<T: DeserializeOwned>(table: &toml::Table, key: &str) -> Option<T> {
    let value = table.get(key)?;
    match value.clone().try_into() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::debug!("Ignoring unrecognized {} value {}", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TextureFilter, TextureShape, TextureUsage, TextureWrap};

    fn texture_meta() -> AssetMetadata {
        let mut meta = AssetMetadata::new(
            AssetHandle::from_raw(4_611_686_018_427_387_904),
            AssetKind::Texture,
            "assets/textures/brick.png",
            "cache/4611686018427387904",
        );
        meta.source_hash = ContentHash::from(0xdead_beef);
        meta.config = AssetConfig::Texture(TextureConfig {
            usage: TextureUsage::NormalMap,
            shape: TextureShape::Cube,
            srgb: false,
            mip_maps: true,
            wrap: TextureWrap::ClampToBorder,
            filter: TextureFilter::Nearest,
        });
        meta
    }

    #[test]
    fn test_round_trip_texture() {
        let meta = texture_meta();
        let text = encode(&meta).unwrap();
        assert!(text.contains("[asset]"));
        assert!(text.contains("schema_version = 0.01"));
        assert_eq!(decode(&text).unwrap(), meta);
    }

    #[test]
    fn test_round_trip_other_kinds() {
        let mut skinned = AssetMetadata::new(
            AssetHandle::from_raw(11),
            AssetKind::SkinnedMesh,
            "assets/hero.fbx",
            "cache/11",
        );
        skinned.source_hash = ContentHash::from(1);
        let folder = AssetMetadata::new(AssetHandle::from_raw(12), AssetKind::Folder, "assets/ui", "");
        let mut script = AssetMetadata::new(
            AssetHandle::from_raw(13),
            AssetKind::Script,
            "assets/player.cs",
            "cache/13",
        );
        script.source_hash = ContentHash::from(u32::MAX);

        for meta in [skinned, folder, script] {
            let decoded = decode(&encode(&meta).unwrap()).unwrap();
            assert_eq!(decoded, meta);
        }
    }

    #[test]
    fn test_handle_above_toml_integer_range() {
        let meta = AssetMetadata::new(
            AssetHandle::from_raw(u64::MAX - 1),
            AssetKind::Material,
            "assets/wood.mat",
            "cache/18446744073709551614",
        );
        let text = encode(&meta).unwrap();
        assert!(text.contains("handle = \"18446744073709551614\""));
        assert_eq!(decode(&text).unwrap().handle, meta.handle);
    }

    #[test]
    fn test_legacy_record_strips_parent_marker() {
        let text = r#"
[asset]
name = "brick"
handle = 1001
kind = "AssetType::Texture2D"
source_path = "..\\Assets\\brick.png"
cache_path = "..\\Cache\\1001"

[asset.config]
sRGB = false
"#;
        let meta = decode(text).unwrap();
        assert_eq!(meta.source_path, "Assets/brick.png");
        assert_eq!(meta.cache_path, "Cache/1001");
        assert_eq!(meta.kind, AssetKind::Texture);
        assert_eq!(meta.source_hash, ContentHash::ZERO);
        assert_eq!(meta.schema_version, LEGACY_SCHEMA_VERSION);
        assert!(!meta.config.texture().srgb);
    }

    #[test]
    fn test_legacy_marker_stripped_once() {
        assert_eq!(strip_parent_marker("../../a.png"), "../a.png");
        assert_eq!(strip_parent_marker("assets/../a.png"), "assets/a.png");
        assert_eq!(strip_parent_marker("..\\x/../y"), "x/../y");
        assert_eq!(strip_parent_marker("plain/path"), "plain/path");
    }

    #[test]
    fn test_legacy_record_ignores_hash_field() {
        let text = r#"
[asset]
handle = 5
kind = "AssetType::Script"
source_path = "scripts/a.cs"
cache_path = "cache/5"
source_hash = 99
"#;
        let meta = decode(text).unwrap();
        assert_eq!(meta.source_hash, ContentHash::ZERO);
        assert_eq!(meta.name, "a");
    }

    #[test]
    fn test_unknown_version_rejected() {
        let text = r#"
[asset]
schema_version = 0.5
name = "x"
handle = 1
kind = "texture"
source_path = "a.png"
cache_path = "cache/1"
source_hash = 0
"#;
        match decode(text) {
            Err(LumenError::UnsupportedSchema(v)) => assert_eq!(v, 0.5),
            other => panic!("expected UnsupportedSchema, got {:?}", other),
        }
    }

    #[test]
    fn test_current_version_requires_hash() {
        let text = r#"
[asset]
schema_version = 0.01
handle = 1
kind = "texture"
source_path = "a.png"
cache_path = "cache/1"
"#;
        assert!(matches!(decode(text), Err(LumenError::SidecarError(_))));
    }

    #[test]
    fn test_unknown_kind_decodes_as_none() {
        let text = r#"
[asset]
schema_version = 0.01
handle = 3
kind = "hologram"
source_path = "a.holo"
cache_path = "cache/3"
source_hash = 7

[asset.config]
flicker = true
"#;
        let meta = decode(text).unwrap();
        assert_eq!(meta.kind, AssetKind::None);
        assert_eq!(meta.config, AssetConfig::Empty);
    }

    #[test]
    fn test_unknown_enum_value_uses_default() {
        let text = r#"
[asset]
schema_version = 0.01
handle = 3
kind = "texture"
source_path = "a.png"
cache_path = "cache/3"
source_hash = 7

[asset.config]
wrap = "spiral"
filter = "nearest"
"#;
        let config = decode(text).unwrap().config.texture();
        assert_eq!(config.wrap, TextureWrap::Repeat);
        assert_eq!(config.filter, TextureFilter::Nearest);
        assert!(config.srgb);
    }

    #[test]
    fn test_missing_asset_table() {
        assert!(matches!(
            decode("name = \"x\""),
            Err(LumenError::SidecarError(_))
        ));
        assert!(matches!(
            decode("not toml ["),
            Err(LumenError::TomlParseError(_))
        ));
    }

    #[test]
    fn test_encode_upgrades_legacy_version() {
        let mut meta = texture_meta();
        meta.schema_version = LEGACY_SCHEMA_VERSION;
        let decoded = decode(&encode(&meta).unwrap()).unwrap();
        assert_eq!(decoded.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_registry_document() {
        let a = texture_meta();
        let mut b = AssetMetadata::new(
            AssetHandle::from_raw(2),
            AssetKind::Mesh,
            "assets/crate.obj",
            "cache/2",
        );
        b.source_hash = ContentHash::from(42);

        let text = encode_registry([&a, &b]).unwrap();
        assert!(text.contains("[[Assets]]"));

        let decoded: Vec<AssetMetadata> = decode_registry(&text)
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(decoded, vec![a, b]);
    }

    #[test]
    fn test_registry_document_keeps_good_records() {
        let text = r#"
[[Assets]]
schema_version = 0.01
handle = 1
kind = "script"
source_path = "a.cs"
cache_path = "cache/1"
source_hash = 1

[[Assets]]
schema_version = 9.0
handle = 2
kind = "script"
source_path = "b.cs"
cache_path = "cache/2"
source_hash = 2
"#;
        let records = decode_registry(text).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_ok());
        assert!(matches!(records[1], Err(LumenError::UnsupportedSchema(_))));
    }

    #[test]
    fn test_empty_registry_document() {
        let text = encode_registry(std::iter::empty()).unwrap();
        assert!(decode_registry(&text).unwrap().is_empty());
        assert!(decode_registry("").unwrap().is_empty());
    }

    #[test]
    fn test_sidecar_paths() {
        let sidecar = sidecar_path(Path::new("assets/brick.png"));
        assert_eq!(sidecar, PathBuf::from("assets/brick.png.asset.toml"));
        assert!(is_sidecar(&sidecar));
        assert!(!is_sidecar(Path::new("assets/brick.png")));
    }
}
