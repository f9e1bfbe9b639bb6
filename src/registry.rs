//! Shader registry: descriptors for MaterialX node definitions, OSL adapters,
//! renderer-native closures, and shaders compiled during filtering.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::oso::parse_oso;

const DEFAULT_SHADER_REGISTRY_JSON: &str = include_str!("../assets/shader-registry.json");

/// Source type tags.
pub const SOURCE_TYPE_MTLX: &str = "mtlx";
pub const SOURCE_TYPE_OSL: &str = "OSL";
pub const SOURCE_TYPE_RMAN_CPP: &str = "RmanCpp";

/// Metadata key naming the primvar a texture node reads its coordinates from.
pub const METADATA_PRIMVARS: &str = "primvars";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShaderProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// Declared default value.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShaderEntry {
    pub identifier: String,
    #[serde(rename = "sourceType")]
    pub source_type: String,
    /// Node category for MaterialX definitions (`image`, `multiply`, ...).
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub inputs: Vec<ShaderProperty>,
    #[serde(default)]
    pub outputs: Vec<ShaderProperty>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip)]
    pub asset_path: Option<PathBuf>,
}

impl ShaderEntry {
    pub fn input(&self, name: &str) -> Option<&ShaderProperty> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&ShaderProperty> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.output(name).is_some()
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|p| p.name.as_str())
    }

    /// Type of the first declared output, used as the node's value type.
    pub fn output_type(&self) -> Option<&str> {
        self.outputs.first().map(|p| p.ty.as_str())
    }

    pub fn is_texture(&self) -> bool {
        self.role.as_deref() == Some("texture")
    }

    pub fn primvar_hint(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_PRIMVARS)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RegistryFile {
    #[allow(dead_code)]
    pub version: String,
    #[serde(default)]
    pub shaders: Vec<ShaderEntry>,
}

/// Thread-safe registry of shader entries keyed by identifier.
///
/// Several entries may share an identifier with different source types;
/// lookups by identifier alone return the first one registered.
#[derive(Debug, Default)]
pub struct ShaderRegistry {
    entries: RwLock<HashMap<String, Vec<Arc<ShaderEntry>>>>,
}

impl ShaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the bundled MaterialX, adapter and closure
    /// descriptions.
    pub fn load_default() -> Result<Self> {
        let registry = Self::new();
        registry
            .merge_json(DEFAULT_SHADER_REGISTRY_JSON)
            .context("failed to parse bundled shader registry")?;
        Ok(registry)
    }

    pub fn merge_json(&self, text: &str) -> Result<usize> {
        let file: RegistryFile = serde_json::from_str(text)?;
        let count = file.shaders.len();
        for entry in file.shaders {
            self.insert(entry);
        }
        Ok(count)
    }

    pub fn merge_json_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read shader registry json at {}", path.display()))?;
        self.merge_json(&text)
            .with_context(|| format!("failed to parse shader registry json at {}", path.display()))
    }

    /// Insert an entry, replacing one with the same identifier and source type.
    pub fn insert(&self, entry: ShaderEntry) -> Arc<ShaderEntry> {
        let entry = Arc::new(entry);
        if let Ok(mut map) = self.entries.write() {
            let slot = map.entry(entry.identifier.clone()).or_default();
            slot.retain(|e| e.source_type != entry.source_type);
            slot.push(entry.clone());
        }
        entry
    }

    pub fn by_identifier_and_type(
        &self,
        identifier: &str,
        source_type: &str,
    ) -> Option<Arc<ShaderEntry>> {
        let map = self.entries.read().ok()?;
        map.get(identifier)?
            .iter()
            .find(|e| e.source_type == source_type)
            .cloned()
    }

    pub fn by_identifier(&self, identifier: &str) -> Option<Arc<ShaderEntry>> {
        let map = self.entries.read().ok()?;
        map.get(identifier)?.first().cloned()
    }

    /// Describe a compiled `.oso` artifact and register it.
    ///
    /// The identifier is the artifact's file stem, which is unique per
    /// compilation.
    pub fn register_from_asset(
        &self,
        asset: &Path,
        metadata: BTreeMap<String, String>,
        sub_identifier: &str,
        source_type: &str,
    ) -> Result<Arc<ShaderEntry>> {
        let text = std::fs::read_to_string(asset)
            .with_context(|| format!("failed to read compiled shader at {}", asset.display()))?;
        let shader = parse_oso(&text)
            .with_context(|| format!("failed to parse compiled shader at {}", asset.display()))?;
        let identifier = asset
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("compiled shader path has no file name: {}", asset.display()))?
            .to_string();

        let mut metadata = metadata;
        metadata
            .entry("subIdentifier".to_string())
            .or_insert_with(|| sub_identifier.to_string());
        metadata
            .entry("shaderName".to_string())
            .or_insert_with(|| shader.name.clone());

        let to_props = |params: Vec<crate::oso::OsoParam>| {
            params
                .into_iter()
                .map(|p| ShaderProperty {
                    name: p.name,
                    ty: p.ty,
                    value: None,
                })
                .collect()
        };

        Ok(self.insert(ShaderEntry {
            identifier,
            source_type: source_type.to_string(),
            family: String::new(),
            role: None,
            inputs: to_props(shader.inputs),
            outputs: to_props(shader.outputs),
            metadata,
            asset_path: Some(asset.to_path_buf()),
        }))
    }
}
