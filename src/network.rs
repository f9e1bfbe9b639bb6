use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the terminal slot the renderer evaluates for surface shading.
pub const SURFACE_TERMINAL: &str = "surface";

/// A single upstream reference feeding a node input or a terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct InputConnection {
    #[serde(rename = "upstreamNode")]
    pub upstream_node: String,
    #[serde(rename = "upstreamOutput", default)]
    pub upstream_output: String,
}

impl InputConnection {
    pub fn new(upstream_node: impl Into<String>, upstream_output: impl Into<String>) -> Self {
        Self {
            upstream_node: upstream_node.into(),
            upstream_output: upstream_output.into(),
        }
    }
}

/// An authored asset reference, e.g. a texture file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssetPath {
    #[serde(rename = "asset")]
    pub authored: String,
    #[serde(
        rename = "resolvedPath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub resolved: Option<String>,
}

impl AssetPath {
    pub fn new(authored: impl Into<String>) -> Self {
        Self {
            authored: authored.into(),
            resolved: None,
        }
    }
}

/// Parameter value on a material node.
///
/// Asset references are kept distinct from plain strings: only asset-valued
/// `file` parameters are treated as texture files.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Asset(AssetPath),
    Value(serde_json::Value),
}

impl ParamValue {
    pub fn string(s: impl Into<String>) -> Self {
        ParamValue::Value(serde_json::Value::String(s.into()))
    }

    pub fn asset(path: impl Into<String>) -> Self {
        ParamValue::Asset(AssetPath::new(path))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Value(v) => v.as_str(),
            ParamValue::Asset(_) => None,
        }
    }

    pub fn as_asset(&self) -> Option<&AssetPath> {
        match self {
            ParamValue::Asset(a) => Some(a),
            ParamValue::Value(_) => None,
        }
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(v: serde_json::Value) -> Self {
        ParamValue::Value(v)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MaterialNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
    #[serde(rename = "inputConnections", default)]
    pub input_connections: BTreeMap<String, InputConnection>,
}

/// In-memory material network: nodes keyed by their structural path plus
/// the terminal bindings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MaterialNetwork {
    #[serde(rename = "materialPath", default)]
    pub material_path: String,
    #[serde(default)]
    pub nodes: BTreeMap<String, MaterialNode>,
    #[serde(default)]
    pub terminals: BTreeMap<String, InputConnection>,
}

/// Accessor/mutator contract the filter uses to read and rewrite a network.
///
/// Mirrors the narrow surface a host renderer exposes over its own network
/// storage: every name is a node path, and a node type of `None` means the
/// node does not exist.
pub trait MaterialNetworkInterface {
    fn material_prim_path(&self) -> &str;

    fn node_names(&self) -> Vec<String>;
    fn node_type(&self, node: &str) -> Option<String>;
    /// Setting the type of an unknown node creates it.
    fn set_node_type(&mut self, node: &str, node_type: &str);
    fn delete_node(&mut self, node: &str);

    fn parameter_value(&self, node: &str, param: &str) -> Option<ParamValue>;
    fn set_parameter_value(&mut self, node: &str, param: &str, value: ParamValue);
    fn delete_parameter(&mut self, node: &str, param: &str);
    fn authored_parameter_names(&self, node: &str) -> Vec<String>;

    fn input_connection(&self, node: &str, input: &str) -> Option<InputConnection>;
    fn set_input_connection(&mut self, node: &str, input: &str, connection: InputConnection);
    fn delete_input_connection(&mut self, node: &str, input: &str);
    fn input_connection_names(&self, node: &str) -> Vec<String>;

    fn terminal_connection(&self, terminal: &str) -> Option<InputConnection>;
    fn set_terminal_connection(&mut self, terminal: &str, connection: InputConnection);

    fn has_node(&self, node: &str) -> bool {
        self.node_type(node).is_some_and(|t| !t.is_empty())
    }
}

impl MaterialNetwork {
    pub fn new(material_path: impl Into<String>) -> Self {
        Self {
            material_path: material_path.into(),
            ..Default::default()
        }
    }

    pub fn node(&self, name: &str) -> Option<&MaterialNode> {
        self.nodes.get(name)
    }
}

impl MaterialNetworkInterface for MaterialNetwork {
    fn material_prim_path(&self) -> &str {
        &self.material_path
    }

    fn node_names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    fn node_type(&self, node: &str) -> Option<String> {
        self.nodes.get(node).map(|n| n.node_type.clone())
    }

    fn set_node_type(&mut self, node: &str, node_type: &str) {
        self.nodes.entry(node.to_string()).or_default().node_type = node_type.to_string();
    }

    fn delete_node(&mut self, node: &str) {
        self.nodes.remove(node);
    }

    fn parameter_value(&self, node: &str, param: &str) -> Option<ParamValue> {
        self.nodes.get(node)?.parameters.get(param).cloned()
    }

    fn set_parameter_value(&mut self, node: &str, param: &str, value: ParamValue) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.parameters.insert(param.to_string(), value);
        }
    }

    fn delete_parameter(&mut self, node: &str, param: &str) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.parameters.remove(param);
        }
    }

    fn authored_parameter_names(&self, node: &str) -> Vec<String> {
        self.nodes
            .get(node)
            .map(|n| n.parameters.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn input_connection(&self, node: &str, input: &str) -> Option<InputConnection> {
        self.nodes.get(node)?.input_connections.get(input).cloned()
    }

    fn set_input_connection(&mut self, node: &str, input: &str, connection: InputConnection) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.input_connections.insert(input.to_string(), connection);
        }
    }

    fn delete_input_connection(&mut self, node: &str, input: &str) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.input_connections.remove(input);
        }
    }

    fn input_connection_names(&self, node: &str) -> Vec<String> {
        self.nodes
            .get(node)
            .map(|n| n.input_connections.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn terminal_connection(&self, terminal: &str) -> Option<InputConnection> {
        self.terminals.get(terminal).cloned()
    }

    fn set_terminal_connection(&mut self, terminal: &str, connection: InputConnection) {
        self.terminals.insert(terminal.to_string(), connection);
    }
}

/// Last component of a node path (`/Mat/NG/image1` → `image1`).
pub fn path_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Name of the parent component of a node path (`/Mat/NG/image1` → `NG`).
/// Empty when the path has no parent component.
pub fn parent_path_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, _)) => path_name(parent),
        None => "",
    }
}

pub fn load_network_from_path(path: impl AsRef<std::path::Path>) -> Result<MaterialNetwork> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read material network json at {}", path.display()))?;
    let network: MaterialNetwork =
        serde_json::from_str(&text).context("failed to parse material network json")?;
    Ok(network)
}
