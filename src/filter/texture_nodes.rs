//! Route texture reads through the renderer's texture path.

use std::{collections::BTreeSet, fmt};

use crate::{
    diagnostics::Diagnostics,
    document::{InputValue, ShadingDocument, find_graph_index, registry_signature},
    network::{MaterialNetworkInterface, ParamValue, parent_path_name, path_name},
    registry::SOURCE_TYPE_MTLX,
};

use super::FilterContext;

const DEFAULT_PRIMVAR: &str = "st";
const GEOMPROPVALUE_NODE_DEF: &str = "ND_geompropvalue_vector2";
const REMAP_NODE_DEF: &str = "ND_remap_vector2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Black,
    Clamp,
    Repeat,
}

impl WrapMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WrapMode::Black => "black",
            WrapMode::Clamp => "clamp",
            WrapMode::Repeat => "repeat",
        }
    }

    /// Map a MaterialX address mode onto what the texture plugin supports.
    pub fn from_address_mode(node: &str, mode: &str, diag: &mut Diagnostics) -> Self {
        match mode {
            "constant" => {
                diag.warn(format!(
                    "RtxHioImagePlugin: Texture '{node}' has unsupported wrap mode 'constant' using 'black' instead."
                ));
                WrapMode::Black
            }
            "clamp" => WrapMode::Clamp,
            "mirror" => {
                diag.warn(format!(
                    "RtxHioImagePlugin: Texture '{node}' has unsupported wrap mode 'mirror' using 'repeat' instead."
                ));
                WrapMode::Repeat
            }
            _ => WrapMode::Repeat,
        }
    }
}

impl fmt::Display for WrapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn wrap_mode(
    network: &dyn MaterialNetworkInterface,
    node: &str,
    param: &str,
    diag: &mut Diagnostics,
) -> WrapMode {
    match network.parameter_value(node, param) {
        None => WrapMode::Repeat,
        Some(value) => match value.as_str() {
            Some(mode) => WrapMode::from_address_mode(node, mode, diag),
            None => WrapMode::Repeat,
        },
    }
}

/// (u, v) wrap modes for a texture node; `repeat` unless authored.
pub fn wrap_modes(
    network: &dyn MaterialNetworkInterface,
    node: &str,
    diag: &mut Diagnostics,
) -> (WrapMode, WrapMode) {
    (
        wrap_mode(network, node, "uaddressmode", diag),
        wrap_mode(network, node, "vaddressmode", diag),
    )
}

pub fn plugin_uri(plugin: &str, path: &str, u: WrapMode, v: WrapMode) -> String {
    format!("rtxplugin:{plugin}?filename={path}&wrapS={u}&wrapT={v}")
}

/// Rewrite the document's texture nodes for the renderer.
///
/// Non-native formats are read through the image plugin; native textures
/// use the resolved path and get their V coordinate inverted. Texture nodes
/// without a `texcoord` input read one from a primvar. Returns the number of
/// document nodes updated.
pub fn update_texture_nodes(
    network: &dyn MaterialNetworkInterface,
    texture_node_paths: &BTreeSet<String>,
    document: &mut ShadingDocument,
    ctx: &mut FilterContext,
) -> usize {
    let mut updated = 0usize;

    for path in texture_node_paths {
        let Some(node_type) = network.node_type(path).filter(|t| !t.is_empty()) else {
            ctx.diag
                .warn(format!("Cannot find texture node '{path}' in material network."));
            continue;
        };

        let Some(file) = network.parameter_value(path, "file") else {
            ctx.diag
                .warn(format!("File path missing for texture node '{path}'."));
            continue;
        };
        let ParamValue::Asset(asset) = file else {
            continue;
        };

        let resolved = match asset.resolved.as_deref() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => ctx.resolver.resolve(&asset.authored),
        };
        let ext = ctx.resolver.extension(&resolved);

        let node_name = path_name(path);
        let Some(gi) = find_graph_index(document, parent_path_name(path), node_name) else {
            continue;
        };
        let graph = &mut document.graphs[gi];

        let invert_t = if !ext.is_empty() && ext != ctx.config.native_texture_extension {
            let (u, v) = wrap_modes(network, path, &mut ctx.diag);
            let uri = plugin_uri(&ctx.config.texture_plugin, &resolved, u, v);
            log::debug!("Resolved MaterialX asset path: {uri}");
            if let Some(node) = graph.node_mut(node_name) {
                node.set_input_value("file", InputValue::String(uri), "filename");
            }
            false
        } else {
            log::debug!("Resolved MaterialX asset path: {resolved}");
            if let Some(node) = graph.node_mut(node_name) {
                node.set_input_value("file", InputValue::String(resolved), "filename");
            }
            true
        };

        let has_texcoord = graph
            .node(node_name)
            .is_some_and(|n| n.input("texcoord").is_some());
        if !has_texcoord {
            let st_name = format!("{node_name}__texcoord");
            let primvar = match ctx
                .registry
                .by_identifier_and_type(&node_type, SOURCE_TYPE_MTLX)
                .and_then(|e| e.primvar_hint().map(str::to_string))
            {
                Some(p) => p,
                None => {
                    ctx.diag.warn(format!(
                        "No primvar hint for texture node '{path}', using '{DEFAULT_PRIMVAR}'."
                    ));
                    DEFAULT_PRIMVAR.to_string()
                }
            };

            let st = graph.add_node("geompropvalue", &st_name, "vector2");
            st.set_input_value("geomprop", InputValue::String(primvar), "string");
            st.set_node_def(GEOMPROPVALUE_NODE_DEF);
            st.signature = registry_signature(GEOMPROPVALUE_NODE_DEF, ctx.registry);

            if let Some(node) = graph.node_mut(node_name) {
                node.add_input("texcoord", "vector2").connected_node = Some(st_name);
            }
        }

        if invert_t {
            let remap_name = format!("{node_name}__remap");
            let (source_node, source_output, source_value) = match graph
                .node(node_name)
                .and_then(|n| n.input("texcoord"))
            {
                Some(t) => (t.connected_node.clone(), t.output.clone(), t.value.clone()),
                None => (None, None, None),
            };

            let remap = graph.add_node("remap", &remap_name, "vector2");
            remap.set_node_def(REMAP_NODE_DEF);
            remap.signature = registry_signature(REMAP_NODE_DEF, ctx.registry);
            let input = remap.add_input("in", "vector2");
            input.connected_node = source_node;
            input.output = source_output;
            input.value = source_value;
            remap.set_input_value("inlow", InputValue::Vector(vec![0.0, 1.0]), "float2");
            remap.set_input_value("inhigh", InputValue::Vector(vec![1.0, 0.0]), "float2");

            if let Some(texcoord) = graph
                .node_mut(node_name)
                .and_then(|n| n.input_mut("texcoord"))
            {
                texcoord.connected_node = Some(remap_name);
                texcoord.output = None;
                texcoord.value = None;
            }
        }

        updated += 1;
    }

    updated
}
