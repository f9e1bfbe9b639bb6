use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::{
    diagnostics::Diagnostics,
    network::{MaterialNetworkInterface, ParamValue, parent_path_name, path_name},
    registry::{SOURCE_TYPE_MTLX, ShaderRegistry},
    stdlib::StdLibrary,
};

use super::{DocInput, DocNode, DocPort, GraphOutput, InputValue, NodeSignature, ShadingDocument};

/// Document built from a material network plus the texture nodes found
/// while building it.
#[derive(Debug, Clone, Default)]
pub struct BuiltDocument {
    pub document: ShadingDocument,
    /// Network paths of texture-sampling nodes.
    pub texture_node_paths: BTreeSet<String>,
    /// Document node name → network node path, for texture nodes.
    pub texture_names: BTreeMap<String, String>,
}

/// Category, value type and input types for a node type, taken from the
/// registry's MaterialX entry or, failing that, the standard library.
#[derive(Debug, Default)]
struct NodeDescription {
    category: String,
    ty: String,
    input_types: HashMap<String, String>,
    /// Declared input order; generated calls pass inputs positionally.
    input_order: Vec<String>,
    input_defaults: HashMap<String, InputValue>,
    outputs: Vec<DocPort>,
    is_texture: bool,
}

impl NodeDescription {
    fn sort_inputs(&self, node: &mut DocNode) {
        let rank = |name: &str| {
            self.input_order
                .iter()
                .position(|n| n == name)
                .unwrap_or(self.input_order.len())
        };
        node.inputs.sort_by_key(|i| rank(&i.name));
    }

    fn signature(&self) -> Option<NodeSignature> {
        if self.category.is_empty() {
            return None;
        }
        let inputs = self
            .input_order
            .iter()
            .map(|name| {
                let ty = self.input_types.get(name).map(String::as_str).unwrap_or("");
                let mut port = DocPort::new(name, ty);
                port.default = self.input_defaults.get(name).cloned();
                port
            })
            .collect();
        Some(NodeSignature {
            inputs,
            outputs: self.outputs.clone(),
        })
    }
}

fn describe_node(node_type: &str, stdlib: &StdLibrary, registry: &ShaderRegistry) -> NodeDescription {
    if let Some(entry) = registry.by_identifier_and_type(node_type, SOURCE_TYPE_MTLX) {
        return NodeDescription {
            category: entry.family.clone(),
            ty: entry.output_type().unwrap_or_default().to_string(),
            input_types: entry
                .inputs
                .iter()
                .map(|p| (p.name.clone(), p.ty.clone()))
                .collect(),
            input_order: entry.input_names().map(str::to_string).collect(),
            input_defaults: entry
                .inputs
                .iter()
                .filter_map(|p| {
                    let value = ParamValue::Value(p.value.clone()?);
                    Some((p.name.clone(), to_input_value(&value, &p.ty)?))
                })
                .collect(),
            outputs: entry
                .outputs
                .iter()
                .map(|p| DocPort::new(&p.name, &p.ty))
                .collect(),
            is_texture: entry.is_texture(),
        };
    }
    if let Some(def) = stdlib.node_def(node_type) {
        return NodeDescription {
            category: def.node.clone(),
            ty: def.ty.clone(),
            input_types: def.inputs.iter().cloned().collect(),
            input_order: def.inputs.iter().map(|(name, _)| name.clone()).collect(),
            input_defaults: def
                .inputs
                .iter()
                .filter_map(|(name, ty)| {
                    let text = def.input_values.get(name)?;
                    Some((name.clone(), parse_value_text(text, ty)?))
                })
                .collect(),
            outputs: def
                .outputs
                .iter()
                .map(|(name, ty)| DocPort::new(name, ty))
                .collect(),
            is_texture: false,
        };
    }
    log::debug!("no MaterialX definition for node type '{node_type}'");
    NodeDescription::default()
}

/// Declared signature of a registry MaterialX node type.
pub fn registry_signature(node_type: &str, registry: &ShaderRegistry) -> Option<NodeSignature> {
    describe_node(node_type, &StdLibrary::default(), registry).signature()
}

/// Value of a MaterialX `value` attribute of type `ty`.
fn parse_value_text(text: &str, ty: &str) -> Option<InputValue> {
    let floats = || {
        text.split(',')
            .map(|part| part.trim().parse::<f32>().ok())
            .collect::<Option<Vec<f32>>>()
    };
    match ty {
        "string" | "filename" => Some(InputValue::String(text.to_string())),
        "boolean" => match text.trim() {
            "true" => Some(InputValue::Boolean(true)),
            "false" => Some(InputValue::Boolean(false)),
            _ => None,
        },
        "integer" => text.trim().parse().ok().map(InputValue::Integer),
        "float" => text.trim().parse().ok().map(InputValue::Float),
        "color3" | "color4" | "vector2" | "vector3" | "vector4" | "float2" => {
            floats().map(InputValue::Vector)
        }
        _ => None,
    }
}

fn infer_type(value: &ParamValue) -> &'static str {
    match value {
        ParamValue::Asset(_) => "filename",
        ParamValue::Value(serde_json::Value::String(_)) => "string",
        ParamValue::Value(serde_json::Value::Bool(_)) => "boolean",
        ParamValue::Value(serde_json::Value::Number(n)) if n.is_i64() => "integer",
        ParamValue::Value(serde_json::Value::Number(_)) => "float",
        ParamValue::Value(serde_json::Value::Array(items)) => match items.len() {
            2 => "vector2",
            4 => "vector4",
            _ => "vector3",
        },
        ParamValue::Value(_) => "",
    }
}

fn to_input_value(value: &ParamValue, ty: &str) -> Option<InputValue> {
    match value {
        ParamValue::Asset(asset) => Some(InputValue::String(
            asset.resolved.clone().unwrap_or_else(|| asset.authored.clone()),
        )),
        ParamValue::Value(v) => match v {
            serde_json::Value::String(s) => Some(InputValue::String(s.clone())),
            serde_json::Value::Bool(b) => Some(InputValue::Boolean(*b)),
            serde_json::Value::Number(n) if ty == "integer" => n.as_i64().map(InputValue::Integer),
            serde_json::Value::Number(n) => n.as_f64().map(|f| InputValue::Float(f as f32)),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|x| x.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<f32>>>()
                .map(InputValue::Vector),
            _ => None,
        },
    }
}

fn add_parameters(
    node: &mut DocNode,
    network: &dyn MaterialNetworkInterface,
    path: &str,
    desc: &NodeDescription,
) {
    for param in network.authored_parameter_names(path) {
        let Some(value) = network.parameter_value(path, &param) else {
            continue;
        };
        let ty = desc
            .input_types
            .get(&param)
            .cloned()
            .unwrap_or_else(|| infer_type(&value).to_string());
        let Some(v) = to_input_value(&value, &ty) else {
            continue;
        };
        node.set_input_value(&param, v, &ty);
    }
}

/// Name of the document's material node for a material prim path.
pub fn material_name(material_path: &str) -> String {
    match path_name(material_path) {
        "" => "Material".to_string(),
        name => name.to_string(),
    }
}

/// Name of the document's surface shader node.
pub fn shader_node_name(material_name: &str) -> String {
    format!("SR_{material_name}")
}

/// Nodes are grouped by the parent component of their path; nodes with no
/// parent share a graph named after the material.
fn graph_key(path: &str, material_name: &str) -> String {
    match parent_path_name(path) {
        "" => format!("NG_{material_name}"),
        parent => parent.to_string(),
    }
}

/// Build a shading document for the sub-graph feeding `terminal`.
///
/// Upstream nodes are grouped into node graphs by the parent component of
/// their path. The terminal becomes the `SR_<material>` shader node and a
/// `<material>` surfacematerial node wraps it.
pub fn build_document(
    network: &dyn MaterialNetworkInterface,
    terminal: &str,
    connection_names: &[String],
    stdlib: &StdLibrary,
    registry: &ShaderRegistry,
    diag: &mut Diagnostics,
) -> BuiltDocument {
    let mut built = BuiltDocument::default();

    let material = material_name(network.material_prim_path());
    let shader_name = shader_node_name(&material);

    let terminal_type = network.node_type(terminal).unwrap_or_default();
    let terminal_desc = describe_node(&terminal_type, stdlib, registry);

    // Wrapper nodes go in first: graph names are uniquified against them.
    {
        let shader = built
            .document
            .add_node(&terminal_desc.category, &shader_name, "surfaceshader");
        if !terminal_type.is_empty() {
            shader.set_node_def(&terminal_type);
        }
        add_parameters(shader, network, terminal, &terminal_desc);
    }
    {
        let node = built
            .document
            .add_node("surfacematerial", &material, "material");
        node.add_input("surfaceshader", "surfaceshader").connected_node =
            Some(shader_name.clone());
    }

    let mut graph_index: HashMap<String, usize> = HashMap::new();
    let mut added: HashSet<String> = HashSet::new();
    let mut shader_inputs: Vec<DocInput> = Vec::new();

    for cname in connection_names {
        let Some(conn) = network.input_connection(terminal, cname) else {
            continue;
        };
        let upstream = conn.upstream_node.as_str();
        if !network.has_node(upstream) {
            log::debug!("skipping unknown upstream node '{upstream}' for input '{cname}'");
            continue;
        }

        let mut stack = vec![upstream.to_string()];
        while let Some(path) = stack.pop() {
            if !added.insert(path.clone()) {
                continue;
            }

            let key = graph_key(&path, &material);
            let gi = *graph_index
                .entry(key.clone())
                .or_insert_with(|| built.document.add_node_graph(&key));

            let node_type = network.node_type(&path).unwrap_or_default();
            let desc = describe_node(&node_type, stdlib, registry);
            let name = path_name(&path).to_string();

            let mut node = DocNode::new(&desc.category, &name, &desc.ty);
            if !node_type.is_empty() {
                node.set_node_def(&node_type);
            }
            node.signature = desc.signature();
            add_parameters(&mut node, network, &path, &desc);

            for input in network.input_connection_names(&path) {
                let Some(up) = network.input_connection(&path, &input) else {
                    continue;
                };
                if !network.has_node(&up.upstream_node) {
                    diag.warn(format!(
                        "Unknown material node '{}' feeding '{}.{}'",
                        up.upstream_node, path, input
                    ));
                    continue;
                }
                let ty = desc.input_types.get(&input).cloned().unwrap_or_default();
                let doc_input = node.add_input(&input, &ty);
                doc_input.connected_node = Some(path_name(&up.upstream_node).to_string());
                if !up.upstream_output.is_empty() && up.upstream_output != "out" {
                    doc_input.output = Some(up.upstream_output.clone());
                }
                stack.push(up.upstream_node.clone());
            }

            if desc.is_texture {
                built.texture_node_paths.insert(path.clone());
                built.texture_names.insert(name.clone(), path.clone());
            }
            desc.sort_inputs(&mut node);
            built.document.graphs[gi].nodes.push(node);
        }

        let Some(&gi) = graph_index.get(&graph_key(upstream, &material)) else {
            continue;
        };
        let graph = &mut built.document.graphs[gi];
        let output_name = format!("{}_output", cname);
        let upstream_name = path_name(upstream).to_string();
        let ty = graph
            .node(&upstream_name)
            .map(|n| n.ty.clone())
            .unwrap_or_default();
        if !graph.outputs.iter().any(|o| o.name == output_name) {
            graph.outputs.push(GraphOutput {
                name: output_name.clone(),
                ty: ty.clone(),
                node_name: upstream_name,
                output: (!conn.upstream_output.is_empty()).then(|| conn.upstream_output.clone()),
            });
        }
        shader_inputs.push(DocInput {
            name: cname.clone(),
            ty: terminal_desc.input_types.get(cname).cloned().unwrap_or(ty),
            value: None,
            connected_node: None,
            output: Some(output_name),
            node_graph: Some(graph.name.clone()),
        });
    }

    if let Some(shader) = built.document.nodes.iter_mut().find(|n| n.name == shader_name) {
        for input in shader_inputs {
            shader.inputs.retain(|i| i.name != input.name);
            shader.inputs.push(input);
        }
    }

    built
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{InputConnection, MaterialNetwork};

    fn textured_network() -> MaterialNetwork {
        let mut net = MaterialNetwork::new("/Materials/Mat");
        net.set_node_type("/Materials/Mat/SR", "ND_standard_surface_surfaceshader");
        net.set_node_type("/Materials/Mat/NG/img", "ND_image_color3");
        net.set_parameter_value("/Materials/Mat/NG/img", "file", ParamValue::asset("foo.png"));
        net.set_node_type("/Materials/Mat/NG/mult", "ND_multiply_color3");
        net.set_parameter_value(
            "/Materials/Mat/NG/mult",
            "in2",
            ParamValue::Value(serde_json::json!([0.5, 0.5, 0.5])),
        );
        net.set_input_connection(
            "/Materials/Mat/NG/mult",
            "in1",
            InputConnection::new("/Materials/Mat/NG/img", "out"),
        );
        net.set_input_connection(
            "/Materials/Mat/SR",
            "base_color",
            InputConnection::new("/Materials/Mat/NG/mult", "out"),
        );
        net
    }

    #[test]
    fn builds_graph_and_wrappers() {
        let net = textured_network();
        let registry = ShaderRegistry::load_default().unwrap();
        let stdlib = StdLibrary::default();
        let names = net.input_connection_names("/Materials/Mat/SR");
        let mut diag = Diagnostics::default();
        let built = build_document(&net, "/Materials/Mat/SR", &names, &stdlib, &registry, &mut diag);
        assert!(diag.is_empty());

        let doc = &built.document;
        assert!(doc.node("SR_Mat").is_some());
        assert!(doc.node("Mat").is_some());
        assert_eq!(doc.graphs.len(), 1);

        let graph = doc.node_graph("NG").unwrap();
        let mult = graph.node("mult").unwrap();
        assert_eq!(mult.category, "multiply");
        assert_eq!(mult.ty, "color3");
        let names: Vec<&str> = mult.inputs.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["in1", "in2"]);
        assert_eq!(
            mult.input("in1").and_then(|i| i.connected_node.as_deref()),
            Some("img")
        );
        assert_eq!(
            mult.input("in2").and_then(|i| i.value.clone()),
            Some(InputValue::Vector(vec![0.5, 0.5, 0.5]))
        );

        let img = graph.node("img").unwrap();
        assert_eq!(img.input("file").map(|i| i.ty.as_str()), Some("filename"));

        assert!(built.texture_node_paths.contains("/Materials/Mat/NG/img"));
        assert_eq!(
            built.texture_names.get("img").map(String::as_str),
            Some("/Materials/Mat/NG/img")
        );

        let sr = doc.node("SR_Mat").unwrap();
        let base = sr.input("base_color").unwrap();
        assert_eq!(base.node_graph.as_deref(), Some("NG"));
        assert_eq!(graph.outputs[0].node_name, "mult");
    }

    #[test]
    fn unknown_upstream_is_reported() {
        let mut net = textured_network();
        net.set_input_connection(
            "/Materials/Mat/NG/img",
            "texcoord",
            InputConnection::new("/Materials/Mat/NG/ghost", "out"),
        );
        let registry = ShaderRegistry::load_default().unwrap();
        let names = net.input_connection_names("/Materials/Mat/SR");
        let mut diag = Diagnostics::default();
        let built = build_document(
            &net,
            "/Materials/Mat/SR",
            &names,
            &StdLibrary::default(),
            &registry,
            &mut diag,
        );

        assert_eq!(diag.len(), 1);
        assert!(diag.messages()[0].contains("Unknown material node '/Materials/Mat/NG/ghost'"));
        let img = built.document.node_graph("NG").unwrap().node("img").unwrap();
        assert!(img.input("texcoord").is_none());
    }

    #[test]
    fn nodes_carry_declared_signatures() {
        let net = textured_network();
        let registry = ShaderRegistry::load_default().unwrap();
        let names = net.input_connection_names("/Materials/Mat/SR");
        let built = build_document(
            &net,
            "/Materials/Mat/SR",
            &names,
            &StdLibrary::default(),
            &registry,
            &mut Diagnostics::default(),
        );
        let graph = built.document.node_graph("NG").unwrap();
        let sig = graph.node("img").and_then(|n| n.signature.clone()).unwrap();
        let inputs: Vec<&str> = sig.inputs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            inputs,
            ["file", "layer", "default", "texcoord", "uaddressmode", "vaddressmode", "filtertype"]
        );
        let uaddress = sig.inputs.iter().find(|p| p.name == "uaddressmode").unwrap();
        assert_eq!(uaddress.default, Some(InputValue::String("periodic".into())));
        assert_eq!(sig.outputs.len(), 1);
        assert_eq!(sig.outputs[0].name, "out");
    }

    #[test]
    fn parses_declared_value_text() {
        assert_eq!(
            parse_value_text("0.5, 0.5, 1", "vector3"),
            Some(InputValue::Vector(vec![0.5, 0.5, 1.0]))
        );
        assert_eq!(parse_value_text("true", "boolean"), Some(InputValue::Boolean(true)));
        assert_eq!(parse_value_text("3", "integer"), Some(InputValue::Integer(3)));
        assert_eq!(parse_value_text("x", "float"), None);
    }

    #[test]
    fn graph_named_like_material_is_uniquified() {
        let mut net = MaterialNetwork::new("/Materials/Mat");
        net.set_node_type("/Materials/Mat/SR", "ND_standard_surface_surfaceshader");
        net.set_node_type("/Materials/Mat/c", "ND_constant_color3");
        net.set_input_connection(
            "/Materials/Mat/SR",
            "base_color",
            InputConnection::new("/Materials/Mat/c", "out"),
        );
        let registry = ShaderRegistry::load_default().unwrap();
        let names = net.input_connection_names("/Materials/Mat/SR");
        let built = build_document(
            &net,
            "/Materials/Mat/SR",
            &names,
            &StdLibrary::default(),
            &registry,
            &mut Diagnostics::default(),
        );
        assert_eq!(built.document.graphs.len(), 1);
        assert_eq!(built.document.graphs[0].name, "Mat2");
        assert!(built.document.graphs[0].node("c").is_some());
    }
}
