//! In-memory MaterialX-style shading document.
//!
//! A document holds top-level nodes (the material and its surface shader)
//! and node graphs. Node graph names are uniquified against the document's
//! other children when created, so callers must not assume a graph carries
//! the name they asked for (see `find_graph_index`).

mod builder;
mod locate;

pub use builder::{
    BuiltDocument, build_document, material_name, registry_signature, shader_node_name,
};
pub use locate::{find_graph_and_node, find_graph_index};

/// Literal value of a document input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    String(String),
    Float(f32),
    Integer(i64),
    Boolean(bool),
    Vector(Vec<f32>),
}

impl InputValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            InputValue::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocInput {
    pub name: String,
    pub ty: String,
    pub value: Option<InputValue>,
    /// Name of the node (in the same graph) feeding this input.
    pub connected_node: Option<String>,
    /// Output of the connected node, when it is not the default one.
    pub output: Option<String>,
    /// Node graph feeding this input (top-level nodes only).
    pub node_graph: Option<String>,
}

/// Named, typed port of a node definition.
#[derive(Debug, Clone, PartialEq)]
pub struct DocPort {
    pub name: String,
    pub ty: String,
    /// Value used when the input is neither connected nor authored.
    pub default: Option<InputValue>,
}

impl DocPort {
    pub fn new(name: &str, ty: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
            default: None,
        }
    }
}

/// Inputs and outputs declared by a node's definition, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSignature {
    pub inputs: Vec<DocPort>,
    pub outputs: Vec<DocPort>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocNode {
    pub name: String,
    pub category: String,
    pub ty: String,
    pub node_def: Option<String>,
    pub inputs: Vec<DocInput>,
    /// Declared ports, when the node definition is known.
    pub signature: Option<NodeSignature>,
}

impl DocNode {
    pub fn new(category: &str, name: &str, ty: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            ty: ty.to_string(),
            node_def: None,
            inputs: Vec::new(),
            signature: None,
        }
    }

    pub fn input(&self, name: &str) -> Option<&DocInput> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut DocInput> {
        self.inputs.iter_mut().find(|i| i.name == name)
    }

    /// Add an input, replacing any existing input of the same name.
    pub fn add_input(&mut self, name: &str, ty: &str) -> &mut DocInput {
        self.inputs.retain(|i| i.name != name);
        self.inputs.push(DocInput {
            name: name.to_string(),
            ty: ty.to_string(),
            ..Default::default()
        });
        let last = self.inputs.len() - 1;
        &mut self.inputs[last]
    }

    /// Set a literal value on an input, creating it when missing.
    pub fn set_input_value(&mut self, name: &str, value: InputValue, ty: &str) {
        if let Some(input) = self.input_mut(name) {
            input.value = Some(value);
            input.ty = ty.to_string();
            return;
        }
        self.add_input(name, ty).value = Some(value);
    }

    pub fn set_node_def(&mut self, node_def: &str) {
        self.node_def = Some(node_def.to_string());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphOutput {
    pub name: String,
    pub ty: String,
    pub node_name: String,
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeGraph {
    pub name: String,
    pub nodes: Vec<DocNode>,
    pub outputs: Vec<GraphOutput>,
}

impl NodeGraph {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn node(&self, name: &str) -> Option<&DocNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut DocNode> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    /// Add a node, replacing any existing node of the same name.
    pub fn add_node(&mut self, category: &str, name: &str, ty: &str) -> &mut DocNode {
        self.nodes.retain(|n| n.name != name);
        self.nodes.push(DocNode::new(category, name, ty));
        let last = self.nodes.len() - 1;
        &mut self.nodes[last]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadingDocument {
    pub nodes: Vec<DocNode>,
    pub graphs: Vec<NodeGraph>,
}

impl ShadingDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, name: &str) -> Option<&DocNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn add_node(&mut self, category: &str, name: &str, ty: &str) -> &mut DocNode {
        self.nodes.retain(|n| n.name != name);
        self.nodes.push(DocNode::new(category, name, ty));
        let last = self.nodes.len() - 1;
        &mut self.nodes[last]
    }

    /// Remove a top-level node. Returns whether a node was removed.
    pub fn remove_node(&mut self, name: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.name != name);
        self.nodes.len() != before
    }

    pub fn node_graph(&self, name: &str) -> Option<&NodeGraph> {
        self.graphs.iter().find(|g| g.name == name)
    }

    pub fn node_graph_mut(&mut self, name: &str) -> Option<&mut NodeGraph> {
        self.graphs.iter_mut().find(|g| g.name == name)
    }

    pub fn node_graphs(&self) -> &[NodeGraph] {
        &self.graphs
    }

    fn has_child(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n.name == name) || self.graphs.iter().any(|g| g.name == name)
    }

    /// Make `name` a valid, unused child name: invalid characters become
    /// `_`, and a numeric suffix is appended on collision.
    pub fn create_valid_child_name(&self, name: &str) -> String {
        let mut base: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
            base.insert(0, '_');
        }
        if !self.has_child(&base) {
            return base;
        }
        // Strip an existing numeric suffix before counting up, like MaterialX does.
        let stem = base.trim_end_matches(|c: char| c.is_ascii_digit()).to_string();
        let mut i = 2usize;
        loop {
            let candidate = format!("{stem}{i}");
            if !self.has_child(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    /// Create a node graph under a valid unique name; returns its index.
    pub fn add_node_graph(&mut self, name: &str) -> usize {
        let name = self.create_valid_child_name(name);
        self.graphs.push(NodeGraph::new(&name));
        self.graphs.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_names_are_uniquified() {
        let mut doc = ShadingDocument::new();
        doc.add_node("surfacematerial", "Mat", "material");
        let a = doc.add_node_graph("Mat");
        let b = doc.add_node_graph("Mat");
        assert_eq!(doc.graphs[a].name, "Mat2");
        assert_eq!(doc.graphs[b].name, "Mat3");
        assert_eq!(doc.create_valid_child_name("my graph"), "my_graph");
    }

    #[test]
    fn set_input_value_creates_or_updates() {
        let mut node = DocNode::new("image", "img", "color3");
        node.set_input_value("file", InputValue::String("a.png".into()), "filename");
        node.set_input_value("file", InputValue::String("b.png".into()), "filename");
        assert_eq!(node.inputs.len(), 1);
        assert_eq!(
            node.input("file").and_then(|i| i.value.as_ref()).and_then(InputValue::as_str),
            Some("b.png")
        );
    }

    #[test]
    fn remove_top_level_node() {
        let mut doc = ShadingDocument::new();
        doc.add_node("standard_surface", "SR_Mat", "surfaceshader");
        assert!(doc.remove_node("SR_Mat"));
        assert!(!doc.remove_node("SR_Mat"));
    }
}
