//! OSL shader generation for MaterialX document nodes.

pub mod osl;

use std::path::PathBuf;

use crate::{
    diagnostics::Diagnostics,
    document::{ShadingDocument, find_graph_and_node},
};

pub use osl::SHADER_OUTPUT;

#[derive(Debug, Clone, Default)]
pub struct GenOptions {
    /// Flip the V texture coordinate of image lookups in generated code.
    pub file_texture_vertical_flip: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GenContext {
    pub options: GenOptions,
    search_paths: Vec<PathBuf>,
}

impl GenContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_source_code_search_path(&mut self, paths: &[PathBuf]) {
        self.search_paths.extend(paths.iter().cloned());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

/// Generate OSL source computing `node_name` from the document.
///
/// Returns `None` (after a warning) when the graph or node cannot be found
/// or the node's computation cannot be expressed in OSL.
pub fn generate_shader_code(
    document: &ShadingDocument,
    search_paths: &[PathBuf],
    shader_name: &str,
    node_name: &str,
    graph_hint: &str,
    diag: &mut Diagnostics,
) -> Option<String> {
    let Some((graph, node)) = find_graph_and_node(document, graph_hint, node_name) else {
        if document.node_graph(graph_hint).is_none() {
            diag.warn(format!("NodeGraph '{graph_hint}' not found in the mxDoc."));
        } else {
            diag.warn(format!(
                "Node '{node_name}' not found in '{graph_hint}' nodeGraph."
            ));
        }
        return None;
    };

    // Texture orientation is handled when the texture nodes are rewritten.
    let mut ctx = GenContext::new();
    ctx.register_source_code_search_path(search_paths);
    ctx.options.file_texture_vertical_flip = false;

    log::debug!("Generate a MaterialX Osl shader for '{node_name}' node.");
    match osl::emit_shader(&ctx, shader_name, graph, node) {
        Ok(source) => Some(source),
        Err(e) => {
            diag.warn(format!(
                "Unable to create Shader for node '{node_name}': {e:#}"
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeGraph;

    fn doc() -> ShadingDocument {
        let mut doc = ShadingDocument::new();
        let mut g = NodeGraph::new("NG2");
        g.add_node("constant", "c", "color3")
            .set_input_value("value", crate::document::InputValue::Vector(vec![1.0, 0.0, 0.0]), "color3");
        doc.graphs.push(g);
        doc
    }

    #[test]
    fn generates_with_stale_hint() {
        let mut diag = Diagnostics::default();
        let src = generate_shader_code(&doc(), &[], "cShader", "c", "NG", &mut diag).unwrap();
        assert!(src.contains("shader cShader"));
        assert!(src.contains("mx_constant_color3(color(1.0, 0.0, 0.0), c_out)"));
        assert!(diag.is_empty());
    }

    #[test]
    fn missing_graph_or_node_warns() {
        let mut diag = Diagnostics::default();
        assert!(
            generate_shader_code(&ShadingDocument::new(), &[], "s", "c", "NG", &mut diag).is_none()
        );
        assert!(diag.messages()[0].contains("NodeGraph 'NG' not found"));

        // The hinted graph is stale and no other graph holds the node.
        let mut diag = Diagnostics::default();
        assert!(generate_shader_code(&doc(), &[], "s", "ghost", "NG", &mut diag).is_none());
        assert!(diag.messages()[0].contains("NodeGraph 'NG' not found"));

        let mut diag = Diagnostics::default();
        assert!(generate_shader_code(&doc(), &[], "s", "ghost", "NG2", &mut diag).is_none());
        assert!(diag.messages()[0].contains("Node 'ghost' not found in 'NG2' nodeGraph."));
    }

    #[test]
    fn generation_failure_warns() {
        let mut doc = ShadingDocument::new();
        let mut g = NodeGraph::new("NG");
        g.add_node("", "mystery", "float");
        doc.graphs.push(g);
        let mut diag = Diagnostics::default();
        assert!(generate_shader_code(&doc, &[], "s", "mystery", "NG", &mut diag).is_none());
        assert!(diag.messages()[0].contains("Unable to create Shader for node 'mystery'"));
    }
}
