use super::{DocNode, NodeGraph, ShadingDocument};

/// Index of the graph holding `node_name`.
///
/// Graph names are uniquified when the document is built, so the hint may
/// name a different graph or none at all. Search order: the hinted graph,
/// then the most recently created graph, then every graph in declaration
/// order. The first match wins.
pub fn find_graph_index(document: &ShadingDocument, graph_hint: &str, node_name: &str) -> Option<usize> {
    let graphs = document.node_graphs();

    if let Some(i) = graphs.iter().position(|g| g.name == graph_hint) {
        if graphs[i].node(node_name).is_some() {
            return Some(i);
        }
    }

    if let Some(last) = graphs.len().checked_sub(1) {
        if graphs[last].node(node_name).is_some() {
            return Some(last);
        }
    }

    graphs.iter().position(|g| g.node(node_name).is_some())
}

pub fn find_graph_and_node<'a>(
    document: &'a ShadingDocument,
    graph_hint: &str,
    node_name: &str,
) -> Option<(&'a NodeGraph, &'a DocNode)> {
    let graph = &document.graphs[find_graph_index(document, graph_hint, node_name)?];
    let node = graph.node(node_name)?;
    Some((graph, node))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with(graphs: &[(&str, &[&str])]) -> ShadingDocument {
        let mut doc = ShadingDocument::new();
        for (name, nodes) in graphs {
            let mut g = NodeGraph::new(name);
            for n in *nodes {
                g.add_node("constant", n, "float");
            }
            doc.graphs.push(g);
        }
        doc
    }

    #[test]
    fn hinted_graph_wins() {
        let doc = doc_with(&[("A", &["n"]), ("B", &["n"]), ("C", &["n"])]);
        assert_eq!(find_graph_index(&doc, "A", "n"), Some(0));
        assert_eq!(find_graph_index(&doc, "B", "n"), Some(1));
    }

    #[test]
    fn stale_hint_falls_back_to_last_graph() {
        let doc = doc_with(&[("A", &["n"]), ("B", &["x"]), ("C", &["n"])]);
        assert_eq!(find_graph_index(&doc, "Missing", "n"), Some(2));
        // Hinted graph exists but lacks the node.
        assert_eq!(find_graph_index(&doc, "B", "n"), Some(2));
    }

    #[test]
    fn full_scan_in_declaration_order() {
        let doc = doc_with(&[("A", &["x"]), ("B", &["n"]), ("C", &["n"]), ("D", &["y"])]);
        assert_eq!(find_graph_index(&doc, "Missing", "n"), Some(1));
        let (graph, node) = find_graph_and_node(&doc, "Missing", "n").unwrap();
        assert_eq!(graph.name, "B");
        assert_eq!(node.name, "n");
    }

    #[test]
    fn not_found() {
        let doc = doc_with(&[("A", &["x"])]);
        assert!(find_graph_and_node(&doc, "A", "n").is_none());
        assert!(find_graph_index(&ShadingDocument::new(), "A", "n").is_none());
    }
}
