//! Replace the nodes feeding the terminal with compiled OSL shader nodes.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::{
    codegen::generate_shader_code,
    diagnostics::Diagnostics,
    document::ShadingDocument,
    graph::upstream_reachable,
    network::{InputConnection, MaterialNetworkInterface, parent_path_name, path_name},
    registry::{SOURCE_TYPE_MTLX, SOURCE_TYPE_OSL, ShaderEntry},
};

use super::{FilterContext, RewriteSummary};

/// Terminal inputs whose names are reserved words in the adapter shaders.
const RESERVED_INPUT_NAMES: &[(&str, &str)] = &[
    ("emission", "emission_value"),
    ("subsurface", "subsurface_value"),
    ("normal", "input_normal"),
];

/// Adapter-side name for a reserved input name, `None` for any other name.
pub fn updated_input_name(name: &str) -> Option<&'static str> {
    RESERVED_INPUT_NAMES
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
}

/// Collect every node upstream of `node` into `nodes`, skipping nodes
/// already in `visited`.
pub fn gather_upstream_nodes(
    network: &dyn MaterialNetworkInterface,
    node: &str,
    nodes: &mut BTreeSet<String>,
    visited: &mut HashSet<String>,
    diag: &mut Diagnostics,
) {
    let mut stack: Vec<String> = vec![node.to_string()];
    while let Some(current) = stack.pop() {
        for input in network.input_connection_names(&current) {
            let Some(conn) = network.input_connection(&current, &input) else {
                continue;
            };
            let upstream = conn.upstream_node;
            if !network.has_node(&upstream) {
                diag.warn(format!("Unknown material node '{upstream}'"));
                continue;
            }
            if !visited.insert(upstream.clone()) {
                continue;
            }
            nodes.insert(upstream.clone());
            stack.push(upstream);
        }
    }
}

/// Connect `input` of the terminal to `connection`, moving it to the
/// adapter-side name when `input` is reserved.
fn connect_terminal_input(
    network: &mut dyn MaterialNetworkInterface,
    terminal: &str,
    input: &str,
    connection: InputConnection,
) {
    match updated_input_name(input) {
        Some(renamed) => {
            network.set_input_connection(terminal, renamed, connection);
            network.delete_input_connection(terminal, input);
        }
        None => network.set_input_connection(terminal, input, connection),
    }
}

/// Point terminal input `input` at the converted node's output, or drop the
/// connection when the compiled shader has no such output.
fn bind_converted_output(
    network: &mut dyn MaterialNetworkInterface,
    terminal: &str,
    input: &str,
    connection: InputConnection,
    entry: &ShaderEntry,
    diag: &mut Diagnostics,
) {
    if entry.has_output(&connection.upstream_output) {
        connect_terminal_input(network, terminal, input, connection);
    } else {
        diag.warn(format!(
            "Output '{}' not found on node '{}'.",
            connection.upstream_output, connection.upstream_node
        ));
        network.delete_input_connection(terminal, input);
    }
}

fn strip_node(network: &mut dyn MaterialNetworkInterface, node: &str) {
    for input in network.input_connection_names(node) {
        network.delete_input_connection(node, &input);
    }
    for param in network.authored_parameter_names(node) {
        network.delete_parameter(node, &param);
    }
}

/// Delete the `candidates` that are not in `keep` and no longer feed the
/// terminal or any node that survives pruning. Returns the deleted names.
///
/// A candidate still referenced by a surviving node is left alone, so
/// pruning never leaves a dangling connection and running it twice is the
/// same as running it once.
pub fn prune_nodes(
    network: &mut dyn MaterialNetworkInterface,
    terminal: &str,
    candidates: &BTreeSet<String>,
    keep: &BTreeSet<String>,
) -> Vec<String> {
    let mut roots: Vec<String> = network
        .node_names()
        .into_iter()
        .filter(|n| !candidates.contains(n) || keep.contains(n))
        .collect();
    roots.push(terminal.to_string());
    let live = upstream_reachable(network, &roots);

    let mut pruned = Vec::new();
    for node in candidates {
        if live.contains(node) || !network.has_node(node) {
            continue;
        }
        network.delete_node(node);
        pruned.push(node.clone());
    }
    pruned
}

/// Rewrite the network feeding `terminal`.
///
/// Each node directly connected to the terminal becomes a compiled shader
/// node computing its whole upstream graph; nodes further upstream are then
/// pruned. A node shared by several terminal inputs is generated once.
pub fn update_network(
    network: &mut dyn MaterialNetworkInterface,
    terminal: &str,
    document: &ShadingDocument,
    ctx: &mut FilterContext,
) -> RewriteSummary {
    let mut summary = RewriteSummary::default();

    let mut keep: BTreeSet<String> = BTreeSet::new();
    let mut candidates: BTreeSet<String> = BTreeSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut converted: HashSet<String> = HashSet::new();

    for cname in network.input_connection_names(terminal) {
        let Some(conn) = network.input_connection(terminal, &cname) else {
            continue;
        };
        let upstream = conn.upstream_node.clone();

        if !network.has_node(&upstream) {
            ctx.diag
                .warn(format!("Unknown material node '{upstream}'"));
            continue;
        }

        if keep.contains(&upstream) {
            if !converted.contains(&upstream) {
                continue;
            }
            let Some(entry) = network
                .node_type(&upstream)
                .and_then(|t| ctx.registry.by_identifier(&t))
            else {
                continue;
            };
            bind_converted_output(network, terminal, &cname, conn, &entry, &mut ctx.diag);
            continue;
        }

        keep.insert(upstream.clone());
        visited.insert(upstream.clone());
        summary.first_level.push(upstream.clone());
        gather_upstream_nodes(network, &upstream, &mut candidates, &mut visited, &mut ctx.diag);

        let node_name = path_name(&upstream);
        let graph_name = parent_path_name(&upstream);
        let shader_name = format!("{node_name}Shader");

        let Some(source) = generate_shader_code(
            document,
            &ctx.config.search_paths,
            &shader_name,
            node_name,
            graph_name,
            &mut ctx.diag,
        ) else {
            continue;
        };
        summary.shaders_generated += 1;

        let Some(artifact) =
            ctx.compiler
                .compile(&shader_name, &source, &ctx.config.search_paths, &mut ctx.diag)
        else {
            continue;
        };
        summary.shaders_compiled += 1;

        let entry = match ctx.registry.register_from_asset(
            &artifact,
            BTreeMap::new(),
            SOURCE_TYPE_MTLX,
            SOURCE_TYPE_OSL,
        ) {
            Ok(entry) => entry,
            Err(e) => {
                ctx.diag.warn(format!(
                    "Unable to register compiled shader for node '{upstream}': {e:#}"
                ));
                continue;
            }
        };

        network.set_node_type(&upstream, &entry.identifier);
        converted.insert(upstream.clone());
        summary.converted.push(upstream.clone());

        bind_converted_output(network, terminal, &cname, conn, &entry, &mut ctx.diag);
        strip_node(network, &upstream);
    }

    summary.pruned = prune_nodes(network, terminal, &candidates, &keep);
    summary
}
