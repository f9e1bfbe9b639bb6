use std::collections::BTreeSet;

use mtlx_matfilt::{
    filter::prune_nodes,
    network::{InputConnection, MaterialNetwork, MaterialNetworkInterface},
};
use proptest::prelude::*;

const TERMINAL: &str = "/Mat/SR";

fn node_name(i: usize) -> String {
    format!("/Mat/NG/n{i}")
}

/// Random DAG: node `i` may read from any node `j > i`; the terminal reads
/// from the nodes flagged in `roots`.
fn build_network(n: usize, edges: &[(usize, usize)], roots: &[usize]) -> MaterialNetwork {
    let mut net = MaterialNetwork::new("/Mat");
    net.set_node_type(TERMINAL, "ND_standard_surface_surfaceshader");
    for i in 0..n {
        net.set_node_type(&node_name(i), "ND_add_float");
    }
    for (k, &(a, b)) in edges.iter().enumerate() {
        let (down, up) = (a.min(b) % n, a.max(b) % n);
        if down == up {
            continue;
        }
        net.set_input_connection(
            &node_name(down),
            &format!("in{k}"),
            InputConnection::new(node_name(up), "out"),
        );
    }
    for (k, &r) in roots.iter().enumerate() {
        net.set_input_connection(
            TERMINAL,
            &format!("input{k}"),
            InputConnection::new(node_name(r % n), "out"),
        );
    }
    net
}

fn to_names(n: usize, idx: &[usize]) -> BTreeSet<String> {
    idx.iter().map(|i| node_name(i % n)).collect()
}

fn assert_no_dangling(net: &MaterialNetwork) {
    for (name, node) in &net.nodes {
        for conn in node.input_connections.values() {
            assert!(
                net.has_node(&conn.upstream_node),
                "{name} references deleted node {}",
                conn.upstream_node
            );
        }
    }
}

proptest! {
    #[test]
    fn pruning_is_idempotent_and_keeps_first_level_nodes(
        n in 1usize..12,
        edges in proptest::collection::vec((0usize..12, 0usize..12), 0..24),
        roots in proptest::collection::vec(0usize..12, 0..4),
        candidates in proptest::collection::vec(0usize..12, 0..12),
        keep in proptest::collection::vec(0usize..12, 0..4),
        cut in proptest::collection::vec(0usize..24, 0..6),
    ) {
        let mut net = build_network(n, &edges, &roots);
        // Cut some connections the way the rewrite strips converted nodes.
        for k in cut {
            for i in 0..n {
                net.delete_input_connection(&node_name(i), &format!("in{k}"));
            }
        }
        let candidates = to_names(n, &candidates);
        let keep = to_names(n, &keep);

        let first = prune_nodes(&mut net, TERMINAL, &candidates, &keep);
        let once = net.clone();
        let second = prune_nodes(&mut net, TERMINAL, &candidates, &keep);

        prop_assert!(second.is_empty());
        prop_assert_eq!(&net, &once);
        for k in &keep {
            prop_assert!(net.has_node(k));
            prop_assert!(!first.contains(k));
        }
        for p in &first {
            prop_assert!(candidates.contains(p));
        }
        assert_no_dangling(&net);
    }
}

#[test]
fn keep_wins_over_remove() {
    let mut net = build_network(3, &[(0, 1), (1, 2)], &[0]);
    net.delete_input_connection(&node_name(0), "in0");

    let candidates = to_names(3, &[1, 2]);
    let keep = to_names(3, &[2]);
    let pruned = prune_nodes(&mut net, TERMINAL, &candidates, &keep);

    assert_eq!(pruned, vec![node_name(1)]);
    assert!(net.has_node(&node_name(2)));
    assert!(net.has_node(&node_name(0)));
}
