use std::collections::HashSet;

use crate::network::MaterialNetworkInterface;

/// Every node reachable upstream of `roots` through input connections,
/// the roots included. References to missing nodes are not followed.
pub fn upstream_reachable(network: &dyn MaterialNetworkInterface, roots: &[String]) -> HashSet<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = roots.to_vec();
    while let Some(n) = stack.pop() {
        if !visited.insert(n.clone()) {
            continue;
        }
        for input in network.input_connection_names(&n) {
            let Some(conn) = network.input_connection(&n, &input) else {
                continue;
            };
            if network.has_node(&conn.upstream_node) && !visited.contains(&conn.upstream_node) {
                stack.push(conn.upstream_node);
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{InputConnection, MaterialNetwork};

    #[test]
    fn follows_connections_and_skips_missing_nodes() {
        let mut net = MaterialNetwork::new("/M");
        for n in ["/M/t", "/M/a", "/M/b", "/M/island"] {
            net.set_node_type(n, "ND_add_float");
        }
        net.set_input_connection("/M/t", "x", InputConnection::new("/M/a", "out"));
        net.set_input_connection("/M/a", "in1", InputConnection::new("/M/b", "out"));
        net.set_input_connection("/M/a", "in2", InputConnection::new("/M/ghost", "out"));
        net.set_input_connection("/M/b", "in1", InputConnection::new("/M/a", "out"));

        let reach = upstream_reachable(&net, &["/M/t".to_string()]);
        assert_eq!(reach.len(), 3);
        assert!(reach.contains("/M/b"));
        assert!(!reach.contains("/M/ghost"));
        assert!(!reach.contains("/M/island"));

        let reach = upstream_reachable(&net, &["/M/island".to_string(), "/M/b".to_string()]);
        assert_eq!(reach.len(), 3);
        assert!(!reach.contains("/M/t"));
    }
}
