use crate::{
    document::{BuiltDocument, build_document, material_name, shader_node_name},
    network::{MaterialNetwork, MaterialNetworkInterface, SURFACE_TERMINAL},
    registry::SOURCE_TYPE_MTLX,
    stdlib::StdLibrary,
};

use super::{
    FilterContext, FilterReport, transform_terminal_node, update_network, update_texture_nodes,
};

/// Convert a network whose surface terminal is a MaterialX node into
/// compiled OSL shader nodes feeding a PxrSurface closure.
///
/// Networks without a surface terminal, or whose terminal is not a
/// MaterialX node, are left untouched.
pub fn matfilt_materialx(
    network: Option<&mut dyn MaterialNetworkInterface>,
    ctx: &mut FilterContext,
) -> FilterReport {
    let mut report = FilterReport::default();
    let Some(network) = network else {
        return report;
    };
    report.material_path = network.material_prim_path().to_string();

    let Some(terminal) = network
        .terminal_connection(SURFACE_TERMINAL)
        .map(|c| c.upstream_node)
    else {
        return report;
    };
    let terminal_type = network.node_type(&terminal).unwrap_or_default();
    if ctx
        .registry
        .by_identifier_and_type(&terminal_type, SOURCE_TYPE_MTLX)
        .is_none()
    {
        return report;
    }

    let connection_names = network.input_connection_names(&terminal);
    if !connection_names.is_empty() {
        let stdlib = StdLibrary::load(&ctx.config.search_paths);
        log::debug!(
            "loaded {} MaterialX node definitions for '{}'",
            stdlib.len(),
            report.material_path
        );

        let BuiltDocument {
            mut document,
            texture_node_paths,
            ..
        } = build_document(
            &*network,
            &terminal,
            &connection_names,
            &stdlib,
            ctx.registry,
            &mut ctx.diag,
        );

        report.texture_nodes_updated =
            update_texture_nodes(&*network, &texture_node_paths, &mut document, ctx);

        // Only the node graphs are generated from.
        let material = material_name(network.material_prim_path());
        document.remove_node(&shader_node_name(&material));
        document.remove_node(&material);

        let summary = update_network(network, &terminal, &document, ctx);
        report.shaders_generated = summary.shaders_generated;
        report.shaders_compiled = summary.shaders_compiled;
        report.nodes_converted = summary.converted.len();
        report.nodes_pruned = summary.pruned.len();
    }

    report.terminal_transformed = transform_terminal_node(network, &terminal, ctx);
    report.warnings = std::mem::take(&mut ctx.diag).into_messages();
    report
}

/// Filter a concrete network owned by the material at `material_path`.
pub fn matfilt_network(
    material_path: &str,
    network: &mut MaterialNetwork,
    ctx: &mut FilterContext,
) -> FilterReport {
    if !material_path.is_empty() {
        network.material_path = material_path.to_string();
    }
    matfilt_materialx(Some(network), ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        filter::test_utils::TestEnv,
        network::{InputConnection, ParamValue},
    };

    #[test]
    fn absent_network_is_a_noop() {
        let env = TestEnv::new();
        let mut ctx = env.context();
        let report = matfilt_materialx(None, &mut ctx);
        assert!(report.warnings.is_empty());
        assert!(!report.terminal_transformed);
    }

    #[test]
    fn non_materialx_terminal_is_untouched() {
        let env = TestEnv::new();
        let mut ctx = env.context();
        let mut net = MaterialNetwork::new("/Mat");
        net.set_node_type("/Mat/Pxr", "PxrSurface");
        net.set_terminal_connection(SURFACE_TERMINAL, InputConnection::new("/Mat/Pxr", ""));
        let before = net.clone();
        let report = matfilt_network("/Mat", &mut net, &mut ctx);
        assert_eq!(net, before);
        assert!(!report.terminal_transformed);

        let mut net = MaterialNetwork::new("/Mat");
        net.set_node_type("/Mat/SR", "ND_standard_surface_surfaceshader");
        let before = net.clone();
        matfilt_network("/Mat", &mut net, &mut ctx);
        assert_eq!(net, before);
    }

    #[test]
    fn terminal_without_connections_only_transforms() {
        let env = TestEnv::new();
        let mut ctx = env.context();
        let mut net = MaterialNetwork::new("/Mat");
        net.set_node_type("/Mat/SR", "ND_standard_surface_surfaceshader");
        net.set_parameter_value("/Mat/SR", "subsurface", ParamValue::Value(serde_json::json!(0.2)));
        net.set_terminal_connection(SURFACE_TERMINAL, InputConnection::new("/Mat/SR", "out"));

        let report = matfilt_network("/Mat", &mut net, &mut ctx);
        assert!(report.terminal_transformed);
        assert_eq!(report.shaders_generated, 0);
        assert_eq!(env.compiler.calls(), 0);
        assert!(net.node("/Mat/SR").unwrap().parameters.contains_key("subsurface_value"));
        assert_eq!(
            net.terminal_connection(SURFACE_TERMINAL).map(|c| c.upstream_node),
            Some("/Mat/SR_PxrSurface".to_string())
        );
    }
}
