//! Replace the MaterialX terminal with an adapter shader feeding PxrSurface.

use crate::{
    diagnostics::Diagnostics,
    network::{InputConnection, MaterialNetworkInterface, SURFACE_TERMINAL},
    registry::{SOURCE_TYPE_OSL, SOURCE_TYPE_RMAN_CPP},
};

use super::{FilterContext, updated_input_name};

pub const PXR_SURFACE: &str = "PxrSurface";

const STANDARD_SURFACE_ADAPTER: &str = "StandardSurfaceParameters";
const USD_PREVIEW_SURFACE_ADAPTER: &str = "UsdPreviewSurfaceParameters";

/// Adapter shader translating a MaterialX surface node's parameters into
/// PxrSurface inputs.
pub fn adapter_node_type(node_type: &str, diag: &mut Diagnostics) -> Option<&'static str> {
    match node_type {
        "ND_standard_surface_surfaceshader" => Some(STANDARD_SURFACE_ADAPTER),
        "ND_UsdPreviewSurface_surfaceshader" => Some(USD_PREVIEW_SURFACE_ADAPTER),
        _ => {
            diag.warn(format!("Unsupported Node Type '{node_type}'"));
            None
        }
    }
}

/// Retype `terminal` to its adapter and bind the surface terminal to a new
/// `<terminal>_PxrSurface` closure node fed by the adapter's outputs.
///
/// Returns false, leaving the network untouched, when the terminal type has
/// no adapter or the adapter or closure is not registered.
pub fn transform_terminal_node(
    network: &mut dyn MaterialNetworkInterface,
    terminal: &str,
    ctx: &mut FilterContext,
) -> bool {
    let terminal_type = network.node_type(terminal).unwrap_or_default();
    let Some(adapter_type) = adapter_node_type(&terminal_type, &mut ctx.diag) else {
        return false;
    };

    let Some(adapter) = ctx
        .registry
        .by_identifier_and_type(adapter_type, SOURCE_TYPE_OSL)
    else {
        ctx.diag
            .warn(format!("No sdrAdapter node of type '{adapter_type}'"));
        return false;
    };
    let Some(closure) = ctx
        .registry
        .by_identifier_and_type(PXR_SURFACE, SOURCE_TYPE_RMAN_CPP)
    else {
        ctx.diag
            .warn(format!("No shader node of type '{PXR_SURFACE}'"));
        return false;
    };

    network.set_node_type(terminal, adapter_type);

    if adapter_type != USD_PREVIEW_SURFACE_ADAPTER {
        // Matching input connections were moved by the network rewrite.
        for param in network.authored_parameter_names(terminal) {
            let Some(renamed) = updated_input_name(&param) else {
                continue;
            };
            if let Some(value) = network.parameter_value(terminal, &param) {
                network.set_parameter_value(terminal, renamed, value);
            }
            network.delete_parameter(terminal, &param);
        }
    }

    let closure_node = format!("{terminal}_{PXR_SURFACE}");
    network.set_node_type(&closure_node, PXR_SURFACE);

    for input in closure.input_names() {
        let adapter_output = format!("{input}Out");
        // Not every closure input has an adapter output.
        if adapter.has_output(&adapter_output) {
            network.set_input_connection(
                &closure_node,
                input,
                InputConnection::new(terminal, adapter_output),
            );
        }
    }

    network.set_terminal_connection(SURFACE_TERMINAL, InputConnection::new(closure_node, ""));
    true
}
