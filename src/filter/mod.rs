//! Rewrite of a MaterialX material network into compiled OSL shader nodes
//! feeding a native surface closure.

mod network_update;
mod pipeline;
mod terminal;
mod texture_nodes;
mod types;

pub use network_update::{gather_upstream_nodes, prune_nodes, update_network, updated_input_name};
pub use pipeline::{matfilt_materialx, matfilt_network};
pub use terminal::{PXR_SURFACE, adapter_node_type, transform_terminal_node};
pub use texture_nodes::{WrapMode, plugin_uri, update_texture_nodes, wrap_modes};
pub use types::{FilterContext, FilterReport, RewriteSummary};
