use serde::Serialize;

use crate::{
    asset::AssetResolver, compiler::ShaderCompiler, config::FilterConfig,
    diagnostics::Diagnostics, registry::ShaderRegistry,
};

/// Collaborators and collected warnings for one filter run.
pub struct FilterContext<'a> {
    pub registry: &'a ShaderRegistry,
    pub config: &'a FilterConfig,
    pub compiler: &'a dyn ShaderCompiler,
    pub resolver: &'a dyn AssetResolver,
    pub diag: Diagnostics,
}

impl<'a> FilterContext<'a> {
    pub fn new(
        registry: &'a ShaderRegistry,
        config: &'a FilterConfig,
        compiler: &'a dyn ShaderCompiler,
        resolver: &'a dyn AssetResolver,
    ) -> Self {
        Self {
            registry,
            config,
            compiler,
            resolver,
            diag: Diagnostics::default(),
        }
    }
}

/// Outcome of the network rewrite.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RewriteSummary {
    /// First-level nodes, in the order they were first visited.
    pub first_level: Vec<String>,
    /// First-level nodes now typed as a compiled shader.
    pub converted: Vec<String>,
    pub shaders_generated: usize,
    pub shaders_compiled: usize,
    pub pruned: Vec<String>,
}

/// What a filter run did to one network.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FilterReport {
    pub material_path: String,
    pub texture_nodes_updated: usize,
    pub shaders_generated: usize,
    pub shaders_compiled: usize,
    pub nodes_converted: usize,
    pub nodes_pruned: usize,
    pub terminal_transformed: bool,
    pub warnings: Vec<String>,
}
