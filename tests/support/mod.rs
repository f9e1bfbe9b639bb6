#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::Mutex,
};

use mtlx_matfilt::{
    FilterContext,
    asset::FsAssetResolver,
    compiler::{ShaderCompiler, unique_artifact_path},
    config::FilterConfig,
    diagnostics::Diagnostics,
    network::{InputConnection, MaterialNetwork, MaterialNetworkInterface, SURFACE_TERMINAL},
    registry::ShaderRegistry,
};

pub const MATERIAL: &str = "/Materials/Mat";
pub const TERMINAL: &str = "/Materials/Mat/SR";

/// Records every shader it is asked to compile and writes an `.oso`
/// declaring the shader's `output` parameters.
pub struct RecordingCompiler {
    dir: PathBuf,
    pub sources: Mutex<Vec<(String, String)>>,
}

impl RecordingCompiler {
    pub fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("mtlx-matfilt-it-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create artifact dir");
        Self {
            dir,
            sources: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.sources.lock().unwrap().len()
    }

    pub fn source_for(&self, shader: &str) -> String {
        self.sources
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == shader)
            .map(|(_, src)| src.clone())
            .unwrap_or_else(|| panic!("no shader named {shader} was compiled"))
    }
}

impl Drop for RecordingCompiler {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

impl ShaderCompiler for RecordingCompiler {
    fn compile(
        &self,
        name: &str,
        source: &str,
        _search_paths: &[PathBuf],
        _diag: &mut Diagnostics,
    ) -> Option<PathBuf> {
        self.sources
            .lock()
            .unwrap()
            .push((name.to_string(), source.to_string()));

        let mut oso = String::from("OpenShadingLanguage 1.00\n");
        for line in source.lines().map(str::trim) {
            if let Some(shader) = line.strip_prefix("shader ") {
                oso.push_str(&format!("shader {shader}\n"));
            } else if let Some(rest) = line.strip_prefix("output ") {
                let mut parts = rest.split_whitespace();
                if let (Some(ty), Some(param)) = (parts.next(), parts.next()) {
                    oso.push_str(&format!("oparam {ty} {param} 0\n"));
                }
            }
        }
        oso.push_str("code ___main___\nend\n");

        let path = unique_artifact_path(&self.dir, name, "oso");
        std::fs::write(&path, oso).ok()?;
        Some(path)
    }
}

pub struct Env {
    pub registry: ShaderRegistry,
    pub config: FilterConfig,
    pub compiler: RecordingCompiler,
    pub resolver: FsAssetResolver,
}

impl Env {
    pub fn new() -> Self {
        Self {
            registry: ShaderRegistry::load_default().expect("bundled registry"),
            config: FilterConfig::default(),
            compiler: RecordingCompiler::new(),
            resolver: FsAssetResolver::new(),
        }
    }

    pub fn context(&self) -> FilterContext<'_> {
        FilterContext::new(&self.registry, &self.config, &self.compiler, &self.resolver)
    }
}

/// Network with a standard surface terminal bound to the surface slot.
pub fn standard_surface_network() -> MaterialNetwork {
    let mut net = MaterialNetwork::new(MATERIAL);
    net.set_node_type(TERMINAL, "ND_standard_surface_surfaceshader");
    net.set_terminal_connection(SURFACE_TERMINAL, InputConnection::new(TERMINAL, "out"));
    net
}

pub fn out(node: &str) -> InputConnection {
    InputConnection::new(node, "out")
}
