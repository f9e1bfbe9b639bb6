//! Filter configuration read from the environment.

use std::path::PathBuf;

pub const ENV_STDLIB_SEARCH_PATHS: &str = "PXR_MTLX_STDLIB_SEARCH_PATHS";
pub const ENV_PLUGIN_SEARCH_PATHS: &str = "PXR_MTLX_PLUGIN_SEARCH_PATHS";
pub const ENV_OSLC: &str = "OSLC";

/// Texture format the renderer loads natively; anything else goes through
/// the image plugin.
pub const NATIVE_TEXTURE_EXTENSION: &str = "tex";
pub const TEXTURE_PLUGIN_BASENAME: &str = "RtxHioImage";

#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// MaterialX library search paths, in priority order.
    pub search_paths: Vec<PathBuf>,
    /// OSL compiler executable.
    pub oslc: PathBuf,
    /// Directory compiled artifacts are written to.
    pub artifact_dir: PathBuf,
    pub native_texture_extension: String,
    /// Texture plugin library file name, e.g. `RtxHioImage.so`.
    pub texture_plugin: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            oslc: PathBuf::from("oslc"),
            artifact_dir: std::env::temp_dir(),
            native_texture_extension: NATIVE_TEXTURE_EXTENSION.to_string(),
            texture_plugin: format!("{TEXTURE_PLUGIN_BASENAME}{}", std::env::consts::DLL_SUFFIX),
        }
    }
}

impl FilterConfig {
    /// Stdlib paths come first, then plugin paths.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        for var in [ENV_STDLIB_SEARCH_PATHS, ENV_PLUGIN_SEARCH_PATHS] {
            if let Some(value) = std::env::var_os(var) {
                config.search_paths.extend(
                    std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()),
                );
            }
        }
        if let Some(oslc) = std::env::var_os(ENV_OSLC) {
            if !oslc.is_empty() {
                config.oslc = PathBuf::from(oslc);
            }
        }
        config
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }
}
