use std::path::{Path, PathBuf};

/// Resolves authored asset paths to filesystem paths.
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, path: &str) -> String;

    /// Lowercase extension without the dot; empty when there is none.
    fn extension(&self, path: &str) -> String {
        Path::new(path)
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }
}

/// Anchors relative asset paths at a root directory. Absolute paths and
/// URIs pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct FsAssetResolver {
    root: Option<PathBuf>,
}

impl FsAssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl AssetResolver for FsAssetResolver {
    fn resolve(&self, path: &str) -> String {
        if path.is_empty() || path.contains("://") || Path::new(path).is_absolute() {
            return path.to_string();
        }
        match &self.root {
            Some(root) => root.join(path).to_string_lossy().into_owned(),
            None => path.to_string(),
        }
    }
}
