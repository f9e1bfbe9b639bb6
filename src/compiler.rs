//! Compilation of generated OSL source into `.oso` artifacts.

use std::path::{Path, PathBuf};

use crate::{config::FilterConfig, diagnostics::Diagnostics};

/// Compiles OSL source to a shader artifact.
///
/// Returns the artifact path, or `None` after recording a warning.
pub trait ShaderCompiler: Send + Sync {
    fn compile(
        &self,
        name: &str,
        source: &str,
        search_paths: &[PathBuf],
        diag: &mut Diagnostics,
    ) -> Option<PathBuf>;
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Unable to save compiled MaterialX Osl shader at '{}'", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to write MaterialX Osl source at '{}'", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to run Osl compiler '{}'", program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Osl compiler failed for '{name}': {stderr}")]
    Failed { name: String, stderr: String },
}

/// Used when OSL support is not built in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCompiler;

impl ShaderCompiler for NullCompiler {
    fn compile(
        &self,
        _name: &str,
        _source: &str,
        _search_paths: &[PathBuf],
        diag: &mut Diagnostics,
    ) -> Option<PathBuf> {
        diag.warn("Unable to compile MaterialX generated Osl shader, enable OSL support.");
        None
    }
}

/// `MX.<name>.<uuid>.<ext>` under `dir`; unique per call.
pub fn unique_artifact_path(dir: &Path, name: &str, ext: &str) -> PathBuf {
    dir.join(format!("MX.{name}.{}.{ext}", uuid::Uuid::new_v4()))
}

/// Include directories for the compiler: `<p>/stdlib/osl` when present,
/// otherwise `<p>` itself.
pub fn include_dirs(search_paths: &[PathBuf]) -> Vec<PathBuf> {
    search_paths
        .iter()
        .map(|p| {
            let osl = p.join("stdlib").join("osl");
            if osl.is_dir() { osl } else { p.clone() }
        })
        .collect()
}

/// Runs the external `oslc` binary.
#[cfg(feature = "oslc")]
#[derive(Debug, Clone)]
pub struct OslcCompiler {
    program: PathBuf,
    artifact_dir: PathBuf,
}

#[cfg(feature = "oslc")]
impl OslcCompiler {
    pub fn new(program: impl Into<PathBuf>, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            artifact_dir: artifact_dir.into(),
        }
    }

    pub fn try_compile(
        &self,
        name: &str,
        source: &str,
        search_paths: &[PathBuf],
    ) -> Result<PathBuf, CompileError> {
        let dest = unique_artifact_path(&self.artifact_dir, name, "oso");
        std::fs::File::create(&dest).map_err(|source| CompileError::Destination {
            path: dest.clone(),
            source,
        })?;

        let scratch = dest.with_extension("osl");
        std::fs::write(&scratch, source).map_err(|source| CompileError::Source {
            path: scratch.clone(),
            source,
        })?;

        let mut cmd = std::process::Command::new(&self.program);
        for dir in include_dirs(search_paths) {
            cmd.arg(format!("-I{}", dir.display()));
        }
        cmd.arg("-o").arg(&dest).arg(&scratch);

        let output = cmd.output();
        std::fs::remove_file(&scratch).ok();
        let output = match output {
            Ok(output) => output,
            Err(source) => {
                std::fs::remove_file(&dest).ok();
                return Err(CompileError::Launch {
                    program: self.program.clone(),
                    source,
                });
            }
        };
        if !output.status.success() {
            std::fs::remove_file(&dest).ok();
            return Err(CompileError::Failed {
                name: name.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(dest)
    }
}

#[cfg(feature = "oslc")]
impl ShaderCompiler for OslcCompiler {
    fn compile(
        &self,
        name: &str,
        source: &str,
        search_paths: &[PathBuf],
        diag: &mut Diagnostics,
    ) -> Option<PathBuf> {
        log::debug!("Generated Osl shader '{name}':\n{source}");
        match self.try_compile(name, source, search_paths) {
            Ok(path) => Some(path),
            Err(e) => {
                diag.warn(e.to_string());
                None
            }
        }
    }
}

#[cfg(feature = "oslc")]
pub fn default_compiler(config: &FilterConfig) -> Box<dyn ShaderCompiler> {
    Box::new(OslcCompiler::new(&config.oslc, &config.artifact_dir))
}

#[cfg(not(feature = "oslc"))]
pub fn default_compiler(_config: &FilterConfig) -> Box<dyn ShaderCompiler> {
    Box::new(NullCompiler)
}
