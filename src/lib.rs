pub mod asset;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod filter;
pub mod graph;
pub mod network;
pub mod oso;
pub mod registry;
pub mod stdlib;

pub use filter::{FilterContext, FilterReport, matfilt_materialx, matfilt_network};
