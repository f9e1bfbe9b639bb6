use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use mtlx_matfilt::{
    FilterContext,
    asset::FsAssetResolver,
    compiler::default_compiler,
    config::FilterConfig,
    matfilt_network,
    network::load_network_from_path,
    registry::ShaderRegistry,
};

#[derive(Debug, Default, Clone)]
struct Cli {
    network: Option<PathBuf>,
    output: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
    registry: Option<PathBuf>,
    asset_root: Option<PathBuf>,
}

const USAGE: &str = "--network <in.json> [--output <out.json>] [--search-path <dir>]... [--registry <extra.json>] [--asset-root <dir>]";

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || {
            args.get(i + 1)
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("missing value for {flag}"))
        };
        match flag {
            "--network" => cli.network = Some(value()?),
            "--output" | "-o" => cli.output = Some(value()?),
            "--search-path" => cli.search_paths.push(value()?),
            "--registry" => cli.registry = Some(value()?),
            "--asset-root" => cli.asset_root = Some(value()?),
            other => {
                return Err(anyhow!("unknown argument: {other} (usage: {USAGE})"));
            }
        }
        i += 2;
    }
    Ok(cli)
}

fn run(cli: Cli) -> Result<()> {
    let network_path = cli
        .network
        .ok_or_else(|| anyhow!("--network is required (usage: {USAGE})"))?;

    let mut config = FilterConfig::from_env();
    for path in cli.search_paths {
        config = config.with_search_path(path);
    }

    let registry = ShaderRegistry::load_default()?;
    if let Some(extra) = cli.registry.as_deref() {
        let count = registry.merge_json_file(extra)?;
        log::info!("merged {count} shader entries from {}", extra.display());
    }

    let asset_root = cli.asset_root.or_else(|| {
        network_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    });
    let resolver = match asset_root {
        Some(root) => FsAssetResolver::with_root(root),
        None => FsAssetResolver::new(),
    };
    let compiler = default_compiler(&config);

    let mut network = load_network_from_path(&network_path)?;
    let material_path = network.material_path.clone();

    let mut ctx = FilterContext::new(&registry, &config, compiler.as_ref(), &resolver);
    let report = matfilt_network(&material_path, &mut network, &mut ctx);
    eprintln!(
        "[matfilt] {}: {} shader(s) compiled, {} node(s) pruned, {} warning(s)",
        report.material_path,
        report.shaders_compiled,
        report.nodes_pruned,
        report.warnings.len()
    );

    let text = serde_json::to_string_pretty(&network).context("failed to serialize network")?;
    match cli.output {
        Some(out) => std::fs::write(&out, text)
            .with_context(|| format!("failed to write network json to {}", out.display()))?,
        None => println!("{text}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;
    run(cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_repeated_search_paths() {
        let cli = parse_cli(&args(&[
            "--network",
            "in.json",
            "--search-path",
            "/a",
            "--search-path",
            "/b",
            "-o",
            "out.json",
        ]))
        .unwrap();
        assert_eq!(cli.network, Some(PathBuf::from("in.json")));
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
        assert_eq!(cli.search_paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn rejects_unknown_and_incomplete_flags() {
        assert!(parse_cli(&args(&["--bogus"])).is_err());
        assert!(parse_cli(&args(&["--network"])).is_err());
    }
}
