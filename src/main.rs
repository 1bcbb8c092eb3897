mod cli;
mod config;
mod error;
mod inject;
mod output;
mod parser;
mod provenance;
mod query;
mod semantic;
mod syntax;
mod walker;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, info};

use cli::{Cli, Commands};
use config::ProvenanceConfig;
use output::{IndexStats, print_summary};
use provenance::{CancellationToken, ReachabilityAnalyzer, Resolver};
use query::output::{format_injection_results, format_scan_results, format_trail_results};
use query::scan::ScanOptions;
use query::{ExprQuery, Located, locate};
use semantic::{SemanticModel, SymbolOracle};
use walker::walk_project;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// Discover, parse and bind every source file under `path`.
fn load_model(path: &Path, config: &ProvenanceConfig) -> Result<(SemanticModel, parser::ParseStats, usize)> {
    let files = walk_project(path, config)?;
    info!("found {} source file(s) under {}", files.len(), path.display());
    let (comp, parse_stats) = parser::build_compilation(&files);
    Ok((SemanticModel::build(comp), parse_stats, files.len()))
}

fn locate_or_bail(model: &SemanticModel, query: &ExprQuery) -> Result<Vec<Located>> {
    let located = locate(model.compilation(), query)?;
    if located.is_empty() {
        anyhow::bail!("no expression matches `{}`", query.text);
    }
    Ok(located)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let cancel = CancellationToken::new();
    if let Some(secs) = cli.timeout_secs {
        cancel.cancel_after(Duration::from_secs(secs));
    }

    match cli.command {
        Commands::Index { path, json } => {
            let start = Instant::now();
            let config = ProvenanceConfig::load(&path);
            let (model, parse, file_count) = load_model(&path, &config)?;
            let stats = IndexStats {
                file_count,
                parse,
                model: model.stats(),
                elapsed_secs: start.elapsed().as_secs_f64(),
            };
            print_summary(&stats, json);
        }

        Commands::Trail {
            path,
            query: expr,
            format,
        } => {
            let config = ProvenanceConfig::load(&path);
            let (model, _, _) = load_model(&path, &config)?;
            let located = locate_or_bail(&model, &expr.into())?;
            let reach = ReachabilityAnalyzer::new(&model);
            let resolver = Resolver::new(&model, &reach);
            let results = query::trails(&resolver, located, &cancel).context("trail resolution failed")?;
            format_trail_results(&results, &format, &path);
        }

        Commands::Inject {
            path,
            query: expr,
            verify,
            field_prefix,
            format,
        } => {
            let config = ProvenanceConfig::load(&path);
            let field_prefix = field_prefix.unwrap_or(config.naming.field_prefix);
            let (model, _, _) = load_model(&path, &config)?;
            let located = locate_or_bail(&model, &expr.into())?;
            let reach = ReachabilityAnalyzer::new(&model);
            let resolver = Resolver::new(&model, &reach);
            let results = query::injections(&resolver, located, field_prefix, verify, &cancel)
                .context("injection planning failed")?;
            format_injection_results(&results, &format, &path);
        }

        Commands::Scan {
            path,
            field_prefix,
            no_methods,
            format,
        } => {
            let config = ProvenanceConfig::load(&path);
            let options = ScanOptions {
                include_methods: config.scan.include_methods && !no_methods,
                field_prefix: field_prefix.unwrap_or(config.naming.field_prefix),
            };
            let (model, _, _) = load_model(&path, &config)?;
            let reach = ReachabilityAnalyzer::new(&model);
            let resolver = Resolver::new(&model, &reach);
            let results = query::scan::scan(&resolver, options, &cancel).context("scan failed")?;
            format_scan_results(&results, &format, &path);
        }
    }

    Ok(())
}
