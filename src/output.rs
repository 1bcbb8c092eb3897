use serde::Serialize;

use crate::parser::ParseStats;
use crate::semantic::ModelStats;

/// Aggregate statistics produced by an indexing run.
#[derive(Debug, Serialize)]
pub struct IndexStats {
    pub file_count: usize,
    #[serde(flatten)]
    pub parse: ParseStats,
    #[serde(flatten)]
    pub model: ModelStats,
    /// Wall-clock time for the indexing run in seconds.
    pub elapsed_secs: f64,
}

/// Print a summary of the indexing run.
///
/// - `json = true`: emit a pretty-printed JSON object to stdout.
/// - `json = false`: emit a cargo-style human-readable summary to stdout.
///
/// Skipped files and files with syntax errors are reported on **stderr** so
/// that the stdout stream remains clean for downstream JSON consumers.
pub fn print_summary(stats: &IndexStats, json: bool) {
    if json {
        match serde_json::to_string_pretty(stats) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("error serialising stats: {}", e),
        }
        return;
    }

    println!(
        "Indexed {} files in {:.2}s",
        stats.file_count, stats.elapsed_secs
    );
    println!(
        "  {} types, {} members, {} expressions",
        stats.model.types, stats.model.members, stats.model.expressions,
    );
    println!(
        "  {} bound expressions, {} call sites, {} member writes",
        stats.model.bound, stats.model.call_sites, stats.model.assignments,
    );

    if stats.parse.skipped > 0 {
        eprintln!("  {} files skipped (unreadable)", stats.parse.skipped);
    }
    if stats.parse.with_errors > 0 {
        eprintln!("  {} files parsed with syntax errors", stats.parse.with_errors);
    }
}
