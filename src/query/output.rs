use std::io::IsTerminal;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::inject::InjectionOutcome;
use crate::query::scan::Candidate;
use crate::query::{InjectResult, Located, TrailResult};

fn relative<'p>(path: &'p Path, project_root: &Path) -> &'p Path {
    path.strip_prefix(project_root).unwrap_or(path)
}

fn location(located: &Located, project_root: &Path) -> String {
    format!("{}:{}", relative(&located.file, project_root).display(), located.line)
}

fn bold(s: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[1m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Trail output
// ---------------------------------------------------------------------------

/// Format and print provenance trails to stdout according to the selected output format.
pub fn format_trail_results(results: &[TrailResult], format: &OutputFormat, project_root: &Path) {
    match format {
        OutputFormat::Compact => {
            for r in results {
                println!(
                    "trail {} {}: {}",
                    location(&r.located, project_root),
                    r.located.text,
                    r.trail
                );
            }
            println!("{} expressions resolved", results.len());
        }

        OutputFormat::Table => {
            let use_color = std::io::stdout().is_terminal();
            for (i, r) in results.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!(
                    "{}",
                    bold(
                        &format!("{}  {}", location(&r.located, project_root), r.located.text),
                        use_color
                    )
                );

                let text_w = r
                    .trail
                    .iter()
                    .map(|e| e.text.len())
                    .max()
                    .unwrap_or(4)
                    .max(4);
                println!("  {:>3}  {:<text_w$}  {:<19}  {}", "#", "TEXT", "SOURCE", "FROM");
                println!("  {}", "-".repeat(text_w + 34));
                for (n, entry) in r.trail.iter().enumerate() {
                    let from = entry.parent.map(|p| p.to_string()).unwrap_or_default();
                    println!(
                        "  {:>3}  {:<text_w$}  {:<19}  {}",
                        n,
                        entry.text,
                        entry.source.to_string(),
                        from,
                    );
                }
            }
        }

        OutputFormat::Json => {
            let json_results: Vec<serde_json::Value> = results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "expr": r.located.text,
                        "file": relative(&r.located.file, project_root).to_string_lossy(),
                        "line": r.located.line,
                        "trail": r.trail,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json_results).unwrap_or_default()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Inject output
// ---------------------------------------------------------------------------

fn verification_line(r: &InjectResult) -> Option<String> {
    let verification = r.verification.as_ref()?;
    let leading: Vec<String> = verification
        .anchors
        .iter()
        .map(|a| match a.trail.leading() {
            Some(entry) => format!("{} {}", a.text, entry.source),
            None => a.text.clone(),
        })
        .collect();
    let verdict = if verification.is_idempotent() { "ok" } else { "FAILED" };
    Some(format!("verify {verdict}: {}", leading.join(", ")))
}

/// Format and print injection plans to stdout according to the selected output format.
pub fn format_injection_results(results: &[InjectResult], format: &OutputFormat, project_root: &Path) {
    match format {
        OutputFormat::Compact | OutputFormat::Table => {
            let use_color = matches!(format, OutputFormat::Table) && std::io::stdout().is_terminal();
            for (i, r) in results.iter().enumerate() {
                if i > 0 && matches!(format, OutputFormat::Table) {
                    println!();
                }
                let head = format!("inject {} {}", location(&r.located, project_root), r.located.text);
                match &r.outcome {
                    InjectionOutcome::Plan(plan) => {
                        println!("{} -> {} {}", bold(&head, use_color), plan.type_name, plan.parameter);
                        for step in &r.steps {
                            println!("  {step}");
                        }
                        if let Some(line) = verification_line(r) {
                            println!("  {line}");
                        }
                    }
                    InjectionOutcome::Unsupported { reason } => {
                        println!("{}: unsupported: {reason}", bold(&head, use_color));
                    }
                }
            }
        }

        OutputFormat::Json => {
            let json_results: Vec<serde_json::Value> = results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "expr": r.located.text,
                        "file": relative(&r.located.file, project_root).to_string_lossy(),
                        "line": r.located.line,
                        "outcome": r.outcome,
                        "steps": r.steps,
                        "verification": r.verification.as_ref().map(|v| serde_json::json!({
                            "idempotent": v.is_idempotent(),
                            "anchors": v.anchors,
                        })),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json_results).unwrap_or_default()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Scan output
// ---------------------------------------------------------------------------

/// Format and print injection candidates to stdout according to the selected output format.
pub fn format_scan_results(results: &[Candidate], format: &OutputFormat, project_root: &Path) {
    match format {
        OutputFormat::Compact => {
            for c in results {
                println!(
                    "prefer-inject {}:{} {} ({} edits)",
                    relative(&c.file, project_root).display(),
                    c.line,
                    c.text,
                    c.edits
                );
            }
            println!("{} candidates found", results.len());
        }

        OutputFormat::Table => {
            let use_color = std::io::stdout().is_terminal();

            let file_w = results
                .iter()
                .map(|c| relative(&c.file, project_root).to_string_lossy().len())
                .max()
                .unwrap_or(4)
                .max(4);
            let type_w = results
                .iter()
                .map(|c| c.type_name.len())
                .max()
                .unwrap_or(4)
                .max(4);

            let header = format!(
                "{:<file_w$}  {:>4}  {:<type_w$}  {:>5}  {}",
                "FILE", "LINE", "TYPE", "EDITS", "EXPRESSION",
            );
            println!("{}", bold(&header, use_color));
            println!("{}", "-".repeat(file_w + type_w + 30));

            for c in results {
                println!(
                    "{:<file_w$}  {:>4}  {:<type_w$}  {:>5}  {}",
                    relative(&c.file, project_root).display(),
                    c.line,
                    c.type_name,
                    c.edits,
                    c.text,
                );
            }
        }

        OutputFormat::Json => {
            let json_results: Vec<serde_json::Value> = results
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "expr": c.text,
                        "file": relative(&c.file, project_root).to_string_lossy(),
                        "line": c.line,
                        "type": c.type_name,
                        "edits": c.edits,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json_results).unwrap_or_default()
            );
        }
    }
}
