use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::RegexBuilder;

use crate::syntax::{Compilation, ExprId};

/// Which expressions a `trail`/`inject` command targets.
#[derive(Debug, Clone, Default)]
pub struct ExprQuery {
    /// Exact expression text, or a pattern when `regex` is set.
    pub text: String,
    pub regex: bool,
    /// Only files whose path ends with this suffix.
    pub file: Option<PathBuf>,
    /// 1-based line the expression starts on.
    pub line: Option<usize>,
}

/// A matched expression and where it is.
#[derive(Debug, Clone)]
pub struct Located {
    pub expr: ExprId,
    pub file: PathBuf,
    pub line: usize,
    pub text: String,
}

enum Matcher {
    Exact(String),
    Pattern(regex::Regex),
}

impl Matcher {
    fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Exact(expected) => text == expected,
            Matcher::Pattern(re) => re.is_match(text),
        }
    }
}

/// Find every expression matching `query`, in file then source order.
///
/// A pattern must match the whole expression text.
pub fn locate(comp: &Compilation, query: &ExprQuery) -> Result<Vec<Located>> {
    let matcher = if query.regex {
        let anchored = format!("^(?:{})$", query.text);
        let re = RegexBuilder::new(&anchored)
            .build()
            .with_context(|| format!("invalid expression pattern: {}", query.text))?;
        Matcher::Pattern(re)
    } else {
        Matcher::Exact(query.text.trim().to_owned())
    };

    let mut found: Vec<Located> = comp
        .expr_ids()
        .filter(|&e| {
            let expr = comp.expr(e);
            expr.parent.is_some()
                && matcher.matches(&expr.text)
                && query.line.is_none_or(|line| expr.span.line + 1 == line)
                && query
                    .file
                    .as_deref()
                    .is_none_or(|suffix| file_matches(&comp.file(expr.span.file).path, suffix))
        })
        .map(|e| {
            let expr = comp.expr(e);
            Located {
                expr: e,
                file: comp.file(expr.span.file).path.clone(),
                line: expr.span.line + 1,
                text: expr.text.clone(),
            }
        })
        .collect();
    found.sort_by_key(|l| {
        let span = comp.expr(l.expr).span;
        (span.file, span.start, l.expr)
    });
    Ok(found)
}

fn file_matches(path: &Path, suffix: &Path) -> bool {
    path.ends_with(suffix) || path.to_string_lossy().ends_with(&*suffix.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::compile_sources;

    fn comp() -> Compilation {
        compile_sources(&[
            "public class Foo\n{\n    public int M(int meh)\n    {\n        var x = meh;\n        return meh;\n    }\n}",
            "public class Bar\n{\n    public int N(int meh) => meh;\n}",
        ])
        .expect("parse")
    }

    fn query(text: &str) -> ExprQuery {
        ExprQuery {
            text: text.into(),
            ..ExprQuery::default()
        }
    }

    #[test]
    fn test_locates_exact_text_everywhere() {
        let found = locate(&comp(), &query("meh")).unwrap();
        let lines: Vec<(String, usize)> = found
            .iter()
            .map(|l| (l.file.display().to_string(), l.line))
            .collect();
        assert_eq!(
            lines,
            vec![
                ("File0.cs".to_string(), 5),
                ("File0.cs".to_string(), 6),
                ("File1.cs".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_file_and_line_filters() {
        let c = comp();
        let by_file = locate(
            &c,
            &ExprQuery {
                file: Some(PathBuf::from("File1.cs")),
                ..query("meh")
            },
        )
        .unwrap();
        assert_eq!(by_file.len(), 1);

        let by_line = locate(
            &c,
            &ExprQuery {
                line: Some(6),
                ..query("meh")
            },
        )
        .unwrap();
        assert_eq!(by_line.len(), 1);
        assert_eq!(by_line[0].file, PathBuf::from("File0.cs"));
    }

    #[test]
    fn test_regex_matches_whole_text() {
        let c = comp();
        let found = locate(
            &c,
            &ExprQuery {
                regex: true,
                ..query("m.h")
            },
        )
        .unwrap();
        assert_eq!(found.len(), 3);
        let bad = locate(
            &c,
            &ExprQuery {
                regex: true,
                ..query("(")
            },
        );
        assert!(bad.is_err());
    }
}
