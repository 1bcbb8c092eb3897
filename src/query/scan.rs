use std::path::PathBuf;

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::error::Cancelled;
use crate::inject::{FieldPrefix, InjectionOutcome, Synthesizer};
use crate::provenance::{CancellationToken, Resolver};
use crate::semantic::SymbolOracle;
use crate::syntax::{Compilation, ExprId, ExprKind, MemberKind};

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub include_methods: bool,
    pub field_prefix: FieldPrefix,
}

/// A creation that could be injected instead.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    #[serde(skip)]
    pub expr: ExprId,
    pub file: PathBuf,
    pub line: usize,
    pub text: String,
    pub type_name: String,
    /// Number of edits the injection plan makes.
    pub edits: usize,
}

/// Object creations of compilation types that sit where injection applies.
fn candidates(oracle: &dyn SymbolOracle, include_methods: bool) -> Vec<ExprId> {
    let comp = oracle.compilation();
    comp.expr_ids()
        .filter(|&e| {
            let expr = comp.expr(e);
            let ExprKind::ObjectCreation {
                type_name: Some(type_name),
                ..
            } = &expr.kind
            else {
                return false;
            };
            if expr.parent.is_none() || oracle.find_type(type_name, Some(comp.enclosing_type(e))).is_none() {
                return false;
            }
            let member = comp.member(expr.member);
            if member.is_static() {
                return false;
            }
            match &member.kind {
                MemberKind::Constructor { .. } => true,
                MemberKind::Field { .. } | MemberKind::Property { .. } if member.initializer() == Some(e) => true,
                MemberKind::Method { .. } | MemberKind::Property { .. } => include_methods,
                _ => false,
            }
        })
        .collect()
}

/// Report every creation whose value is created on the spot and for which
/// an injection plan exists. Candidates are resolved in parallel.
///
/// # Errors
/// Returns `Cancelled` if `cancel` fires during the scan.
pub fn scan(resolver: &Resolver<'_>, options: ScanOptions, cancel: &CancellationToken) -> Result<Vec<Candidate>, Cancelled> {
    let oracle = resolver.oracle();
    let comp: &Compilation = oracle.compilation();
    let synthesizer = Synthesizer::new(resolver, options.field_prefix);
    let exprs = candidates(oracle, options.include_methods);

    let found: Vec<Option<Candidate>> = exprs
        .par_iter()
        .map(|&e| -> Result<Option<Candidate>, Cancelled> {
            let plan = match synthesizer.plan(e, cancel)? {
                InjectionOutcome::Plan(plan) => plan,
                InjectionOutcome::Unsupported { .. } => return Ok(None),
            };
            let expr = comp.expr(e);
            Ok(Some(Candidate {
                expr: e,
                file: comp.file(expr.span.file).path.clone(),
                line: expr.span.line + 1,
                text: expr.text.clone(),
                type_name: plan.type_name,
                edits: plan.edits.len(),
            }))
        })
        .collect::<Result<_, Cancelled>>()?;

    let mut found: Vec<Candidate> = found.into_iter().flatten().collect();
    found.sort_by_key(|c| (comp.expr(c.expr).span.position(), c.expr));
    info!(creations = exprs.len(), candidates = found.len(), "scan finished");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::ReachabilityAnalyzer;
    use crate::semantic::testing::model;

    const SOURCE: &str = r#"
public class Foo
{
    private readonly Bar first = new Bar();
    private readonly System.IO.Stream stream;

    public Foo()
    {
        this.stream = new System.IO.MemoryStream();
    }

    public object Get()
    {
        return new Bar();
    }

    public static object Make()
    {
        return new Bar();
    }
}

public class Bar { }"#;

    fn lines(include_methods: bool) -> Vec<(usize, String)> {
        let m = model(&[SOURCE]);
        let reach = ReachabilityAnalyzer::new(&m);
        let resolver = Resolver::new(&m, &reach);
        let options = ScanOptions {
            include_methods,
            field_prefix: FieldPrefix::Auto,
        };
        scan(&resolver, options, &CancellationToken::new())
            .expect("not cancelled")
            .into_iter()
            .map(|c| (c.line, c.text))
            .collect()
    }

    #[test]
    fn test_scan_reports_compilation_creations() {
        assert_eq!(
            lines(true),
            vec![(4, "new Bar()".to_string()), (14, "new Bar()".to_string())]
        );
    }

    #[test]
    fn test_scan_can_skip_methods() {
        assert_eq!(lines(false), vec![(4, "new Bar()".to_string())]);
    }

    #[test]
    fn test_scan_honours_cancellation() {
        let m = model(&[SOURCE]);
        let reach = ReachabilityAnalyzer::new(&m);
        let resolver = Resolver::new(&m, &reach);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = ScanOptions {
            include_methods: true,
            field_prefix: FieldPrefix::Auto,
        };
        assert!(scan(&resolver, options, &cancel).is_err());
    }
}
