pub mod locate;
pub mod output;
pub mod scan;

use tracing::debug;

use crate::error::{Cancelled, VerifyError};
use crate::inject::{self, ArenaEditor, FieldPrefix, InjectionOutcome, Verification};
use crate::provenance::{CancellationToken, ProvenanceTrail, Resolver};

pub use locate::{ExprQuery, Located, locate};

/// The trail of one located expression.
#[derive(Debug, Clone)]
pub struct TrailResult {
    pub located: Located,
    pub trail: ProvenanceTrail,
}

/// The injection outcome for one located expression.
#[derive(Debug, Clone)]
pub struct InjectResult {
    pub located: Located,
    pub outcome: InjectionOutcome,
    /// Human-readable edit list; empty when unsupported.
    pub steps: Vec<String>,
    /// Present when verification was requested and a plan exists.
    pub verification: Option<Verification>,
}

/// Resolve the trail of every located expression, in order.
pub fn trails(
    resolver: &Resolver<'_>,
    located: Vec<Located>,
    cancel: &CancellationToken,
) -> Result<Vec<TrailResult>, Cancelled> {
    located
        .into_iter()
        .map(|located| -> Result<TrailResult, Cancelled> {
            let trail = resolver.resolve(located.expr, cancel)?;
            debug!(expr = %located.text, entries = trail.len(), "resolved");
            Ok(TrailResult { located, trail })
        })
        .collect()
}

/// Plan an injection for every located expression, optionally applying each
/// plan and re-resolving the rewritten tree.
pub fn injections(
    resolver: &Resolver<'_>,
    located: Vec<Located>,
    field_prefix: FieldPrefix,
    verify: bool,
    cancel: &CancellationToken,
) -> Result<Vec<InjectResult>, VerifyError> {
    let comp = resolver.oracle().compilation();
    let mut results = Vec::with_capacity(located.len());
    for located in located {
        let outcome = inject::plan_injection(resolver, located.expr, field_prefix, cancel)?;
        let (steps, verification) = match &outcome {
            InjectionOutcome::Plan(plan) => {
                let verification = if verify {
                    Some(inject::verify(comp, plan, &ArenaEditor, cancel)?)
                } else {
                    None
                };
                (plan.describe(comp), verification)
            }
            InjectionOutcome::Unsupported { .. } => (Vec::new(), None),
        };
        results.push(InjectResult {
            located,
            outcome,
            steps,
            verification,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inject::plan::UnsupportedReason;
    use crate::provenance::ReachabilityAnalyzer;
    use crate::semantic::SymbolOracle;
    use crate::semantic::testing::model;

    const SOURCE: &str = r#"
public class Foo
{
    private readonly Bar bar;

    public Foo()
    {
        this.bar = new Bar();
    }

    public int Meh(int meh) => meh;
}

public class Bar { }"#;

    fn query(text: &str) -> ExprQuery {
        ExprQuery {
            text: text.into(),
            ..ExprQuery::default()
        }
    }

    #[test]
    fn test_trails_follow_located_order() {
        let m = model(&[SOURCE]);
        let reach = ReachabilityAnalyzer::new(&m);
        let resolver = Resolver::new(&m, &reach);
        let located = locate(m.compilation(), &query("meh")).unwrap();
        let results = trails(&resolver, located, &CancellationToken::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].located.line, 11);
        assert_eq!(results[0].trail.leading().map(|e| e.text.as_str()), Some("meh"));
    }

    #[test]
    fn test_injections_plan_and_verify() {
        let m = model(&[SOURCE]);
        let reach = ReachabilityAnalyzer::new(&m);
        let resolver = Resolver::new(&m, &reach);
        let located = locate(m.compilation(), &query("new Bar()")).unwrap();
        let results = injections(&resolver, located, FieldPrefix::Auto, true, &CancellationToken::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].outcome, InjectionOutcome::Plan(_)));
        assert_eq!(
            results[0].steps,
            vec![
                "add parameter `Bar bar` to Foo()".to_string(),
                "replace `new Bar()` at File0.cs:8 with `bar`".to_string(),
            ]
        );
        let verification = results[0].verification.as_ref().expect("verified");
        assert!(verification.is_idempotent());
    }

    #[test]
    fn test_injections_report_unsupported_without_steps() {
        let m = model(&[SOURCE]);
        let reach = ReachabilityAnalyzer::new(&m);
        let resolver = Resolver::new(&m, &reach);
        let located = locate(m.compilation(), &query("meh")).unwrap();
        let results = injections(&resolver, located, FieldPrefix::Auto, true, &CancellationToken::new()).unwrap();
        assert_eq!(
            results[0].outcome,
            InjectionOutcome::Unsupported {
                reason: UnsupportedReason::AlreadyInjected
            }
        );
        assert!(results[0].steps.is_empty());
        assert!(results[0].verification.is_none());
    }
}
