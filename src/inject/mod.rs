//! Constructor injection: turn a value created inside a type into a constructor parameter.

pub mod editor;
pub mod naming;
pub mod plan;
pub mod synthesizer;

use serde::Serialize;
use tracing::debug;

use crate::error::{Cancelled, VerifyError};
use crate::provenance::{CancellationToken, ProvenanceTrail, ReachabilityAnalyzer, Resolver, ValueSource};
use crate::semantic::{SemanticModel, SymbolOracle};
use crate::syntax::{Compilation, ExprId};

pub use editor::{ArenaEditor, TreeEditor};
pub use naming::FieldPrefix;
pub use plan::{InjectionOutcome, RewritePlan};
pub use synthesizer::Synthesizer;

/// Plan the injection of the value created at `expr`.
///
/// # Errors
/// Returns `Cancelled` if `cancel` fires before planning completes.
pub fn plan_injection(
    resolver: &Resolver<'_>,
    expr: ExprId,
    field_prefix: FieldPrefix,
    cancel: &CancellationToken,
) -> Result<InjectionOutcome, Cancelled> {
    Synthesizer::new(resolver, field_prefix).plan(expr, cancel)
}

/// The trail of one expression that carries the injected value after rewriting.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedAnchor {
    pub text: String,
    pub trail: ProvenanceTrail,
}

#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub anchors: Vec<VerifiedAnchor>,
}

impl Verification {
    /// No rewritten expression is still classified as created on the spot.
    pub fn is_idempotent(&self) -> bool {
        !self.anchors.is_empty()
            && self
                .anchors
                .iter()
                .all(|a| a.trail.leading().is_some_and(|e| e.source != ValueSource::Created))
    }
}

/// Apply `plan` with `editor`, rebuild the semantic model over the result and
/// resolve every expression that now carries the injected value.
///
/// # Errors
/// Returns `VerifyError::Edit` when the plan does not fit `comp`, and
/// `VerifyError::Cancelled` when `cancel` fires while re-resolving.
pub fn verify(
    comp: &Compilation,
    plan: &RewritePlan,
    editor: &dyn TreeEditor,
    cancel: &CancellationToken,
) -> Result<Verification, VerifyError> {
    let applied = editor.apply(comp, plan)?;
    let model = SemanticModel::build(applied.compilation);
    let reach = ReachabilityAnalyzer::new(&model);
    let resolver = Resolver::new(&model, &reach);
    let mut anchors = Vec::with_capacity(applied.anchors.len());
    for anchor in applied.anchors {
        let trail = resolver.resolve(anchor, cancel)?;
        anchors.push(VerifiedAnchor {
            text: model.compilation().expr(anchor).text.clone(),
            trail,
        });
    }
    let verification = Verification { anchors };
    debug!(
        anchors = verification.anchors.len(),
        idempotent = verification.is_idempotent(),
        "rewrite verified"
    );
    Ok(verification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::call_graph::CallSiteKind;
    use crate::semantic::testing::{find_expr, model};
    use plan::{ArgumentValue, Edit, UnsupportedReason};

    fn outcome(m: &SemanticModel, expr: ExprId) -> InjectionOutcome {
        let reach = ReachabilityAnalyzer::new(m);
        let resolver = Resolver::new(m, &reach);
        plan_injection(&resolver, expr, FieldPrefix::Auto, &CancellationToken::new()).expect("not cancelled")
    }

    fn rewrite(m: &SemanticModel, expr: ExprId) -> RewritePlan {
        match outcome(m, expr) {
            InjectionOutcome::Plan(plan) => plan,
            InjectionOutcome::Unsupported { reason } => panic!("expected a plan, got {reason}"),
        }
    }

    fn unsupported(sources: &[&str], anchor: &str, text: &str) -> UnsupportedReason {
        let m = model(sources);
        match outcome(&m, find_expr(&m, anchor, text)) {
            InjectionOutcome::Unsupported { reason } => reason,
            InjectionOutcome::Plan(plan) => panic!("expected unsupported, got {:?}", plan.edits),
        }
    }

    const IN_CONSTRUCTOR: &str = r#"
public sealed class Foo
{
    private readonly Bar bar;

    public Foo()
    {
        this.bar = new Bar();
    }
}

public sealed class Bar { }"#;

    #[test]
    fn test_creation_in_constructor_becomes_parameter() {
        let m = model(&[IN_CONSTRUCTOR]);
        let target = find_expr(&m, "this.bar =", "new Bar()");
        let plan = rewrite(&m, target);
        assert_eq!(plan.parameter, "bar");
        assert_eq!(plan.type_name, "Bar");
        assert_eq!(plan.field, None);
        assert!(matches!(
            plan.edits.as_slice(),
            [
                Edit::AddParameter { name, type_name, .. },
                Edit::ReplaceExpression { expr, with },
            ] if name == "bar" && type_name == "Bar" && *expr == target && with == "bar"
        ));
        let lines = plan.describe(m.compilation());
        assert_eq!(lines[0], "add parameter `Bar bar` to Foo()");
        assert!(lines[1].starts_with("replace `new Bar()` at "));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let m = model(&[IN_CONSTRUCTOR]);
        let target = find_expr(&m, "this.bar =", "new Bar()");
        let plan = rewrite(&m, target);
        let cancel = CancellationToken::new();

        let verification = verify(m.compilation(), &plan, &ArenaEditor, &cancel).expect("verified");
        assert!(verification.is_idempotent());
        assert_eq!(verification.anchors[0].trail.to_string(), "bar Injected");

        let applied = ArenaEditor.apply(m.compilation(), &plan).expect("applied");
        let rewritten = SemanticModel::build(applied.compilation);
        assert_eq!(
            outcome(&rewritten, applied.anchors[0]),
            InjectionOutcome::Unsupported {
                reason: UnsupportedReason::AlreadyInjected
            }
        );
    }

    #[test]
    fn test_closed_expression_is_passed_by_callers() {
        let m = model(&[
            IN_CONSTRUCTOR,
            r#"
public class User
{
    public Foo Make() => new Foo();
}"#,
        ]);
        let target = find_expr(&m, "this.bar =", "new Bar()");
        let plan = rewrite(&m, target);
        let Some(Edit::AppendArgument { site, value }) = plan.edits.last() else {
            panic!("expected an appended argument, got {:?}", plan.edits);
        };
        assert!(matches!(site.kind, CallSiteKind::Creation(_)));
        assert_eq!(value, &ArgumentValue::Expression(target));

        let applied = ArenaEditor.apply(m.compilation(), &plan).expect("applied");
        let CallSiteKind::Creation(creation) = site.kind else {
            panic!("expected a creation site");
        };
        assert_eq!(applied.compilation.expr(creation).text, "new Foo(new Bar())");

        let verification =
            verify(m.compilation(), &plan, &ArenaEditor, &CancellationToken::new()).expect("verified");
        assert!(verification.is_idempotent());
        assert_eq!(
            verification.anchors[0].trail.to_string(),
            "bar PotentiallyInjected, new Bar() Created"
        );
    }

    #[test]
    fn test_open_expression_threads_parameter_through_chained_constructor() {
        let m = model(&[r#"
public class Foo
{
    private readonly Bar bar;

    public Foo(int size)
    {
        this.bar = new Bar(size);
    }

    public Foo() : this(1)
    {
    }
}

public class Bar
{
    public Bar(int size) { }
}"#]);
        let target = find_expr(&m, "this.bar =", "new Bar(size)");
        let plan = rewrite(&m, target);
        let comp = m.compilation();
        assert_eq!(
            plan.describe(comp)[2..],
            [
                "add parameter `Bar bar` to Foo()".to_string(),
                "pass `bar` at `: this(...)` of Foo()".to_string(),
            ]
        );

        let verification = verify(comp, &plan, &ArenaEditor, &CancellationToken::new()).expect("verified");
        assert!(verification.is_idempotent());
    }

    #[test]
    fn test_open_expression_with_method_caller_is_ambiguous() {
        let reason = unsupported(
            &[r#"
public class Foo
{
    public Foo(int size)
    {
        var b = new Bar(size);
    }
}

public class Bar
{
    public Bar(int size) { }
}

public class User
{
    public Foo Make() => new Foo(2);
}"#],
            "var b",
            "new Bar(size)",
        );
        assert_eq!(reason, UnsupportedReason::AmbiguousCallSite);
    }

    #[test]
    fn test_field_initializer_moves_into_constructors() {
        let m = model(&[r#"
public class Foo
{
    private readonly Bar bar = new Bar();

    public Foo()
    {
    }

    public Foo(int x) : this()
    {
    }
}

public class Bar { }"#]);
        let target = find_expr(&m, "private readonly Bar", "new Bar()");
        let plan = rewrite(&m, target);
        let lines = plan.describe(m.compilation());
        assert_eq!(
            lines,
            [
                "remove the initializer of `bar`",
                "add parameter `Bar bar` to Foo()",
                "assign `this.bar = bar;` in Foo()",
                "pass `new Bar()` at `: this(...)` of Foo(int)",
            ]
        );

        let verification =
            verify(m.compilation(), &plan, &ArenaEditor, &CancellationToken::new()).expect("verified");
        assert!(verification.is_idempotent());
        assert_eq!(verification.anchors.len(), 1);
        assert_eq!(verification.anchors[0].text, "bar");
    }

    #[test]
    fn test_method_creation_gets_backing_field() {
        let m = model(&[r#"
public class Foo
{
    private readonly int _size;

    public Foo(int size)
    {
        _size = size;
    }

    public object Get()
    {
        return new Bar();
    }
}

public class Bar { }"#]);
        let target = find_expr(&m, "return", "new Bar()");
        let plan = rewrite(&m, target);
        assert_eq!(plan.field.as_deref(), Some("_bar"));
        let comp = m.compilation();
        let span = comp.expr(target).span;
        let replace = format!(
            "replace `new Bar()` at {}:{} with `_bar`",
            comp.file(span.file).path.display(),
            span.line + 1
        );
        assert_eq!(
            plan.describe(comp),
            [
                "add field `private readonly Bar _bar` to Foo",
                "add parameter `Bar bar` to Foo(int)",
                "assign `_bar = bar;` in Foo(int)",
                replace.as_str(),
            ]
        );

        let verification =
            verify(m.compilation(), &plan, &ArenaEditor, &CancellationToken::new()).expect("verified");
        assert_eq!(verification.anchors.len(), 2);
        assert!(verification.is_idempotent());
    }

    #[test]
    fn test_locator_call_is_injectable() {
        let m = model(&[r#"
public interface ILocator
{
    T Get<T>();
}

public class Foo
{
    private readonly Bar bar;

    public Foo(ILocator locator)
    {
        this.bar = locator.Get<Bar>();
    }
}

public class Bar { }"#]);
        let target = find_expr(&m, "this.bar =", "locator.Get<Bar>()");
        let plan = rewrite(&m, target);
        assert_eq!(plan.type_name, "Bar");
        assert_eq!(plan.describe(m.compilation())[0], "add parameter `Bar bar` to Foo(ILocator)");
    }

    #[test]
    fn test_unsupported_reasons() {
        let bar = "public class Bar { }";
        assert_eq!(
            unsupported(
                &[
                    "public class Foo { private readonly Bar bar; public Foo(Bar bar) { this.bar = bar; } }",
                    bar
                ],
                "this.bar =",
                "bar",
            ),
            UnsupportedReason::AlreadyInjected
        );
        assert_eq!(
            unsupported(&["public class Foo { public static object Make() => new Bar(); }", bar], "Make", "new Bar()"),
            UnsupportedReason::StaticContext
        );
        assert_eq!(
            unsupported(&["public class Foo { public Foo(int bar) { var x = new Bar(); } }", bar], "var x", "new Bar()"),
            UnsupportedReason::NameCollision
        );
        assert_eq!(
            unsupported(
                &["public class Foo { public Foo(int size = 1) { var x = new Bar(); } }", bar],
                "var x",
                "new Bar()"
            ),
            UnsupportedReason::OptionalParameters
        );
        assert_eq!(
            unsupported(&["public class Foo { public object Get() => new Bar(); }", bar], "Get", "new Bar()"),
            UnsupportedReason::NoConstructor
        );
        assert_eq!(
            unsupported(
                &["public class Foo { public object Get() => System.IO.File.OpenRead(\"a\"); }"],
                "Get",
                "System.IO.File.OpenRead(\"a\")"
            ),
            UnsupportedReason::NotCreatedHere
        );
        assert_eq!(
            unsupported(
                &["public class Foo { private readonly object x = Wrap(new Bar()); public Foo() { } static object Wrap(object o) => o; }", bar],
                "Wrap(new",
                "new Bar()"
            ),
            UnsupportedReason::NestedInitializer
        );
    }

    #[test]
    fn test_unqualified_field_with_parameter_name_collides() {
        let reason = unsupported(
            &[r#"
public class Foo
{
    private readonly Bar bar;

    public Foo()
    {
        bar = new Bar();
    }

    public Bar Get() => this.bar;
}

public class Bar { }"#],
            "bar =",
            "new Bar()",
        );
        assert_eq!(reason, UnsupportedReason::NameCollision);
    }

    #[test]
    fn test_unqualified_field_read_in_initializer_moves_collides() {
        let reason = unsupported(
            &[r#"
public class Foo
{
    private readonly Bar bar = new Bar();
    private readonly object copy;

    public Foo()
    {
        copy = bar;
    }
}

public class Bar { }"#],
            "private readonly Bar",
            "new Bar()",
        );
        assert_eq!(reason, UnsupportedReason::NameCollision);
    }

    #[test]
    fn test_derived_type_with_implicit_constructor_is_ambiguous() {
        let reason = unsupported(
            &[r#"
public class Foo
{
    private readonly Bar bar;

    public Foo()
    {
        this.bar = new Bar();
    }
}

public class Derived : Foo
{
}

public class Bar { }"#],
            "this.bar =",
            "new Bar()",
        );
        assert_eq!(reason, UnsupportedReason::AmbiguousCallSite);
    }

    #[test]
    fn test_derived_type_with_explicit_constructor_gets_base_argument() {
        let m = model(&[r#"
public class Foo
{
    private readonly Bar bar;

    public Foo()
    {
        this.bar = new Bar();
    }
}

public class Derived : Foo
{
    public Derived()
    {
    }
}

public class Bar { }"#]);
        let target = find_expr(&m, "this.bar =", "new Bar()");
        let plan = rewrite(&m, target);
        let Some(Edit::AppendArgument { site, value }) = plan.edits.last() else {
            panic!("expected an appended argument, got {:?}", plan.edits);
        };
        assert_eq!(site.kind, CallSiteKind::ImplicitBase);
        assert_eq!(value, &ArgumentValue::Expression(target));
    }

    #[test]
    fn test_cancelled_planning_reports_cancellation() {
        let m = model(&[IN_CONSTRUCTOR]);
        let target = find_expr(&m, "this.bar =", "new Bar()");
        let reach = ReachabilityAnalyzer::new(&m);
        let resolver = Resolver::new(&m, &reach);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            plan_injection(&resolver, target, FieldPrefix::Auto, &cancel),
            Err(Cancelled)
        );
    }
}
