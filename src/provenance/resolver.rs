use std::collections::HashSet;
use std::rc::Rc;

use tracing::trace;

use crate::error::Cancelled;
use crate::semantic::SymbolOracle;
use crate::semantic::call_graph::{ArgumentMatch, match_argument};
use crate::semantic::flow::{Definition, Variable, reaching_definitions};
use crate::syntax::{Argument, Body, Compilation, ExprId, ExprKind, MemberId, MemberKind, ParamId, Position};

use super::cancel::CancellationToken;
use super::classifier::{Classification, classify};
use super::reachability::ReachabilityAnalyzer;
use super::trail::{ProvenanceTrail, ValueSource};

/// Arguments of the call being expanded, bound for reads of the callee's parameters.
struct CallFrame {
    callee: MemberId,
    args: Vec<Argument>,
    /// Where the arguments themselves are evaluated.
    outer: Context,
}

#[derive(Clone, Default)]
struct Context {
    frame: Option<Rc<CallFrame>>,
    /// Set while a getter called from a constructor is expanded: the
    /// constructor and the position of the getter call.
    construction: Option<(MemberId, Position)>,
}

impl Context {
    fn call(callee: MemberId, args: Vec<Argument>, outer: Context) -> Self {
        Context {
            frame: Some(Rc::new(CallFrame {
                callee,
                args,
                outer,
            })),
            construction: None,
        }
    }

    fn constructing(ctor: MemberId, before: Position) -> Self {
        Context {
            frame: None,
            construction: Some((ctor, before)),
        }
    }
}

/// Identity of a node being expanded, used to stop cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum VisitKey {
    Member(MemberId),
    Parameter(ParamId),
    Value(ExprId),
}

/// Traces where the value of an expression comes from.
///
/// A resolver holds no per-query state and can be shared across threads; each
/// [`resolve`](Self::resolve) call walks with its own visited set.
pub struct Resolver<'a> {
    oracle: &'a dyn SymbolOracle,
    reach: &'a ReachabilityAnalyzer<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(oracle: &'a dyn SymbolOracle, reach: &'a ReachabilityAnalyzer<'a>) -> Self {
        Self { oracle, reach }
    }

    pub fn oracle(&self) -> &'a dyn SymbolOracle {
        self.oracle
    }

    /// Resolve `expr` into a non-empty trail.
    ///
    /// # Errors
    /// Returns `Cancelled` if `cancel` fires before the walk completes.
    pub fn resolve(&self, expr: ExprId, cancel: &CancellationToken) -> Result<ProvenanceTrail, Cancelled> {
        let mut walk = Walk {
            oracle: self.oracle,
            reach: self.reach,
            cancel,
            trail: ProvenanceTrail::new(),
            in_progress: HashSet::new(),
        };
        walk.expr(expr, None, &Context::default())?;
        if walk.trail.is_empty() {
            walk.push(expr, ValueSource::External, None);
        }
        Ok(walk.trail)
    }
}

struct Walk<'r> {
    oracle: &'r dyn SymbolOracle,
    reach: &'r ReachabilityAnalyzer<'r>,
    cancel: &'r CancellationToken,
    trail: ProvenanceTrail,
    in_progress: HashSet<VisitKey>,
}

/// `X`, `this.X`, `base.X` and element access on them.
fn reads_own_instance(comp: &Compilation, expr: ExprId) -> bool {
    match &comp.expr(expr).kind {
        ExprKind::Name(_) => true,
        ExprKind::MemberAccess { target, .. } => {
            matches!(comp.expr(*target).kind, ExprKind::This | ExprKind::Base)
        }
        ExprKind::ElementAccess { target, .. } => reads_own_instance(comp, *target),
        _ => false,
    }
}

fn initializer_args(comp: &Compilation, ctor: MemberId) -> Vec<Argument> {
    match &comp.member(ctor).kind {
        MemberKind::Constructor {
            initializer: Some(init),
            ..
        } => init.args.clone(),
        _ => Vec::new(),
    }
}

impl Walk<'_> {
    fn push(&mut self, expr: ExprId, source: ValueSource, parent: Option<usize>) -> usize {
        let oracle = self.oracle;
        let text = oracle.compilation().expr(expr).text.as_str();
        self.trail.push(text, source, Some(expr), parent)
    }

    /// Run `expand` unless `key` is already being expanded further up, in which
    /// case a terminal `Recursion` entry is recorded instead.
    fn guarded(
        &mut self,
        key: VisitKey,
        expr: ExprId,
        parent: Option<usize>,
        expand: impl FnOnce(&mut Self) -> Result<(), Cancelled>,
    ) -> Result<(), Cancelled> {
        if !self.in_progress.insert(key) {
            trace!(?key, "recursion");
            self.push(expr, ValueSource::Recursion, parent);
            return Ok(());
        }
        let result = expand(self);
        self.in_progress.remove(&key);
        result
    }

    fn expr(&mut self, expr: ExprId, parent: Option<usize>, ctx: &Context) -> Result<(), Cancelled> {
        self.cancel.check()?;
        match classify(self.oracle, expr) {
            Classification::Constant => {
                self.push(expr, ValueSource::Constant, parent);
            }
            Classification::Cached(_) => {
                self.push(expr, ValueSource::Cached, parent);
            }
            Classification::Created => {
                self.push(expr, ValueSource::Created, parent);
            }
            Classification::Calculated => {
                self.push(expr, ValueSource::Calculated, parent);
            }
            Classification::Instance => {
                self.push(expr, ValueSource::Member, parent);
            }
            Classification::NoValue => {}
            Classification::Transparent(inner) => self.expr(inner, parent, ctx)?,
            Classification::Branches(branches) => {
                for branch in branches {
                    self.expr(branch, parent, ctx)?;
                }
            }
            Classification::External { receiver } => {
                let idx = self.push(expr, ValueSource::External, parent);
                if let Some(receiver) = receiver {
                    self.expr(receiver, Some(idx), ctx)?;
                }
            }
            Classification::Invocation { method, body } => self.invocation(expr, method, body, parent, ctx)?,
            Classification::Getter { property, body } => self.getter(expr, property, body, parent, ctx)?,
            Classification::Member(member) => self.member(expr, member, parent, ctx)?,
            Classification::Parameter(param) => self.variable(expr, Variable::Parameter(param), parent, ctx)?,
            Classification::Local(local) => self.variable(expr, Variable::Local(local), parent, ctx)?,
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Members with bodies
    // -----------------------------------------------------------------------

    fn invocation(
        &mut self,
        expr: ExprId,
        method: MemberId,
        body: Body,
        parent: Option<usize>,
        ctx: &Context,
    ) -> Result<(), Cancelled> {
        let oracle = self.oracle;
        let comp = oracle.compilation();
        let args = match &comp.expr(expr).kind {
            ExprKind::Invocation { args, .. } => args.clone(),
            _ => Vec::new(),
        };
        self.guarded(VisitKey::Member(method), expr, parent, |w| {
            let idx = w.push(expr, ValueSource::Calculated, parent);
            let inner = Context::call(method, args, ctx.clone());
            for ret in comp.return_exprs(body) {
                w.expr(ret, Some(idx), &inner)?;
            }
            Ok(())
        })
    }

    /// A getter read on the instance under construction sees the fields as
    /// they are at the point of the read.
    fn getter(
        &mut self,
        expr: ExprId,
        property: MemberId,
        body: Body,
        parent: Option<usize>,
        ctx: &Context,
    ) -> Result<(), Cancelled> {
        let oracle = self.oracle;
        let comp = oracle.compilation();
        let inner = match self.construction_site(expr, property, ctx) {
            Some((ctor, before)) => Context::constructing(ctor, before),
            None => Context::default(),
        };
        self.guarded(VisitKey::Member(property), expr, parent, |w| {
            let idx = w.push(expr, ValueSource::Calculated, parent);
            for ret in comp.return_exprs(body) {
                w.expr(ret, Some(idx), &inner)?;
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Fields and auto-properties
    // -----------------------------------------------------------------------

    /// The constructor performing a read of the instance under construction,
    /// directly or through a getter it calls, and the position it reads at.
    fn construction_site(&self, expr: ExprId, member: MemberId, ctx: &Context) -> Option<(MemberId, Position)> {
        let comp = self.oracle.compilation();
        let reader = comp.expr(expr).member;
        let (ctor, before) = match ctx.construction {
            Some(site) if !comp.member(reader).is_constructor() => site,
            _ => (reader, comp.expr(expr).span.position()),
        };
        let ctor_decl = comp.member(ctor);
        let decl = comp.member(member);
        (ctor_decl.is_constructor()
            && ctor_decl.is_static() == decl.is_static()
            && reads_own_instance(comp, expr)
            && self.oracle.derives_from(ctor_decl.declaring, decl.declaring))
        .then_some((ctor, before))
    }

    fn member(&mut self, expr: ExprId, member: MemberId, parent: Option<usize>, ctx: &Context) -> Result<(), Cancelled> {
        let oracle = self.oracle;
        let comp = oracle.compilation();
        self.guarded(VisitKey::Member(member), expr, parent, |w| {
            let idx = w.push(expr, ValueSource::Member, parent);
            let decl = comp.member(member);
            let under_construction = w.construction_site(expr, member, ctx);
            if under_construction.is_none() && w.reach.is_externally_mutable(member) {
                w.push(expr, ValueSource::PotentiallyInjected, Some(idx));
            }
            if let Some(init) = decl.initializer() {
                w.expr(init, Some(idx), &Context::default())?;
            }

            if let Some((ctor, before)) = under_construction {
                return w.constructor_chain(ctor, member, Some(before), idx);
            }

            let reader = comp.enclosing_type(expr);
            if reader != decl.declaring
                && reads_own_instance(comp, expr)
                && oracle.derives_from(reader, decl.declaring)
            {
                let ctors = comp.constructors(reader, decl.is_static());
                if !ctors.is_empty() {
                    for ctor in ctors {
                        w.constructor_chain(ctor, member, None, idx)?;
                    }
                    return Ok(());
                }
            }

            let ctors = comp.constructors(decl.declaring, decl.is_static());
            let sites = oracle.assignments(member);
            for ctor in &ctors {
                for site in sites.iter().filter(|s| s.container == *ctor) {
                    w.expr(site.value, Some(idx), &Context::default())?;
                }
            }
            for site in sites.iter().filter(|s| !ctors.contains(&s.container)) {
                w.expr(site.value, Some(idx), &Context::default())?;
            }
            Ok(())
        })
    }

    /// Writes to `member` performed while `ctor` runs: first by the constructors
    /// it chains to, innermost first, then by `ctor` itself up to `before`.
    fn constructor_chain(
        &mut self,
        ctor: MemberId,
        member: MemberId,
        before: Option<Position>,
        idx: usize,
    ) -> Result<(), Cancelled> {
        let oracle = self.oracle;
        let comp = oracle.compilation();

        let mut links: Vec<(MemberId, Context)> = vec![(ctor, Context::default())];
        let mut current = ctor;
        while let Some(next) = oracle.chained_constructor(current) {
            if links.iter().any(|(c, _)| *c == next) {
                break;
            }
            let outer = links.last().map(|(_, c)| c.clone()).unwrap_or_default();
            links.push((next, Context::call(next, initializer_args(comp, current), outer)));
            current = next;
        }

        for (depth, (link, ctx)) in links.iter().enumerate().rev() {
            self.cancel.check()?;
            let limit = if depth == 0 { before } else { None };
            for site in oracle.assignments(member) {
                if site.container != *link || !site.on_this {
                    continue;
                }
                if let Some(limit) = limit
                    && comp.expr(site.expr).span.end_position() > limit
                {
                    continue;
                }
                self.expr(site.value, Some(idx), ctx)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Locals and parameters
    // -----------------------------------------------------------------------

    fn variable(&mut self, expr: ExprId, var: Variable, parent: Option<usize>, ctx: &Context) -> Result<(), Cancelled> {
        let defs = reaching_definitions(self.oracle, var, expr);
        if defs.is_empty() {
            self.push(expr, ValueSource::External, parent);
            return Ok(());
        }
        for def in defs {
            match def {
                Definition::Entry(param) => self.parameter(expr, param, parent, ctx)?,
                Definition::Value(value) => {
                    self.guarded(VisitKey::Value(value), value, parent, |w| w.expr(value, parent, ctx))?
                }
                Definition::Update(update) => {
                    self.push(update, ValueSource::Calculated, parent);
                }
                Definition::Opaque => {
                    self.push(expr, ValueSource::External, parent);
                }
            }
        }
        Ok(())
    }

    fn parameter(&mut self, expr: ExprId, param: ParamId, parent: Option<usize>, ctx: &Context) -> Result<(), Cancelled> {
        let oracle = self.oracle;
        let comp = oracle.compilation();
        let decl = comp.param(param);

        if let Some(frame) = &ctx.frame
            && frame.callee == decl.owner
        {
            let frame = Rc::clone(frame);
            let idx = self.push(expr, ValueSource::Argument, parent);
            return self.bind_argument(param, &frame.args, idx, &frame.outer);
        }

        if decl.is_accessor_value {
            return self.setter_value(expr, param, parent);
        }

        let owner = decl.owner;
        self.guarded(VisitKey::Parameter(param), expr, parent, |w| {
            w.cancel.check()?;
            let sites = oracle.call_sites(owner);
            if sites.is_empty() {
                w.push(expr, ValueSource::Injected, parent);
                return Ok(());
            }
            let source = if w.reach.is_externally_reachable(owner) {
                ValueSource::PotentiallyInjected
            } else {
                ValueSource::Argument
            };
            let idx = w.push(expr, source, parent);
            for site in sites {
                w.cancel.check()?;
                w.bind_argument(param, site.arguments(comp), idx, &Context::default())?;
            }
            Ok(())
        })
    }

    /// The implicit `value` of a setter is supplied by every write to the property.
    fn setter_value(&mut self, expr: ExprId, param: ParamId, parent: Option<usize>) -> Result<(), Cancelled> {
        let oracle = self.oracle;
        let property = oracle.compilation().param(param).owner;
        self.guarded(VisitKey::Parameter(param), expr, parent, |w| {
            w.cancel.check()?;
            let sites = oracle.assignments(property);
            if sites.is_empty() {
                w.push(expr, ValueSource::Injected, parent);
                return Ok(());
            }
            let source = if w.reach.is_externally_mutable(property) {
                ValueSource::PotentiallyInjected
            } else {
                ValueSource::Argument
            };
            let idx = w.push(expr, source, parent);
            for site in sites {
                w.cancel.check()?;
                w.expr(site.value, Some(idx), &Context::default())?;
            }
            Ok(())
        })
    }

    fn bind_argument(&mut self, param: ParamId, args: &[Argument], idx: usize, ctx: &Context) -> Result<(), Cancelled> {
        let oracle = self.oracle;
        let comp = oracle.compilation();
        match match_argument(comp.param(param), args) {
            ArgumentMatch::Supplied(values) => {
                for value in values {
                    self.expr(value, Some(idx), ctx)?;
                }
            }
            ArgumentMatch::Default(default) => self.expr(default, Some(idx), &Context::default())?,
            ArgumentMatch::Missing => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::testing::{find_expr, model};

    fn trail_of(sources: &[&str], anchor: &str, text: &str) -> String {
        let m = model(sources);
        let reach = ReachabilityAnalyzer::new(&m);
        let resolver = Resolver::new(&m, &reach);
        let expr = find_expr(&m, anchor, text);
        let trail = resolver
            .resolve(expr, &CancellationToken::new())
            .expect("not cancelled");
        assert!(trail.recursion_is_terminal());
        trail.to_string()
    }

    #[test]
    fn test_parameter_of_constructor_without_call_sites_is_injected() {
        let code = r#"
public class Foo
{
    internal Foo(int meh)
    {
        var value = meh;
    }
}"#;
        assert_eq!(trail_of(&[code], "var value", "meh"), "meh Injected");
    }

    #[test]
    fn test_private_constructor_parameter_resolves_to_call_site_arguments() {
        let code = r#"
public class Foo
{
    private Foo(int value)
    {
        var temp = value;
    }

    public static Foo Create() => new Foo(1);
}"#;
        assert_eq!(trail_of(&[code], "var temp", "value"), "value Argument, 1 Constant");
    }

    #[test]
    fn test_property_over_readonly_field() {
        let code = r#"
public class Foo
{
    private readonly int value = 1;

    public int Value => this.value;

    public int M() => this.Value;
}"#;
        assert_eq!(
            trail_of(&[code], "public int M", "this.Value"),
            "this.Value Calculated, this.value Member, 1 Constant"
        );
    }

    #[test]
    fn test_chained_private_constructor() {
        let code = r#"
public class Foo
{
    public Foo()
        : this(1)
    {
    }

    private Foo(int meh)
    {
        var temp = meh;
    }
}"#;
        assert_eq!(trail_of(&[code], "var temp", "meh"), "meh Argument, 1 Constant");
    }

    #[test]
    fn test_chained_call_skips_the_calling_constructor() {
        let code = r#"
internal class Foo
{
    public Foo(string text)
        : this(text.Length)
    {
    }

    private Foo(int meh)
    {
        var value = meh;
    }
}"#;
        assert_eq!(
            trail_of(&[code], "var value", "meh"),
            "meh Argument, text.Length External, text Injected"
        );
    }

    #[test]
    fn test_chained_calls_pick_overload_by_argument_type_and_default() {
        let code = r#"
internal class Foo
{
    public Foo()
        : this(1)
    {
    }

    public Foo(double gg)
        : this(1, 2)
    {
    }

    public Foo(string text)
        : this(1, text.Length)
    {
    }

    public Foo(int _, int meh = 1)
    {
        var value = meh;
    }
}"#;
        assert_eq!(
            trail_of(&[code], "var value", "meh"),
            "meh PotentiallyInjected, 1 Constant, 2 Constant, text.Length External, text Injected"
        );
    }

    #[test]
    fn test_getter_read_in_constructor_sees_construction_state() {
        let code = r#"
internal class Foo
{
    private int value = 1;

    public Foo(int ctorValue)
    {
        this.value = ctorValue;
        var temp1 = this.Value;
    }

    public int Value
    {
        get { return this.value; }
        set { this.value = value; }
    }

    public void Meh()
    {
        var temp2 = this.Value;
    }
}"#;
        assert_eq!(
            trail_of(&[code], "var temp1", "this.Value"),
            "this.Value Calculated, this.value Member, 1 Constant, ctorValue Injected"
        );
        assert_eq!(
            trail_of(&[code], "var temp2", "this.Value"),
            "this.Value Calculated, this.value Member, 1 Constant, ctorValue Injected, value Injected"
        );
    }

    #[test]
    fn test_public_constructor_with_call_sites_is_potentially_injected() {
        let code = r#"
public class Foo
{
    public Foo(int meh)
    {
        var temp = meh;
    }
}

public class Bar
{
    public Foo Create(int gg) => new Foo(gg);
}"#;
        assert_eq!(
            trail_of(&[code], "var temp", "meh"),
            "meh PotentiallyInjected, gg Injected"
        );
    }

    #[test]
    fn test_every_call_site_argument_is_evidence() {
        let code = r#"
public class Foo
{
    public Foo(int meh)
    {
        var temp = meh;
    }
}

public class Bar
{
    public void Run(string text)
    {
        var a = new Foo(1);
        var b = new Foo(2);
        var c = new Foo(text.Length);
    }
}"#;
        assert_eq!(
            trail_of(&[code], "var temp", "meh"),
            "meh PotentiallyInjected, 1 Constant, 2 Constant, text.Length External, text Injected"
        );
    }

    #[test]
    fn test_invocation_binds_arguments_to_call() {
        let code = r#"
public class Foo
{
    private readonly object value;

    public Foo(System.IDisposable disposable)
    {
        this.value = Id(disposable);
    }

    private static object Id(object arg) => arg;
}"#;
        assert_eq!(
            trail_of(&[code], "this.value =", "Id(disposable)"),
            "Id(disposable) Calculated, arg Argument, disposable Injected"
        );
    }

    #[test]
    fn test_unresolved_member_continues_at_receiver() {
        let code = r#"
public class Foo
{
    public Foo(Bar disposable)
    {
        var temp = disposable.Disposable;
    }
}"#;
        assert_eq!(
            trail_of(&[code], "var temp", "disposable.Disposable"),
            "disposable.Disposable External, disposable Injected"
        );
    }

    #[test]
    fn test_null_conditional_member_chain() {
        let code = r#"
public class Foo
{
    private readonly Bar meh;

    public Foo(Bar meh)
    {
        this.meh = meh;
    }

    public object M() => this.meh?.Disposable;
}"#;
        assert_eq!(
            trail_of(&[code], "public object M", "this.meh?.Disposable"),
            "this.meh?.Disposable External, this.meh Member, meh Injected"
        );
    }

    #[test]
    fn test_auto_property_read_in_constructor_and_method() {
        let code = r#"
public class Foo
{
    public Foo()
    {
        var temp = Value;
    }

    public int Value { get; set; } = 1;

    public int M()
    {
        return Value;
    }
}"#;
        assert_eq!(trail_of(&[code], "var temp", "Value"), "Value Member, 1 Constant");
        assert_eq!(
            trail_of(&[code], "return", "Value"),
            "Value Member, Value PotentiallyInjected, 1 Constant"
        );
    }

    #[test]
    fn test_constructor_read_sees_only_earlier_assignments() {
        let code = r#"
public class Foo
{
    private readonly int value;

    public Foo(int meh)
    {
        this.value = 1;
        var temp = this.value;
        this.value = meh;
    }
}"#;
        assert_eq!(
            trail_of(&[code], "var temp", "this.value"),
            "this.value Member, 1 Constant"
        );
    }

    #[test]
    fn test_field_assigned_in_branches() {
        let code = r#"
public class Foo
{
    private readonly Stream stream;

    public Foo(bool flag)
    {
        if (flag)
        {
            this.stream = File.OpenRead("A");
        }
        else
        {
            this.stream = File.OpenRead("B");
        }
    }

    public Stream M() => this.stream;
}"#;
        assert_eq!(
            trail_of(&[code], "public Stream M", "this.stream"),
            r#"this.stream Member, File.OpenRead("A") External, File.OpenRead("B") External"#
        );
    }

    #[test]
    fn test_cached_and_constant_members() {
        let code = r#"
public class Foo
{
    public const int ConstValue = 1;
    public static readonly object CachedDisposable = new object();

    public object A() => CachedDisposable;
    public int B() => ConstValue;
}"#;
        assert_eq!(trail_of(&[code], "public object A", "CachedDisposable"), "CachedDisposable Cached");
        assert_eq!(trail_of(&[code], "public int B", "ConstValue"), "ConstValue Constant");
    }

    #[test]
    fn test_base_member_read_from_derived_type() {
        let code = r#"
public class Base
{
    protected Base(int value)
    {
        Value = value;
    }

    public int Value { get; }
}

public class Derived : Base
{
    public Derived(int arg)
        : base(arg)
    {
    }

    public int M() => Value;
}"#;
        assert_eq!(
            trail_of(&[code], "public int M", "Value"),
            "Value Member, value Argument, arg Injected"
        );
    }

    #[test]
    fn test_recursive_method_is_terminal_recursion() {
        let code = r#"
public class Foo
{
    private readonly object value;

    public Foo(object arg)
    {
        this.value = Bar(arg);
    }

    private static object Bar(object disposable, object[] disposables = null)
    {
        if (disposables == null)
        {
            return Bar(disposable, new[] { disposable });
        }

        return disposable;
    }
}"#;
        assert_eq!(
            trail_of(&[code], "this.value =", "Bar(arg)"),
            "Bar(arg) Calculated, Bar(disposable, new[] { disposable }) Recursion, disposable Argument, arg Injected"
        );
    }

    #[test]
    fn test_self_referential_property() {
        let code = r#"
public class Foo
{
    public int X => X;

    public int M() => X;
}"#;
        assert_eq!(trail_of(&[code], "public int M", "X"), "X Calculated, X Recursion");
    }

    #[test]
    fn test_local_with_branch_assignments() {
        let code = r#"
public class Foo
{
    public object M(bool flag)
    {
        object value;
        if (flag)
        {
            value = new object();
        }
        else
        {
            value = System.IO.File.OpenRead("A");
        }

        return value;
    }
}"#;
        assert_eq!(
            trail_of(&[code], "return", "value"),
            r#"new object() Created, System.IO.File.OpenRead("A") External"#
        );
    }

    #[test]
    fn test_setter_value_follows_property_writes() {
        let code = r#"
public class Foo
{
    private int value;

    public int Value
    {
        get => this.value;
        private set => this.value = value;
    }

    public void Reset() => Value = 5;
}"#;
        assert_eq!(
            trail_of(&[code], "private set", "value"),
            "value Argument, 5 Constant"
        );
    }

    #[test]
    fn test_unbound_name_is_external() {
        let code = r#"
public class Foo
{
    public object M() => Missing;
}"#;
        assert_eq!(trail_of(&[code], "public object M", "Missing"), "Missing External");
    }

    #[test]
    fn test_cancelled_resolution_reports_cancellation() {
        let m = model(&["public class Foo { public int M() => 1; }"]);
        let reach = ReachabilityAnalyzer::new(&m);
        let resolver = Resolver::new(&m, &reach);
        let token = CancellationToken::new();
        token.cancel();
        let expr = find_expr(&m, "=>", "1");
        assert_eq!(resolver.resolve(expr, &token), Err(Cancelled));
    }
}
