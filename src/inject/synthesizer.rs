use std::collections::HashSet;

use tracing::debug;

use crate::error::Cancelled;
use crate::provenance::classifier::receiver_of;
use crate::provenance::{CancellationToken, Resolver, ValueSource};
use crate::semantic::binder::generic_argument;
use crate::semantic::{Symbol, SymbolOracle};
use crate::syntax::{
    Compilation, ExprId, ExprKind, ExprParent, InitializerKind, LambdaBody, MemberId, MemberKind,
    TypeId,
};

use super::naming::{FieldPrefix, field_name, field_reference, field_style, parameter_name};
use super::plan::{ArgumentValue, Edit, InjectionOutcome, RewritePlan, UnsupportedReason};

/// Why planning stopped early.
enum Stop {
    Cancelled,
    Unsupported(UnsupportedReason),
}

impl From<Cancelled> for Stop {
    fn from(_: Cancelled) -> Self {
        Stop::Cancelled
    }
}

impl From<UnsupportedReason> for Stop {
    fn from(reason: UnsupportedReason) -> Self {
        Stop::Unsupported(reason)
    }
}

/// Plans the rewrite that turns a local creation into a constructor parameter.
pub struct Synthesizer<'a> {
    resolver: &'a Resolver<'a>,
    field_prefix: FieldPrefix,
}

impl<'a> Synthesizer<'a> {
    pub fn new(resolver: &'a Resolver<'a>, field_prefix: FieldPrefix) -> Self {
        Self {
            resolver,
            field_prefix,
        }
    }

    /// Plan the injection of the value created at `expr`.
    ///
    /// The plan either covers every affected constructor and call site or is
    /// not produced at all.
    ///
    /// # Errors
    /// Returns `Cancelled` if `cancel` fires while resolving or walking call sites.
    pub fn plan(&self, expr: ExprId, cancel: &CancellationToken) -> Result<InjectionOutcome, Cancelled> {
        match self.build(expr, cancel) {
            Ok(plan) => {
                debug!(
                    parameter = %plan.parameter,
                    edits = plan.edits.len(),
                    "injection planned"
                );
                Ok(InjectionOutcome::Plan(plan))
            }
            Err(Stop::Unsupported(reason)) => {
                debug!(%reason, "injection unsupported");
                Ok(InjectionOutcome::Unsupported { reason })
            }
            Err(Stop::Cancelled) => Err(Cancelled),
        }
    }

    fn build(&self, expr: ExprId, cancel: &CancellationToken) -> Result<RewritePlan, Stop> {
        let oracle = self.resolver.oracle();
        let comp = oracle.compilation();
        self.check_origin(expr, cancel)?;

        let type_name = injected_type(oracle, expr).ok_or(UnsupportedReason::UnknownType)?;
        let parameter = parameter_name(&type_name);
        if parameter.is_empty() {
            return Err(UnsupportedReason::UnknownType.into());
        }

        let member = comp.expr(expr).member;
        let decl = comp.member(member);
        if decl.is_static() {
            return Err(UnsupportedReason::StaticContext.into());
        }
        let ty = decl.declaring;

        let mut builder = PlanBuilder {
            oracle,
            cancel,
            target: expr,
            type_name: type_name.clone(),
            parameter: parameter.clone(),
            closed: is_closed(oracle, expr),
            edits: Vec::new(),
            extended: HashSet::new(),
            pending: Vec::new(),
        };
        let mut field = None;

        if decl.is_constructor() {
            builder.extend(member)?;
            let text = &comp.expr(expr).text;
            let body = decl.body().map(|b| comp.body_exprs(b)).unwrap_or_default();
            let mut replaced = vec![expr];
            replaced.extend(body.into_iter().filter(|&e| {
                e != expr
                    && comp.expr(e).text == *text
                    && matches!(comp.expr(e).kind, ExprKind::ObjectCreation { .. })
            }));
            for e in replaced {
                builder.edits.push(Edit::ReplaceExpression {
                    expr: e,
                    with: parameter.clone(),
                });
            }
        } else if decl.initializer() == Some(expr) {
            let targets = injection_constructors(comp, ty)?;
            builder.edits.push(Edit::RemoveInitializer { member });
            let reference = field_reference(&decl.name);
            for ctor in targets {
                builder.extend(ctor)?;
                builder.edits.push(Edit::AssignField {
                    ctor,
                    field: reference.clone(),
                    parameter: parameter.clone(),
                });
            }
        } else if in_member_initializer(comp, expr) {
            return Err(UnsupportedReason::NestedInitializer.into());
        } else {
            let style = field_style(comp, ty, self.field_prefix);
            let name = field_name(&parameter, style);
            if comp.ty(ty).members.iter().any(|&m| comp.member(m).name == name) {
                return Err(UnsupportedReason::NameCollision.into());
            }
            let targets = injection_constructors(comp, ty)?;
            builder.edits.push(Edit::AddField {
                ty,
                name: name.clone(),
                type_name: type_name.clone(),
            });
            let reference = field_reference(&name);
            for ctor in targets {
                builder.extend(ctor)?;
                builder.edits.push(Edit::AssignField {
                    ctor,
                    field: reference.clone(),
                    parameter: parameter.clone(),
                });
            }
            builder.edits.push(Edit::ReplaceExpression {
                expr,
                with: reference,
            });
            field = Some(name);
        }

        builder.propagate()?;
        Ok(RewritePlan {
            target: expr,
            type_name,
            parameter,
            field,
            edits: builder.edits,
        })
    }

    /// Accept expressions whose value is created right there, or fetched from an
    /// injected locator such as `locator.Get<Bar>()`.
    fn check_origin(&self, expr: ExprId, cancel: &CancellationToken) -> Result<(), Stop> {
        let oracle = self.resolver.oracle();
        let trail = self.resolver.resolve(expr, cancel)?;
        let Some(leading) = trail.leading() else {
            return Err(UnsupportedReason::NotCreatedHere.into());
        };
        match leading.source {
            ValueSource::Created if leading.node == Some(expr) => Ok(()),
            ValueSource::Injected | ValueSource::PotentiallyInjected | ValueSource::Argument => {
                Err(UnsupportedReason::AlreadyInjected.into())
            }
            ValueSource::External if leading.node == Some(expr) => {
                let comp = oracle.compilation();
                if !matches!(comp.expr(expr).kind, ExprKind::Invocation { .. } | ExprKind::MemberAccess { .. }) {
                    return Err(UnsupportedReason::NotCreatedHere.into());
                }
                let receiver = receiver_of(oracle, expr).ok_or(UnsupportedReason::NotCreatedHere)?;
                let receiver_trail = self.resolver.resolve(receiver, cancel)?;
                match receiver_trail.leading().map(|e| e.source) {
                    Some(ValueSource::Injected | ValueSource::PotentiallyInjected | ValueSource::Argument) => {
                        Ok(())
                    }
                    _ => Err(UnsupportedReason::NotCreatedHere.into()),
                }
            }
            _ => Err(UnsupportedReason::NotCreatedHere.into()),
        }
    }
}

/// The type of the value at `expr`; target-typed `new()` takes the declared
/// type of the member or local it initializes.
fn injected_type(oracle: &dyn SymbolOracle, expr: ExprId) -> Option<String> {
    let comp = oracle.compilation();
    if let Some(t) = oracle.type_of(expr) {
        // `locator.Get<Bar>()` declared as returning a type parameter
        if let ExprKind::Invocation { target, .. } = &comp.expr(expr).kind
            && let Some(argument) = generic_argument(&comp.expr(*target).text)
            && oracle.find_type(&t, Some(comp.enclosing_type(expr))).is_none()
        {
            return Some(argument.to_owned());
        }
        return Some(t);
    }
    match comp.expr(expr).parent? {
        ExprParent::Member(m) if comp.member(m).initializer() == Some(expr) => {
            comp.member(m).type_name().map(str::to_owned)
        }
        ExprParent::Expr(parent) => match &comp.expr(parent).kind {
            ExprKind::Assignment { left, right, .. } if *right == expr => oracle.type_of(*left),
            _ => None,
        },
        _ => comp
            .locals
            .iter()
            .find(|l| l.initializer == Some(expr))
            .and_then(|l| l.type_name.clone()),
    }
}

/// Instance constructors that initialize the instance themselves, skipping
/// those that delegate with `: this(...)`.
fn injection_constructors(comp: &Compilation, ty: TypeId) -> Result<Vec<MemberId>, Stop> {
    let targets: Vec<MemberId> = comp
        .constructors(ty, false)
        .into_iter()
        .filter(|&c| {
            !matches!(
                &comp.member(c).kind,
                MemberKind::Constructor { initializer: Some(init), .. } if init.kind == InitializerKind::This
            )
        })
        .collect();
    if targets.is_empty() {
        return Err(UnsupportedReason::NoConstructor.into());
    }
    Ok(targets)
}

/// True when `expr` is strictly inside a field or property initializer.
fn in_member_initializer(comp: &Compilation, expr: ExprId) -> bool {
    let mut current = expr;
    loop {
        match comp.expr(current).parent {
            Some(ExprParent::Expr(parent)) => current = parent,
            Some(ExprParent::Member(m)) => {
                return current != expr && comp.member(m).initializer() == Some(current);
            }
            _ => return false,
        }
    }
}

/// An expression that reads nothing from its surroundings: no locals,
/// parameters, `this` or instance members. It can be copied to any caller.
fn is_closed(oracle: &dyn SymbolOracle, expr: ExprId) -> bool {
    let comp = oracle.compilation();
    comp.subtree(expr, true).into_iter().all(|e| match &comp.expr(e).kind {
        ExprKind::This | ExprKind::Base | ExprKind::Declaration(_) => false,
        ExprKind::Lambda {
            body: LambdaBody::Block(_),
            ..
        } => false,
        ExprKind::Name(_) | ExprKind::MemberAccess { .. } => match oracle.resolve_symbol(e) {
            Some(Symbol::Local(_) | Symbol::Parameter(_)) => false,
            Some(Symbol::Member(m)) => {
                let decl = comp.member(m);
                decl.is_static() || matches!(decl.kind, MemberKind::EnumMember { .. })
            }
            Some(Symbol::Type(_)) | None => true,
        },
        _ => true,
    })
}

struct PlanBuilder<'p> {
    oracle: &'p dyn SymbolOracle,
    cancel: &'p CancellationToken,
    target: ExprId,
    type_name: String,
    parameter: String,
    closed: bool,
    edits: Vec<Edit>,
    /// Constructors that receive the new parameter.
    extended: HashSet<MemberId>,
    /// Extended constructors whose call sites are not yet rewritten.
    pending: Vec<MemberId>,
}

impl PlanBuilder<'_> {
    /// Add the parameter to `ctor`, once.
    fn extend(&mut self, ctor: MemberId) -> Result<(), Stop> {
        if self.extended.contains(&ctor) {
            return Ok(());
        }
        let comp = self.oracle.compilation();
        let decl = comp.member(ctor);
        let params = decl.params();
        if params.iter().any(|&p| comp.param(p).is_optional()) {
            return Err(UnsupportedReason::OptionalParameters.into());
        }
        let taken_by_param = params.iter().any(|&p| comp.param(p).name == self.parameter);
        let taken_by_local = comp
            .locals
            .iter()
            .any(|l| l.owner == ctor && l.name == self.parameter);
        if taken_by_param || taken_by_local || self.shadows_member(ctor) {
            return Err(UnsupportedReason::NameCollision.into());
        }
        self.extended.insert(ctor);
        self.pending.push(ctor);
        self.edits.push(Edit::AddParameter {
            ctor,
            name: self.parameter.clone(),
            type_name: self.type_name.clone(),
        });
        Ok(())
    }

    /// True when `ctor` reads or writes a member through the bare parameter name,
    /// which the new parameter would hide.
    fn shadows_member(&self, ctor: MemberId) -> bool {
        let comp = self.oracle.compilation();
        let decl = comp.member(ctor);
        let mut exprs = decl.body().map(|b| comp.body_exprs(b)).unwrap_or_default();
        if let MemberKind::Constructor {
            initializer: Some(init),
            ..
        } = &decl.kind
        {
            for arg in &init.args {
                exprs.extend(comp.subtree(arg.value, true));
            }
        }
        exprs.into_iter().any(|e| {
            matches!(&comp.expr(e).kind, ExprKind::Name(name) if *name == self.parameter)
                && matches!(self.oracle.resolve_symbol(e), Some(Symbol::Member(_)))
        })
    }

    /// Give every call of an extended constructor its new argument, extending
    /// calling constructors in turn when the original expression cannot be copied.
    fn propagate(&mut self) -> Result<(), Stop> {
        let oracle = self.oracle;
        while let Some(ctor) = self.pending.pop() {
            self.cancel.check()?;
            if !oracle.implicit_constructor_callers(ctor).is_empty() {
                // A derived type relies on the implicit parameterless call.
                return Err(UnsupportedReason::AmbiguousCallSite.into());
            }
            for site in oracle.call_sites(ctor) {
                self.cancel.check()?;
                let value = if self.closed {
                    ArgumentValue::Expression(self.target)
                } else {
                    let caller = oracle.compilation().member(site.caller);
                    if !caller.is_constructor() || caller.is_static() {
                        return Err(UnsupportedReason::AmbiguousCallSite.into());
                    }
                    self.extend(site.caller)?;
                    ArgumentValue::Name(self.parameter.clone())
                };
                self.edits.push(Edit::AppendArgument { site: *site, value });
            }
        }
        Ok(())
    }
}
