pub mod binder;
pub mod call_graph;
pub mod flow;
#[cfg(test)]
pub mod testing;

use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::syntax::{
    Accessibility, AssignOp, Compilation, ExprId, ExprKind, ExprParent, InitializerKind, MemberId,
    MemberKind, Position, TypeId, TypeKind,
};

use binder::{Binder, Tables};
use call_graph::{CallGraph, CallSite, CallSiteKind};

/// The declaration a name binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Symbol {
    Local(crate::syntax::LocalId),
    Parameter(crate::syntax::ParamId),
    /// Field, property, method, constructor or enum member.
    Member(MemberId),
    Type(TypeId),
}

/// A write to a field or property somewhere in the compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentSite {
    /// The assignment (or `++`/`--`) expression.
    pub expr: ExprId,
    /// What the member holds afterwards: the right-hand side for `=` and `??=`,
    /// the whole expression for compound updates.
    pub value: ExprId,
    /// The member whose body performs the write.
    pub container: MemberId,
    /// The write targets the instance being constructed or `this`, not an
    /// object initializer of another instance.
    pub on_this: bool,
    pub position: Position,
}

/// Everything the provenance core needs to know about symbols and calls.
///
/// Implementations must be safe to query from many resolver threads at once;
/// the core never mutates the compilation behind it.
pub trait SymbolOracle: Sync {
    fn compilation(&self) -> &Compilation;

    /// The declaration `expr` binds to, or `None` when it cannot be bound.
    fn resolve_symbol(&self, expr: ExprId) -> Option<Symbol>;

    /// Every call site of a method or constructor, in source order.
    fn call_sites(&self, member: MemberId) -> &[CallSite];

    /// Every write to a field or property, in source order.
    fn assignments(&self, member: MemberId) -> &[AssignmentSite];

    /// The static type of `expr` as written in source.
    fn type_of(&self, expr: ExprId) -> Option<String>;

    /// A type declared in the compilation, looked up by written name.
    fn find_type(&self, written: &str, from: Option<TypeId>) -> Option<TypeId>;

    fn base_type(&self, ty: TypeId) -> Option<TypeId>;

    /// The constructor a `this(...)`/`base(...)` initializer, or the implicit
    /// parameterless base call, of `ctor` invokes. When the arguments fit several
    /// overloads equally well the first declared one is returned.
    fn chained_constructor(&self, ctor: MemberId) -> Option<MemberId>;

    /// Types that declare no instance constructor and whose implicit one calls `ctor`.
    fn implicit_constructor_callers(&self, ctor: MemberId) -> &[TypeId];

    fn is_constant(&self, symbol: Symbol) -> bool {
        match symbol {
            Symbol::Member(m) => {
                let decl = self.compilation().member(m);
                decl.modifiers.is_const || matches!(decl.kind, MemberKind::EnumMember { .. })
            }
            _ => false,
        }
    }

    fn accessibility_of(&self, symbol: Symbol) -> Accessibility {
        let comp = self.compilation();
        match symbol {
            Symbol::Member(m) => comp.declared_accessibility(m),
            Symbol::Parameter(p) => comp.declared_accessibility(comp.param(p).owner),
            Symbol::Type(t) => comp.type_accessibility(t),
            Symbol::Local(_) => Accessibility::Private,
        }
    }

    fn is_sealed(&self, ty: TypeId) -> bool {
        self.compilation().ty(ty).is_sealed()
    }

    /// True when `ty` is `base` or derives from it.
    fn derives_from(&self, ty: TypeId, base: TypeId) -> bool {
        let mut current = Some(ty);
        let mut steps = 0;
        while let Some(t) = current {
            if t == base {
                return true;
            }
            steps += 1;
            if steps > self.compilation().types.len() {
                return false;
            }
            current = self.base_type(t);
        }
        false
    }
}

/// Counters logged after a model is built and printed by `index`.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ModelStats {
    pub types: usize,
    pub members: usize,
    pub expressions: usize,
    pub bound: usize,
    pub call_sites: usize,
    pub assignments: usize,
}

/// The symbol oracle over one immutable compilation.
///
/// Binding for every expression, the call-site index and the member-write index
/// are all computed once in [`SemanticModel::build`].
pub struct SemanticModel {
    comp: Compilation,
    tables: Tables,
    symbols: Vec<Option<Symbol>>,
    calls: CallGraph,
    /// Every overload a chained call may bind to.
    chained: HashMap<MemberId, Vec<MemberId>>,
    implicit_callers: HashMap<MemberId, Vec<TypeId>>,
    assignments: HashMap<MemberId, Vec<AssignmentSite>>,
}

impl SemanticModel {
    pub fn build(comp: Compilation) -> Self {
        let tables = Tables::build(&comp);
        let symbols: Vec<Option<Symbol>> = {
            let binder = Binder::new(&comp, &tables);
            (0..comp.exprs.len())
                .into_par_iter()
                .map(|i| binder.bind(ExprId(i as u32)))
                .collect()
        };

        let mut model = Self {
            comp,
            tables,
            symbols,
            calls: CallGraph::build(Vec::new()),
            chained: HashMap::new(),
            implicit_callers: HashMap::new(),
            assignments: HashMap::new(),
        };
        model.index_constructor_chains();
        model.calls = CallGraph::build(model.collect_call_sites());
        model.index_assignments();

        let stats = model.stats();
        info!(
            types = stats.types,
            members = stats.members,
            expressions = stats.expressions,
            "semantic model built"
        );
        debug!(
            bound = stats.bound,
            call_sites = stats.call_sites,
            assignments = stats.assignments,
            "semantic indexes"
        );
        model
    }

    pub fn binder(&self) -> Binder<'_> {
        Binder::new(&self.comp, &self.tables)
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            types: self.comp.types.len(),
            members: self.comp.members.len(),
            expressions: self.comp.exprs.len(),
            bound: self.symbols.iter().filter(|s| s.is_some()).count(),
            call_sites: self.calls.edge_count(),
            assignments: self.assignments.values().map(Vec::len).sum(),
        }
    }

    // -----------------------------------------------------------------------
    // Index construction
    // -----------------------------------------------------------------------

    fn index_constructor_chains(&mut self) {
        let binder = Binder::new(&self.comp, &self.tables);
        let mut chained: HashMap<MemberId, Vec<MemberId>> = HashMap::new();
        for member in self.comp.member_ids() {
            let decl = self.comp.member(member);
            let MemberKind::Constructor { initializer, .. } = &decl.kind else {
                continue;
            };
            if decl.is_static() {
                continue;
            }
            let (target, args, exclude) = match initializer {
                Some(init) if init.kind == InitializerKind::This => {
                    (Some(decl.declaring), init.args.as_slice(), Some(member))
                }
                Some(init) => (binder.base_type(decl.declaring), init.args.as_slice(), None),
                None => (binder.base_type(decl.declaring), &[][..], None),
            };
            let Some(target) = target else {
                continue;
            };
            let ctors = binder.select_constructors(target, args, exclude);
            if ctors.len() > 1 {
                debug!(ctor = %decl.name, candidates = ctors.len(), "ambiguous chained constructor");
            }
            if !ctors.is_empty() {
                chained.insert(member, ctors);
            }
        }

        let mut implicit_callers: HashMap<MemberId, Vec<TypeId>> = HashMap::new();
        for ty in self.comp.type_ids() {
            let decl = self.comp.ty(ty);
            let declares_ctor = decl.members.iter().any(|&m| {
                let member = self.comp.member(m);
                member.is_constructor() && !member.is_static()
            });
            if declares_ctor || decl.kind != TypeKind::Class || decl.is_static() {
                continue;
            }
            let Some(base) = binder.base_type(ty) else {
                continue;
            };
            for ctor in binder.select_constructors(base, &[], None) {
                implicit_callers.entry(ctor).or_default().push(ty);
            }
        }

        self.chained = chained;
        self.implicit_callers = implicit_callers;
    }

    fn collect_call_sites(&self) -> Vec<CallSite> {
        let mut sites = Vec::new();
        for expr in self.comp.expr_ids() {
            let node = self.comp.expr(expr);
            let kind = match node.kind {
                ExprKind::Invocation { .. } => CallSiteKind::Invocation(expr),
                ExprKind::ObjectCreation { .. } => CallSiteKind::Creation(expr),
                _ => continue,
            };
            if let Some(Symbol::Member(callee)) = self.symbols[expr.index()] {
                sites.push(CallSite {
                    caller: node.member,
                    callee,
                    kind,
                    position: node.span.position(),
                });
            }
        }
        for (&caller, callees) in &self.chained {
            let decl = self.comp.member(caller);
            let (kind, position) = match &decl.kind {
                MemberKind::Constructor {
                    initializer: Some(init),
                    ..
                } => (
                    CallSiteKind::Initializer {
                        this: init.kind == InitializerKind::This,
                    },
                    init.span.position(),
                ),
                _ => (CallSiteKind::ImplicitBase, decl.span.position()),
            };
            for &callee in callees {
                sites.push(CallSite {
                    caller,
                    callee,
                    kind,
                    position,
                });
            }
        }
        sites
    }

    /// `X = ...` inside `new Foo { X = ... }`.
    fn is_object_initializer(&self, assignment: ExprId) -> bool {
        match self.comp.expr(assignment).parent {
            Some(ExprParent::Expr(parent)) => matches!(
                &self.comp.expr(parent).kind,
                ExprKind::ObjectCreation { initializers, .. } if initializers.contains(&assignment)
            ),
            _ => false,
        }
    }

    fn writes_this(&self, assignment: ExprId, target: ExprId) -> bool {
        match &self.comp.expr(target).kind {
            ExprKind::Name(_) => !self.is_object_initializer(assignment),
            ExprKind::MemberAccess { target, .. } => matches!(self.comp.expr(*target).kind, ExprKind::This),
            _ => false,
        }
    }

    fn index_assignments(&mut self) {
        let mut assignments: HashMap<MemberId, Vec<AssignmentSite>> = HashMap::new();
        for expr in self.comp.expr_ids() {
            let node = self.comp.expr(expr);
            let (target, value) = match &node.kind {
                ExprKind::Assignment { op, left, right } => (
                    *left,
                    match op {
                        AssignOp::Assign | AssignOp::Coalesce => *right,
                        AssignOp::Compound => expr,
                    },
                ),
                ExprKind::Unary {
                    operand,
                    mutates: true,
                    ..
                } => (*operand, expr),
                _ => continue,
            };
            let Some(Symbol::Member(member)) = self.symbols[target.index()] else {
                continue;
            };
            if !matches!(
                self.comp.member(member).kind,
                MemberKind::Field { .. } | MemberKind::Property { .. }
            ) {
                continue;
            }
            assignments.entry(member).or_default().push(AssignmentSite {
                expr,
                value,
                container: node.member,
                on_this: self.writes_this(expr, target),
                position: node.span.position(),
            });
        }
        for sites in assignments.values_mut() {
            sites.sort_by_key(|s| s.position);
        }
        self.assignments = assignments;
    }
}

impl SymbolOracle for SemanticModel {
    fn compilation(&self) -> &Compilation {
        &self.comp
    }

    fn resolve_symbol(&self, expr: ExprId) -> Option<Symbol> {
        self.symbols.get(expr.index()).copied().flatten()
    }

    fn call_sites(&self, member: MemberId) -> &[CallSite] {
        self.calls.call_sites(member)
    }

    fn assignments(&self, member: MemberId) -> &[AssignmentSite] {
        self.assignments.get(&member).map(Vec::as_slice).unwrap_or(&[])
    }

    fn type_of(&self, expr: ExprId) -> Option<String> {
        self.binder().type_of(expr)
    }

    fn find_type(&self, written: &str, from: Option<TypeId>) -> Option<TypeId> {
        self.binder().lookup_type(written, from)
    }

    fn base_type(&self, ty: TypeId) -> Option<TypeId> {
        self.binder().base_type(ty)
    }

    fn chained_constructor(&self, ctor: MemberId) -> Option<MemberId> {
        self.chained.get(&ctor).and_then(|c| c.first()).copied()
    }

    fn implicit_constructor_callers(&self, ctor: MemberId) -> &[TypeId] {
        self.implicit_callers.get(&ctor).map(Vec::as_slice).unwrap_or(&[])
    }
}
