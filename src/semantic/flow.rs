//! Reaching definitions for locals and parameters over structured statements.
//!
//! The walk is syntactic: statements run in order, `if`/`switch` branches are
//! merged in source order, loop bodies feed their definitions back to the loop
//! head, and branches ending in `return`/`throw` drop out of the merge.

use crate::syntax::{
    AccessorKind, AssignOp, Body, Compilation, ExprId, ExprKind, LocalId, LocalKind, MemberKind,
    ParamId, RefKind, Span, StmtId, StmtKind,
};

use super::{Symbol, SymbolOracle};

/// A variable whose value is tracked through assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    Local(LocalId),
    Parameter(ParamId),
}

impl Variable {
    fn matches(self, symbol: Option<Symbol>) -> bool {
        match (self, symbol) {
            (Variable::Local(a), Some(Symbol::Local(b))) => a == b,
            (Variable::Parameter(a), Some(Symbol::Parameter(b))) => a == b,
            _ => false,
        }
    }
}

/// One assignment that may supply the value observed at a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Definition {
    /// The value the parameter held on entry.
    Entry(ParamId),
    /// `x = value` or `var x = value`: the value flows in unchanged.
    Value(ExprId),
    /// `x += 1`, `x++`: the expression computes the new value.
    Update(ExprId),
    /// `foreach`, `catch`, `out` and pattern variables.
    Opaque,
}

type Defs = Vec<Definition>;

enum Outcome {
    Normal(Defs),
    Exit,
    Found(Defs),
}

fn union(into: &mut Defs, from: &[Definition]) {
    for d in from {
        if !into.contains(d) {
            into.push(*d);
        }
    }
}

fn merge(outcomes: impl IntoIterator<Item = Outcome>) -> Outcome {
    let mut merged: Option<Defs> = None;
    for outcome in outcomes {
        match outcome {
            Outcome::Normal(defs) => union(merged.get_or_insert_with(Vec::new), &defs),
            Outcome::Found(defs) => return Outcome::Found(defs),
            Outcome::Exit => {}
        }
    }
    match merged {
        Some(defs) => Outcome::Normal(defs),
        None => Outcome::Exit,
    }
}

/// Definitions of `var` that reach the read at `read`, in discovery order.
pub fn reaching_definitions(oracle: &dyn SymbolOracle, var: Variable, read: ExprId) -> Vec<Definition> {
    let comp = oracle.compilation();
    if let Variable::Local(l) = var
        && comp.local(l).kind != LocalKind::Variable
    {
        return vec![Definition::Opaque];
    }
    let entry = match var {
        Variable::Parameter(p) => vec![Definition::Entry(p)],
        Variable::Local(_) => Vec::new(),
    };
    let flow = Flow {
        oracle,
        comp,
        var,
        read: comp.expr(read).span,
    };
    match flow.root(read) {
        Some(Body::Block(block)) => match flow.exec(block, entry.clone()) {
            Outcome::Found(defs) => defs,
            _ => entry,
        },
        Some(Body::Expression(e)) => flow.apply(e, entry, true),
        None => entry,
    }
}

struct Flow<'a> {
    oracle: &'a dyn SymbolOracle,
    comp: &'a Compilation,
    var: Variable,
    read: Span,
}

impl Flow<'_> {
    fn contains(&self, span: Span) -> bool {
        span.contains(&self.read)
    }

    fn body_span(&self, body: Body) -> Span {
        match body {
            Body::Block(s) => self.comp.stmt(s).span,
            Body::Expression(e) => self.comp.expr(e).span,
        }
    }

    /// The body to walk: a lambda block declaring the local, else the member body
    /// or accessor holding the read.
    fn root(&self, read: ExprId) -> Option<Body> {
        let member = self.comp.expr(read).member;
        if let Variable::Local(l) = self.var {
            let decl = self.comp.local(l).span;
            let lambda = self
                .comp
                .expr_ids()
                .filter(|&e| self.comp.expr(e).member == member)
                .filter_map(|e| match &self.comp.expr(e).kind {
                    ExprKind::Lambda {
                        body: crate::syntax::LambdaBody::Block(block),
                        ..
                    } => Some(*block),
                    _ => None,
                })
                .filter(|&block| {
                    let span = self.comp.stmt(block).span;
                    span.contains(&decl) && self.contains(span)
                })
                .min_by_key(|&block| {
                    let span = self.comp.stmt(block).span;
                    span.end - span.start
                });
            if let Some(block) = lambda {
                return Some(Body::Block(block));
            }
        }

        let decl = self.comp.member(member);
        let candidates: Vec<Body> = match &decl.kind {
            MemberKind::Method { body, .. } | MemberKind::Constructor { body, .. } => {
                body.iter().copied().collect()
            }
            MemberKind::Property {
                getter,
                setter,
                expression_body,
                ..
            } => getter
                .iter()
                .chain(setter.iter())
                .filter(|a| matches!(a.kind, AccessorKind::Get | AccessorKind::Set | AccessorKind::Init))
                .filter_map(|a| a.body)
                .chain(expression_body.map(Body::Expression))
                .collect(),
            _ => Vec::new(),
        };
        candidates
            .into_iter()
            .find(|&b| self.contains(self.body_span(b)))
    }

    // -----------------------------------------------------------------------
    // Expression effects
    // -----------------------------------------------------------------------

    fn targets(&self, expr: ExprId) -> bool {
        let expr = match self.comp.expr(expr).kind {
            ExprKind::Parenthesized(inner) => inner,
            _ => expr,
        };
        self.var.matches(self.oracle.resolve_symbol(expr))
    }

    /// The definition produced by `expr`, if it writes the variable.
    fn definition(&self, expr: ExprId, state: &Defs) -> Option<Defs> {
        match &self.comp.expr(expr).kind {
            ExprKind::Assignment { op, left, right } if self.targets(*left) => Some(match op {
                AssignOp::Assign => vec![Definition::Value(*right)],
                AssignOp::Coalesce => {
                    let mut defs = state.clone();
                    union(&mut defs, &[Definition::Value(*right)]);
                    defs
                }
                AssignOp::Compound => vec![Definition::Update(expr)],
            }),
            ExprKind::Unary {
                operand,
                mutates: true,
                ..
            } if self.targets(*operand) => Some(vec![Definition::Update(expr)]),
            ExprKind::Declaration(l) if self.var == Variable::Local(*l) => Some(vec![Definition::Opaque]),
            ExprKind::Invocation { args, .. } | ExprKind::ObjectCreation { args, .. } => args
                .iter()
                .any(|a| matches!(a.ref_kind, Some(RefKind::Out | RefKind::Ref)) && self.targets(a.value))
                .then(|| vec![Definition::Opaque]),
            _ => None,
        }
    }

    /// Apply the writes inside `root` in completion order. With `before_read`,
    /// only writes that complete before the read are applied.
    fn apply(&self, root: ExprId, mut state: Defs, before_read: bool) -> Defs {
        let mut writes = self.comp.subtree(root, false);
        writes.retain(|&e| !before_read || self.comp.expr(e).span.end <= self.read.start);
        writes.sort_by_key(|&e| {
            let span = self.comp.expr(e).span;
            (span.end, std::cmp::Reverse(span.start))
        });
        for e in writes {
            if let Some(defs) = self.definition(e, &state) {
                state = defs;
            }
        }
        state
    }

    /// Every definition a statement can produce, for loop back edges.
    fn all_definitions(&self, stmt: StmtId) -> Defs {
        let mut defs = Vec::new();
        for e in self.comp.stmt_subtree_exprs(stmt) {
            if let Some(d) = self.definition(e, &Vec::new()) {
                union(&mut defs, &d);
            }
        }
        defs
    }

    fn declares_var_inside(&self, stmt: StmtId) -> bool {
        match self.var {
            Variable::Local(l) => self.comp.stmt(stmt).span.contains(&self.comp.local(l).span),
            Variable::Parameter(_) => false,
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    /// Run a statement that contains the read.
    fn exec(&self, id: StmtId, state: Defs) -> Outcome {
        let stmt = self.comp.stmt(id);
        if !self.contains(stmt.span) {
            return self.run(id, state);
        }
        let header_with_read = stmt
            .header_exprs()
            .into_iter()
            .find(|&e| self.contains(self.comp.expr(e).span));

        match &stmt.kind {
            StmtKind::Block(stmts) => self.exec_seq(stmts, state),
            StmtKind::Locals(locals) => {
                let mut state = state;
                for &l in locals {
                    let local = self.comp.local(l);
                    if let Some(init) = local.initializer {
                        if self.contains(self.comp.expr(init).span) {
                            return Outcome::Found(self.apply(init, state, true));
                        }
                        state = self.apply(init, state, false);
                    }
                    if self.var == Variable::Local(l) {
                        state = local.initializer.map(Definition::Value).into_iter().collect();
                    }
                }
                Outcome::Found(state)
            }
            StmtKind::Expression(_) | StmtKind::Return(_) | StmtKind::Throw(_) => match header_with_read {
                Some(e) => Outcome::Found(self.apply(e, state, true)),
                None => Outcome::Found(state),
            },
            StmtKind::If {
                condition,
                then,
                otherwise,
            } => {
                if let Some(e) = header_with_read {
                    return Outcome::Found(self.apply(e, state, true));
                }
                let state = self.apply(*condition, state, false);
                match otherwise {
                    Some(o) if self.contains(self.comp.stmt(*o).span) => self.exec(*o, state),
                    _ => self.exec(*then, state),
                }
            }
            StmtKind::Loop {
                init, header, body, ..
            } => {
                let mut state = state;
                if let Some(init) = init {
                    if self.contains(self.comp.stmt(*init).span) {
                        return self.exec(*init, state);
                    }
                    if let Outcome::Normal(d) = self.run(*init, state.clone()) {
                        state = d;
                    }
                }
                if !self.declares_var_inside(*body) {
                    union(&mut state, &self.all_definitions(*body));
                    for &h in header {
                        union(&mut state, &self.apply(h, Vec::new(), false));
                    }
                }
                if let Some(e) = header_with_read {
                    return Outcome::Found(self.apply(e, state, true));
                }
                self.exec(*body, state)
            }
            StmtKind::Switch { value, sections } => {
                if let Some(e) = header_with_read {
                    return Outcome::Found(self.apply(e, state, true));
                }
                let state = self.apply(*value, state, false);
                for section in sections {
                    if section.body.iter().any(|&s| self.contains(self.comp.stmt(s).span)) {
                        return self.exec_seq(&section.body, state);
                    }
                }
                Outcome::Found(state)
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                if self.contains(self.comp.stmt(*body).span) {
                    return self.exec(*body, state);
                }
                let mut widened = state.clone();
                union(&mut widened, &self.all_definitions(*body));
                if let Some(&c) = catches.iter().find(|&&c| self.contains(self.comp.stmt(c).span)) {
                    return self.exec(c, widened);
                }
                for &c in catches {
                    union(&mut widened, &self.all_definitions(c));
                }
                match finally {
                    Some(f) => self.exec(*f, widened),
                    None => Outcome::Found(state),
                }
            }
            StmtKind::Scoped { header, decl, body } => {
                if let Some(e) = header_with_read {
                    return Outcome::Found(self.apply(e, state, true));
                }
                let mut state = header.iter().fold(state, |s, &h| self.apply(h, s, false));
                if let Some(decl) = decl {
                    if self.contains(self.comp.stmt(*decl).span) {
                        return self.exec(*decl, state);
                    }
                    if let Outcome::Normal(d) = self.run(*decl, state.clone()) {
                        state = d;
                    }
                }
                self.exec(*body, state)
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Empty => Outcome::Found(state),
        }
    }

    fn exec_seq(&self, stmts: &[StmtId], state: Defs) -> Outcome {
        let mut state = state;
        for &s in stmts {
            if self.contains(self.comp.stmt(s).span) {
                return self.exec(s, state);
            }
            state = match self.run(s, state) {
                Outcome::Normal(d) => d,
                Outcome::Exit | Outcome::Found(_) => Vec::new(),
            };
        }
        Outcome::Normal(state)
    }

    fn run_seq(&self, stmts: &[StmtId], state: Defs) -> Outcome {
        let mut state = state;
        for &s in stmts {
            match self.run(s, state) {
                Outcome::Normal(d) => state = d,
                other => return other,
            }
        }
        Outcome::Normal(state)
    }

    /// Run a statement that does not contain the read, to completion.
    fn run(&self, id: StmtId, state: Defs) -> Outcome {
        let stmt = self.comp.stmt(id);
        match &stmt.kind {
            StmtKind::Block(stmts) => self.run_seq(stmts, state),
            StmtKind::Locals(locals) => {
                let mut state = state;
                for &l in locals {
                    let local = self.comp.local(l);
                    if let Some(init) = local.initializer {
                        state = self.apply(init, state, false);
                    }
                    if self.var == Variable::Local(l) {
                        state = local.initializer.map(Definition::Value).into_iter().collect();
                    }
                }
                Outcome::Normal(state)
            }
            StmtKind::Expression(e) => Outcome::Normal(self.apply(*e, state, false)),
            StmtKind::Return(e) | StmtKind::Throw(e) => {
                if let Some(e) = e {
                    self.apply(*e, state, false);
                }
                Outcome::Exit
            }
            StmtKind::If {
                condition,
                then,
                otherwise,
            } => {
                let state = self.apply(*condition, state, false);
                let then_out = self.run(*then, state.clone());
                let else_out = match otherwise {
                    Some(o) => self.run(*o, state),
                    None => Outcome::Normal(state),
                };
                merge([then_out, else_out])
            }
            StmtKind::Loop {
                init, header, body, ..
            } => {
                let mut state = state;
                if let Some(init) = init
                    && let Outcome::Normal(d) = self.run(*init, state.clone())
                {
                    state = d;
                }
                for &h in header {
                    state = self.apply(h, state, false);
                }
                union(&mut state, &self.all_definitions(*body));
                Outcome::Normal(state)
            }
            StmtKind::Switch { value, sections } => {
                let state = self.apply(*value, state, false);
                let mut outcomes: Vec<Outcome> = sections
                    .iter()
                    .map(|s| self.run_seq(&s.body, state.clone()))
                    .collect();
                if !sections.iter().any(|s| s.is_default) {
                    outcomes.push(Outcome::Normal(state));
                }
                merge(outcomes)
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                let mut widened = state.clone();
                union(&mut widened, &self.all_definitions(*body));
                let mut outcomes = vec![self.run(*body, state)];
                outcomes.extend(catches.iter().map(|&c| self.run(c, widened.clone())));
                let merged = merge(outcomes);
                match (finally, merged) {
                    (Some(f), Outcome::Normal(d)) => self.run(*f, d),
                    (Some(f), _) => {
                        self.run(*f, widened);
                        Outcome::Exit
                    }
                    (None, merged) => merged,
                }
            }
            StmtKind::Scoped { header, decl, body } => {
                let mut state = header.iter().fold(state, |s, &h| self.apply(h, s, false));
                if let Some(decl) = decl
                    && let Outcome::Normal(d) = self.run(*decl, state.clone())
                {
                    state = d;
                }
                self.run(*body, state)
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Empty => Outcome::Normal(state),
        }
    }
}
