use crate::error::EditError;
use crate::semantic::call_graph::CallSiteKind;
use crate::syntax::{
    Accessibility, Argument, AssignOp, Body, Compilation, CtorInitializer, Expr, ExprId, ExprKind,
    ExprParent, InitializerKind, MemberDecl, MemberId, MemberKind, Modifiers, ParamDecl, Span, Stmt,
    StmtKind,
};

use super::plan::{ArgumentValue, Edit, RewritePlan};

/// A rewritten compilation plus the expressions that now carry the injected value.
#[derive(Debug)]
pub struct Applied {
    pub compilation: Compilation,
    /// Replaced expressions and the parameter reads of synthesized assignments.
    pub anchors: Vec<ExprId>,
}

/// Applies a rewrite plan to a compilation, leaving the input untouched.
pub trait TreeEditor {
    fn apply(&self, comp: &Compilation, plan: &RewritePlan) -> Result<Applied, EditError>;
}

/// Edits a copy of the syntax arena directly.
///
/// Replaced sub-trees stay in the arena detached from any parent, so ids held
/// by the caller keep pointing at valid nodes. Source files are not re-printed;
/// expression texts are patched so trails over the result read naturally.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArenaEditor;

impl TreeEditor for ArenaEditor {
    fn apply(&self, comp: &Compilation, plan: &RewritePlan) -> Result<Applied, EditError> {
        let mut session = Session {
            source: comp,
            comp: comp.clone(),
            parameter: &plan.parameter,
            anchors: Vec::new(),
        };
        for edit in &plan.edits {
            session.apply(edit)?;
        }
        Ok(Applied {
            compilation: session.comp,
            anchors: session.anchors,
        })
    }
}

struct Session<'p> {
    /// The unedited compilation; copies of original expressions come from here.
    source: &'p Compilation,
    comp: Compilation,
    parameter: &'p str,
    anchors: Vec<ExprId>,
}

impl Session<'_> {
    fn apply(&mut self, edit: &Edit) -> Result<(), EditError> {
        match edit {
            Edit::AddParameter {
                ctor,
                name,
                type_name,
            } => self.add_parameter(*ctor, name, type_name),
            Edit::ReplaceExpression { expr, with } => {
                self.replace_expression(*expr, with);
                Ok(())
            }
            Edit::AddField {
                ty,
                name,
                type_name,
            } => {
                let span = self.comp.ty(*ty).span;
                self.comp.add_member(MemberDecl {
                    name: name.clone(),
                    declaring: *ty,
                    modifiers: Modifiers {
                        accessibility: Some(Accessibility::Private),
                        is_readonly: true,
                        ..Modifiers::default()
                    },
                    kind: MemberKind::Field {
                        type_name: type_name.clone(),
                        initializer: None,
                    },
                    span: Span::point(span.file, span.start, span.line),
                });
                Ok(())
            }
            Edit::AssignField {
                ctor,
                field,
                parameter,
            } => self.assign_field(*ctor, field, parameter),
            Edit::RemoveInitializer { member } => {
                let removed = match &mut self.comp.members[member.index()].kind {
                    MemberKind::Field { initializer, .. } | MemberKind::Property { initializer, .. } => {
                        initializer.take()
                    }
                    _ => None,
                };
                let init = removed.ok_or(EditError::NoInitializer(*member))?;
                self.detach(init, true);
                Ok(())
            }
            Edit::AppendArgument { site, value } => match site.kind {
                CallSiteKind::Invocation(e) | CallSiteKind::Creation(e) => {
                    self.append_to_call(e, site.caller, value)
                }
                CallSiteKind::Initializer { .. } | CallSiteKind::ImplicitBase => {
                    self.append_to_initializer(site.caller, value)
                }
            },
        }
    }

    fn add_parameter(&mut self, ctor: MemberId, name: &str, type_name: &str) -> Result<(), EditError> {
        let decl = self.comp.member(ctor);
        let MemberKind::Constructor { params, .. } = &decl.kind else {
            return Err(EditError::NotAConstructor(ctor));
        };
        let param = ParamDecl {
            name: name.to_owned(),
            type_name: type_name.to_owned(),
            owner: ctor,
            ordinal: params.len(),
            default: None,
            is_params: false,
            ref_kind: None,
            is_accessor_value: false,
            span: Span::point(decl.span.file, decl.span.start, decl.span.line),
        };
        let id = self.comp.add_param(param);
        if let MemberKind::Constructor { params, .. } = &mut self.comp.members[ctor.index()].kind {
            params.push(id);
        }
        Ok(())
    }

    /// Rewrite `expr` in place into a name or `this.name` read.
    fn replace_expression(&mut self, expr: ExprId, with: &str) {
        let old = self.comp.expr(expr).clone();
        self.detach(expr, false);
        let kind = self.reference_kind(with, expr, old.span, old.member);
        let node = &mut self.comp.exprs[expr.index()];
        node.kind = kind;
        node.text = with.to_owned();
        self.patch_ancestors(old.parent, &old.text, with);
        self.anchors.push(expr);
    }

    /// `this.x` becomes a member access on a fresh `this`; anything else a simple name.
    fn reference_kind(&mut self, reference: &str, parent: ExprId, span: Span, member: MemberId) -> ExprKind {
        match reference.strip_prefix("this.") {
            Some(name) => {
                let this = self.comp.add_expr(Expr {
                    kind: ExprKind::This,
                    text: "this".into(),
                    span: Span::point(span.file, span.start, span.line),
                    parent: Some(ExprParent::Expr(parent)),
                    member,
                });
                ExprKind::MemberAccess {
                    target: this,
                    name: name.to_owned(),
                    conditional: false,
                }
            }
            None => ExprKind::Name(reference.to_owned()),
        }
    }

    fn assign_field(&mut self, ctor: MemberId, field: &str, parameter: &str) -> Result<(), EditError> {
        let decl = self.comp.member(ctor).clone();
        let MemberKind::Constructor { body, .. } = decl.kind else {
            return Err(EditError::NotAConstructor(ctor));
        };
        let at = match body {
            Some(Body::Block(block)) => {
                let span = self.comp.stmt(block).span;
                Span::point(span.file, span.start + 1, span.line)
            }
            Some(Body::Expression(e)) => {
                let span = self.comp.expr(e).span;
                Span::point(span.file, span.start, span.line)
            }
            None => Span::point(decl.span.file, decl.span.end, decl.span.line),
        };

        let placeholder = |text: String| Expr {
            kind: ExprKind::Other(Vec::new()),
            text,
            span: at,
            parent: None,
            member: ctor,
        };
        let assignment = self.comp.add_expr(placeholder(format!("{field} = {parameter}")));
        let left = self.comp.add_expr(placeholder(field.to_owned()));
        let left_kind = self.reference_kind(field, left, at, ctor);
        self.comp.exprs[left.index()].kind = left_kind;
        let right = self.comp.add_expr(Expr {
            kind: ExprKind::Name(parameter.to_owned()),
            ..placeholder(parameter.to_owned())
        });
        for side in [left, right] {
            self.comp.exprs[side.index()].parent = Some(ExprParent::Expr(assignment));
        }
        self.comp.exprs[assignment.index()].kind = ExprKind::Assignment {
            op: AssignOp::Assign,
            left,
            right,
        };
        let stmt = self.comp.add_stmt(Stmt {
            kind: StmtKind::Expression(assignment),
            span: at,
            member: ctor,
        });
        self.comp.exprs[assignment.index()].parent = Some(ExprParent::Stmt(stmt));

        match body {
            Some(Body::Block(block)) => {
                if let StmtKind::Block(stmts) = &mut self.comp.stmts[block.index()].kind {
                    stmts.insert(0, stmt);
                }
            }
            Some(Body::Expression(e)) => {
                let span = self.comp.expr(e).span;
                let rest = self.comp.add_stmt(Stmt {
                    kind: StmtKind::Expression(e),
                    span,
                    member: ctor,
                });
                self.comp.exprs[e.index()].parent = Some(ExprParent::Stmt(rest));
                let block = self.comp.add_stmt(Stmt {
                    kind: StmtKind::Block(vec![stmt, rest]),
                    span: Span { start: at.start, ..span },
                    member: ctor,
                });
                self.set_body(ctor, block);
            }
            None => {
                let block = self.comp.add_stmt(Stmt {
                    kind: StmtKind::Block(vec![stmt]),
                    span: at,
                    member: ctor,
                });
                self.set_body(ctor, block);
            }
        }
        self.anchors.push(right);
        Ok(())
    }

    fn set_body(&mut self, ctor: MemberId, block: crate::syntax::StmtId) {
        if let MemberKind::Constructor { body, .. } = &mut self.comp.members[ctor.index()].kind {
            *body = Some(Body::Block(block));
        }
    }

    fn argument(&mut self, value: &ArgumentValue, parent: ExprParent, member: MemberId, at: Span) -> Argument {
        let value = match value {
            ArgumentValue::Expression(original) => self.copy_expr(*original, parent, member, at),
            ArgumentValue::Name(name) => self.comp.add_expr(Expr {
                kind: ExprKind::Name(name.clone()),
                text: name.clone(),
                span: at,
                parent: Some(parent),
                member,
            }),
        };
        Argument {
            name: None,
            value,
            ref_kind: None,
        }
    }

    /// Copy an expression of the unedited compilation into `member`.
    fn copy_expr(&mut self, original: ExprId, parent: ExprParent, member: MemberId, at: Span) -> ExprId {
        let node = self.source.expr(original).clone();
        let id = self.comp.add_expr(Expr {
            kind: ExprKind::Other(Vec::new()),
            text: node.text.clone(),
            span: at,
            parent: Some(parent),
            member,
        });
        let kind = node
            .kind
            .map_children(|child| self.copy_expr(child, ExprParent::Expr(id), member, at));
        self.comp.exprs[id.index()].kind = kind;
        id
    }

    fn append_to_call(&mut self, call: ExprId, caller: MemberId, value: &ArgumentValue) -> Result<(), EditError> {
        let node = self.comp.expr(call);
        let (has_named, is_creation) = match &node.kind {
            ExprKind::Invocation { args, .. } => (args.iter().any(|a| a.name.is_some()), false),
            ExprKind::ObjectCreation { args, .. } => (args.iter().any(|a| a.name.is_some()), true),
            _ => return Err(EditError::NotACallSite(call)),
        };
        let at = Span::point(node.span.file, node.span.end, node.span.line);
        let mut argument = self.argument(value, ExprParent::Expr(call), caller, at);
        let value_text = self.comp.expr(argument.value).text.clone();
        let rendered = if has_named {
            argument.name = Some(self.parameter.to_owned());
            format!("{}: {value_text}", self.parameter)
        } else {
            value_text
        };

        let node = &mut self.comp.exprs[call.index()];
        if let ExprKind::Invocation { args, .. } | ExprKind::ObjectCreation { args, .. } = &mut node.kind {
            args.push(argument);
        }
        let old = node.text.clone();
        let new = if is_creation {
            insert_creation_argument(&old, &rendered)
        } else {
            insert_invocation_argument(&old, &rendered)
        };
        node.text = new.clone();
        let parent = node.parent;
        self.patch_ancestors(parent, &old, &new);
        Ok(())
    }

    fn append_to_initializer(&mut self, ctor: MemberId, value: &ArgumentValue) -> Result<(), EditError> {
        let decl = self.comp.member(ctor);
        let MemberKind::Constructor { initializer, .. } = &decl.kind else {
            return Err(EditError::NotAConstructor(ctor));
        };
        let at = match initializer {
            Some(init) => Span::point(init.span.file, init.span.end, init.span.line),
            None => Span::point(decl.span.file, decl.span.start, decl.span.line),
        };
        let argument = self.argument(value, ExprParent::Member(ctor), ctor, at);
        if let MemberKind::Constructor { initializer, .. } = &mut self.comp.members[ctor.index()].kind {
            match initializer {
                Some(init) => init.args.push(argument),
                None => {
                    *initializer = Some(CtorInitializer {
                        kind: InitializerKind::Base,
                        args: vec![argument],
                        span: at,
                    });
                }
            }
        }
        Ok(())
    }

    /// Cut the sub-tree below `root` out of the tree. Detached nodes become
    /// childless `Other` expressions so no index picks them up again.
    fn detach(&mut self, root: ExprId, include_root: bool) {
        for id in self.comp.subtree(root, true) {
            if id == root && !include_root {
                continue;
            }
            let node = &mut self.comp.exprs[id.index()];
            node.kind = ExprKind::Other(Vec::new());
            node.parent = None;
        }
    }

    /// Propagate a text change from a child into each enclosing expression.
    fn patch_ancestors(&mut self, mut parent: Option<ExprParent>, old: &str, new: &str) {
        let (mut old, mut new) = (old.to_owned(), new.to_owned());
        while let Some(ExprParent::Expr(id)) = parent {
            let node = &mut self.comp.exprs[id.index()];
            let before = node.text.clone();
            node.text = before.replacen(&old, &new, 1);
            old = before;
            new = node.text.clone();
            parent = node.parent;
        }
    }
}

/// `new Foo(a) { X = 1 }` -> `new Foo(a, arg) { X = 1 }`; adds parentheses when missing.
fn insert_creation_argument(text: &str, arg: &str) -> String {
    let brace = text.find('{').unwrap_or(text.len());
    let Some(open) = text[..brace].find('(') else {
        let (head, tail) = text.split_at(brace);
        let head = head.trim_end();
        return if tail.is_empty() {
            format!("{head}({arg})")
        } else {
            format!("{head}({arg}) {tail}")
        };
    };
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return splice(text, open, open + i, arg);
                }
            }
            _ => {}
        }
    }
    format!("{text}({arg})")
}

/// `a.B(c).D(e)` -> `a.B(c).D(e, arg)`: the last argument list is the call's own.
fn insert_invocation_argument(text: &str, arg: &str) -> String {
    let Some(close) = text.rfind(')') else {
        return format!("{text}({arg})");
    };
    let mut depth = 0usize;
    for (i, c) in text[..=close].char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth -= 1;
                if depth == 0 {
                    return splice(text, i, close, arg);
                }
            }
            _ => {}
        }
    }
    format!("{text}({arg})")
}

/// Insert `arg` as the last entry of the list between `open` and `close`.
fn splice(text: &str, open: usize, close: usize, arg: &str) -> String {
    let separator = if text[open + 1..close].trim().is_empty() { "" } else { ", " };
    format!("{}{separator}{arg}{}", &text[..close], &text[close..])
}
