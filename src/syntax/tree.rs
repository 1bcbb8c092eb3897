use super::{ExprId, LocalId, MemberId, ParamId, Span, StmtId};
use super::decl::RefKind;

/// One argument of an invocation, creation or constructor initializer.
#[derive(Debug, Clone)]
pub struct Argument {
    /// The `name:` label of a named argument.
    pub name: Option<String>,
    pub value: ExprId,
    pub ref_kind: Option<RefKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Integer,
    Real,
    String,
    Character,
    Boolean,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// Plain `=`.
    Assign,
    /// `??=`: keeps the previous value when it is not null.
    Coalesce,
    /// `+=`, `-=`, `|=` and the other read-modify-write operators.
    Compound,
}

#[derive(Debug, Clone)]
pub enum LambdaBody {
    Expression(ExprId),
    Block(StmtId),
}

/// The closed set of expression shapes the analysis distinguishes.
///
/// Anything the lowering does not model lands in `Other`, which still keeps its
/// sub-expressions so that walks over the tree stay complete.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(LiteralKind),
    /// A simple or generic name; generic arguments are stripped from `name`.
    Name(String),
    This,
    Base,
    MemberAccess {
        target: ExprId,
        name: String,
        /// `?.` access.
        conditional: bool,
    },
    ElementAccess {
        target: ExprId,
        args: Vec<Argument>,
        conditional: bool,
    },
    Invocation {
        target: ExprId,
        args: Vec<Argument>,
    },
    /// `new T(...) { ... }`; `type_name` is `None` for target-typed `new(...)`.
    ObjectCreation {
        type_name: Option<String>,
        args: Vec<Argument>,
        initializers: Vec<ExprId>,
    },
    /// Array creation, collection initializers and anonymous objects.
    Collection(Vec<ExprId>),
    Assignment {
        op: AssignOp,
        left: ExprId,
        right: ExprId,
    },
    Conditional {
        condition: ExprId,
        then: ExprId,
        otherwise: ExprId,
    },
    Coalesce {
        left: ExprId,
        right: ExprId,
    },
    Binary {
        op: String,
        left: ExprId,
        right: ExprId,
    },
    Unary {
        op: String,
        operand: ExprId,
        /// `++`/`--`.
        mutates: bool,
    },
    /// `(T)x` and `x as T`.
    Cast {
        type_name: String,
        operand: ExprId,
    },
    Parenthesized(ExprId),
    Await(ExprId),
    Lambda {
        params: Vec<LocalId>,
        body: LambdaBody,
    },
    SwitchExpr {
        value: ExprId,
        arms: Vec<ExprId>,
    },
    Interpolated(Vec<ExprId>),
    Throw(Option<ExprId>),
    Default,
    /// `out var x`, `is Foo x` designations.
    Declaration(LocalId),
    Other(Vec<ExprId>),
}

/// Where an expression hangs in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprParent {
    Expr(ExprId),
    Stmt(StmtId),
    /// Field/property initializer, `=>` body or constructor initializer argument.
    Member(MemberId),
    /// Default value of a parameter.
    Param(ParamId),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    /// Source text of the expression, kept verbatim.
    pub text: String,
    pub span: Span,
    pub parent: Option<ExprParent>,
    /// The member whose declaration lexically contains this expression.
    pub member: MemberId,
}

impl Expr {
    /// Direct sub-expressions in source order. Lambda block bodies are statements
    /// and are not included.
    pub fn children(&self) -> Vec<ExprId> {
        let args = |args: &[Argument]| args.iter().map(|a| a.value).collect::<Vec<_>>();
        match &self.kind {
            ExprKind::Literal(_)
            | ExprKind::Name(_)
            | ExprKind::This
            | ExprKind::Base
            | ExprKind::Default
            | ExprKind::Declaration(_) => Vec::new(),
            ExprKind::MemberAccess { target, .. } => vec![*target],
            ExprKind::ElementAccess { target, args: a, .. }
            | ExprKind::Invocation { target, args: a } => {
                let mut out = vec![*target];
                out.extend(args(a));
                out
            }
            ExprKind::ObjectCreation {
                args: a,
                initializers,
                ..
            } => {
                let mut out = args(a);
                out.extend(initializers.iter().copied());
                out
            }
            ExprKind::Collection(items) | ExprKind::Interpolated(items) | ExprKind::Other(items) => {
                items.clone()
            }
            ExprKind::Assignment { left, right, .. }
            | ExprKind::Coalesce { left, right }
            | ExprKind::Binary { left, right, .. } => vec![*left, *right],
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => vec![*condition, *then, *otherwise],
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => vec![*operand],
            ExprKind::Parenthesized(inner) | ExprKind::Await(inner) => vec![*inner],
            ExprKind::Lambda { body, .. } => match body {
                LambdaBody::Expression(e) => vec![*e],
                LambdaBody::Block(_) => Vec::new(),
            },
            ExprKind::SwitchExpr { value, arms } => {
                let mut out = vec![*value];
                out.extend(arms.iter().copied());
                out
            }
            ExprKind::Throw(inner) => inner.iter().copied().collect(),
        }
    }

    pub fn is_lambda(&self) -> bool {
        matches!(self.kind, ExprKind::Lambda { .. })
    }
}

impl ExprKind {
    /// The same shape with every direct sub-expression replaced by `f(child)`,
    /// visiting children in source order.
    pub fn map_children(&self, mut f: impl FnMut(ExprId) -> ExprId) -> ExprKind {
        fn args(args: &[Argument], f: &mut dyn FnMut(ExprId) -> ExprId) -> Vec<Argument> {
            args.iter()
                .map(|a| Argument {
                    name: a.name.clone(),
                    value: f(a.value),
                    ref_kind: a.ref_kind,
                })
                .collect()
        }
        match self {
            ExprKind::Literal(_)
            | ExprKind::Name(_)
            | ExprKind::This
            | ExprKind::Base
            | ExprKind::Default
            | ExprKind::Declaration(_) => self.clone(),
            ExprKind::MemberAccess {
                target,
                name,
                conditional,
            } => ExprKind::MemberAccess {
                target: f(*target),
                name: name.clone(),
                conditional: *conditional,
            },
            ExprKind::ElementAccess {
                target,
                args: a,
                conditional,
            } => {
                let target = f(*target);
                ExprKind::ElementAccess {
                    target,
                    args: args(a, &mut f),
                    conditional: *conditional,
                }
            }
            ExprKind::Invocation { target, args: a } => {
                let target = f(*target);
                ExprKind::Invocation {
                    target,
                    args: args(a, &mut f),
                }
            }
            ExprKind::ObjectCreation {
                type_name,
                args: a,
                initializers,
            } => {
                let a = args(a, &mut f);
                ExprKind::ObjectCreation {
                    type_name: type_name.clone(),
                    args: a,
                    initializers: initializers.iter().map(|&e| f(e)).collect(),
                }
            }
            ExprKind::Collection(items) => ExprKind::Collection(items.iter().map(|&e| f(e)).collect()),
            ExprKind::Interpolated(items) => {
                ExprKind::Interpolated(items.iter().map(|&e| f(e)).collect())
            }
            ExprKind::Other(items) => ExprKind::Other(items.iter().map(|&e| f(e)).collect()),
            ExprKind::Assignment { op, left, right } => {
                let left = f(*left);
                ExprKind::Assignment {
                    op: *op,
                    left,
                    right: f(*right),
                }
            }
            ExprKind::Coalesce { left, right } => {
                let left = f(*left);
                ExprKind::Coalesce {
                    left,
                    right: f(*right),
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = f(*left);
                ExprKind::Binary {
                    op: op.clone(),
                    left,
                    right: f(*right),
                }
            }
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = f(*condition);
                let then = f(*then);
                ExprKind::Conditional {
                    condition,
                    then,
                    otherwise: f(*otherwise),
                }
            }
            ExprKind::Unary {
                op,
                operand,
                mutates,
            } => ExprKind::Unary {
                op: op.clone(),
                operand: f(*operand),
                mutates: *mutates,
            },
            ExprKind::Cast { type_name, operand } => ExprKind::Cast {
                type_name: type_name.clone(),
                operand: f(*operand),
            },
            ExprKind::Parenthesized(inner) => ExprKind::Parenthesized(f(*inner)),
            ExprKind::Await(inner) => ExprKind::Await(f(*inner)),
            ExprKind::Lambda { params, body } => ExprKind::Lambda {
                params: params.clone(),
                body: match body {
                    LambdaBody::Expression(e) => LambdaBody::Expression(f(*e)),
                    LambdaBody::Block(b) => LambdaBody::Block(*b),
                },
            },
            ExprKind::SwitchExpr { value, arms } => {
                let value = f(*value);
                ExprKind::SwitchExpr {
                    value,
                    arms: arms.iter().map(|&e| f(e)).collect(),
                }
            }
            ExprKind::Throw(inner) => ExprKind::Throw(inner.map(&mut f)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchSection {
    pub labels: Vec<ExprId>,
    pub is_default: bool,
    pub body: Vec<StmtId>,
}

#[derive(Debug, Clone)]
pub enum LoopKind {
    While,
    Do,
    For,
    ForEach(Option<LocalId>),
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Block(Vec<StmtId>),
    /// `var a = 1, b;` Each local with its initializer, if any.
    Locals(Vec<LocalId>),
    Expression(ExprId),
    Return(Option<ExprId>),
    Throw(Option<ExprId>),
    If {
        condition: ExprId,
        then: StmtId,
        otherwise: Option<StmtId>,
    },
    Loop {
        kind: LoopKind,
        /// `for` initializer statement.
        init: Option<StmtId>,
        /// Condition, `for` updates and `foreach` collection.
        header: Vec<ExprId>,
        body: StmtId,
    },
    Switch {
        value: ExprId,
        sections: Vec<SwitchSection>,
    },
    Try {
        body: StmtId,
        catches: Vec<StmtId>,
        finally: Option<StmtId>,
    },
    /// `using`, `lock`, `fixed` and `checked` statements: a header followed by a body.
    Scoped {
        header: Vec<ExprId>,
        decl: Option<StmtId>,
        body: StmtId,
    },
    Break,
    Continue,
    Empty,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    pub member: MemberId,
}

impl Stmt {
    /// Nested statements in source order.
    pub fn child_stmts(&self) -> Vec<StmtId> {
        match &self.kind {
            StmtKind::Block(stmts) => stmts.clone(),
            StmtKind::If {
                then, otherwise, ..
            } => std::iter::once(*then).chain(*otherwise).collect(),
            StmtKind::Loop { init, body, .. } => init.iter().copied().chain([*body]).collect(),
            StmtKind::Switch { sections, .. } => {
                sections.iter().flat_map(|s| s.body.iter().copied()).collect()
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => std::iter::once(*body)
                .chain(catches.iter().copied())
                .chain(*finally)
                .collect(),
            StmtKind::Scoped { decl, body, .. } => decl.iter().copied().chain([*body]).collect(),
            _ => Vec::new(),
        }
    }

    /// Expressions owned directly by this statement, excluding nested statements.
    pub fn header_exprs(&self) -> Vec<ExprId> {
        match &self.kind {
            StmtKind::Expression(e) => vec![*e],
            StmtKind::Return(e) | StmtKind::Throw(e) => e.iter().copied().collect(),
            StmtKind::If { condition, .. } => vec![*condition],
            StmtKind::Loop { header, .. } | StmtKind::Scoped { header, .. } => header.clone(),
            StmtKind::Switch { value, sections } => std::iter::once(*value)
                .chain(sections.iter().flat_map(|s| s.labels.iter().copied()))
                .collect(),
            _ => Vec::new(),
        }
    }
}
