pub mod decl;
pub mod tree;

use std::path::PathBuf;

use serde::Serialize;

pub use decl::{
    Accessibility, Accessor, AccessorKind, Body, CtorInitializer, InitializerKind, LocalDecl,
    LocalKind, MemberDecl, MemberKind, Modifiers, ParamDecl, RefKind, TypeDecl, TypeKind,
};
pub use tree::{
    Argument, AssignOp, Expr, ExprKind, ExprParent, LambdaBody, LiteralKind, LoopKind, Stmt,
    StmtKind, SwitchSection,
};

// ---------------------------------------------------------------------------
// Arena ids
// ---------------------------------------------------------------------------

macro_rules! arena_id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
            pub struct $name(pub u32);

            impl $name {
                pub fn index(self) -> usize {
                    self.0 as usize
                }

                fn from_len(len: usize) -> Self {
                    Self(len as u32)
                }
            }
        )*
    };
}

arena_id!(FileId, TypeId, MemberId, ParamId, LocalId, StmtId, ExprId);

/// A point in the compilation. Orders by file, then byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub file: FileId,
    pub offset: usize,
}

/// Byte range of a node plus its 0-based start row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub file: FileId,
    pub start: usize,
    pub end: usize,
    pub line: usize,
}

impl Span {
    pub fn position(&self) -> Position {
        Position {
            file: self.file,
            offset: self.start,
        }
    }

    pub fn end_position(&self) -> Position {
        Position {
            file: self.file,
            offset: self.end,
        }
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.file == other.file && self.start <= other.start && other.end <= self.end
    }

    /// An empty span at `offset`, used for synthesized nodes.
    pub fn point(file: FileId, offset: usize, line: usize) -> Self {
        Span {
            file,
            start: offset,
            end: offset,
            line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    /// The parser recovered from at least one syntax error.
    pub has_errors: bool,
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Every syntax node of one compilation, stored in flat arenas and addressed by id.
///
/// The analysis never mutates a `Compilation`; rewrites clone it and edit the copy.
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    pub files: Vec<SourceFile>,
    pub types: Vec<TypeDecl>,
    pub members: Vec<MemberDecl>,
    pub params: Vec<ParamDecl>,
    pub locals: Vec<LocalDecl>,
    pub stmts: Vec<Stmt>,
    pub exprs: Vec<Expr>,
}

impl Compilation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }

    pub fn ty(&self, id: TypeId) -> &TypeDecl {
        &self.types[id.index()]
    }

    pub fn member(&self, id: MemberId) -> &MemberDecl {
        &self.members[id.index()]
    }

    pub fn param(&self, id: ParamId) -> &ParamDecl {
        &self.params[id.index()]
    }

    pub fn local(&self, id: LocalId) -> &LocalDecl {
        &self.locals[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn add_file(&mut self, file: SourceFile) -> FileId {
        let id = FileId::from_len(self.files.len());
        self.files.push(file);
        id
    }

    pub fn add_type(&mut self, decl: TypeDecl) -> TypeId {
        let id = TypeId::from_len(self.types.len());
        self.types.push(decl);
        id
    }

    pub fn add_member(&mut self, decl: MemberDecl) -> MemberId {
        let id = MemberId::from_len(self.members.len());
        let declaring = decl.declaring;
        self.members.push(decl);
        self.types[declaring.index()].members.push(id);
        id
    }

    pub fn add_param(&mut self, decl: ParamDecl) -> ParamId {
        let id = ParamId::from_len(self.params.len());
        self.params.push(decl);
        id
    }

    pub fn add_local(&mut self, decl: LocalDecl) -> LocalId {
        let id = LocalId::from_len(self.locals.len());
        self.locals.push(decl);
        id
    }

    pub fn add_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId::from_len(self.stmts.len());
        self.stmts.push(stmt);
        id
    }

    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId::from_len(self.exprs.len());
        self.exprs.push(expr);
        id
    }

    pub fn expr_ids(&self) -> impl Iterator<Item = ExprId> + '_ {
        (0..self.exprs.len()).map(ExprId::from_len)
    }

    pub fn member_ids(&self) -> impl Iterator<Item = MemberId> + '_ {
        (0..self.members.len()).map(MemberId::from_len)
    }

    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        (0..self.types.len()).map(TypeId::from_len)
    }

    /// The type declaring the member that contains `expr`.
    pub fn enclosing_type(&self, expr: ExprId) -> TypeId {
        self.member(self.expr(expr).member).declaring
    }

    /// Instance or static constructors of `ty`, in declaration order.
    pub fn constructors(&self, ty: TypeId, is_static: bool) -> Vec<MemberId> {
        self.ty(ty)
            .members
            .iter()
            .copied()
            .filter(|&m| {
                let decl = self.member(m);
                decl.is_constructor() && decl.is_static() == is_static
            })
            .collect()
    }

    /// Effective accessibility: the narrowest of the member's and every container's.
    pub fn declared_accessibility(&self, member: MemberId) -> Accessibility {
        let decl = self.member(member);
        let ty = self.ty(decl.declaring);
        let own = decl.modifiers.accessibility.unwrap_or(match (ty.kind, &decl.kind) {
            (TypeKind::Interface, _) | (_, MemberKind::EnumMember { .. }) => Accessibility::Public,
            _ => Accessibility::Private,
        });
        own.min(self.type_accessibility(decl.declaring))
    }

    /// Effective accessibility of a type, including its containers.
    pub fn type_accessibility(&self, ty: TypeId) -> Accessibility {
        let decl = self.ty(ty);
        match decl.containing {
            None => decl.modifiers.accessibility.unwrap_or(Accessibility::Internal),
            Some(outer) => decl
                .modifiers
                .accessibility
                .unwrap_or(Accessibility::Private)
                .min(self.type_accessibility(outer)),
        }
    }

    /// Pre-order walk of `root` and its sub-expressions. Expression-bodied lambdas
    /// are entered only when `into_lambdas` is set.
    pub fn subtree(&self, root: ExprId, into_lambdas: bool) -> Vec<ExprId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let expr = self.expr(id);
            if expr.is_lambda() && !into_lambdas && id != root {
                continue;
            }
            stack.extend(expr.children().into_iter().rev());
        }
        out
    }

    /// Every expression directly or transitively owned by a statement, in source order.
    /// Nested lambda block bodies are not entered.
    pub fn stmt_subtree_exprs(&self, root: StmtId) -> Vec<ExprId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let stmt = self.stmt(id);
            if let StmtKind::Locals(locals) = &stmt.kind {
                for local in locals {
                    if let Some(init) = self.local(*local).initializer {
                        out.extend(self.subtree(init, false));
                    }
                }
            }
            for e in stmt.header_exprs() {
                out.extend(self.subtree(e, false));
            }
            stack.extend(stmt.child_stmts().into_iter().rev());
        }
        out.sort_by_key(|&e| (self.expr(e).span.start, std::cmp::Reverse(self.expr(e).span.end)));
        out
    }

    /// All `return` expressions of a body, skipping nested lambdas.
    pub fn return_exprs(&self, body: Body) -> Vec<ExprId> {
        match body {
            Body::Expression(e) => vec![e],
            Body::Block(block) => {
                let mut out = Vec::new();
                let mut stack = vec![block];
                while let Some(id) = stack.pop() {
                    let stmt = self.stmt(id);
                    if let StmtKind::Return(Some(e)) = stmt.kind {
                        out.push(e);
                    }
                    stack.extend(stmt.child_stmts().into_iter().rev());
                }
                out
            }
        }
    }

    /// Every expression of a body, in source order.
    pub fn body_exprs(&self, body: Body) -> Vec<ExprId> {
        match body {
            Body::Expression(e) => self.subtree(e, false),
            Body::Block(block) => self.stmt_subtree_exprs(block),
        }
    }
}
