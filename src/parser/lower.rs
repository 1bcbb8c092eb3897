use std::path::PathBuf;

use tree_sitter::{Node, Tree};

use crate::syntax::{
    Accessor, AccessorKind, Argument, AssignOp, Body, Compilation, CtorInitializer, Expr,
    ExprId, ExprKind, ExprParent, FileId, InitializerKind, LambdaBody, LiteralKind, LocalDecl,
    LocalId, LocalKind, LoopKind, MemberDecl, MemberId, MemberKind, Modifiers, ParamDecl,
    ParamId, RefKind, SourceFile, Span, Stmt, StmtId, StmtKind, SwitchSection, TypeDecl,
    TypeId, TypeKind,
};

/// Statement node kinds of the C# grammar that a `switch_section` may contain.
const STATEMENT_KINDS: &[&str] = &[
    "block",
    "break_statement",
    "checked_statement",
    "continue_statement",
    "do_statement",
    "empty_statement",
    "expression_statement",
    "fixed_statement",
    "for_statement",
    "return_statement",
    "lock_statement",
    "yield_statement",
    "switch_statement",
    "throw_statement",
    "try_statement",
    "unsafe_statement",
    "using_statement",
    "foreach_statement",
    "goto_statement",
    "labeled_statement",
    "if_statement",
    "while_statement",
    "local_declaration_statement",
    "local_function_statement",
];

/// Lexical context threaded through expression and statement lowering.
#[derive(Clone, Copy)]
struct Scope {
    member: MemberId,
    /// Byte offset where locals declared at this point go out of scope.
    scope_end: usize,
}

impl Scope {
    fn until(self, end: usize) -> Self {
        Scope {
            scope_end: end,
            ..self
        }
    }
}

/// Lower one parsed file into `comp` and return its id.
pub fn lower_file(comp: &mut Compilation, path: PathBuf, source: &str, tree: &Tree) -> FileId {
    let root = tree.root_node();
    let file = comp.add_file(SourceFile {
        path,
        text: source.to_owned(),
        has_errors: root.has_error(),
    });
    let mut lowerer = Lowerer {
        comp,
        file,
        source,
        namespace: String::new(),
    };
    lowerer.declarations(root, None);
    file
}

struct Lowerer<'a> {
    comp: &'a mut Compilation,
    file: FileId,
    source: &'a str,
    namespace: String,
}

// ---------------------------------------------------------------------------
// Node helpers
// ---------------------------------------------------------------------------

fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

/// Named children plus the anonymous `this`/`base` tokens, which stand for expressions.
fn value_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    children(node)
        .into_iter()
        .filter(|c| {
            (c.is_named() && c.kind() != "comment" && c.kind() != "attribute_list")
                || matches!(c.kind(), "this" | "base")
        })
        .collect()
}

fn has_token(node: Node, token: &str) -> bool {
    children(node).iter().any(|c| !c.is_named() && c.kind() == token)
}

fn is_statement(kind: &str) -> bool {
    STATEMENT_KINDS.contains(&kind)
}

impl<'a> Lowerer<'a> {
    fn text(&self, node: Node) -> &'a str {
        self.source.get(node.start_byte()..node.end_byte()).unwrap_or("")
    }

    fn field_text(&self, node: Node, field: &str) -> String {
        node.child_by_field_name(field)
            .map(|n| self.text(n).to_owned())
            .unwrap_or_default()
    }

    /// Type text with whitespace removed, so `Dictionary<string, int>` compares stably.
    fn type_text(&self, node: Option<Node>) -> String {
        node.map(|n| self.text(n).split_whitespace().collect::<String>())
            .unwrap_or_default()
    }

    fn span(&self, node: Node) -> Span {
        Span {
            file: self.file,
            start: node.start_byte(),
            end: node.end_byte(),
            line: node.start_position().row,
        }
    }

    fn modifiers(&self, node: Node) -> Modifiers {
        let words: Vec<&str> = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "modifier")
            .map(|c| self.text(c))
            .collect();
        Modifiers::from_keywords(words)
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn declarations(&mut self, node: Node, containing: Option<TypeId>) {
        for child in named_children(node) {
            match child.kind() {
                "namespace_declaration" => {
                    let saved = self.namespace.clone();
                    let name = self.field_text(child, "name");
                    self.namespace = if saved.is_empty() {
                        name
                    } else {
                        format!("{saved}.{name}")
                    };
                    if let Some(body) = child.child_by_field_name("body") {
                        self.declarations(body, containing);
                    }
                    self.namespace = saved;
                }
                "file_scoped_namespace_declaration" => {
                    self.namespace = self.field_text(child, "name");
                }
                "class_declaration" | "struct_declaration" | "interface_declaration"
                | "record_declaration" | "enum_declaration" => {
                    self.type_declaration(child, containing);
                }
                "preproc_if" | "declaration_list" => self.declarations(child, containing),
                _ => {
                    if let Some(ty) = containing {
                        self.member_declaration(child, ty);
                    }
                }
            }
        }
    }

    fn type_declaration(&mut self, node: Node, containing: Option<TypeId>) {
        let name = self.field_text(node, "name");
        let kind = match node.kind() {
            "struct_declaration" => TypeKind::Struct,
            "interface_declaration" => TypeKind::Interface,
            "enum_declaration" => TypeKind::Enum,
            "record_declaration" => TypeKind::Record,
            _ => TypeKind::Class,
        };
        let modifiers = self.modifiers(node);
        let base_types: Vec<String> = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "base_list")
            .flat_map(named_children)
            .filter(|c| !matches!(c.kind(), "argument_list" | "primary_constructor_base_type"))
            .map(|c| self.type_text(Some(c)))
            .collect();

        let existing = modifiers.is_partial.then(|| {
            self.comp.type_ids().find(|&t| {
                let decl = self.comp.ty(t);
                decl.modifiers.is_partial
                    && decl.name == name
                    && decl.namespace == self.namespace
                    && decl.containing == containing
            })
        });
        let ty = match existing.flatten() {
            Some(ty) => {
                let decl = &mut self.comp.types[ty.index()];
                for base in base_types {
                    if !decl.base_types.contains(&base) {
                        decl.base_types.push(base);
                    }
                }
                if decl.modifiers.accessibility.is_none() {
                    decl.modifiers.accessibility = modifiers.accessibility;
                }
                decl.modifiers.is_sealed |= modifiers.is_sealed;
                decl.modifiers.is_static |= modifiers.is_static;
                ty
            }
            None => self.comp.add_type(TypeDecl {
                name,
                namespace: self.namespace.clone(),
                kind,
                modifiers,
                containing,
                base_types,
                members: Vec::new(),
                span: self.span(node),
            }),
        };

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        if kind == TypeKind::Enum {
            for member in named_children(body) {
                if member.kind() == "enum_member_declaration" {
                    self.enum_member(member, ty);
                }
            }
        } else {
            self.declarations(body, Some(ty));
        }
    }

    fn add_member(&mut self, name: String, ty: TypeId, modifiers: Modifiers, kind: MemberKind, node: Node) -> MemberId {
        self.comp.add_member(MemberDecl {
            name,
            declaring: ty,
            modifiers,
            kind,
            span: self.span(node),
        })
    }

    fn member_scope(member: MemberId, node: Node) -> Scope {
        Scope {
            member,
            scope_end: node.end_byte(),
        }
    }

    fn enum_member(&mut self, node: Node, ty: TypeId) {
        let name = self.field_text(node, "name");
        let member = self.add_member(
            name,
            ty,
            Modifiers::from_keywords(["public", "const"]),
            MemberKind::EnumMember { value: None },
            node,
        );
        if let Some(value) = node.child_by_field_name("value") {
            let scope = Self::member_scope(member, node);
            let value = self.expr(value, scope);
            self.set_parent(value, ExprParent::Member(member));
            self.comp.members[member.index()].kind = MemberKind::EnumMember { value: Some(value) };
        }
    }

    fn member_declaration(&mut self, node: Node, ty: TypeId) {
        match node.kind() {
            "field_declaration" | "event_field_declaration" => self.field(node, ty),
            "property_declaration" | "indexer_declaration" => self.property(node, ty),
            "method_declaration" => self.method(node, ty),
            "constructor_declaration" => self.constructor(node, ty),
            _ => {}
        }
    }

    fn field(&mut self, node: Node, ty: TypeId) {
        let modifiers = self.modifiers(node);
        let Some(decl) = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "variable_declaration")
        else {
            return;
        };
        let type_name = self.type_text(decl.child_by_field_name("type"));
        for declarator in named_children(decl) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            let member = self.add_member(
                self.text(name_node).to_owned(),
                ty,
                modifiers.clone(),
                MemberKind::Field {
                    type_name: type_name.clone(),
                    initializer: None,
                },
                declarator,
            );
            let scope = Self::member_scope(member, node);
            let initializer = self
                .declarator_value(declarator, name_node)
                .map(|v| self.expr(v, scope));
            if let Some(init) = initializer {
                self.set_parent(init, ExprParent::Member(member));
                self.comp.members[member.index()].kind = MemberKind::Field {
                    type_name: type_name.clone(),
                    initializer: Some(init),
                };
            }
        }
    }

    /// The `= value` part of a declarator, if present.
    fn declarator_value<'t>(&self, declarator: Node<'t>, name: Node<'t>) -> Option<Node<'t>> {
        value_children(declarator)
            .into_iter()
            .filter(|c| c.id() != name.id() && !matches!(c.kind(), "bracketed_argument_list" | "tuple_pattern"))
            .last()
    }

    fn property(&mut self, node: Node, ty: TypeId) {
        let modifiers = self.modifiers(node);
        let type_name = self.type_text(node.child_by_field_name("type"));
        let name = if node.kind() == "indexer_declaration" {
            "this".to_owned()
        } else {
            self.field_text(node, "name")
        };
        let member = self.add_member(
            name,
            ty,
            modifiers,
            MemberKind::Property {
                type_name: type_name.clone(),
                params: Vec::new(),
                getter: None,
                setter: None,
                initializer: None,
                expression_body: None,
            },
            node,
        );
        let scope = Self::member_scope(member, node);
        let params = node
            .child_by_field_name("parameters")
            .map(|list| self.parameters(list, member))
            .unwrap_or_default();

        let (mut getter, mut setter) = (None, None);
        if let Some(list) = node.child_by_field_name("accessors") {
            for acc in named_children(list) {
                if acc.kind() != "accessor_declaration" {
                    continue;
                }
                let kind = match acc.child_by_field_name("name").map(|n| self.text(n)) {
                    Some("get") => AccessorKind::Get,
                    Some("set") => AccessorKind::Set,
                    Some("init") => AccessorKind::Init,
                    _ => continue,
                };
                let value_param = (kind != AccessorKind::Get).then(|| {
                    self.comp.add_param(ParamDecl {
                        name: "value".to_owned(),
                        type_name: type_name.clone(),
                        owner: member,
                        ordinal: params.len(),
                        default: None,
                        is_params: false,
                        ref_kind: None,
                        is_accessor_value: true,
                        span: self.span(acc),
                    })
                });
                let accessor = Accessor {
                    kind,
                    accessibility: self.modifiers(acc).accessibility,
                    body: self.function_body(acc, scope),
                    value_param,
                    span: self.span(acc),
                };
                match kind {
                    AccessorKind::Get => getter = Some(accessor),
                    _ => setter = Some(accessor),
                }
            }
        }

        let (mut initializer, mut expression_body) = (None, None);
        if let Some(value) = node.child_by_field_name("value") {
            if value.kind() == "arrow_expression_clause" {
                expression_body = self.arrow(value, scope);
            } else {
                initializer = Some(self.expr(value, scope));
            }
        }
        for e in initializer.iter().chain(expression_body.iter()) {
            self.set_parent(*e, ExprParent::Member(member));
        }

        self.comp.members[member.index()].kind = MemberKind::Property {
            type_name,
            params,
            getter,
            setter,
            initializer,
            expression_body,
        };
    }

    fn method(&mut self, node: Node, ty: TypeId) {
        let modifiers = self.modifiers(node);
        let return_type = self.type_text(node.child_by_field_name("returns"));
        let member = self.add_member(
            self.field_text(node, "name"),
            ty,
            modifiers,
            MemberKind::Method {
                return_type: return_type.clone(),
                params: Vec::new(),
                body: None,
            },
            node,
        );
        let scope = Self::member_scope(member, node);
        let params = node
            .child_by_field_name("parameters")
            .map(|list| self.parameters(list, member))
            .unwrap_or_default();
        let body = self.function_body(node, scope);
        self.comp.members[member.index()].kind = MemberKind::Method {
            return_type,
            params,
            body,
        };
    }

    fn constructor(&mut self, node: Node, ty: TypeId) {
        let modifiers = self.modifiers(node);
        let member = self.add_member(
            self.field_text(node, "name"),
            ty,
            modifiers,
            MemberKind::Constructor {
                params: Vec::new(),
                initializer: None,
                body: None,
            },
            node,
        );
        let scope = Self::member_scope(member, node);
        let params = node
            .child_by_field_name("parameters")
            .map(|list| self.parameters(list, member))
            .unwrap_or_default();

        let initializer = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "constructor_initializer")
            .map(|init| {
                let kind = if has_token(init, "base") {
                    InitializerKind::Base
                } else {
                    InitializerKind::This
                };
                let args = named_children(init)
                    .into_iter()
                    .find(|c| c.kind() == "argument_list")
                    .map(|list| self.arguments(list, scope))
                    .unwrap_or_default();
                for arg in &args {
                    self.set_parent(arg.value, ExprParent::Member(member));
                }
                CtorInitializer {
                    kind,
                    args,
                    span: self.span(init),
                }
            });
        let body = self.function_body(node, scope);
        self.comp.members[member.index()].kind = MemberKind::Constructor {
            params,
            initializer,
            body,
        };
    }

    fn parameters(&mut self, list: Node, owner: MemberId) -> Vec<ParamId> {
        let scope_end = self.comp.member(owner).span.end;
        let scope = Scope {
            member: owner,
            scope_end,
        };
        let mut out = Vec::new();
        let mut params_type: Option<String> = None;
        let mut pending_params = false;

        for child in children(list) {
            match child.kind() {
                "params" if !child.is_named() => pending_params = true,
                "parameter" => {
                    let name_node = child.child_by_field_name("name");
                    let ref_kind = named_children(child)
                        .into_iter()
                        .filter(|c| c.kind() == "modifier")
                        .find_map(|c| match self.text(c) {
                            "ref" => Some(RefKind::Ref),
                            "out" => Some(RefKind::Out),
                            "in" => Some(RefKind::In),
                            _ => None,
                        });
                    let param = self.comp.add_param(ParamDecl {
                        name: name_node.map(|n| self.text(n).to_owned()).unwrap_or_default(),
                        type_name: self.type_text(child.child_by_field_name("type")),
                        owner,
                        ordinal: out.len(),
                        default: None,
                        is_params: false,
                        ref_kind,
                        is_accessor_value: false,
                        span: self.span(child),
                    });
                    let default = name_node.and_then(|name| {
                        value_children(child)
                            .into_iter()
                            .filter(|c| c.start_byte() > name.start_byte() && c.kind() != "modifier")
                            .last()
                    });
                    if let Some(default) = default {
                        let value = self.expr(default, scope);
                        self.set_parent(value, ExprParent::Param(param));
                        self.comp.params[param.index()].default = Some(value);
                    }
                    out.push(param);
                }
                "identifier" if pending_params => {
                    let param = self.comp.add_param(ParamDecl {
                        name: self.text(child).to_owned(),
                        type_name: params_type.take().unwrap_or_default(),
                        owner,
                        ordinal: out.len(),
                        default: None,
                        is_params: true,
                        ref_kind: None,
                        is_accessor_value: false,
                        span: self.span(child),
                    });
                    pending_params = false;
                    out.push(param);
                }
                _ if pending_params && child.is_named() && child.kind() != "attribute_list" => {
                    params_type = Some(self.type_text(Some(child)));
                }
                _ => {}
            }
        }
        out
    }

    fn function_body(&mut self, node: Node, scope: Scope) -> Option<Body> {
        let body = node.child_by_field_name("body")?;
        match body.kind() {
            "block" => Some(Body::Block(self.stmt(body, scope))),
            "arrow_expression_clause" => {
                let expr = self.arrow(body, scope)?;
                self.set_parent(expr, ExprParent::Member(scope.member));
                Some(Body::Expression(expr))
            }
            _ => None,
        }
    }

    fn arrow(&mut self, clause: Node, scope: Scope) -> Option<ExprId> {
        let value = value_children(clause).into_iter().next()?;
        Some(self.expr(value, scope))
    }

    fn arguments(&mut self, list: Node, scope: Scope) -> Vec<Argument> {
        let mut out = Vec::new();
        for arg in named_children(list) {
            if arg.kind() != "argument" {
                continue;
            }
            let name_node = arg.child_by_field_name("name");
            let ref_kind = children(arg).iter().find_map(|c| match c.kind() {
                "ref" if !c.is_named() => Some(RefKind::Ref),
                "out" if !c.is_named() => Some(RefKind::Out),
                "in" if !c.is_named() => Some(RefKind::In),
                _ => None,
            });
            let value = value_children(arg)
                .into_iter()
                .filter(|c| Some(c.id()) != name_node.map(|n| n.id()))
                .last();
            if let Some(value) = value {
                out.push(Argument {
                    name: name_node.map(|n| self.text(n).to_owned()),
                    value: self.expr(value, scope),
                    ref_kind,
                });
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn add_stmt(&mut self, kind: StmtKind, node: Node, scope: Scope) -> StmtId {
        let id = self.comp.add_stmt(Stmt {
            kind,
            span: self.span(node),
            member: scope.member,
        });
        let stmt = self.comp.stmt(id);
        let mut owned = stmt.header_exprs();
        if let StmtKind::Locals(locals) = &stmt.kind {
            owned.extend(locals.iter().filter_map(|l| self.comp.local(*l).initializer));
        }
        for e in owned {
            self.set_parent(e, ExprParent::Stmt(id));
        }
        id
    }

    fn stmt(&mut self, node: Node, scope: Scope) -> StmtId {
        let kind = match node.kind() {
            "block" => {
                let inner = scope.until(node.end_byte());
                let stmts = named_children(node)
                    .into_iter()
                    .filter(|c| is_statement(c.kind()))
                    .map(|c| self.stmt(c, inner))
                    .collect();
                StmtKind::Block(stmts)
            }
            "local_declaration_statement" => {
                let locals = named_children(node)
                    .into_iter()
                    .find(|c| c.kind() == "variable_declaration")
                    .map(|d| self.variable_declaration(d, scope))
                    .unwrap_or_default();
                StmtKind::Locals(locals)
            }
            "expression_statement" => match value_children(node).into_iter().next() {
                Some(e) => StmtKind::Expression(self.expr(e, scope)),
                None => StmtKind::Empty,
            },
            "return_statement" => {
                StmtKind::Return(value_children(node).into_iter().next().map(|e| self.expr(e, scope)))
            }
            "yield_statement" => {
                StmtKind::Return(value_children(node).into_iter().next().map(|e| self.expr(e, scope)))
            }
            "throw_statement" => {
                StmtKind::Throw(value_children(node).into_iter().next().map(|e| self.expr(e, scope)))
            }
            "if_statement" => {
                let condition = self.field_expr(node, "condition", scope);
                let then = match node.child_by_field_name("consequence") {
                    Some(s) => self.stmt(s, scope),
                    None => self.add_stmt(StmtKind::Empty, node, scope),
                };
                let otherwise = node.child_by_field_name("alternative").map(|s| self.stmt(s, scope));
                StmtKind::If {
                    condition,
                    then,
                    otherwise,
                }
            }
            "while_statement" | "do_statement" => {
                let header = vec![self.field_expr(node, "condition", scope)];
                let body = self.field_stmt(node, "body", scope);
                let kind = if node.kind() == "do_statement" {
                    LoopKind::Do
                } else {
                    LoopKind::While
                };
                StmtKind::Loop {
                    kind,
                    init: None,
                    header,
                    body,
                }
            }
            "for_statement" => self.for_statement(node, scope),
            "foreach_statement" => self.foreach_statement(node, scope),
            "switch_statement" => self.switch_statement(node, scope),
            "try_statement" => self.try_statement(node, scope),
            "using_statement" | "fixed_statement" | "lock_statement" => {
                let inner = scope.until(node.end_byte());
                let mut header = Vec::new();
                let mut decl = None;
                let body_node = node.child_by_field_name("body").or_else(|| {
                    named_children(node)
                        .into_iter()
                        .rfind(|c| is_statement(c.kind()))
                });
                for child in value_children(node) {
                    if Some(child.id()) == body_node.map(|b| b.id()) {
                        continue;
                    }
                    if child.kind() == "variable_declaration" {
                        let locals = self.variable_declaration(child, inner);
                        decl = Some(self.add_stmt(StmtKind::Locals(locals), child, inner));
                    } else {
                        header.push(self.expr(child, inner));
                    }
                }
                let body = match body_node {
                    Some(b) => self.stmt(b, inner),
                    None => self.add_stmt(StmtKind::Empty, node, inner),
                };
                StmtKind::Scoped { header, decl, body }
            }
            "checked_statement" | "unsafe_statement" => {
                match named_children(node).into_iter().find(|c| c.kind() == "block") {
                    Some(b) => StmtKind::Scoped {
                        header: Vec::new(),
                        decl: None,
                        body: self.stmt(b, scope),
                    },
                    None => StmtKind::Empty,
                }
            }
            "labeled_statement" => {
                match named_children(node).into_iter().find(|c| is_statement(c.kind())) {
                    Some(inner) => return self.stmt(inner, scope),
                    None => StmtKind::Empty,
                }
            }
            "break_statement" => StmtKind::Break,
            "continue_statement" => StmtKind::Continue,
            _ => StmtKind::Empty,
        };
        self.add_stmt(kind, node, scope)
    }

    fn field_expr(&mut self, node: Node, field: &str, scope: Scope) -> ExprId {
        match node.child_by_field_name(field) {
            Some(e) => self.expr(e, scope),
            None => self.add_expr(ExprKind::Other(Vec::new()), node, scope),
        }
    }

    fn field_stmt(&mut self, node: Node, field: &str, scope: Scope) -> StmtId {
        match node.child_by_field_name(field) {
            Some(s) => self.stmt(s, scope),
            None => self.add_stmt(StmtKind::Empty, node, scope),
        }
    }

    fn for_statement(&mut self, node: Node, scope: Scope) -> StmtKind {
        let inner = scope.until(node.end_byte());
        let mut cursor = node.walk();
        let initializers: Vec<Node> = node.children_by_field_name("initializer", &mut cursor).collect();
        let updates: Vec<Node> = node.children_by_field_name("update", &mut cursor).collect();

        let mut header = Vec::new();
        let mut init = None;
        for child in initializers.into_iter().filter(|c| c.is_named()) {
            if child.kind() == "variable_declaration" {
                let locals = self.variable_declaration(child, inner);
                init = Some(self.add_stmt(StmtKind::Locals(locals), child, inner));
            } else {
                header.push(self.expr(child, inner));
            }
        }
        if let Some(condition) = node.child_by_field_name("condition") {
            header.push(self.expr(condition, inner));
        }
        for update in updates.into_iter().filter(|c| c.is_named()) {
            header.push(self.expr(update, inner));
        }
        let body = self.field_stmt(node, "body", inner);
        StmtKind::Loop {
            kind: LoopKind::For,
            init,
            header,
            body,
        }
    }

    fn foreach_statement(&mut self, node: Node, scope: Scope) -> StmtKind {
        let inner = scope.until(node.end_byte());
        let mut header = Vec::new();
        if let Some(collection) = node.child_by_field_name("right") {
            header.push(self.expr(collection, scope));
        }
        let mut local = None;
        if let Some(left) = node.child_by_field_name("left") {
            if left.kind() == "identifier" {
                let type_name = self.type_text(node.child_by_field_name("type"));
                local = Some(self.comp.add_local(LocalDecl {
                    name: self.text(left).to_owned(),
                    type_name: (type_name != "var").then_some(type_name),
                    owner: scope.member,
                    kind: LocalKind::ForEach,
                    initializer: None,
                    scope_end: inner.scope_end,
                    span: self.span(left),
                }));
            } else if left.kind() != "tuple_pattern" {
                header.insert(0, self.expr(left, inner));
            }
        }
        let body = self.field_stmt(node, "body", inner);
        StmtKind::Loop {
            kind: LoopKind::ForEach(local),
            init: None,
            header,
            body,
        }
    }

    fn switch_statement(&mut self, node: Node, scope: Scope) -> StmtKind {
        let value = self.field_expr(node, "value", scope);
        let mut sections = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let inner = scope.until(body.end_byte());
            for section in named_children(body) {
                if section.kind() != "switch_section" {
                    continue;
                }
                let mut labels = Vec::new();
                let mut stmts = Vec::new();
                for child in named_children(section) {
                    if is_statement(child.kind()) {
                        stmts.push(self.stmt(child, inner));
                    } else {
                        labels.push(self.expr(child, inner));
                    }
                }
                sections.push(SwitchSection {
                    labels,
                    is_default: has_token(section, "default"),
                    body: stmts,
                });
            }
        }
        StmtKind::Switch { value, sections }
    }

    fn try_statement(&mut self, node: Node, scope: Scope) -> StmtKind {
        let body = self.field_stmt(node, "body", scope);
        let mut catches = Vec::new();
        let mut finally = None;
        for child in named_children(node) {
            match child.kind() {
                "catch_clause" => {
                    let inner = scope.until(child.end_byte());
                    if let Some(decl) = named_children(child)
                        .into_iter()
                        .find(|c| c.kind() == "catch_declaration")
                        && let Some(name) = decl.child_by_field_name("name")
                    {
                        self.comp.add_local(LocalDecl {
                            name: self.text(name).to_owned(),
                            type_name: Some(self.type_text(decl.child_by_field_name("type"))),
                            owner: scope.member,
                            kind: LocalKind::Catch,
                            initializer: None,
                            scope_end: inner.scope_end,
                            span: self.span(name),
                        });
                    }
                    catches.push(self.field_stmt(child, "body", inner));
                }
                "finally_clause" => {
                    finally = named_children(child)
                        .into_iter()
                        .find(|c| c.kind() == "block")
                        .map(|b| self.stmt(b, scope));
                }
                _ => {}
            }
        }
        StmtKind::Try {
            body,
            catches,
            finally,
        }
    }

    fn variable_declaration(&mut self, node: Node, scope: Scope) -> Vec<LocalId> {
        let type_name = self.type_text(node.child_by_field_name("type"));
        let mut out = Vec::new();
        for declarator in named_children(node) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            let initializer = self
                .declarator_value(declarator, name)
                .map(|v| self.expr(v, scope));
            out.push(self.comp.add_local(LocalDecl {
                name: self.text(name).to_owned(),
                type_name: (type_name != "var").then(|| type_name.clone()),
                owner: scope.member,
                kind: LocalKind::Variable,
                initializer,
                scope_end: scope.scope_end,
                span: self.span(name),
            }));
        }
        out
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn set_parent(&mut self, expr: ExprId, parent: ExprParent) {
        self.comp.exprs[expr.index()].parent = Some(parent);
    }

    fn add_expr(&mut self, kind: ExprKind, node: Node, scope: Scope) -> ExprId {
        let id = self.comp.add_expr(Expr {
            kind,
            text: self.text(node).to_owned(),
            span: self.span(node),
            parent: None,
            member: scope.member,
        });
        for child in self.comp.expr(id).children() {
            self.set_parent(child, ExprParent::Expr(id));
        }
        id
    }

    fn first_value(&mut self, node: Node, scope: Scope) -> ExprId {
        match value_children(node).into_iter().next() {
            Some(inner) => self.expr(inner, scope),
            None => self.add_expr(ExprKind::Other(Vec::new()), node, scope),
        }
    }

    fn simple_name(&self, node: Node) -> String {
        match node.kind() {
            "generic_name" => named_children(node)
                .into_iter()
                .find(|c| c.kind() == "identifier")
                .map(|c| self.text(c).to_owned())
                .unwrap_or_default(),
            _ => self.text(node).to_owned(),
        }
    }

    fn expr(&mut self, node: Node, scope: Scope) -> ExprId {
        let kind = match node.kind() {
            "integer_literal" => ExprKind::Literal(LiteralKind::Integer),
            "real_literal" => ExprKind::Literal(LiteralKind::Real),
            "string_literal" | "verbatim_string_literal" | "raw_string_literal" => {
                ExprKind::Literal(LiteralKind::String)
            }
            "character_literal" => ExprKind::Literal(LiteralKind::Character),
            "boolean_literal" => ExprKind::Literal(LiteralKind::Boolean),
            "null_literal" => ExprKind::Literal(LiteralKind::Null),
            "sizeof_expression" => ExprKind::Literal(LiteralKind::Integer),
            "identifier" | "generic_name" | "predefined_type" | "qualified_name"
            | "alias_qualified_name" | "implicit_type" => ExprKind::Name(self.simple_name(node)),
            "this" => ExprKind::This,
            "base" => ExprKind::Base,
            "default_expression" => ExprKind::Default,
            "member_access_expression" => {
                let target = self.field_expr(node, "expression", scope);
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.simple_name(n))
                    .unwrap_or_default();
                ExprKind::MemberAccess {
                    target,
                    name,
                    conditional: false,
                }
            }
            "conditional_access_expression" => self.conditional_access(node, scope),
            "element_access_expression" => {
                let target = self.field_expr(node, "expression", scope);
                let args = node
                    .child_by_field_name("subscript")
                    .map(|s| self.arguments(s, scope))
                    .unwrap_or_default();
                ExprKind::ElementAccess {
                    target,
                    args,
                    conditional: false,
                }
            }
            "invocation_expression" => {
                let target = self.field_expr(node, "function", scope);
                let args = node
                    .child_by_field_name("arguments")
                    .map(|a| self.arguments(a, scope))
                    .unwrap_or_default();
                ExprKind::Invocation { target, args }
            }
            "object_creation_expression" | "implicit_object_creation_expression" => {
                let type_name = node
                    .child_by_field_name("type")
                    .map(|t| self.type_text(Some(t)));
                let list = node.child_by_field_name("arguments").or_else(|| {
                    named_children(node)
                        .into_iter()
                        .find(|c| c.kind() == "argument_list")
                });
                let args = list.map(|a| self.arguments(a, scope)).unwrap_or_default();
                let init = node.child_by_field_name("initializer").or_else(|| {
                    named_children(node)
                        .into_iter()
                        .find(|c| c.kind() == "initializer_expression")
                });
                let initializers = init
                    .map(|i| {
                        value_children(i)
                            .into_iter()
                            .map(|e| self.expr(e, scope))
                            .collect()
                    })
                    .unwrap_or_default();
                ExprKind::ObjectCreation {
                    type_name,
                    args,
                    initializers,
                }
            }
            "array_creation_expression"
            | "implicit_array_creation_expression"
            | "stackalloc_expression"
            | "implicit_stackalloc_expression" => {
                let items = named_children(node)
                    .into_iter()
                    .filter(|c| c.kind() == "initializer_expression")
                    .flat_map(value_children)
                    .map(|e| self.expr(e, scope))
                    .collect();
                ExprKind::Collection(items)
            }
            "initializer_expression" | "anonymous_object_creation_expression"
            | "collection_expression" => {
                let items = value_children(node)
                    .into_iter()
                    .map(|e| self.expr(e, scope))
                    .collect();
                ExprKind::Collection(items)
            }
            "assignment_expression" => {
                let op = match node.child_by_field_name("operator").map(|o| self.text(o)) {
                    Some("=") => AssignOp::Assign,
                    Some("??=") => AssignOp::Coalesce,
                    _ => AssignOp::Compound,
                };
                let left = self.field_expr(node, "left", scope);
                let right = self.field_expr(node, "right", scope);
                ExprKind::Assignment { op, left, right }
            }
            "binary_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o).to_owned())
                    .unwrap_or_default();
                let left = self.field_expr(node, "left", scope);
                let right = self.field_expr(node, "right", scope);
                if op == "??" {
                    ExprKind::Coalesce { left, right }
                } else {
                    ExprKind::Binary { op, left, right }
                }
            }
            "conditional_expression" => ExprKind::Conditional {
                condition: self.field_expr(node, "condition", scope),
                then: self.field_expr(node, "consequence", scope),
                otherwise: self.field_expr(node, "alternative", scope),
            },
            "prefix_unary_expression" | "postfix_unary_expression" => {
                let op = children(node)
                    .into_iter()
                    .find(|c| !c.is_named() && !matches!(c.kind(), "this" | "base"))
                    .map(|c| self.text(c).to_owned())
                    .unwrap_or_default();
                let operand = self.first_value(node, scope);
                if node.kind() == "postfix_unary_expression" && op == "!" {
                    ExprKind::Parenthesized(operand)
                } else {
                    let mutates = op == "++" || op == "--";
                    ExprKind::Unary {
                        op,
                        operand,
                        mutates,
                    }
                }
            }
            "cast_expression" => ExprKind::Cast {
                type_name: self.type_text(node.child_by_field_name("type")),
                operand: self.field_expr(node, "value", scope),
            },
            "as_expression" => ExprKind::Cast {
                type_name: self.type_text(node.child_by_field_name("right")),
                operand: self.field_expr(node, "left", scope),
            },
            "is_expression" => {
                let left = self.field_expr(node, "left", scope);
                let type_node = node.child_by_field_name("right").unwrap_or(node);
                let right = self.add_expr(ExprKind::Other(Vec::new()), type_node, scope);
                ExprKind::Binary {
                    op: "is".to_owned(),
                    left,
                    right,
                }
            }
            "is_pattern_expression" => {
                let left = self.field_expr(node, "expression", scope);
                let pattern = node.child_by_field_name("pattern").unwrap_or(node);
                let designations = self.designations(pattern, scope);
                let right = self.add_expr(ExprKind::Other(designations), pattern, scope);
                ExprKind::Binary {
                    op: "is".to_owned(),
                    left,
                    right,
                }
            }
            "parenthesized_expression" | "checked_expression" | "ref_expression" => {
                ExprKind::Parenthesized(self.first_value(node, scope))
            }
            "await_expression" => ExprKind::Await(self.first_value(node, scope)),
            "throw_expression" => {
                let inner = value_children(node).into_iter().next().map(|e| self.expr(e, scope));
                ExprKind::Throw(inner)
            }
            "lambda_expression" | "anonymous_method_expression" => self.lambda(node, scope),
            "switch_expression" => {
                let parts = value_children(node);
                let value = match parts.first() {
                    Some(v) if v.kind() != "switch_expression_arm" => self.expr(*v, scope),
                    _ => self.add_expr(ExprKind::Other(Vec::new()), node, scope),
                };
                let arms = parts
                    .into_iter()
                    .filter(|c| c.kind() == "switch_expression_arm")
                    .filter_map(|arm| value_children(arm).into_iter().last())
                    .map(|result| self.expr(result, scope))
                    .collect();
                ExprKind::SwitchExpr { value, arms }
            }
            "interpolated_string_expression" => {
                let parts = named_children(node)
                    .into_iter()
                    .filter(|c| c.kind() == "interpolation")
                    .filter_map(|i| value_children(i).into_iter().find(|c| c.kind() != "interpolation_brace"))
                    .map(|e| self.expr(e, scope))
                    .collect();
                ExprKind::Interpolated(parts)
            }
            "declaration_expression" => {
                let type_name = self.type_text(node.child_by_field_name("type"));
                match node.child_by_field_name("name") {
                    Some(name) => ExprKind::Declaration(self.designation(name, Some(type_name), scope)),
                    None => ExprKind::Other(Vec::new()),
                }
            }
            _ => {
                let items = value_children(node)
                    .into_iter()
                    .map(|e| self.expr(e, scope))
                    .collect();
                ExprKind::Other(items)
            }
        };
        self.add_expr(kind, node, scope)
    }

    fn conditional_access(&mut self, node: Node, scope: Scope) -> ExprKind {
        let target = self.field_expr(node, "condition", scope);
        let binding = value_children(node)
            .into_iter()
            .rfind(|c| matches!(c.kind(), "member_binding_expression" | "element_binding_expression"));
        match binding {
            Some(b) if b.kind() == "member_binding_expression" => ExprKind::MemberAccess {
                target,
                name: b
                    .child_by_field_name("name")
                    .map(|n| self.simple_name(n))
                    .unwrap_or_default(),
                conditional: true,
            },
            Some(b) => ExprKind::ElementAccess {
                target,
                args: self.arguments(b, scope),
                conditional: true,
            },
            None => ExprKind::Parenthesized(target),
        }
    }

    fn lambda(&mut self, node: Node, scope: Scope) -> ExprKind {
        let inner = scope.until(node.end_byte());
        let mut params = Vec::new();
        if let Some(list) = node.child_by_field_name("parameters") {
            if list.kind() == "implicit_parameter" {
                params.push(self.lambda_param(list, None, inner));
            } else {
                for param in named_children(list) {
                    if param.kind() != "parameter" {
                        continue;
                    }
                    if let Some(name) = param.child_by_field_name("name") {
                        let type_name = param
                            .child_by_field_name("type")
                            .map(|t| self.type_text(Some(t)));
                        params.push(self.lambda_param(name, type_name, inner));
                    }
                }
            }
        }
        let body_node = node.child_by_field_name("body").or_else(|| {
            named_children(node)
                .into_iter()
                .find(|c| c.kind() == "block")
        });
        let body = match body_node {
            Some(b) if b.kind() == "block" => LambdaBody::Block(self.stmt(b, inner)),
            Some(e) => LambdaBody::Expression(self.expr(e, inner)),
            None => LambdaBody::Expression(self.add_expr(ExprKind::Other(Vec::new()), node, inner)),
        };
        ExprKind::Lambda { params, body }
    }

    fn lambda_param(&mut self, name: Node, type_name: Option<String>, scope: Scope) -> LocalId {
        self.comp.add_local(LocalDecl {
            name: self.text(name).to_owned(),
            type_name,
            owner: scope.member,
            kind: LocalKind::LambdaParameter,
            initializer: None,
            scope_end: scope.scope_end,
            span: self.span(name),
        })
    }

    fn designation(&mut self, name: Node, type_name: Option<String>, scope: Scope) -> LocalId {
        self.comp.add_local(LocalDecl {
            name: self.text(name).to_owned(),
            type_name: type_name.filter(|t| t != "var"),
            owner: scope.member,
            kind: LocalKind::Designation,
            initializer: None,
            scope_end: scope.scope_end,
            span: self.span(name),
        })
    }

    /// Locals introduced by a pattern (`is Foo foo`, `is var x`).
    fn designations(&mut self, pattern: Node, scope: Scope) -> Vec<ExprId> {
        let mut out = Vec::new();
        let mut stack = vec![pattern];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "declaration_pattern" | "var_pattern" | "recursive_pattern" => {
                    let type_name = node
                        .child_by_field_name("type")
                        .map(|t| self.type_text(Some(t)));
                    if let Some(name) = node.child_by_field_name("name") {
                        let local = self.designation(name, type_name, scope);
                        out.push(self.add_expr(ExprKind::Declaration(local), name, scope));
                    }
                }
                _ => stack.extend(named_children(node)),
            }
        }
        out
    }
}
