use serde::Serialize;

use super::{ExprId, MemberId, ParamId, Span, StmtId, TypeId};

/// Declared accessibility of a type or member.
///
/// Variants are ordered from most to least restrictive so that the effective
/// accessibility of a nested declaration is the `min` over its containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Accessibility {
    Private,
    Internal,
    Protected,
    Public,
}

/// Modifier flags collected from `modifier` nodes.
#[derive(Debug, Clone, Default)]
pub struct Modifiers {
    /// Explicit accessibility, `None` when the declaration relies on the default.
    pub accessibility: Option<Accessibility>,
    pub is_static: bool,
    pub is_readonly: bool,
    pub is_const: bool,
    pub is_sealed: bool,
    pub is_abstract: bool,
    pub is_extern: bool,
    pub is_partial: bool,
}

impl Modifiers {
    /// Fold a list of modifier keywords into flags.
    ///
    /// `protected internal` widens to `Protected`, `private protected` narrows to `Private`.
    pub fn from_keywords<'a>(keywords: impl IntoIterator<Item = &'a str>) -> Self {
        let mut mods = Modifiers::default();
        let (mut public, mut private, mut protected, mut internal) = (false, false, false, false);
        for kw in keywords {
            match kw {
                "public" => public = true,
                "private" => private = true,
                "protected" => protected = true,
                "internal" => internal = true,
                "static" => mods.is_static = true,
                "readonly" => mods.is_readonly = true,
                "const" => mods.is_const = true,
                "sealed" => mods.is_sealed = true,
                "abstract" => mods.is_abstract = true,
                "extern" => mods.is_extern = true,
                "partial" => mods.is_partial = true,
                _ => {}
            }
        }
        mods.accessibility = match (public, private, protected, internal) {
            (true, ..) => Some(Accessibility::Public),
            (_, true, _, _) => Some(Accessibility::Private),
            (_, _, true, _) => Some(Accessibility::Protected),
            (_, _, _, true) => Some(Accessibility::Internal),
            _ => None,
        };
        mods
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Record,
}

/// A class, struct, interface, enum or record declaration.
///
/// Partial declarations that share a namespace, container and name are merged
/// into one `TypeDecl` during lowering.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub namespace: String,
    pub kind: TypeKind,
    pub modifiers: Modifiers,
    pub containing: Option<TypeId>,
    /// Base class and interfaces as written in the base list, generic arguments included.
    pub base_types: Vec<String>,
    pub members: Vec<MemberId>,
    pub span: Span,
}

impl TypeDecl {
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static
    }

    /// Structs, enums and `sealed`/`static` classes cannot be derived from.
    pub fn is_sealed(&self) -> bool {
        self.modifiers.is_sealed
            || self.modifiers.is_static
            || matches!(self.kind, TypeKind::Struct | TypeKind::Enum)
    }
}

/// Function-like body: a block or an `=>` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    Block(StmtId),
    Expression(ExprId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessorKind {
    Get,
    Set,
    Init,
}

#[derive(Debug, Clone)]
pub struct Accessor {
    pub kind: AccessorKind,
    /// Accessor-level accessibility (`private set;`), `None` inherits the property's.
    pub accessibility: Option<Accessibility>,
    pub body: Option<Body>,
    /// The implicit `value` parameter of `set`/`init` accessors.
    pub value_param: Option<ParamId>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializerKind {
    This,
    Base,
}

/// A `: this(...)` or `: base(...)` constructor initializer.
#[derive(Debug, Clone)]
pub struct CtorInitializer {
    pub kind: InitializerKind,
    pub args: Vec<super::Argument>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum MemberKind {
    Field {
        type_name: String,
        initializer: Option<ExprId>,
    },
    Property {
        type_name: String,
        /// Indexer parameters; empty for ordinary properties.
        params: Vec<ParamId>,
        getter: Option<Accessor>,
        setter: Option<Accessor>,
        initializer: Option<ExprId>,
        expression_body: Option<ExprId>,
    },
    Method {
        return_type: String,
        params: Vec<ParamId>,
        body: Option<Body>,
    },
    Constructor {
        params: Vec<ParamId>,
        initializer: Option<CtorInitializer>,
        body: Option<Body>,
    },
    EnumMember {
        value: Option<ExprId>,
    },
}

#[derive(Debug, Clone)]
pub struct MemberDecl {
    pub name: String,
    pub declaring: TypeId,
    pub modifiers: Modifiers,
    pub kind: MemberKind,
    pub span: Span,
}

impl MemberDecl {
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static || self.modifiers.is_const
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.kind, MemberKind::Constructor { .. })
    }

    pub fn params(&self) -> &[ParamId] {
        match &self.kind {
            MemberKind::Method { params, .. }
            | MemberKind::Constructor { params, .. }
            | MemberKind::Property { params, .. } => params,
            _ => &[],
        }
    }

    /// The declared type of a field or property, or the return type of a method.
    pub fn type_name(&self) -> Option<&str> {
        match &self.kind {
            MemberKind::Field { type_name, .. } | MemberKind::Property { type_name, .. } => {
                Some(type_name)
            }
            MemberKind::Method { return_type, .. } => Some(return_type),
            _ => None,
        }
    }

    /// The initializer expression of a field or auto-property.
    pub fn initializer(&self) -> Option<ExprId> {
        match &self.kind {
            MemberKind::Field { initializer, .. } | MemberKind::Property { initializer, .. } => {
                *initializer
            }
            _ => None,
        }
    }

    /// An auto-property has accessors without bodies and no `=>` body.
    pub fn is_auto_property(&self) -> bool {
        match &self.kind {
            MemberKind::Property {
                getter,
                setter,
                expression_body,
                ..
            } => {
                expression_body.is_none()
                    && getter.as_ref().is_none_or(|a| a.body.is_none())
                    && setter.as_ref().is_none_or(|a| a.body.is_none())
            }
            _ => false,
        }
    }

    /// The function-like body of a method or constructor.
    pub fn body(&self) -> Option<Body> {
        match &self.kind {
            MemberKind::Method { body, .. } | MemberKind::Constructor { body, .. } => *body,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Ref,
    Out,
    In,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub type_name: String,
    pub owner: MemberId,
    pub ordinal: usize,
    pub default: Option<ExprId>,
    pub is_params: bool,
    pub ref_kind: Option<RefKind>,
    /// True for the implicit `value` parameter of a setter.
    pub is_accessor_value: bool,
    pub span: Span,
}

impl ParamDecl {
    pub fn is_optional(&self) -> bool {
        self.default.is_some() || self.is_params
    }
}

/// How a local came into existence. Only plain variables carry a tracked value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Variable,
    ForEach,
    Catch,
    /// `out var x`, `is Foo x` and other designations.
    Designation,
    LambdaParameter,
}

#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub name: String,
    /// `None` for `var`.
    pub type_name: Option<String>,
    pub owner: MemberId,
    pub kind: LocalKind,
    pub initializer: Option<ExprId>,
    /// Byte offset where the enclosing scope ends.
    pub scope_end: usize,
    pub span: Span,
}
