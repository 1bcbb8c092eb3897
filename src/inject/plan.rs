use std::fmt;

use serde::Serialize;

use crate::semantic::call_graph::{CallSite, CallSiteKind};
use crate::syntax::{Compilation, ExprId, MemberId, MemberKind, TypeId};

/// What a synthesized call-site argument is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentValue {
    /// A copy of the original expression, which is valid in the caller's scope.
    Expression(ExprId),
    /// A parameter the caller received through the same rewrite.
    Name(String),
}

/// One step of a rewrite plan. Applying every edit in order yields the rewritten program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "edit", rename_all = "snake_case")]
pub enum Edit {
    AddParameter {
        ctor: MemberId,
        name: String,
        type_name: String,
    },
    ReplaceExpression {
        expr: ExprId,
        with: String,
    },
    AddField {
        ty: TypeId,
        name: String,
        type_name: String,
    },
    /// `field = parameter;` as the first statement of `ctor`.
    AssignField {
        ctor: MemberId,
        field: String,
        parameter: String,
    },
    RemoveInitializer {
        member: MemberId,
    },
    AppendArgument {
        site: CallSite,
        value: ArgumentValue,
    },
}

/// A complete, all-or-nothing description of a constructor injection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewritePlan {
    pub target: ExprId,
    pub type_name: String,
    pub parameter: String,
    /// Backing field introduced for creations outside constructors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub edits: Vec<Edit>,
}

/// Why no plan was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnsupportedReason {
    /// The value is not created at the expression.
    NotCreatedHere,
    /// The value already comes from a caller.
    AlreadyInjected,
    /// The type of the expression could not be determined.
    UnknownType,
    /// The synthesized name is taken in a constructor or type that would receive it.
    NameCollision,
    /// The type declares no instance constructor to add the parameter to.
    NoConstructor,
    /// The expression sits in a static member.
    StaticContext,
    /// A call site outside a constructor cannot see the original expression.
    AmbiguousCallSite,
    /// A constructor to extend ends in optional or `params` parameters.
    OptionalParameters,
    /// The expression is part of a larger member initializer, which cannot read a parameter.
    NestedInitializer,
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnsupportedReason::NotCreatedHere => "value is not created here",
            UnsupportedReason::AlreadyInjected => "value is already injected",
            UnsupportedReason::UnknownType => "type of the expression is unknown",
            UnsupportedReason::NameCollision => "synthesized name is already in use",
            UnsupportedReason::NoConstructor => "type has no instance constructor",
            UnsupportedReason::StaticContext => "expression is in a static context",
            UnsupportedReason::AmbiguousCallSite => "a call site cannot supply the value",
            UnsupportedReason::OptionalParameters => "constructor has optional parameters",
            UnsupportedReason::NestedInitializer => "expression is nested in a member initializer",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InjectionOutcome {
    Plan(RewritePlan),
    Unsupported { reason: UnsupportedReason },
}

// ---------------------------------------------------------------------------
// Human-readable rendering
// ---------------------------------------------------------------------------

fn signature(comp: &Compilation, member: MemberId) -> String {
    let decl = comp.member(member);
    let params: Vec<&str> = decl
        .params()
        .iter()
        .map(|p| comp.param(*p).type_name.as_str())
        .collect();
    let owner = &comp.ty(decl.declaring).name;
    match decl.kind {
        MemberKind::Constructor { .. } => format!("{owner}({})", params.join(", ")),
        _ => format!("{owner}.{}({})", decl.name, params.join(", ")),
    }
}

fn location(comp: &Compilation, expr: ExprId) -> String {
    let span = comp.expr(expr).span;
    format!("{}:{}", comp.file(span.file).path.display(), span.line + 1)
}

fn site_location(comp: &Compilation, site: &CallSite) -> String {
    match site.kind {
        CallSiteKind::Invocation(e) | CallSiteKind::Creation(e) => location(comp, e),
        CallSiteKind::Initializer { this } => {
            let chain = if this { "this" } else { "base" };
            format!("`: {chain}(...)` of {}", signature(comp, site.caller))
        }
        CallSiteKind::ImplicitBase => format!("implicit `: base()` of {}", signature(comp, site.caller)),
    }
}

impl RewritePlan {
    /// One line per edit, in application order.
    pub fn describe(&self, comp: &Compilation) -> Vec<String> {
        self.edits
            .iter()
            .map(|edit| match edit {
                Edit::AddParameter {
                    ctor,
                    name,
                    type_name,
                } => format!("add parameter `{type_name} {name}` to {}", signature(comp, *ctor)),
                Edit::ReplaceExpression { expr, with } => format!(
                    "replace `{}` at {} with `{with}`",
                    comp.expr(*expr).text,
                    location(comp, *expr)
                ),
                Edit::AddField {
                    ty,
                    name,
                    type_name,
                } => format!(
                    "add field `private readonly {type_name} {name}` to {}",
                    comp.ty(*ty).name
                ),
                Edit::AssignField {
                    ctor,
                    field,
                    parameter,
                } => format!("assign `{field} = {parameter};` in {}", signature(comp, *ctor)),
                Edit::RemoveInitializer { member } => {
                    format!("remove the initializer of `{}`", comp.member(*member).name)
                }
                Edit::AppendArgument { site, value } => {
                    let value = match value {
                        ArgumentValue::Expression(e) => comp.expr(*e).text.clone(),
                        ArgumentValue::Name(name) => name.clone(),
                    };
                    format!("pass `{value}` at {}", site_location(comp, site))
                }
            })
            .collect()
    }
}
