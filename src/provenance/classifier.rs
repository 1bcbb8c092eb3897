//! Provenance classification: one closed match over expression shapes.

use crate::semantic::{Symbol, SymbolOracle};
use crate::syntax::{
    AccessorKind, AssignOp, Body, ExprId, ExprKind, LiteralKind, LocalId, MemberDecl, MemberId,
    MemberKind, ParamId,
};

/// What an expression is, for provenance purposes, and where to continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Literal, `const`, enum member, `default`, `nameof(...)`.
    Constant,
    /// `static readonly` field or static get-only auto-property.
    Cached(MemberId),
    /// Object, array, collection, lambda or method-group creation.
    Created,
    /// Computed from operands; not traced further.
    Calculated,
    /// `this` or `base`.
    Instance,
    /// The value is the operand's: parentheses, casts, `await`, `!`, `x = y`.
    Transparent(ExprId),
    /// Any branch can be the value: `?:`, `??`, `??=`, switch expressions.
    Branches(Vec<ExprId>),
    /// Call of a method with a body; the value comes from its returns.
    Invocation { method: MemberId, body: Body },
    /// Read of a property whose getter has a body.
    Getter { property: MemberId, body: Body },
    /// Field or auto-property read, including element access on one.
    Member(MemberId),
    Parameter(ParamId),
    Local(LocalId),
    /// Cannot be seen into. `receiver` is the innermost bound receiver of the
    /// access chain, which is traced further.
    External { receiver: Option<ExprId> },
    /// `throw` expressions produce no value.
    NoValue,
}

pub fn classify(oracle: &dyn SymbolOracle, expr: ExprId) -> Classification {
    let comp = oracle.compilation();
    match &comp.expr(expr).kind {
        ExprKind::Literal(_) | ExprKind::Default => Classification::Constant,
        ExprKind::Name(_) | ExprKind::MemberAccess { .. } => classify_symbol(oracle, expr),
        ExprKind::ElementAccess { target, .. } => match classify(oracle, *target) {
            member @ (Classification::Member(_) | Classification::Cached(_)) => member,
            _ => Classification::External {
                receiver: chain_receiver(oracle, expr),
            },
        },
        ExprKind::Invocation { target, .. } => {
            if matches!(&comp.expr(*target).kind, ExprKind::Name(n) if n == "nameof")
                && oracle.resolve_symbol(*target).is_none()
            {
                return Classification::Constant;
            }
            match oracle.resolve_symbol(expr) {
                Some(Symbol::Member(method)) => match comp.member(method).body() {
                    Some(body) => Classification::Invocation { method, body },
                    None => Classification::External {
                        receiver: chain_receiver(oracle, expr),
                    },
                },
                _ => Classification::External {
                    receiver: chain_receiver(oracle, expr),
                },
            }
        }
        ExprKind::ObjectCreation { .. } | ExprKind::Collection(_) | ExprKind::Lambda { .. } => {
            Classification::Created
        }
        ExprKind::Assignment { op, left, right } => match op {
            AssignOp::Assign => Classification::Transparent(*right),
            AssignOp::Coalesce => Classification::Branches(vec![*left, *right]),
            AssignOp::Compound => Classification::Calculated,
        },
        ExprKind::Conditional {
            then, otherwise, ..
        } => Classification::Branches(vec![*then, *otherwise]),
        ExprKind::Coalesce { left, right } => Classification::Branches(vec![*left, *right]),
        ExprKind::SwitchExpr { arms, .. } => Classification::Branches(arms.clone()),
        ExprKind::Unary { op, operand, .. }
            if matches!(op.as_str(), "-" | "+")
                && matches!(
                    comp.expr(*operand).kind,
                    ExprKind::Literal(LiteralKind::Integer | LiteralKind::Real)
                ) =>
        {
            Classification::Constant
        }
        ExprKind::Binary { .. } | ExprKind::Unary { .. } | ExprKind::Interpolated(_) => {
            Classification::Calculated
        }
        ExprKind::Cast { operand, .. } => Classification::Transparent(*operand),
        ExprKind::Parenthesized(inner) | ExprKind::Await(inner) => Classification::Transparent(*inner),
        ExprKind::This | ExprKind::Base => Classification::Instance,
        ExprKind::Throw(_) => Classification::NoValue,
        ExprKind::Declaration(local) => Classification::Local(*local),
        ExprKind::Other(_) => Classification::External { receiver: None },
    }
}

fn classify_symbol(oracle: &dyn SymbolOracle, expr: ExprId) -> Classification {
    let Some(symbol) = oracle.resolve_symbol(expr) else {
        return Classification::External {
            receiver: chain_receiver(oracle, expr),
        };
    };
    match symbol {
        Symbol::Local(local) => Classification::Local(local),
        Symbol::Parameter(param) => Classification::Parameter(param),
        Symbol::Type(_) => Classification::External { receiver: None },
        Symbol::Member(member) => {
            if oracle.is_constant(symbol) {
                return Classification::Constant;
            }
            let decl = oracle.compilation().member(member);
            if is_cached(decl) {
                return Classification::Cached(member);
            }
            match &decl.kind {
                MemberKind::Field { .. } => Classification::Member(member),
                MemberKind::Property {
                    getter,
                    expression_body,
                    ..
                } => {
                    let body = expression_body.map(Body::Expression).or_else(|| {
                        getter
                            .as_ref()
                            .filter(|g| g.kind == AccessorKind::Get)
                            .and_then(|g| g.body)
                    });
                    match body {
                        Some(body) => Classification::Getter {
                            property: member,
                            body,
                        },
                        None => Classification::Member(member),
                    }
                }
                MemberKind::Method { .. } => Classification::Created,
                MemberKind::EnumMember { .. } => Classification::Constant,
                MemberKind::Constructor { .. } => Classification::External { receiver: None },
            }
        }
    }
}

/// Static fields that are assigned once, and static get-only auto-properties.
fn is_cached(decl: &MemberDecl) -> bool {
    if !decl.modifiers.is_static || decl.modifiers.is_const {
        return false;
    }
    match &decl.kind {
        MemberKind::Field { .. } => decl.modifiers.is_readonly,
        MemberKind::Property { setter, .. } => decl.is_auto_property() && setter.is_none(),
        _ => false,
    }
}

/// The receiver an access or call is made on, looking through parentheses.
pub fn receiver_of(oracle: &dyn SymbolOracle, expr: ExprId) -> Option<ExprId> {
    let comp = oracle.compilation();
    match &comp.expr(expr).kind {
        ExprKind::MemberAccess { target, .. } | ExprKind::ElementAccess { target, .. } => Some(*target),
        ExprKind::Invocation { target, .. } => match &comp.expr(*target).kind {
            ExprKind::MemberAccess { target, .. } => Some(*target),
            _ => None,
        },
        ExprKind::Parenthesized(inner) | ExprKind::Cast { operand: inner, .. } => Some(*inner),
        _ => None,
    }
}

/// Walk down `a?.B.C()` past links the oracle cannot bind, to the first receiver
/// bound to a local, parameter or member.
pub fn chain_receiver(oracle: &dyn SymbolOracle, expr: ExprId) -> Option<ExprId> {
    let mut current = receiver_of(oracle, expr)?;
    loop {
        match oracle.resolve_symbol(current) {
            Some(Symbol::Local(_) | Symbol::Parameter(_) | Symbol::Member(_)) => return Some(current),
            Some(Symbol::Type(_)) => return None,
            None => current = receiver_of(oracle, current)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::testing::{find_expr, model};

    #[test]
    fn test_classifies_shapes() {
        let m = model(&[r#"
public class Foo
{
    public const int ConstValue = 1;
    public static readonly object CachedValue = new object();
    private readonly int value = 2;

    public int Value => this.value;

    public object M(int x)
    {
        var a = -1;
        var b = x + 1;
        var c = new object();
        var d = nameof(M);
        var e = ConstValue;
        var f = CachedValue;
        var g = this.Value;
        var h = (object)x;
        return x > 0 ? a : b;
    }
}"#]);
        let at = |text: &str| classify(&m, find_expr(&m, "public object M", text));
        assert_eq!(at("-1"), Classification::Constant);
        assert_eq!(at("x + 1"), Classification::Calculated);
        assert_eq!(at("new object()"), Classification::Created);
        assert_eq!(at("nameof(M)"), Classification::Constant);
        assert_eq!(at("ConstValue"), Classification::Constant);
        assert!(matches!(at("CachedValue"), Classification::Cached(_)));
        assert!(matches!(at("this.Value"), Classification::Getter { .. }));
        assert!(matches!(at("(object)x"), Classification::Transparent(_)));
        assert!(matches!(at("x > 0 ? a : b"), Classification::Branches(ref b) if b.len() == 2));
        assert!(matches!(at("x"), Classification::Parameter(_)));
    }

    #[test]
    fn test_unbound_chain_continues_at_bound_receiver() {
        let m = model(&[r#"
public class Foo
{
    public int M(System.IDisposable meh)
    {
        return meh?.ToString()?.Length;
    }
}"#]);
        let outer = find_expr(&m, "return", "meh?.ToString()?.Length");
        match classify(&m, outer) {
            Classification::External { receiver: Some(r) } => {
                assert_eq!(m.compilation().expr(r).text, "meh");
            }
            other => panic!("expected external with receiver, got {other:?}"),
        }
    }
}
