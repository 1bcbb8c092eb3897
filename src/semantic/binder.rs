use std::collections::HashMap;

use crate::syntax::{
    Argument, Compilation, ExprId, ExprKind, ExprParent, LiteralKind, LocalId, MemberId,
    MemberKind, TypeId, TypeKind,
};

use super::Symbol;
use super::call_graph::{ArgumentMatch, match_argument};

/// Guard against pathological `var x = x;` style cycles.
const MAX_DEPTH: usize = 48;

/// Reduce a written type to the simple name used for lookup:
/// `global::System.Collections.Generic.List<int>?` -> `List`.
pub fn simple_type_name(written: &str) -> &str {
    let written = written.strip_prefix("global::").unwrap_or(written);
    let end = written.find(['<', '?', '[']).unwrap_or(written.len());
    let base = &written[..end];
    base.rsplit(['.', ':']).next().unwrap_or(base)
}

/// The single generic argument of `Get<Bar>` style names, if any.
pub fn generic_argument(text: &str) -> Option<&str> {
    let open = text.rfind('<')?;
    let close = text[open..].find('>')? + open;
    let inner = text[open + 1..close].trim();
    (!inner.is_empty() && !inner.contains(',')).then_some(inner)
}

/// `System.Int32` and `Int32` are the same type as `int`.
fn keyword_name(simple: &str) -> &str {
    match simple {
        "SByte" => "sbyte",
        "Byte" => "byte",
        "Int16" => "short",
        "UInt16" => "ushort",
        "Int32" => "int",
        "UInt32" => "uint",
        "Int64" => "long",
        "UInt64" => "ulong",
        "Single" => "float",
        "Double" => "double",
        "Decimal" => "decimal",
        "Char" => "char",
        "Boolean" => "bool",
        "String" => "string",
        "Object" => "object",
        other => other,
    }
}

fn is_predefined(name: &str) -> bool {
    matches!(
        name,
        "sbyte"
            | "byte"
            | "short"
            | "ushort"
            | "int"
            | "uint"
            | "long"
            | "ulong"
            | "float"
            | "double"
            | "decimal"
            | "char"
            | "bool"
            | "string"
    )
}

/// Implicit numeric conversions.
fn widens(from: &str, to: &str) -> bool {
    let targets: &[&str] = match from {
        "sbyte" => &["short", "int", "long", "float", "double", "decimal"],
        "byte" => &["short", "ushort", "int", "uint", "long", "ulong", "float", "double", "decimal"],
        "short" => &["int", "long", "float", "double", "decimal"],
        "ushort" => &["int", "uint", "long", "ulong", "float", "double", "decimal"],
        "int" => &["long", "float", "double", "decimal"],
        "uint" => &["long", "ulong", "float", "double", "decimal"],
        "long" | "ulong" => &["float", "double", "decimal"],
        "char" => &["ushort", "int", "uint", "long", "ulong", "float", "double", "decimal"],
        "float" => &["double"],
        _ => &[],
    };
    targets.contains(&to)
}

/// How well an argument converts to a parameter, worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Conversion {
    /// The argument type is unknown, or the parameter takes anything.
    Unknown,
    Implicit,
    Identity,
}

/// True when no conversion in `a` is worse than its counterpart in `b`.
fn no_worse(a: &[Conversion], b: &[Conversion]) -> bool {
    a.iter().zip(b).all(|(x, y)| x >= y)
}

/// Name tables shared by binding and type queries.
pub struct Tables {
    pub types_by_name: HashMap<String, Vec<TypeId>>,
    pub locals_by_member: HashMap<MemberId, Vec<LocalId>>,
}

impl Tables {
    pub fn build(comp: &Compilation) -> Self {
        let mut types_by_name: HashMap<String, Vec<TypeId>> = HashMap::new();
        for ty in comp.type_ids() {
            types_by_name
                .entry(comp.ty(ty).name.clone())
                .or_default()
                .push(ty);
        }
        let mut locals_by_member: HashMap<MemberId, Vec<LocalId>> = HashMap::new();
        for (i, local) in comp.locals.iter().enumerate() {
            locals_by_member
                .entry(local.owner)
                .or_default()
                .push(LocalId(i as u32));
        }
        Self {
            types_by_name,
            locals_by_member,
        }
    }
}

/// Resolves names to declarations and computes static types, without caching.
///
/// Every method is a pure function of the compilation, so binding can run on
/// many threads at once.
pub struct Binder<'c> {
    comp: &'c Compilation,
    tables: &'c Tables,
}

impl<'c> Binder<'c> {
    pub fn new(comp: &'c Compilation, tables: &'c Tables) -> Self {
        Self { comp, tables }
    }

    // -----------------------------------------------------------------------
    // Types and members
    // -----------------------------------------------------------------------

    /// Find a type by written name, preferring types nested in or sharing a
    /// namespace with `from`.
    pub fn lookup_type(&self, written: &str, from: Option<TypeId>) -> Option<TypeId> {
        let candidates = self.tables.types_by_name.get(simple_type_name(written))?;
        if candidates.len() == 1 {
            return candidates.first().copied();
        }
        if let Some(from) = from {
            let mut container = Some(from);
            while let Some(c) = container {
                if let Some(&nested) = candidates.iter().find(|&&t| self.comp.ty(t).containing == Some(c)) {
                    return Some(nested);
                }
                container = self.comp.ty(c).containing;
            }
            let namespace = &self.comp.ty(from).namespace;
            if let Some(&same) = candidates.iter().find(|&&t| &self.comp.ty(t).namespace == namespace) {
                return Some(same);
            }
        }
        candidates.first().copied()
    }

    /// The base class of a class or record, or the first base interface of an interface.
    pub fn base_type(&self, ty: TypeId) -> Option<TypeId> {
        let decl = self.comp.ty(ty);
        decl.base_types.iter().find_map(|written| {
            let base = self.lookup_type(written, Some(ty))?;
            let kind = self.comp.ty(base).kind;
            let fits = match decl.kind {
                TypeKind::Interface => kind == TypeKind::Interface,
                _ => matches!(kind, TypeKind::Class | TypeKind::Record),
            };
            (fits && base != ty).then_some(base)
        })
    }

    /// Walk `ty` and its base chain, innermost first.
    pub fn hierarchy(&self, ty: TypeId) -> Vec<TypeId> {
        let mut out = vec![ty];
        let mut current = self.base_type(ty);
        while let Some(t) = current {
            if out.contains(&t) || out.len() > MAX_DEPTH {
                break;
            }
            out.push(t);
            current = self.base_type(t);
        }
        out
    }

    /// True when a method or constructor can be called with `argc` arguments.
    pub fn accepts(&self, member: MemberId, argc: usize) -> bool {
        let params = self.comp.member(member).params();
        let required = params
            .iter()
            .filter(|p| !self.comp.param(**p).is_optional())
            .count();
        let variadic = params.iter().any(|p| self.comp.param(*p).is_params);
        argc >= required && (variadic || argc <= params.len())
    }

    fn conversion(&self, arg: Option<&str>, param: &str, from: TypeId) -> Option<Conversion> {
        let Some(arg) = arg else {
            return Some(Conversion::Unknown);
        };
        if arg.trim() == param.trim() {
            return Some(Conversion::Identity);
        }
        let (a, p) = (keyword_name(simple_type_name(arg)), keyword_name(simple_type_name(param)));
        if a == p {
            return Some(Conversion::Identity);
        }
        if matches!(p, "object" | "dynamic" | "var") || a == "dynamic" {
            return Some(Conversion::Unknown);
        }
        if is_predefined(a) && is_predefined(p) {
            return widens(a, p).then_some(Conversion::Implicit);
        }
        let (a_known, p_known) = (self.lookup_type(a, Some(from)), self.lookup_type(p, Some(from)));
        match (a_known, p_known) {
            (Some(at), Some(pt)) => {
                if self.hierarchy(at).contains(&pt) {
                    return Some(Conversion::Implicit);
                }
                match self.comp.ty(pt).kind {
                    // Only the first base interface is followed by `hierarchy`.
                    TypeKind::Interface => Some(Conversion::Unknown),
                    _ => None,
                }
            }
            (Some(_), None) if is_predefined(p) => None,
            (None, Some(_)) if is_predefined(a) => None,
            _ => Some(Conversion::Unknown),
        }
    }

    /// Rank a candidate for `args`: the conversions of every supplied argument,
    /// then how few optional parameters the call leaves out.
    fn overload_score(&self, member: MemberId, args: &[Argument], from: TypeId, depth: usize) -> Option<(Vec<Conversion>, usize)> {
        if !self.accepts(member, args.len()) {
            return None;
        }
        let params = self.comp.member(member).params();
        let named_ok = args
            .iter()
            .filter_map(|a| a.name.as_deref())
            .all(|name| params.iter().any(|&p| self.comp.param(p).name == name));
        if !named_ok {
            return None;
        }
        let mut conversions = Vec::new();
        let mut omitted = 0;
        for &p in params {
            let param = self.comp.param(p);
            match match_argument(param, args) {
                ArgumentMatch::Supplied(values) => {
                    let element = param.type_name.strip_suffix("[]").unwrap_or(&param.type_name);
                    for value in &values {
                        let arg = self.type_of_at(*value, depth + 1);
                        let arg = arg.as_deref();
                        let as_element = if param.is_params {
                            self.conversion(arg, element, from)
                        } else {
                            None
                        };
                        let whole = if param.is_params && values.len() > 1 {
                            None
                        } else {
                            self.conversion(arg, &param.type_name, from)
                        };
                        conversions.push(as_element.max(whole)?);
                    }
                }
                ArgumentMatch::Default(_) => omitted += 1,
                ArgumentMatch::Missing => return None,
            }
        }
        Some((conversions, omitted))
    }

    /// The overloads among `candidates` a call with `args` binds to, best first.
    ///
    /// A candidate wins when none of its argument conversions is worse than
    /// another's and it omits no more optional parameters. Candidates no
    /// argument list distinguishes are all returned. When no candidate's
    /// parameter types fit, the count-only choice is kept.
    fn rank_overloads(&self, candidates: &[MemberId], args: &[Argument], from: TypeId, depth: usize) -> Vec<MemberId> {
        let scored: Vec<(MemberId, Vec<Conversion>, usize)> = candidates
            .iter()
            .filter_map(|&m| {
                self.overload_score(m, args, from, depth)
                    .map(|(conversions, omitted)| (m, conversions, omitted))
            })
            .collect();
        if scored.is_empty() {
            return candidates
                .iter()
                .copied()
                .find(|&m| self.accepts(m, args.len()))
                .into_iter()
                .collect();
        }
        let best: Vec<&(MemberId, Vec<Conversion>, usize)> = scored
            .iter()
            .filter(|(_, conv, _)| {
                scored
                    .iter()
                    .all(|(_, other, _)| no_worse(conv, other) || !no_worse(other, conv))
            })
            .collect();
        let fewest = best.iter().map(|(_, _, omitted)| *omitted).min().unwrap_or(0);
        best.into_iter()
            .filter(|(_, _, omitted)| *omitted == fewest)
            .map(|(m, _, _)| *m)
            .collect()
    }

    /// Look a member up by name in `ty`, its bases and then its containing types.
    /// `args` picks among method overloads.
    fn find_member_at(&self, ty: TypeId, name: &str, args: Option<&[Argument]>, depth: usize) -> Option<MemberId> {
        for t in self.hierarchy(ty) {
            let candidates: Vec<MemberId> = self
                .comp
                .ty(t)
                .members
                .iter()
                .copied()
                .filter(|&m| {
                    let decl = self.comp.member(m);
                    decl.name == name && !decl.is_constructor()
                })
                .collect();
            let chosen = match args {
                Some(args) if candidates.len() > 1 => self
                    .rank_overloads(&candidates, args, ty, depth)
                    .first()
                    .copied()
                    .or_else(|| candidates.first().copied()),
                _ => candidates.first().copied(),
            };
            if chosen.is_some() {
                return chosen;
            }
        }
        let containing = self.comp.ty(ty).containing?;
        self.find_member_at(containing, name, args, depth)
    }

    /// The instance constructors of `ty` a call with `args` binds to, best
    /// first. `exclude` drops the calling constructor of a `this(...)` chain.
    /// More than one result means the arguments do not pick a single overload.
    pub fn select_constructors(&self, ty: TypeId, args: &[Argument], exclude: Option<MemberId>) -> Vec<MemberId> {
        self.select_constructors_at(ty, args, exclude, 0)
    }

    fn select_constructors_at(&self, ty: TypeId, args: &[Argument], exclude: Option<MemberId>, depth: usize) -> Vec<MemberId> {
        let ctors: Vec<MemberId> = self
            .comp
            .constructors(ty, false)
            .into_iter()
            .filter(|&c| Some(c) != exclude)
            .collect();
        let ranked = self.rank_overloads(&ctors, args, ty, depth);
        if ranked.is_empty() && ctors.len() == 1 {
            return ctors;
        }
        ranked
    }

    // -----------------------------------------------------------------------
    // Names
    // -----------------------------------------------------------------------

    pub fn bind(&self, expr: ExprId) -> Option<Symbol> {
        self.bind_at(expr, 0)
    }

    fn bind_at(&self, expr: ExprId, depth: usize) -> Option<Symbol> {
        if depth > MAX_DEPTH {
            return None;
        }
        let node = self.comp.expr(expr);
        match &node.kind {
            ExprKind::Name(name) => self.bind_name(expr, name, depth),
            ExprKind::MemberAccess { target, name, .. } => {
                self.bind_member_access(expr, *target, name, depth)
            }
            ExprKind::Invocation { target, .. } => match self.bind_at(*target, depth + 1) {
                Some(Symbol::Member(m))
                    if matches!(self.comp.member(m).kind, MemberKind::Method { .. }) =>
                {
                    Some(Symbol::Member(m))
                }
                _ => None,
            },
            ExprKind::ObjectCreation {
                type_name: Some(type_name),
                args,
                ..
            } => {
                let ty = self.lookup_type(type_name, Some(self.comp.enclosing_type(expr)))?;
                self.select_constructors_at(ty, args, None, depth)
                    .first()
                    .copied()
                    .map(Symbol::Member)
            }
            ExprKind::Declaration(local) => Some(Symbol::Local(*local)),
            _ => None,
        }
    }

    /// Arguments of the invocation `expr` is the target of, if any.
    fn invocation_args(&self, expr: ExprId) -> Option<&'c [Argument]> {
        match self.comp.expr(expr).parent {
            Some(ExprParent::Expr(parent)) => match &self.comp.expr(parent).kind {
                ExprKind::Invocation { target, args } if *target == expr => Some(args.as_slice()),
                _ => None,
            },
            _ => None,
        }
    }

    /// `X` in `new Foo { X = 1 }` names a member of `Foo`.
    fn object_initializer_target(&self, expr: ExprId) -> Option<TypeId> {
        let Some(ExprParent::Expr(assignment)) = self.comp.expr(expr).parent else {
            return None;
        };
        let ExprKind::Assignment { left, .. } = self.comp.expr(assignment).kind else {
            return None;
        };
        let Some(ExprParent::Expr(creation)) = self.comp.expr(assignment).parent else {
            return None;
        };
        match &self.comp.expr(creation).kind {
            ExprKind::ObjectCreation {
                type_name: Some(type_name),
                initializers,
                ..
            } if left == expr && initializers.contains(&assignment) => {
                self.lookup_type(type_name, Some(self.comp.enclosing_type(expr)))
            }
            _ => None,
        }
    }

    fn bind_name(&self, expr: ExprId, name: &str, depth: usize) -> Option<Symbol> {
        let node = self.comp.expr(expr);
        let member = node.member;
        let declaring = self.comp.member(member).declaring;

        if let Some(created) = self.object_initializer_target(expr) {
            return self.find_member_at(created, name, None, depth).map(Symbol::Member);
        }

        let local = self
            .tables
            .locals_by_member
            .get(&member)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&l| {
                let decl = self.comp.local(l);
                decl.name == name
                    && decl.span.file == node.span.file
                    && decl.span.start <= node.span.start
                    && node.span.start < decl.scope_end
            })
            .max_by_key(|&l| self.comp.local(l).span.start);
        if let Some(local) = local {
            return Some(Symbol::Local(local));
        }

        let decl = self.comp.member(member);
        if let Some(&param) = decl.params().iter().find(|&&p| self.comp.param(p).name == name) {
            return Some(Symbol::Parameter(param));
        }
        if let MemberKind::Property {
            setter: Some(setter),
            ..
        } = &decl.kind
            && let Some(value) = setter.value_param
            && name == "value"
            && setter.span.contains(&node.span)
        {
            return Some(Symbol::Parameter(value));
        }

        if let Some(m) = self.find_member_at(declaring, name, self.invocation_args(expr), depth) {
            return Some(Symbol::Member(m));
        }
        self.lookup_type(name, Some(declaring)).map(Symbol::Type)
    }

    fn bind_member_access(&self, expr: ExprId, target: ExprId, name: &str, depth: usize) -> Option<Symbol> {
        let args = self.invocation_args(expr);
        let enclosing = self.comp.enclosing_type(expr);
        let receiver = match self.comp.expr(target).kind {
            ExprKind::This => Some(enclosing),
            ExprKind::Base => self.base_type(enclosing),
            _ => match self.bind_at(target, depth + 1) {
                Some(Symbol::Type(t)) => Some(t),
                _ => self
                    .type_of_at(target, depth + 1)
                    .and_then(|t| self.lookup_type(&t, Some(enclosing))),
            },
        };
        if let Some(ty) = receiver
            && let Some(m) = self.find_member_at(ty, name, args, depth)
        {
            return Some(Symbol::Member(m));
        }
        // `Namespace.Type` used as a receiver.
        let target_unbound = matches!(
            self.comp.expr(target).kind,
            ExprKind::Name(_) | ExprKind::MemberAccess { .. }
        ) && receiver.is_none();
        if target_unbound {
            return self.lookup_type(name, Some(enclosing)).map(Symbol::Type);
        }
        None
    }

    // -----------------------------------------------------------------------
    // Types of expressions
    // -----------------------------------------------------------------------

    /// The static type of `expr` as written in source, when it can be inferred.
    pub fn type_of(&self, expr: ExprId) -> Option<String> {
        self.type_of_at(expr, 0)
    }

    fn type_of_at(&self, expr: ExprId, depth: usize) -> Option<String> {
        if depth > MAX_DEPTH {
            return None;
        }
        let next = depth + 1;
        let node = self.comp.expr(expr);
        match &node.kind {
            ExprKind::Literal(kind) => match kind {
                LiteralKind::Integer => Some("int".into()),
                LiteralKind::Real => Some("double".into()),
                LiteralKind::String => Some("string".into()),
                LiteralKind::Character => Some("char".into()),
                LiteralKind::Boolean => Some("bool".into()),
                LiteralKind::Null => None,
            },
            ExprKind::Name(_) | ExprKind::MemberAccess { .. } | ExprKind::Declaration(_) => {
                match self.bind_at(expr, next)? {
                    Symbol::Local(l) => {
                        let local = self.comp.local(l);
                        match &local.type_name {
                            Some(t) => Some(t.clone()),
                            None => self.type_of_at(local.initializer?, next),
                        }
                    }
                    Symbol::Parameter(p) => Some(self.comp.param(p).type_name.clone()),
                    Symbol::Member(m) => self.comp.member(m).type_name().map(str::to_owned),
                    Symbol::Type(t) => Some(self.comp.ty(t).name.clone()),
                }
            }
            ExprKind::ElementAccess { target, .. } => {
                let container = self.type_of_at(*target, next)?;
                container.strip_suffix("[]").map(str::to_owned)
            }
            ExprKind::Invocation { target, .. } => match self.bind_at(expr, next) {
                Some(Symbol::Member(m)) => self.comp.member(m).type_name().map(str::to_owned),
                _ => generic_argument(&self.comp.expr(*target).text).map(str::to_owned),
            },
            ExprKind::ObjectCreation { type_name, .. } => type_name.clone(),
            ExprKind::This => Some(self.comp.ty(self.comp.enclosing_type(expr)).name.clone()),
            ExprKind::Base => self
                .base_type(self.comp.enclosing_type(expr))
                .map(|t| self.comp.ty(t).name.clone()),
            ExprKind::Cast { type_name, .. } => Some(type_name.clone()),
            ExprKind::Parenthesized(inner) => self.type_of_at(*inner, next),
            ExprKind::Await(inner) => {
                let awaited = self.type_of_at(*inner, next)?;
                Some(generic_argument(&awaited).unwrap_or(&awaited).to_owned())
            }
            ExprKind::Conditional {
                then, otherwise, ..
            } => self
                .type_of_at(*then, next)
                .or_else(|| self.type_of_at(*otherwise, next)),
            ExprKind::Coalesce { left, right } => self
                .type_of_at(*left, next)
                .or_else(|| self.type_of_at(*right, next)),
            ExprKind::Assignment { left, .. } => self.type_of_at(*left, next),
            ExprKind::Interpolated(_) => Some("string".into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_type_name() {
        assert_eq!(simple_type_name("Foo"), "Foo");
        assert_eq!(simple_type_name("System.IO.Stream"), "Stream");
        assert_eq!(simple_type_name("global::N.Bar<int>"), "Bar");
        assert_eq!(simple_type_name("IDisposable?"), "IDisposable");
        assert_eq!(simple_type_name("int[]"), "int");
    }

    #[test]
    fn test_numeric_widening_and_aliases() {
        assert!(widens("int", "double"));
        assert!(widens("char", "int"));
        assert!(!widens("double", "int"));
        assert!(!widens("int", "string"));
        assert_eq!(keyword_name(simple_type_name("System.Int32")), "int");
        assert!(Conversion::Identity > Conversion::Implicit);
        assert!(no_worse(&[Conversion::Identity], &[Conversion::Implicit]));
        assert!(!no_worse(&[Conversion::Unknown, Conversion::Identity], &[Conversion::Implicit, Conversion::Identity]));
    }

    #[test]
    fn test_generic_argument() {
        assert_eq!(generic_argument("locator.Get<Bar>"), Some("Bar"));
        assert_eq!(generic_argument("Task<int>"), Some("int"));
        assert_eq!(generic_argument("Dictionary<int,string>"), None);
        assert_eq!(generic_argument("Get"), None);
    }
}
