use std::collections::HashMap;

use petgraph::Direction;
use petgraph::Directed;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use serde::Serialize;

use crate::syntax::{
    Argument, Compilation, ExprId, ExprKind, MemberId, MemberKind, ParamDecl, Position,
};

/// How a call site reaches its callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallSiteKind {
    /// `Foo(...)` or `x.Foo(...)`.
    Invocation(ExprId),
    /// `new Foo(...)`.
    Creation(ExprId),
    /// `: this(...)` or `: base(...)` on the caller constructor.
    Initializer { this: bool },
    /// A constructor without initializer calling the parameterless base constructor.
    ImplicitBase,
}

/// One syntactic call of a member inside the compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallSite {
    /// The member whose body contains the call.
    pub caller: MemberId,
    pub callee: MemberId,
    pub kind: CallSiteKind,
    pub position: Position,
}

/// The argument(s) a call site supplies for one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentMatch {
    Supplied(Vec<ExprId>),
    /// The call site omits an optional parameter.
    Default(ExprId),
    Missing,
}

impl CallSite {
    /// Arguments as written at the call site.
    pub fn arguments<'c>(&self, comp: &'c Compilation) -> &'c [Argument] {
        match self.kind {
            CallSiteKind::Invocation(e) | CallSiteKind::Creation(e) => match &comp.expr(e).kind {
                ExprKind::Invocation { args, .. } | ExprKind::ObjectCreation { args, .. } => args,
                _ => &[],
            },
            CallSiteKind::Initializer { .. } => match &comp.member(self.caller).kind {
                MemberKind::Constructor {
                    initializer: Some(init),
                    ..
                } => &init.args,
                _ => &[],
            },
            CallSiteKind::ImplicitBase => &[],
        }
    }
}

/// Match `param` against an argument list: named arguments first, then position.
/// A `params` parameter collects every remaining positional argument.
pub fn match_argument(param: &ParamDecl, args: &[Argument]) -> ArgumentMatch {
    if let Some(named) = args
        .iter()
        .find(|a| a.name.as_deref() == Some(param.name.as_str()))
    {
        return ArgumentMatch::Supplied(vec![named.value]);
    }
    let positional: Vec<ExprId> = args
        .iter()
        .take_while(|a| a.name.is_none())
        .map(|a| a.value)
        .collect();
    if param.is_params {
        let rest: Vec<ExprId> = positional.into_iter().skip(param.ordinal).collect();
        if !rest.is_empty() {
            return ArgumentMatch::Supplied(rest);
        }
    } else if let Some(value) = positional.get(param.ordinal) {
        return ArgumentMatch::Supplied(vec![*value]);
    }
    match param.default {
        Some(default) => ArgumentMatch::Default(default),
        None => ArgumentMatch::Missing,
    }
}

/// Directed member -> member call graph with a per-callee call-site index.
///
/// Built once per analysis pass; `call_sites` never rescans the compilation.
pub struct CallGraph {
    graph: StableGraph<MemberId, CallSite, Directed>,
    sites: HashMap<MemberId, Vec<CallSite>>,
}

impl CallGraph {
    pub fn build(calls: impl IntoIterator<Item = CallSite>) -> Self {
        let mut graph = StableGraph::new();
        let mut index: HashMap<MemberId, NodeIndex> = HashMap::new();
        let mut node = |graph: &mut StableGraph<MemberId, CallSite, Directed>, m: MemberId| {
            *index.entry(m).or_insert_with(|| graph.add_node(m))
        };
        for site in calls {
            let from = node(&mut graph, site.caller);
            let to = node(&mut graph, site.callee);
            graph.add_edge(from, to, site);
        }

        let mut sites: HashMap<MemberId, Vec<CallSite>> = HashMap::new();
        for (&member, &idx) in &index {
            let mut incoming: Vec<CallSite> = graph
                .edges_directed(idx, Direction::Incoming)
                .map(|e| *e.weight())
                .collect();
            if incoming.is_empty() {
                continue;
            }
            incoming.sort_by_key(|s| (s.position, s.caller));
            sites.insert(member, incoming);
        }

        Self { graph, sites }
    }

    /// Every call site of `member` in source order.
    pub fn call_sites(&self, member: MemberId) -> &[CallSite] {
        self.sites.get(&member).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{FileId, Span};

    fn param(name: &str, ordinal: usize, default: Option<ExprId>, is_params: bool) -> ParamDecl {
        ParamDecl {
            name: name.to_string(),
            type_name: "int".to_string(),
            owner: MemberId(0),
            ordinal,
            default,
            is_params,
            ref_kind: None,
            is_accessor_value: false,
            span: Span::point(FileId(0), 0, 0),
        }
    }

    fn arg(name: Option<&str>, value: u32) -> Argument {
        Argument {
            name: name.map(str::to_string),
            value: ExprId(value),
            ref_kind: None,
        }
    }

    #[test]
    fn test_match_argument_positional_named_and_default() {
        let args = vec![arg(None, 10), arg(Some("c"), 11)];
        assert_eq!(
            match_argument(&param("a", 0, None, false), &args),
            ArgumentMatch::Supplied(vec![ExprId(10)])
        );
        assert_eq!(
            match_argument(&param("c", 2, None, false), &args),
            ArgumentMatch::Supplied(vec![ExprId(11)])
        );
        assert_eq!(
            match_argument(&param("b", 1, Some(ExprId(99)), false), &args),
            ArgumentMatch::Default(ExprId(99))
        );
        assert_eq!(
            match_argument(&param("b", 1, None, false), &args),
            ArgumentMatch::Missing
        );
    }

    #[test]
    fn test_match_argument_params_array() {
        let args = vec![arg(None, 1), arg(None, 2), arg(None, 3)];
        assert_eq!(
            match_argument(&param("rest", 1, None, true), &args),
            ArgumentMatch::Supplied(vec![ExprId(2), ExprId(3)])
        );
    }

    #[test]
    fn test_call_sites_sorted_by_position() {
        let pos = |offset| Position {
            file: FileId(0),
            offset,
        };
        let site = |caller, offset| CallSite {
            caller: MemberId(caller),
            callee: MemberId(9),
            kind: CallSiteKind::ImplicitBase,
            position: pos(offset),
        };
        let graph = CallGraph::build(vec![site(3, 50), site(1, 10), site(2, 30)]);
        let callers: Vec<u32> = graph
            .call_sites(MemberId(9))
            .iter()
            .map(|s| s.caller.0)
            .collect();
        assert_eq!(callers, vec![1, 2, 3]);
        assert!(graph.call_sites(MemberId(1)).is_empty());
        assert_eq!(graph.edge_count(), 3);
    }
}
