use dashmap::DashMap;
use serde::Serialize;

use crate::semantic::{Symbol, SymbolOracle};
use crate::syntax::{Accessibility, MemberId, MemberKind, TypeId};

/// Why a member was judged reachable or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Evidence {
    /// Only code in the compilation can call it.
    Private,
    Public,
    /// Internal or protected, and nothing outside can derive from the declaring type.
    SealedType(TypeId),
    /// Internal or protected on a type other code can derive from.
    OpenType(TypeId),
    /// Readonly or const field, or a property without a setter.
    NotWritable,
}

/// A cached reachability decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub reachable: bool,
    pub accessibility: Accessibility,
    pub evidence: Evidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    /// Calling a method/constructor or reading a member.
    Access(MemberId),
    /// Writing a field or property from outside.
    Write(MemberId),
}

/// Decides whether code outside the compilation can call or mutate a member.
///
/// Verdicts are memoized for the lifetime of the analyzer, which should match
/// one pass over one compilation. The map's entry API computes each key at most
/// once even when resolvers on several threads ask concurrently.
pub struct ReachabilityAnalyzer<'o> {
    oracle: &'o dyn SymbolOracle,
    cache: DashMap<Key, Verdict>,
}

impl<'o> ReachabilityAnalyzer<'o> {
    pub fn new(oracle: &'o dyn SymbolOracle) -> Self {
        Self {
            oracle,
            cache: DashMap::new(),
        }
    }

    pub fn is_externally_reachable(&self, member: MemberId) -> bool {
        self.verdict(member).reachable
    }

    pub fn verdict(&self, member: MemberId) -> Verdict {
        *self
            .cache
            .entry(Key::Access(member))
            .or_insert_with(|| self.judge(self.oracle.accessibility_of(Symbol::Member(member)), member))
    }

    /// True when outside code can assign the member after construction:
    /// a writable field or a property whose setter is reachable.
    pub fn is_externally_mutable(&self, member: MemberId) -> bool {
        self.write_verdict(member).reachable
    }

    pub fn write_verdict(&self, member: MemberId) -> Verdict {
        *self
            .cache
            .entry(Key::Write(member))
            .or_insert_with(|| self.judge_write(member))
    }

    #[cfg(test)]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn judge(&self, accessibility: Accessibility, member: MemberId) -> Verdict {
        let declaring = self.oracle.compilation().member(member).declaring;
        let (reachable, evidence) = match accessibility {
            Accessibility::Private => (false, Evidence::Private),
            Accessibility::Public => (true, Evidence::Public),
            Accessibility::Protected | Accessibility::Internal => {
                if self.oracle.is_sealed(declaring) {
                    (false, Evidence::SealedType(declaring))
                } else {
                    (true, Evidence::OpenType(declaring))
                }
            }
        };
        Verdict {
            reachable,
            accessibility,
            evidence,
        }
    }

    fn not_writable(&self, member: MemberId) -> Verdict {
        Verdict {
            reachable: false,
            accessibility: self.oracle.accessibility_of(Symbol::Member(member)),
            evidence: Evidence::NotWritable,
        }
    }

    fn judge_write(&self, member: MemberId) -> Verdict {
        let comp = self.oracle.compilation();
        let decl = comp.member(member);
        match &decl.kind {
            MemberKind::Field { .. } if decl.modifiers.is_readonly || decl.modifiers.is_const => {
                self.not_writable(member)
            }
            MemberKind::Field { .. } => {
                self.judge(self.oracle.accessibility_of(Symbol::Member(member)), member)
            }
            MemberKind::Property {
                setter: Some(setter),
                ..
            } => {
                let accessibility = match setter.accessibility {
                    Some(own) => own.min(comp.type_accessibility(decl.declaring)),
                    None => self.oracle.accessibility_of(Symbol::Member(member)),
                };
                self.judge(accessibility, member)
            }
            _ => self.not_writable(member),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::testing::model;

    fn member(model: &crate::semantic::SemanticModel, ty: &str, name: &str) -> MemberId {
        let comp = model.compilation();
        comp.member_ids()
            .find(|&m| {
                let decl = comp.member(m);
                decl.name == name && comp.ty(decl.declaring).name == ty
            })
            .unwrap_or_else(|| panic!("{ty}.{name} not found"))
    }

    #[test]
    fn test_accessibility_and_sealing() {
        let m = model(&[r#"
public class Open
{
    private Open(int a) { }
    internal Open(string b) { }
    public Open() { }
    protected void Run() { }
}

public sealed class Closed
{
    internal Closed(int a) { }
    protected void Run() { }
}

internal class Outer
{
    public class Inner
    {
        public Inner() { }
    }
}"#]);
        let reach = ReachabilityAnalyzer::new(&m);
        let comp = m.compilation();
        let ctors: Vec<MemberId> = comp
            .member_ids()
            .filter(|&c| comp.member(c).is_constructor() && comp.ty(comp.member(c).declaring).name == "Open")
            .collect();
        assert!(!reach.is_externally_reachable(ctors[0]));
        assert!(reach.is_externally_reachable(ctors[1]));
        assert!(reach.is_externally_reachable(ctors[2]));
        assert!(reach.is_externally_reachable(member(&m, "Open", "Run")));

        assert!(!reach.is_externally_reachable(member(&m, "Closed", "Closed")));
        assert_eq!(
            reach.verdict(member(&m, "Closed", "Run")).evidence,
            Evidence::SealedType(comp.member(member(&m, "Closed", "Run")).declaring)
        );

        let inner = reach.verdict(member(&m, "Inner", "Inner"));
        assert_eq!(inner.accessibility, Accessibility::Internal);
        assert!(inner.reachable);
    }

    #[test]
    fn test_external_mutation() {
        let m = model(&[r#"
public class Foo
{
    public int Field;
    public readonly int ReadOnlyField;
    public int Settable { get; set; }
    public int PrivateSet { get; private set; }
    public int GetOnly { get; }
    private int hidden;
}"#]);
        let reach = ReachabilityAnalyzer::new(&m);
        assert!(reach.is_externally_mutable(member(&m, "Foo", "Field")));
        assert!(!reach.is_externally_mutable(member(&m, "Foo", "ReadOnlyField")));
        assert!(reach.is_externally_mutable(member(&m, "Foo", "Settable")));
        assert!(!reach.is_externally_mutable(member(&m, "Foo", "PrivateSet")));
        assert!(!reach.is_externally_mutable(member(&m, "Foo", "GetOnly")));
        assert!(!reach.is_externally_mutable(member(&m, "Foo", "hidden")));
    }

    #[test]
    fn test_verdicts_are_cached() {
        let m = model(&["public class Foo { public Foo() { } }"]);
        let reach = ReachabilityAnalyzer::new(&m);
        let ctor = member(&m, "Foo", "Foo");
        assert_eq!(reach.cached(), 0);
        let first = reach.verdict(ctor);
        assert_eq!(reach.verdict(ctor), first);
        assert_eq!(reach.cached(), 1);
    }
}
