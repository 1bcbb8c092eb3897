use std::fmt;

use serde::Serialize;

use crate::syntax::ExprId;

/// Where a value observed at an expression comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueSource {
    /// Literal or compile-time constant.
    Constant,
    /// Read of a field or auto-property.
    Member,
    /// Object creation inside the analyzed code; the creator owns the value.
    Created,
    /// Supplied by the only possible caller of a closed constructor or method.
    Injected,
    /// Code outside the compilation may have supplied or replaced the value.
    PotentiallyInjected,
    /// Computed by an expression or a member with a body.
    Calculated,
    /// Parameter bound to arguments at known call sites.
    Argument,
    /// `static readonly` field or static get-only property.
    Cached,
    /// Comes from code the analysis cannot see into.
    External,
    /// The walk reached a node that is already being resolved.
    Recursion,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueSource::Constant => "Constant",
            ValueSource::Member => "Member",
            ValueSource::Created => "Created",
            ValueSource::Injected => "Injected",
            ValueSource::PotentiallyInjected => "PotentiallyInjected",
            ValueSource::Calculated => "Calculated",
            ValueSource::Argument => "Argument",
            ValueSource::Cached => "Cached",
            ValueSource::External => "External",
            ValueSource::Recursion => "Recursion",
        };
        f.write_str(name)
    }
}

/// One piece of evidence in a trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrailEntry {
    pub text: String,
    pub source: ValueSource,
    /// The expression the entry was produced for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<ExprId>,
    /// Index of the entry whose expansion discovered this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
}

/// Ordered provenance evidence for one queried expression, in discovery order.
///
/// Entries with the same text and source are stored once; a second discovery
/// returns the index of the first so later evidence still hangs off it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProvenanceTrail {
    entries: Vec<TrailEntry>,
}

impl ProvenanceTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry unless an identical `(text, source)` pair exists.
    /// Returns the index of the stored entry.
    pub fn push(
        &mut self,
        text: impl Into<String>,
        source: ValueSource,
        node: Option<ExprId>,
        parent: Option<usize>,
    ) -> usize {
        let text = text.into();
        if let Some(existing) = self
            .entries
            .iter()
            .position(|e| e.source == source && e.text == text)
        {
            return existing;
        }
        self.entries.push(TrailEntry {
            text,
            source,
            node,
            parent,
        });
        self.entries.len() - 1
    }

    pub fn entries(&self) -> &[TrailEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrailEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The classification of the queried expression itself.
    pub fn leading(&self) -> Option<&TrailEntry> {
        self.entries.first()
    }

    pub fn contains(&self, source: ValueSource) -> bool {
        self.entries.iter().any(|e| e.source == source)
    }

    /// True when no entry was discovered by expanding a `Recursion` entry.
    pub fn recursion_is_terminal(&self) -> bool {
        self.entries.iter().all(|e| {
            e.parent
                .is_none_or(|p| self.entries[p].source != ValueSource::Recursion)
        })
    }
}

impl<'a> IntoIterator for &'a ProvenanceTrail {
    type Item = &'a TrailEntry;
    type IntoIter = std::slice::Iter<'a, TrailEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Compact rendering: `text Source, text Source, ...`.
impl fmt::Display for ProvenanceTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", entry.text, entry.source)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_suppresses_exact_duplicates() {
        let mut trail = ProvenanceTrail::new();
        let a = trail.push("meh", ValueSource::Argument, None, None);
        let b = trail.push("1", ValueSource::Constant, None, Some(a));
        let again = trail.push("1", ValueSource::Constant, None, Some(a));
        let other = trail.push("1", ValueSource::Cached, None, Some(a));
        assert_eq!(b, again);
        assert_ne!(b, other);
        assert_eq!(trail.len(), 3);
        assert_eq!(trail.to_string(), "meh Argument, 1 Constant, 1 Cached");
    }

    #[test]
    fn test_recursion_is_terminal() {
        let mut trail = ProvenanceTrail::new();
        let x = trail.push("X", ValueSource::Calculated, None, None);
        let r = trail.push("X", ValueSource::Recursion, None, Some(x));
        assert!(trail.recursion_is_terminal());
        trail.push("1", ValueSource::Constant, None, Some(r));
        assert!(!trail.recursion_is_terminal());
    }

    #[test]
    fn test_serializes_as_entry_list() {
        let mut trail = ProvenanceTrail::new();
        trail.push("meh", ValueSource::Injected, None, None);
        let json = serde_json::to_value(&trail).expect("serialize");
        assert_eq!(json, serde_json::json!([{ "text": "meh", "source": "Injected" }]));
    }
}
