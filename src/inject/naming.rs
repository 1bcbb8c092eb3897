use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::semantic::binder::simple_type_name;
use crate::syntax::{Compilation, MemberKind, TypeId};

/// How a synthesized backing field is named and referenced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FieldPrefix {
    /// Follow the fields already declared in the type, then in the compilation.
    #[default]
    Auto,
    /// `_bar`, referenced as `_bar`.
    Underscore,
    /// `bar`, referenced as `this.bar`.
    This,
}

/// The parameter name for a value of `type_name`: generic arguments and
/// namespace dropped, an interface `I` prefix removed, first letter lowercased.
///
/// `IDisposable` -> `disposable`, `System.IO.Stream` -> `stream`, `Bar<int>` -> `bar`.
pub fn parameter_name(type_name: &str) -> String {
    let simple = simple_type_name(type_name);
    let mut chars = simple.chars();
    let stem = match (chars.next(), chars.next()) {
        (Some('I'), Some(next)) if next.is_uppercase() => &simple[1..],
        _ => simple,
    };
    let mut out = String::with_capacity(stem.len());
    let mut chars = stem.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_lowercase());
        out.push_str(chars.as_str());
    }
    out
}

fn underscore_votes<'c>(fields: impl Iterator<Item = &'c str>) -> Option<bool> {
    let (mut with, mut without) = (0usize, 0usize);
    for name in fields {
        if name.starts_with('_') {
            with += 1;
        } else {
            without += 1;
        }
    }
    (with + without > 0).then_some(with > without)
}

/// Resolve `Auto` against the instance fields of `ty`, falling back to the
/// whole compilation and finally to `This`.
pub fn field_style(comp: &Compilation, ty: TypeId, prefix: FieldPrefix) -> FieldPrefix {
    if prefix != FieldPrefix::Auto {
        return prefix;
    }
    let instance_fields = |members: &mut dyn Iterator<Item = crate::syntax::MemberId>| -> Vec<&str> {
        members
            .filter(|&m| {
                let decl = comp.member(m);
                matches!(decl.kind, MemberKind::Field { .. }) && !decl.is_static()
            })
            .map(|m| comp.member(m).name.as_str())
            .collect()
    };
    let local = instance_fields(&mut comp.ty(ty).members.iter().copied());
    let votes = underscore_votes(local.into_iter())
        .or_else(|| underscore_votes(instance_fields(&mut comp.member_ids()).into_iter()));
    match votes {
        Some(true) => FieldPrefix::Underscore,
        _ => FieldPrefix::This,
    }
}

/// Declared name of a new backing field.
pub fn field_name(parameter: &str, style: FieldPrefix) -> String {
    match style {
        FieldPrefix::Underscore => format!("_{parameter}"),
        FieldPrefix::Auto | FieldPrefix::This => parameter.to_owned(),
    }
}

/// How code inside the type refers to an instance field named `field`.
pub fn field_reference(field: &str) -> String {
    if field.starts_with('_') {
        field.to_owned()
    } else {
        format!("this.{field}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::compile_sources;

    #[test]
    fn test_parameter_name() {
        assert_eq!(parameter_name("IDisposable"), "disposable");
        assert_eq!(parameter_name("Bar"), "bar");
        assert_eq!(parameter_name("Bar<int>"), "bar");
        assert_eq!(parameter_name("System.IO.Stream"), "stream");
        assert_eq!(parameter_name("Item"), "item");
        assert_eq!(parameter_name("I"), "i");
    }

    #[test]
    fn test_field_style_detection() {
        let comp = compile_sources(&[
            "public class A { private readonly int _x; private int _y; }",
            "public class B { private int y; }",
            "public class C { }",
        ])
        .expect("parse");
        let ty = |name: &str| comp.type_ids().find(|&t| comp.ty(t).name == name).expect("type");
        assert_eq!(field_style(&comp, ty("A"), FieldPrefix::Auto), FieldPrefix::Underscore);
        assert_eq!(field_style(&comp, ty("B"), FieldPrefix::Auto), FieldPrefix::This);
        // two underscore fields against one plain field across the compilation
        assert_eq!(field_style(&comp, ty("C"), FieldPrefix::Auto), FieldPrefix::Underscore);
        assert_eq!(field_style(&comp, ty("A"), FieldPrefix::This), FieldPrefix::This);
    }

    #[test]
    fn test_field_naming_and_reference() {
        assert_eq!(field_name("bar", FieldPrefix::Underscore), "_bar");
        assert_eq!(field_name("bar", FieldPrefix::This), "bar");
        assert_eq!(field_reference("_bar"), "_bar");
        assert_eq!(field_reference("bar"), "this.bar");
    }
}
