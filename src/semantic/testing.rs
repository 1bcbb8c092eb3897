//! Fixtures shared by unit tests: build a model from inline C# and find nodes by text.

use crate::parser::compile_sources;
use crate::syntax::ExprId;

use super::{SemanticModel, SymbolOracle};

pub fn model(sources: &[&str]) -> SemanticModel {
    SemanticModel::build(compile_sources(sources).expect("test sources parse"))
}

/// The first expression with exactly `text` that starts at or after the first
/// occurrence of `anchor` in any file.
pub fn find_expr(model: &SemanticModel, anchor: &str, text: &str) -> ExprId {
    let comp = model.compilation();
    let (file, offset) = comp
        .files
        .iter()
        .enumerate()
        .find_map(|(i, f)| f.text.find(anchor).map(|o| (i, o)))
        .unwrap_or_else(|| panic!("anchor {anchor:?} not found"));
    comp.expr_ids()
        .filter(|&e| {
            let expr = comp.expr(e);
            expr.span.file.index() == file && expr.span.start >= offset && expr.text == text
        })
        .min_by_key(|&e| (comp.expr(e).span.start, e))
        .unwrap_or_else(|| panic!("no expression {text:?} after {anchor:?}"))
}
