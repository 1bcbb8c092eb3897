pub mod lower;

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};
use tree_sitter::{Parser, Tree};

use crate::error::ParseError;
use crate::syntax::Compilation;

// One C# parser per rayon worker thread, created lazily on first use.
thread_local! {
    static PARSER_CS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_c_sharp::LANGUAGE.into()).unwrap();
        p
    });
}

/// A parsed file waiting to be lowered.
pub struct ParsedFile {
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
}

/// Parse C# source text on the calling thread's parser.
///
/// # Errors
/// Returns an error if the extension is not `.cs` or tree-sitter produces no tree.
pub fn parse_source(path: &Path, source: String) -> Result<ParsedFile, ParseError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext != "cs" {
        return Err(ParseError::UnsupportedExtension(path.to_path_buf()));
    }
    let tree = PARSER_CS
        .with(|p| p.borrow_mut().parse(source.as_bytes(), None))
        .ok_or_else(|| ParseError::NoTree(path.to_path_buf()))?;
    Ok(ParsedFile {
        path: path.to_path_buf(),
        source,
        tree,
    })
}

/// Read and parse a file from disk.
pub fn parse_path(path: &Path) -> Result<ParsedFile, ParseError> {
    let source = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_source(path, source)
}

/// Counters reported by `index`.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ParseStats {
    pub parsed: usize,
    pub skipped: usize,
    pub with_errors: usize,
}

/// Parse `files` in parallel and lower them, in path order, into one compilation.
///
/// Unreadable or unparsable files are skipped with a warning.
pub fn build_compilation(files: &[PathBuf]) -> (Compilation, ParseStats) {
    let mut parsed: Vec<ParsedFile> = files
        .par_iter()
        .filter_map(|path| match parse_path(path) {
            Ok(file) => Some(file),
            Err(err) => {
                warn!("{err}");
                None
            }
        })
        .collect();
    parsed.sort_by(|a, b| a.path.cmp(&b.path));

    let mut stats = ParseStats {
        skipped: files.len() - parsed.len(),
        ..ParseStats::default()
    };
    let mut comp = Compilation::new();
    for file in parsed {
        lower_parsed(&mut comp, file, &mut stats);
    }
    (comp, stats)
}

/// Build a compilation from in-memory sources, named `File0.cs`, `File1.cs`, ...
#[cfg(test)]
pub fn compile_sources<S: AsRef<str>>(sources: &[S]) -> Result<Compilation, ParseError> {
    let mut comp = Compilation::new();
    let mut stats = ParseStats::default();
    for (i, source) in sources.iter().enumerate() {
        let path = PathBuf::from(format!("File{i}.cs"));
        let file = parse_source(&path, source.as_ref().to_owned())?;
        lower_parsed(&mut comp, file, &mut stats);
    }
    Ok(comp)
}

fn lower_parsed(comp: &mut Compilation, file: ParsedFile, stats: &mut ParseStats) {
    let id = lower::lower_file(comp, file.path, &file.source, &file.tree);
    stats.parsed += 1;
    if comp.file(id).has_errors {
        stats.with_errors += 1;
        debug!("{} parsed with syntax errors", comp.file(id).path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{ExprKind, MemberKind, StmtKind, TypeKind};

    fn compile(src: &str) -> Compilation {
        compile_sources(&[src]).expect("parse")
    }

    #[test]
    fn test_rejects_non_cs_extension() {
        let err = parse_source(Path::new("foo.ts"), String::new()).err();
        assert!(matches!(err, Some(ParseError::UnsupportedExtension(_))));
    }

    #[test]
    fn test_lowers_class_members() {
        let comp = compile(
            r#"
namespace N
{
    public sealed class Foo : Base, IDisposable
    {
        private readonly int value = 1;
        public const string Name = "foo";
        public int Value => this.value;
        public int Auto { get; private set; }

        public Foo(int meh) : base(meh)
        {
        }

        public int Bar(int x, int y = 2) => x + y;
    }
}"#,
        );
        assert_eq!(comp.types.len(), 1);
        let ty = &comp.types[0];
        assert_eq!(ty.name, "Foo");
        assert_eq!(ty.namespace, "N");
        assert_eq!(ty.kind, TypeKind::Class);
        assert!(ty.is_sealed());
        assert_eq!(ty.base_types, vec!["Base".to_string(), "IDisposable".to_string()]);

        let names: Vec<&str> = ty.members.iter().map(|m| comp.member(*m).name.as_str()).collect();
        assert_eq!(names, vec!["value", "Name", "Value", "Auto", "Foo", "Bar"]);

        let value = comp.member(ty.members[0]);
        assert!(value.modifiers.is_readonly);
        let init = value.initializer().expect("field initializer");
        assert_eq!(comp.expr(init).text, "1");

        let auto = comp.member(ty.members[3]);
        assert!(auto.is_auto_property());
        match &auto.kind {
            MemberKind::Property { setter: Some(setter), .. } => {
                assert!(setter.value_param.is_some());
                assert_eq!(setter.accessibility, Some(crate::syntax::Accessibility::Private));
            }
            other => panic!("expected property with setter, got {other:?}"),
        }

        let ctor = comp.member(ty.members[4]);
        match &ctor.kind {
            MemberKind::Constructor {
                params,
                initializer: Some(init),
                ..
            } => {
                assert_eq!(params.len(), 1);
                assert_eq!(init.args.len(), 1);
                assert_eq!(comp.expr(init.args[0].value).text, "meh");
            }
            other => panic!("expected chained constructor, got {other:?}"),
        }

        let bar = comp.member(ty.members[5]);
        let y = comp.param(bar.params()[1]);
        assert_eq!(y.name, "y");
        assert!(y.is_optional());
        assert_eq!(comp.expr(y.default.expect("default")).text, "2");
    }

    #[test]
    fn test_lowers_null_conditional_access() {
        let comp = compile(
            r#"
public class Foo
{
    public void M(object meh)
    {
        var h = meh?.ToString();
    }
}"#,
        );
        let access = comp
            .exprs
            .iter()
            .find(|e| matches!(e.kind, ExprKind::MemberAccess { conditional: true, .. }))
            .expect("conditional member access");
        assert!(access.text.starts_with("meh?."));
    }

    #[test]
    fn test_lowers_statements_and_locals() {
        let comp = compile(
            r#"
public class Foo
{
    public int M(bool flag)
    {
        int value;
        if (flag)
        {
            value = 1;
        }
        else
        {
            value = 2;
        }
        foreach (var item in new[] { 1, 2 })
        {
            value += item;
        }
        return value;
    }
}"#,
        );
        let names: Vec<&str> = comp.locals.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["value", "item"]);
        assert!(comp.stmts.iter().any(|s| matches!(s.kind, StmtKind::If { otherwise: Some(_), .. })));
        assert!(comp.stmts.iter().any(|s| matches!(s.kind, StmtKind::Return(Some(_)))));
    }

    #[test]
    fn test_merges_partial_declarations() {
        let comp = compile_sources(&[
            "public partial class Foo { private int a; }",
            "public partial class Foo : Bar { private int b; }",
        ])
        .expect("parse");
        assert_eq!(comp.types.len(), 1);
        assert_eq!(comp.types[0].members.len(), 2);
        assert_eq!(comp.types[0].base_types, vec!["Bar".to_string()]);
    }
}
