use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ProvenanceConfig;

/// Source file extension the frontend parses.
const SOURCE_EXTENSION: &str = "cs";

/// Build output directories that never hold hand-written sources.
const BUILD_DIRS: &[&str] = &["bin", "obj"];

/// Walk a project directory and collect C# source files, sorted by path.
///
/// Respects `.gitignore` rules, always excludes `bin/` and `obj/`, and applies
/// any additional exclusions from `config.exclude`.
pub fn walk_project(root: &Path, config: &ProvenanceConfig) -> anyhow::Result<Vec<PathBuf>> {
    if !root.exists() {
        anyhow::bail!("path does not exist: {}", root.display());
    }

    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git repository.
        .require_git(false)
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }
        if is_in_build_dir(path.strip_prefix(root).unwrap_or(path)) {
            continue;
        }
        if is_excluded_by_config(path, config) {
            continue;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext != SOURCE_EXTENSION {
            continue;
        }

        debug!("{}", path.display());
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Returns true if any component of `path` is a build output directory.
fn is_in_build_dir(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| BUILD_DIRS.contains(&s))
            .unwrap_or(false)
    })
}

/// Returns true if `path` matches any exclusion pattern from config.
fn is_excluded_by_config(path: &Path, config: &ProvenanceConfig) -> bool {
    let Some(patterns) = &config.exclude else {
        return false;
    };

    let path_str = path.to_string_lossy();
    patterns.iter().any(|pattern| {
        let Ok(matcher) = glob::Pattern::new(pattern) else {
            return false;
        };
        // Match the whole path, or any single component.
        matcher.matches(&path_str)
            || path
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .any(|s| matcher.matches(s))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_walk_project_returns_only_source_files() {
        let dir = tmp();
        fs::write(dir.path().join("Foo.cs"), "class Foo {}").unwrap();
        fs::write(dir.path().join("README.md"), "# Hello").unwrap();
        fs::write(dir.path().join("Foo.csproj"), "<Project />").unwrap();

        let files = walk_project(dir.path(), &ProvenanceConfig::default()).unwrap();
        assert_eq!(names(&files), vec!["Foo.cs"]);
    }

    #[test]
    fn test_walk_project_excludes_build_output() {
        let dir = tmp();
        let obj = dir.path().join("obj").join("Debug");
        fs::create_dir_all(&obj).unwrap();
        fs::write(obj.join("AssemblyInfo.cs"), "").unwrap();
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::write(dir.path().join("bin").join("Gen.cs"), "").unwrap();
        fs::write(dir.path().join("Foo.cs"), "class Foo {}").unwrap();

        let files = walk_project(dir.path(), &ProvenanceConfig::default()).unwrap();
        assert_eq!(names(&files), vec!["Foo.cs"]);
    }

    #[test]
    fn test_walk_project_respects_exclude_patterns() {
        let dir = tmp();
        fs::write(dir.path().join("Foo.cs"), "class Foo {}").unwrap();
        fs::write(dir.path().join("Foo.g.cs"), "class FooGenerated {}").unwrap();

        let config = ProvenanceConfig {
            exclude: Some(vec!["*.g.cs".to_string()]),
            ..ProvenanceConfig::default()
        };
        let files = walk_project(dir.path(), &config).unwrap();
        assert_eq!(names(&files), vec!["Foo.cs"]);
    }

    #[test]
    fn test_walk_project_respects_gitignore() {
        let dir = tmp();
        fs::write(dir.path().join(".gitignore"), "Ignored.cs\n").unwrap();
        fs::write(dir.path().join("Ignored.cs"), "class Ignored {}").unwrap();
        fs::write(dir.path().join("Kept.cs"), "class Kept {}").unwrap();

        let files = walk_project(dir.path(), &ProvenanceConfig::default()).unwrap();
        assert_eq!(names(&files), vec!["Kept.cs"]);
    }

    #[test]
    fn test_walk_project_missing_root_is_an_error() {
        let dir = tmp();
        assert!(walk_project(&dir.path().join("missing"), &ProvenanceConfig::default()).is_err());
    }
}
