//! Error types for the parser, the analysis core and the tree editor.

use std::path::PathBuf;

use thiserror::Error;

use crate::syntax::{ExprId, MemberId};

/// Failure to turn a source file into syntax.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Only `.cs` files are parsed.
    #[error("unsupported file extension: {0:?}")]
    UnsupportedExtension(PathBuf),

    /// tree-sitter gave up on the input (timeout or cancellation flag).
    #[error("tree-sitter returned no tree for {0:?}")]
    NoTree(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Returned by every resolve/plan operation when its cancellation token fires.
///
/// Carries no partial result.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("analysis cancelled")]
pub struct Cancelled;

/// A rewrite plan that does not fit the compilation it is applied to.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("member {0:?} is not a constructor")]
    NotAConstructor(MemberId),

    #[error("expression {0:?} cannot take another argument")]
    NotACallSite(ExprId),

    #[error("member {0:?} has no initializer to remove")]
    NoInitializer(MemberId),
}

/// Failure while applying a plan and re-resolving the result.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}
