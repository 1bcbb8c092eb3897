use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::inject::FieldPrefix;

/// Value provenance analysis for C# codebases.
///
/// provenance answers "where does the value observed at this expression come
/// from?" and, for values created on the spot, plans the constructor injection
/// that would hand them in from outside instead.
#[derive(Parser, Debug)]
#[command(
    name = "provenance",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    /// Log progress to stderr (-v for info, -vv for debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Give up on resolution and planning after this many seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for query results.
#[derive(Clone, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    /// Compact one-line-per-result format (default).
    #[default]
    Compact,
    /// Human-readable columnar table with optional ANSI color when stdout is a terminal.
    Table,
    /// Structured JSON array suitable for programmatic consumption.
    Json,
}

/// Which expressions a query targets.
#[derive(Args, Debug)]
pub struct ExprArgs {
    /// Expression text, matched exactly (e.g. "new Bar()" or "this.bar").
    #[arg(long)]
    pub expr: String,

    /// Treat `--expr` as a regex that must match the whole expression text.
    #[arg(long)]
    pub regex: bool,

    /// Only match in files whose path ends with this (e.g. "Foo.cs" or "Services/Foo.cs").
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Only match expressions starting on this 1-based line.
    #[arg(long)]
    pub line: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a project directory and build the semantic model, then print statistics.
    Index {
        /// Path to the project root to index.
        path: PathBuf,

        /// Output results as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// Show where the value observed at an expression comes from.
    ///
    /// Prints one trail per matching expression, e.g. "meh Argument, 1 Constant".
    Trail {
        /// Path to the project root to analyze.
        path: PathBuf,

        #[command(flatten)]
        query: ExprArgs,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Plan the constructor injection of a value created at an expression.
    ///
    /// Prints the edits the rewrite would make, or why it is unsupported.
    Inject {
        /// Path to the project root to analyze.
        path: PathBuf,

        #[command(flatten)]
        query: ExprArgs,

        /// Apply the plan in memory, rebuild the model and re-resolve the rewritten expressions.
        #[arg(long)]
        verify: bool,

        /// Backing-field naming convention (overrides provenance.toml).
        #[arg(long, value_enum)]
        field_prefix: Option<FieldPrefix>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// List object creations that could be injected instead.
    Scan {
        /// Path to the project root to analyze.
        path: PathBuf,

        /// Backing-field naming convention (overrides provenance.toml).
        #[arg(long, value_enum)]
        field_prefix: Option<FieldPrefix>,

        /// Skip creations inside ordinary methods (overrides provenance.toml).
        #[arg(long)]
        no_methods: bool,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },
}

impl From<ExprArgs> for crate::query::ExprQuery {
    fn from(args: ExprArgs) -> Self {
        Self {
            text: args.expr,
            regex: args.regex,
            file: args.file,
            line: args.line,
        }
    }
}
