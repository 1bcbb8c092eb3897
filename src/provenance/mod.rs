//! Value provenance: where does the value observed at an expression come from?

pub mod cancel;
pub mod classifier;
pub mod reachability;
pub mod resolver;
pub mod trail;

pub use cancel::CancellationToken;
pub use reachability::ReachabilityAnalyzer;
pub use resolver::Resolver;
pub use trail::{ProvenanceTrail, ValueSource};
