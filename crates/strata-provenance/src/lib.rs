//! Provenance reconstruction.
//!
//! Walks the commits reachable from a revision, keeps those carrying a
//! run-record, resolves their recorded names against the repository tree and
//! builds a [`WorkflowGraph`](strata_workflow::WorkflowGraph) of what actually
//! ran. Fingerprints are computed exactly as for abstract graphs so the two
//! can be matched.

mod error;
mod record;
mod resolve;
mod scanner;

pub use error::ProvenanceError;
pub use record::{RUN_MARKER, RunRecord};
pub use resolve::PathIndex;
pub use scanner::{ProvenanceScanner, ResolvedRun, build_provenance_graph, owning_subrepos};
