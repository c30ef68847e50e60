//! Strata Workflow
//!
//! This crate provides the workflow graph model shared by the abstract
//! (planned) side and the provenance (executed) side of Strata.
//!
//! - [`WorkflowNode`] is a single tagged node type; [`NodeKind`] carries the
//!   file- or task-specific fields.
//! - [`WorkflowGraph`] owns nodes and edges and answers structural queries.
//! - [`match_graphs`] compares two graphs by fingerprint and yields the
//!   annotated graph plus the pending-only difference graph.
//! - [`WorkflowGraph::frontier`] gives the nodes that can run next.
//!
//! Every transformation returns a new graph value; graphs never share
//! mutable state.

mod diff;
mod error;
mod fingerprint;
mod graph;
mod node;
mod workflow;

pub use diff::{MatchOutcome, match_graphs};
pub use error::WorkflowError;
pub use fingerprint::{file_fingerprint, task_fingerprint};
pub use graph::Graph;
pub use node::{DEFAULT_GROUP, NodeKind, NodeStatus, WorkflowNode};
pub use workflow::{GraphSummary, WorkflowGraph};
