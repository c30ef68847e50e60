//! Strata Dispatch
//!
//! Runs the pending part of a workflow in isolated clones, one per requested
//! branch, and merges the pushed results back with a single multi-parent merge
//! per touched sub-repository. See [`Dispatcher`] for the entry point.

mod branch;
mod dispatcher;
mod error;
mod events;
mod reconcile;
mod report;

pub use branch::{BranchOutcome, BranchState};
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use events::{ChannelNotifier, DispatchEvent, DispatchNotifier, NoopNotifier};
pub use reconcile::{MergeRecord, ReconcileSummary, merge_plan};
pub use report::DispatchReport;
