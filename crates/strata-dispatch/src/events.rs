//! Dispatch events and notifiers for observability.
//!
//! Events are emitted while branches are worked on and reconciled so callers
//! can stream progress, persist it or ignore it.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::branch::BranchState;

/// Events emitted during a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchEvent {
  /// A dispatch has started.
  DispatchStarted { dispatch_id: String, branches: usize },

  /// A worker picked up a branch.
  BranchStarted { dispatch_id: String, branch: String },

  /// A branch moved to a new state.
  BranchStateChanged {
    dispatch_id: String,
    branch: String,
    state: BranchState,
  },

  /// A branch finished without error.
  BranchSucceeded {
    dispatch_id: String,
    branch: String,
    job_ref: Option<String>,
  },

  /// A branch failed; other branches are unaffected.
  BranchFailed {
    dispatch_id: String,
    branch: String,
    error: String,
  },

  /// Every branch has terminated and merging begins.
  ReconcileStarted { dispatch_id: String, job_refs: usize },

  ReconcileCompleted { dispatch_id: String, merged: usize },

  ReconcileFailed { dispatch_id: String, error: String },

  /// The dispatch has finished, reconciliation included.
  DispatchCompleted { dispatch_id: String },
}

/// Trait for receiving dispatch events.
pub trait DispatchNotifier: Send + Sync {
  /// Called when a dispatch event occurs.
  fn notify(&self, event: DispatchEvent);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl DispatchNotifier for NoopNotifier {
  fn notify(&self, _event: DispatchEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Event volume is a handful per branch, so the channel is not bounded.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<DispatchEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<DispatchEvent>) -> Self {
    Self { sender }
  }
}

impl DispatchNotifier for ChannelNotifier {
  fn notify(&self, event: DispatchEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
