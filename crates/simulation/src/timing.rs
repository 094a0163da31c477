//! Per-node timing bookkeeping.

use crate::connection::ConnectionTiming;
use crate::pool::ConnectionHandle;

/// Simulated schedule for one node, milliseconds from navigation start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTiming {
    pub start_ms: f64,
    pub end_ms: f64,
    /// Handshake breakdown, present for network nodes that downloaded over
    /// a modeled connection.
    pub connection: Option<ConnectionTiming>,
}

impl NodeTiming {
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

/// Lifecycle of a node within one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Waiting on at least one dependency.
    Pending,
    /// All dependencies complete, queued for admission.
    Ready,
    InProgress,
    Complete,
}

/// Mutable progress record for one node, indexed by node position.
#[derive(Debug, Clone)]
pub(crate) struct ProgressEntry {
    pub phase: Phase,
    pub queued_at_ms: f64,
    pub started_at_ms: f64,
    pub end_ms: f64,
    /// Simulated time this node has been actively progressing.
    pub time_elapsed_ms: f64,
    /// Amount the last slice overshot this node's own completion.
    pub time_elapsed_overshoot_ms: f64,
    pub bytes_downloaded: f64,
    /// Estimate produced in the current iteration; the scheduler advances
    /// the clock by the minimum of these.
    pub estimated_time_elapsed_ms: f64,
    /// Connection on loan from the pool while a network node is in flight.
    pub connection: Option<ConnectionHandle>,
    pub connection_timing: Option<ConnectionTiming>,
}

impl ProgressEntry {
    pub fn column(len: usize) -> Vec<ProgressEntry> {
        vec![
            ProgressEntry {
                phase: Phase::Pending,
                queued_at_ms: 0.0,
                started_at_ms: 0.0,
                end_ms: 0.0,
                time_elapsed_ms: 0.0,
                time_elapsed_overshoot_ms: 0.0,
                bytes_downloaded: 0.0,
                estimated_time_elapsed_ms: 0.0,
                connection: None,
                connection_timing: None,
            };
            len
        ]
    }
}
