//! Core record types shared across the Lampion workspace.
//!
//! This crate is the foundation layer: it defines the normalized input
//! records the engine consumes (network requests, CPU tasks, trace
//! summaries, settings) and has no dependency on any other Lampion crate.
//! Records arrive already normalized by an external gathering layer; this
//! crate does not parse browser traces or protocol logs.
//!
//! All times are milliseconds as `f64`. Request and task times are
//! relative to the navigation's time origin; epoch-like timestamps are
//! produced by adding [`TraceSummary::time_origin`].

pub mod request;
pub mod settings;
pub mod task;
pub mod trace;

// Re-export the main types at the crate root.
pub use request::{NetworkRequest, RequestId, RequestPriority, ResourceType, TimingBreakdown};
pub use settings::{kbps_to_bytes_per_sec, SimulationSettings, ThrottlingMethod, ThrottlingPreset};
pub use task::{CpuTask, TaskGroup};
pub use trace::TraceSummary;
