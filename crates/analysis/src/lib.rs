//! Derives network characteristics from an observed devtools log.
//!
//! The simulator needs three things the log never states outright: the
//! round-trip time to each origin, how fast the link actually was, and how
//! long each server sat on requests before answering. This crate estimates
//! all three from per-record timing breakdowns, falling back to coarser
//! heuristics when the connection sub-phases carry `-1` sentinels.
//!
//! Every aggregate carries a synthetic [`SUMMARY_ORIGIN`] entry spanning
//! all observed origins, used as the fallback for origins the simulation
//! encounters but the log never measured directly.

pub mod analyzer;
pub mod error;

pub use analyzer::{
    analyze, estimate_connection_reuse, estimate_rtt_by_origin,
    estimate_server_response_time_by_origin, estimate_throughput, NetworkAnalysis,
    RttEstimateOptions, Summary, SUMMARY_ORIGIN,
};
pub use error::AnalysisError;
