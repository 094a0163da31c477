//! The metric contract and its dispatch surface.
//!
//! A metric is a pair of graph filters plus a reduction. The optimistic
//! filter keeps only the work that must block the target paint under the
//! most favorable reading of the page; the pessimistic filter keeps
//! everything that could plausibly block it. Both filtered graphs are
//! replayed through the simulator and a calibration blend of the two pass
//! estimates becomes the reported timing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use lampion_graph::{DependencyGraph, NodeId};
use lampion_simulation::{NodeTiming, SimulationResult, Simulator};
use lampion_types::TraceSummary;

use crate::coefficients::MetricCoefficients;
use crate::error::MetricError;
use crate::lcp_load_delay::lcp_request_node;

/// Final output for one metric: a duration and its absolute position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// Milliseconds from the navigation time origin.
    pub timing_ms: f64,
    /// Epoch-like timestamp, `time_origin + timing`.
    pub timestamp_ms: f64,
}

impl MetricValue {
    pub fn new(trace: &TraceSummary, timing_ms: f64) -> Self {
        Self {
            timing_ms,
            timestamp_ms: trace.timestamp_for(timing_ms),
        }
    }
}

/// One simulated pass over a filtered graph.
#[derive(Debug, Clone, PartialEq)]
pub struct PassEstimate {
    /// The pass's reduced estimate in milliseconds.
    pub time_ms: f64,
    /// Simulated schedule of every node that survived the filter.
    pub node_timings: BTreeMap<NodeId, NodeTiming>,
}

/// A simulated metric estimate with both contributing passes.
///
/// The passes are kept because downstream consumers read individual node
/// timings back out of them, like the LCP breakdown locating the image
/// request inside the optimistic schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEstimate {
    pub timing_ms: f64,
    pub timestamp_ms: f64,
    pub optimistic: PassEstimate,
    pub pessimistic: PassEstimate,
}

impl MetricEstimate {
    pub fn value(&self) -> MetricValue {
        MetricValue {
            timing_ms: self.timing_ms,
            timestamp_ms: self.timestamp_ms,
        }
    }
}

/// A paint metric estimator.
///
/// Implementations are stateless; the two graph methods derive filtered
/// clones and [`estimate`](Metric::estimate) drives the simulations and
/// blends the results. `estimate_from_pass` reduces one simulated pass to
/// milliseconds and defaults to the pass's total completion time.
pub trait Metric {
    /// Report name, also used as the structured logging field.
    const NAME: &'static str;

    /// Filtered graph assuming best-case contention.
    fn optimistic_graph(
        graph: &DependencyGraph,
        trace: &TraceSummary,
    ) -> Result<DependencyGraph, MetricError>;

    /// Filtered graph assuming worst-case contention.
    fn pessimistic_graph(
        graph: &DependencyGraph,
        trace: &TraceSummary,
    ) -> Result<DependencyGraph, MetricError>;

    /// Reduces one simulated pass to a millisecond estimate.
    fn estimate_from_pass(pass_graph: &DependencyGraph, result: &SimulationResult) -> f64 {
        let _ = pass_graph;
        result.total_ms
    }

    /// Runs both passes and blends them with the metric's coefficients.
    fn estimate(
        graph: &DependencyGraph,
        trace: &TraceSummary,
        simulator: &Simulator,
        coefficients: MetricCoefficients,
    ) -> Result<MetricEstimate, MetricError> {
        let optimistic_graph = Self::optimistic_graph(graph, trace)?;
        let pessimistic_graph = Self::pessimistic_graph(graph, trace)?;

        let optimistic_run = simulator.simulate(&optimistic_graph)?;
        let pessimistic_run = simulator.simulate(&pessimistic_graph)?;

        let optimistic = PassEstimate {
            time_ms: Self::estimate_from_pass(&optimistic_graph, &optimistic_run),
            node_timings: optimistic_run.node_timings,
        };
        let pessimistic = PassEstimate {
            time_ms: Self::estimate_from_pass(&pessimistic_graph, &pessimistic_run),
            node_timings: pessimistic_run.node_timings,
        };

        let timing_ms = coefficients.blend(optimistic.time_ms, pessimistic.time_ms);
        debug!(
            metric = Self::NAME,
            timing_ms,
            optimistic_ms = optimistic.time_ms,
            pessimistic_ms = pessimistic.time_ms,
            "Estimated metric"
        );

        Ok(MetricEstimate {
            timing_ms,
            timestamp_ms: trace.timestamp_for(timing_ms),
            optimistic,
            pessimistic,
        })
    }
}

/// Every metric this crate can estimate, for callers that iterate or
/// dispatch dynamically instead of naming an estimator type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    FirstContentfulPaint,
    LargestContentfulPaint,
    LcpLoadDelay,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [
        MetricKind::FirstContentfulPaint,
        MetricKind::LargestContentfulPaint,
        MetricKind::LcpLoadDelay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::FirstContentfulPaint => "first-contentful-paint",
            MetricKind::LargestContentfulPaint => "largest-contentful-paint",
            MetricKind::LcpLoadDelay => "lcp-load-delay",
        }
    }

    /// Simulated estimate for this metric.
    pub fn estimate(
        self,
        graph: &DependencyGraph,
        trace: &TraceSummary,
        simulator: &Simulator,
        coefficients: MetricCoefficients,
    ) -> Result<MetricEstimate, MetricError> {
        match self {
            MetricKind::FirstContentfulPaint => {
                crate::first_contentful_paint::FirstContentfulPaint::estimate(
                    graph,
                    trace,
                    simulator,
                    coefficients,
                )
            }
            MetricKind::LargestContentfulPaint => {
                crate::largest_contentful_paint::LargestContentfulPaint::estimate(
                    graph,
                    trace,
                    simulator,
                    coefficients,
                )
            }
            MetricKind::LcpLoadDelay => crate::lcp_load_delay::LcpLoadDelay::estimate(
                graph,
                trace,
                simulator,
                coefficients,
            ),
        }
    }

    /// Observed value for this metric, read from the trace instead of
    /// simulated. Used when throttling was applied while recording.
    pub fn observed(
        self,
        graph: &DependencyGraph,
        trace: &TraceSummary,
    ) -> Result<MetricValue, MetricError> {
        match self {
            MetricKind::FirstContentfulPaint => {
                Ok(MetricValue::new(trace, trace.first_contentful_paint))
            }
            MetricKind::LargestContentfulPaint => {
                let lcp = trace.largest_contentful_paint.ok_or(MetricError::NoLcp)?;
                Ok(MetricValue::new(trace, lcp))
            }
            MetricKind::LcpLoadDelay => {
                let index = lcp_request_node(graph, trace)?;
                Ok(MetricValue::new(trace, graph.node(index).start_time()))
            }
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
