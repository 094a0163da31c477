//! The evaluation context and its compute-once artifact caches.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{debug, trace};

use lampion_analysis::{analyze, NetworkAnalysis};
use lampion_graph::{build_graph, DependencyGraph};
use lampion_metrics::{CoefficientTable, LcpBreakdown, MetricEstimate, MetricKind, MetricValue};
use lampion_simulation::{SimulationResult, Simulator, SimulatorOptions};
use lampion_types::ThrottlingMethod;

use crate::error::EngineError;
use crate::input::{InputId, PageInput};

/// How a metric value was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricOutcome {
    /// Two-pass simulation under the configured throttling.
    Simulated(MetricEstimate),
    /// Read straight from the trace, which was recorded under real
    /// throttling conditions.
    Observed(MetricValue),
}

impl MetricOutcome {
    /// The reported {timing, timestamp} pair, whichever way it was made.
    pub fn value(&self) -> MetricValue {
        match self {
            MetricOutcome::Simulated(estimate) => estimate.value(),
            MetricOutcome::Observed(value) => *value,
        }
    }
}

/// Point-in-time counters over every artifact cache in one context.
///
/// A miss is recorded exactly once per computed artifact, so a stable
/// miss count across repeated requests proves nothing was recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Evaluation context: derives page-load artifacts and remembers them.
///
/// Artifacts are memoized by [`InputId`], plus the metric kind where one
/// input yields several metrics. Failed computations are remembered the
/// same way, so every caller asking for a broken artifact receives the
/// same error. Concurrent requests for a key that is mid-computation wait
/// on the map's entry lock and receive the first caller's result; each
/// artifact is computed once per context no matter how many threads ask.
pub struct Engine {
    coefficients: CoefficientTable,
    analyses: DashMap<InputId, Result<Arc<NetworkAnalysis>, EngineError>>,
    graphs: DashMap<InputId, Result<Arc<DependencyGraph>, EngineError>>,
    simulators: DashMap<InputId, Result<Arc<Simulator>, EngineError>>,
    metrics: DashMap<(InputId, MetricKind), Result<MetricOutcome, EngineError>>,
    timelines: DashMap<InputId, Result<Arc<SimulationResult>, EngineError>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("analyses", &self.analyses.len())
            .field("graphs", &self.graphs.len())
            .field("simulators", &self.simulators.len())
            .field("metrics", &self.metrics.len())
            .field("timelines", &self.timelines.len())
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// A context blending passes with the built-in default coefficients.
    pub fn new() -> Self {
        Self::with_coefficients(CoefficientTable::default())
    }

    /// A context with fitted calibration coefficients.
    pub fn with_coefficients(coefficients: CoefficientTable) -> Self {
        Self {
            coefficients,
            analyses: DashMap::new(),
            graphs: DashMap::new(),
            simulators: DashMap::new(),
            metrics: DashMap::new(),
            timelines: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn coefficients(&self) -> &CoefficientTable {
        &self.coefficients
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// RTT, throughput, and per-origin latency estimates derived from the
    /// input's observed records.
    pub fn network_analysis(
        &self,
        input: &PageInput,
    ) -> Result<Arc<NetworkAnalysis>, EngineError> {
        let key = input.id();

        // Fast path: read the cache without taking the entry lock.
        if let Some(analysis) = self.analyses.get(&key) {
            self.record_hit("network-analysis");
            return analysis.clone();
        }

        self.analyses
            .entry(key)
            .or_insert_with(|| {
                self.record_miss("network-analysis");
                analyze(input.records())
                    .map(Arc::new)
                    .map_err(EngineError::from)
            })
            .clone()
    }

    /// The dependency graph assembled from the input's records and tasks.
    pub fn dependency_graph(
        &self,
        input: &PageInput,
    ) -> Result<Arc<DependencyGraph>, EngineError> {
        let key = input.id();

        if let Some(graph) = self.graphs.get(&key) {
            self.record_hit("dependency-graph");
            return graph.clone();
        }

        self.graphs
            .entry(key)
            .or_insert_with(|| {
                self.record_miss("dependency-graph");
                build_graph(input.records(), input.tasks())
                    .map(Arc::new)
                    .map_err(EngineError::from)
            })
            .clone()
    }

    /// A simulator throttled per the input's settings, carrying the
    /// per-origin latency adjustments from the network analysis.
    pub fn simulator(&self, input: &PageInput) -> Result<Arc<Simulator>, EngineError> {
        let key = input.id();

        if let Some(simulator) = self.simulators.get(&key) {
            self.record_hit("simulator");
            return simulator.clone();
        }

        self.simulators
            .entry(key)
            .or_insert_with(|| {
                self.record_miss("simulator");
                self.build_simulator(input)
            })
            .clone()
    }

    /// One metric's outcome under the input's throttling method.
    ///
    /// Failures are isolated per metric: a page without an LCP event
    /// fails the LCP metrics while first contentful paint still computes.
    pub fn metric(
        &self,
        input: &PageInput,
        kind: MetricKind,
    ) -> Result<MetricOutcome, EngineError> {
        let key = (input.id(), kind);

        if let Some(outcome) = self.metrics.get(&key) {
            self.record_hit("metric");
            return outcome.clone();
        }

        self.metrics
            .entry(key)
            .or_insert_with(|| {
                self.record_miss("metric");
                self.compute_metric(input, kind)
            })
            .clone()
    }

    /// Every metric at once.
    ///
    /// Metrics are pure functions of the shared cached artifacts, so they
    /// fan out across the rayon pool; the per-metric result map keeps one
    /// metric's failure from hiding its siblings.
    pub fn estimate_all(
        &self,
        input: &PageInput,
    ) -> BTreeMap<MetricKind, Result<MetricOutcome, EngineError>> {
        debug!(input = %input.id(), "Estimating all metrics");
        MetricKind::ALL
            .into_par_iter()
            .map(|kind| (kind, self.metric(input, kind)))
            .collect()
    }

    /// Simulated schedule of the full unfiltered graph, for per-node
    /// diagnostic tables.
    pub fn timeline(&self, input: &PageInput) -> Result<Arc<SimulationResult>, EngineError> {
        let key = input.id();

        if let Some(timeline) = self.timelines.get(&key) {
            self.record_hit("timeline");
            return timeline.clone();
        }

        self.timelines
            .entry(key)
            .or_insert_with(|| {
                self.record_miss("timeline");
                self.compute_timeline(input)
            })
            .clone()
    }

    /// TTFB / load-start / load-end phases of the largest contentful
    /// paint, derived from the LCP outcome without extra simulation.
    pub fn lcp_breakdown(&self, input: &PageInput) -> Result<LcpBreakdown, EngineError> {
        let graph = self.dependency_graph(input)?;
        match self.metric(input, MetricKind::LargestContentfulPaint)? {
            MetricOutcome::Simulated(estimate) => {
                Ok(LcpBreakdown::from_estimate(&graph, input.trace(), &estimate)?)
            }
            MetricOutcome::Observed(_) => {
                Ok(LcpBreakdown::from_observed(&graph, input.trace())?)
            }
        }
    }

    fn build_simulator(&self, input: &PageInput) -> Result<Arc<Simulator>, EngineError> {
        let analysis = self.network_analysis(input)?;
        let settings = input.settings();
        let options = SimulatorOptions {
            rtt_ms: settings.effective_rtt_ms(),
            throughput_bytes_per_sec: settings.effective_throughput_bytes_per_sec(),
            cpu_slowdown_multiplier: settings.cpu_slowdown_multiplier,
            additional_rtt_by_origin: analysis.additional_rtt_by_origin.clone(),
            server_response_time_by_origin: analysis.server_response_time_by_origin.clone(),
            ..SimulatorOptions::default()
        };
        Ok(Arc::new(Simulator::new(options)?))
    }

    fn compute_metric(
        &self,
        input: &PageInput,
        kind: MetricKind,
    ) -> Result<MetricOutcome, EngineError> {
        let graph = self.dependency_graph(input)?;
        match input.settings().throttling_method {
            ThrottlingMethod::Simulate => {
                let simulator = self.simulator(input)?;
                let estimate = kind.estimate(
                    &graph,
                    input.trace(),
                    &simulator,
                    self.coefficients.for_kind(kind),
                )?;
                Ok(MetricOutcome::Simulated(estimate))
            }
            ThrottlingMethod::Provided => {
                let value = kind.observed(&graph, input.trace())?;
                debug!(metric = %kind, timing_ms = value.timing_ms, "Read observed metric");
                Ok(MetricOutcome::Observed(value))
            }
        }
    }

    fn compute_timeline(&self, input: &PageInput) -> Result<Arc<SimulationResult>, EngineError> {
        let graph = self.dependency_graph(input)?;
        let simulator = self.simulator(input)?;
        Ok(Arc::new(simulator.simulate(&graph)?))
    }

    fn record_hit(&self, artifact: &'static str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        trace!(artifact, "Cache hit");
    }

    fn record_miss(&self, artifact: &'static str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(artifact, "Cache miss");
    }
}
