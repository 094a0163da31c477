//! Phase breakdown of the largest contentful paint.
//!
//! Splits the span from navigation to LCP at the moments the image
//! request started and finished, which is what separates "the page took
//! long to ask for the image" from "the image was slow to download".

use serde::{Deserialize, Serialize};

use lampion_graph::DependencyGraph;
use lampion_types::TraceSummary;

use crate::error::MetricError;
use crate::lcp_load_delay::lcp_request_node;
use crate::metric::MetricEstimate;

/// Phase boundaries of the LCP image's journey, ms from navigation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LcpBreakdown {
    /// When the main document's response headers arrived.
    pub ttfb_ms: f64,
    /// When the LCP image request went out. Absent when the LCP element
    /// was not a loaded image.
    pub load_start_ms: Option<f64>,
    /// When the LCP image finished downloading.
    pub load_end_ms: Option<f64>,
}

impl LcpBreakdown {
    /// Breakdown over a simulated LCP estimate.
    ///
    /// Load phases come from the image request's schedule in the
    /// optimistic pass, clamped so `ttfb ≤ loadStart ≤ loadEnd ≤ lcp`
    /// holds even when the blended metric lands inside the image's
    /// simulated window.
    pub fn from_estimate(
        graph: &DependencyGraph,
        trace: &TraceSummary,
        lcp: &MetricEstimate,
    ) -> Result<Self, MetricError> {
        let ttfb_ms = observed_ttfb(graph);
        let index = match lcp_request_node(graph, trace) {
            Ok(index) => index,
            Err(MetricError::LcpNotAnImage | MetricError::LcpRequestNotFound { .. }) => {
                return Ok(Self {
                    ttfb_ms,
                    load_start_ms: None,
                    load_end_ms: None,
                });
            }
            Err(err) => return Err(err),
        };

        let node = graph.node(index);
        let timing = lcp.optimistic.node_timings.get(node.id()).ok_or_else(|| {
            MetricError::LcpTimingMissing {
                url: node
                    .as_network()
                    .map(|request| request.url.clone())
                    .unwrap_or_default(),
            }
        })?;

        let load_end_ms = timing.end_ms.min(lcp.timing_ms);
        let load_start_ms = timing.start_ms.min(load_end_ms).max(ttfb_ms);
        Ok(Self {
            ttfb_ms,
            load_start_ms: Some(load_start_ms),
            load_end_ms: Some(load_end_ms),
        })
    }

    /// Breakdown from observed record times, for runs that were
    /// throttled while recording instead of simulated afterwards.
    pub fn from_observed(
        graph: &DependencyGraph,
        trace: &TraceSummary,
    ) -> Result<Self, MetricError> {
        let ttfb_ms = observed_ttfb(graph);
        let index = match lcp_request_node(graph, trace) {
            Ok(index) => index,
            Err(MetricError::LcpNotAnImage | MetricError::LcpRequestNotFound { .. }) => {
                return Ok(Self {
                    ttfb_ms,
                    load_start_ms: None,
                    load_end_ms: None,
                });
            }
            Err(err) => return Err(err),
        };

        let node = graph.node(index);
        Ok(Self {
            ttfb_ms,
            load_start_ms: Some(node.start_time()),
            load_end_ms: Some(node.end_time()),
        })
    }
}

/// First response byte of the main document, from its observed timing.
/// Falls back to the fetch end when the headers offset went unrecorded.
fn observed_ttfb(graph: &DependencyGraph) -> f64 {
    let main = graph
        .nodes()
        .find(|(_, node)| node.is_main_document())
        .map_or_else(|| graph.root_node(), |(_, node)| node);
    let Some(request) = main.as_network() else {
        return 0.0;
    };
    let headers_offset_ms = request
        .timing
        .and_then(|timing| timing.receive_headers_end_observed())
        .unwrap_or_else(|| request.observed_duration());
    request.network_request_time + headers_offset_ms
}
