//! Largest contentful paint.

use lampion_graph::{DependencyGraph, Node};
use lampion_simulation::SimulationResult;
use lampion_types::{NetworkRequest, ResourceType, TraceSummary};

use crate::error::MetricError;
use crate::first_contentful_paint::first_paint_based_graph;
use crate::metric::Metric;

pub struct LargestContentfulPaint;

/// Low-priority images are usually offscreen and almost never the LCP
/// resource, so the estimator leaves them out of both passes.
pub(crate) fn is_not_low_priority_image(request: &NetworkRequest) -> bool {
    !(request.resource_type == ResourceType::Image && request.priority.is_low())
}

impl Metric for LargestContentfulPaint {
    const NAME: &'static str = "largest-contentful-paint";

    fn optimistic_graph(
        graph: &DependencyGraph,
        trace: &TraceSummary,
    ) -> Result<DependencyGraph, MetricError> {
        let cutoff_ms = trace.largest_contentful_paint.ok_or(MetricError::NoLcp)?;
        first_paint_based_graph(graph, cutoff_ms, is_not_low_priority_image, |_| false)
    }

    /// Worst case keeps every fetch plus all layout work, since any
    /// layout pass can move the largest element.
    fn pessimistic_graph(
        graph: &DependencyGraph,
        trace: &TraceSummary,
    ) -> Result<DependencyGraph, MetricError> {
        let cutoff_ms = trace.largest_contentful_paint.ok_or(MetricError::NoLcp)?;
        first_paint_based_graph(graph, cutoff_ms, |_| true, |task| task.performs_layout())
    }

    /// The pass estimate is the last finish among candidate LCP
    /// resources rather than the pass total, so trailing offscreen image
    /// downloads cannot drag the estimate out.
    fn estimate_from_pass(pass_graph: &DependencyGraph, result: &SimulationResult) -> f64 {
        result
            .node_timings
            .iter()
            .filter(|(id, _)| {
                pass_graph
                    .index_of(id)
                    .map(|index| pass_graph.node(index))
                    .and_then(Node::as_network)
                    .is_some_and(|request| is_not_low_priority_image(request))
            })
            .map(|(_, timing)| timing.end_ms)
            .fold(0.0, f64::max)
    }
}
