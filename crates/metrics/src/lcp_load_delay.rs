//! LCP load delay: how long the page waited before even requesting the
//! LCP image.
//!
//! Both passes cut the graph at the LCP request's observed start, since
//! anything that began later cannot have delayed the request. The passes
//! disagree about contention before that point: the optimistic reading
//! drops main-thread work and deferrable fetches entirely, the
//! pessimistic reading keeps them all.

use lampion_graph::{DependencyGraph, NodeIndex};
use lampion_types::TraceSummary;

use crate::error::MetricError;
use crate::metric::Metric;

pub struct LcpLoadDelay;

/// Node of the request that fetched the LCP image.
///
/// When two requests share the image URL the later one in traversal
/// order wins, matching how repeated fetches shadow each other in the
/// graph's id map.
pub(crate) fn lcp_request_node(
    graph: &DependencyGraph,
    trace: &TraceSummary,
) -> Result<NodeIndex, MetricError> {
    if trace.largest_contentful_paint.is_none() {
        return Err(MetricError::NoLcp);
    }
    let url = trace
        .lcp_image_url
        .as_deref()
        .ok_or(MetricError::LcpNotAnImage)?;

    let mut found = None;
    graph.traverse(|index, node| {
        if node.as_network().is_some_and(|request| request.url == url) {
            found = Some(index);
        }
    });
    found.ok_or_else(|| MetricError::LcpRequestNotFound {
        url: url.to_string(),
    })
}

impl Metric for LcpLoadDelay {
    const NAME: &'static str = "lcp-load-delay";

    /// Best case: no main-thread work and no deferrable fetch stands
    /// between navigation and the LCP request.
    fn optimistic_graph(
        graph: &DependencyGraph,
        trace: &TraceSummary,
    ) -> Result<DependencyGraph, MetricError> {
        let lcp_start_ms = graph.node(lcp_request_node(graph, trace)?).start_time();
        let filtered = graph.clone_with_relationships(|node| {
            if node.start_time() > lcp_start_ms {
                return false;
            }
            if node.is_cpu() {
                return false;
            }
            node.as_network()
                .is_some_and(|request| !request.priority.is_low())
        })?;
        Ok(filtered)
    }

    /// Worst case: everything observed before the LCP request blocks it.
    fn pessimistic_graph(
        graph: &DependencyGraph,
        trace: &TraceSummary,
    ) -> Result<DependencyGraph, MetricError> {
        let lcp_start_ms = graph.node(lcp_request_node(graph, trace)?).start_time();
        Ok(graph.clone_with_relationships(|node| node.start_time() <= lcp_start_ms)?)
    }
}
