//! First contentful paint, and the first-paint graph machinery shared
//! with the LCP estimator.
//!
//! The filter works backwards from a paint timestamp: work that finished
//! after the paint cannot have produced it, scripts whose evaluation
//! demonstrably ran after the paint get excluded even when their fetch
//! looked render-blocking, and the main-thread tasks that evaluated the
//! retained scripts are kept alongside them.

use std::collections::{HashMap, HashSet};

use lampion_graph::{DependencyGraph, NodeId, NodeIndex, NodeKind};
use lampion_types::{CpuTask, NetworkRequest, ResourceType, TaskGroup, TraceSummary};

use crate::error::MetricError;
use crate::metric::Metric;

pub struct FirstContentfulPaint;

impl Metric for FirstContentfulPaint {
    const NAME: &'static str = "first-contentful-paint";

    /// Keeps render-blocking-priority fetches only: resources the parser
    /// actually halts on.
    fn optimistic_graph(
        graph: &DependencyGraph,
        trace: &TraceSummary,
    ) -> Result<DependencyGraph, MetricError> {
        first_paint_based_graph(
            graph,
            trace.first_contentful_paint,
            NetworkRequest::is_render_blocking_priority,
            |_| false,
        )
    }

    /// Treats every fetch that made it in before the paint as blocking.
    fn pessimistic_graph(
        graph: &DependencyGraph,
        trace: &TraceSummary,
    ) -> Result<DependencyGraph, MetricError> {
        first_paint_based_graph(graph, trace.first_contentful_paint, |_| true, |_| false)
    }
}

/// Script URLs to drop and CPU nodes to keep for one paint cutoff.
struct RenderBlockingSets {
    /// Scripts that looked blocking by fetch shape but whose earliest
    /// evaluation ran after the paint, so they provably did not block it.
    excluded_script_urls: HashSet<String>,
    /// Main-thread tasks the paint needed.
    blocking_task_ids: HashSet<NodeId>,
}

/// Filtered clone containing the work required for a paint at
/// `cutoff_ms`.
///
/// `treat_as_blocking` decides which fetches count as render-blocking;
/// `extra_blocking_tasks` admits additional CPU candidates beyond script
/// evaluation and the first layout/paint/parse, which the pessimistic LCP
/// pass uses to pull in every layout task.
pub(crate) fn first_paint_based_graph<N, C>(
    graph: &DependencyGraph,
    cutoff_ms: f64,
    treat_as_blocking: N,
    extra_blocking_tasks: C,
) -> Result<DependencyGraph, MetricError>
where
    N: Fn(&NetworkRequest) -> bool,
    C: Fn(&CpuTask) -> bool,
{
    let sets = classify_render_blocking(graph, cutoff_ms, &treat_as_blocking, &extra_blocking_tasks);

    let clone = graph.clone_with_relationships(|node| match node.kind() {
        NodeKind::Network(request) => {
            // An unfinished request reports a negative end time, so the
            // start time guards against fetches that began after the
            // paint.
            let ended_after_paint =
                node.end_time() > cutoff_ms || node.start_time() > cutoff_ms;
            if ended_after_paint && !node.is_main_document() {
                return false;
            }
            if sets.excluded_script_urls.contains(&request.url) {
                return false;
            }
            treat_as_blocking(request)
        }
        NodeKind::Cpu(_) => sets.blocking_task_ids.contains(node.id()),
    })?;
    Ok(clone)
}

fn classify_render_blocking(
    graph: &DependencyGraph,
    cutoff_ms: f64,
    treat_as_blocking: &impl Fn(&NetworkRequest) -> bool,
    extra_blocking_tasks: &impl Fn(&CpuTask) -> bool,
) -> RenderBlockingSets {
    let order = graph.traverse_order();

    // CPU tasks that started by the cutoff are paint candidates. The
    // paint event can land inside the task window, which is why the
    // cutoff compares against start times.
    let mut candidates: Vec<NodeIndex> = Vec::new();
    // Script URL to the earliest task that evaluated it.
    let mut earliest_eval_by_url: HashMap<&str, (f64, NodeIndex)> = HashMap::new();
    for &index in &order {
        let Some(task) = graph.node(index).as_cpu() else {
            continue;
        };
        if task.start_time <= cutoff_ms {
            candidates.push(index);
        }
        for url in task.evaluated_script_urls() {
            let entry = earliest_eval_by_url
                .entry(url.as_str())
                .or_insert((task.start_time, index));
            if task.start_time < entry.0 {
                *entry = (task.start_time, index);
            }
        }
    }
    candidates.sort_by(|&a, &b| {
        graph
            .node(a)
            .start_time()
            .total_cmp(&graph.node(b).start_time())
    });

    // A script possibly blocked the paint if its fetch finished in time
    // and its shape passes the blocking filter.
    let mut possibly_blocking_script_urls: HashSet<&str> = HashSet::new();
    for &index in &order {
        let node = graph.node(index);
        let Some(request) = node.as_network() else {
            continue;
        };
        if request.resource_type != ResourceType::Script {
            continue;
        }
        if node.end_time() <= cutoff_ms && treat_as_blocking(request) {
            possibly_blocking_script_urls.insert(request.url.as_str());
        }
    }

    let mut excluded_script_urls = HashSet::new();
    let mut blocking_task_ids = HashSet::new();
    for &url in &possibly_blocking_script_urls {
        let Some(&(eval_start_ms, eval_index)) = earliest_eval_by_url.get(url) else {
            // Never saw it evaluate: nothing to conclude either way.
            continue;
        };
        if eval_start_ms <= cutoff_ms {
            blocking_task_ids.insert(graph.node(eval_index).id().clone());
        } else {
            excluded_script_urls.insert(url.to_string());
        }
    }

    // The first layout, paint, and parse are almost always needed.
    for group in [TaskGroup::Layout, TaskGroup::Paint, TaskGroup::ParseHtml] {
        let first = candidates.iter().find(|&&index| {
            graph
                .node(index)
                .as_cpu()
                .is_some_and(|task| task.group == group)
        });
        if let Some(&index) = first {
            blocking_task_ids.insert(graph.node(index).id().clone());
        }
    }

    for &index in &candidates {
        let node = graph.node(index);
        if node.as_cpu().is_some_and(|task| extra_blocking_tasks(task)) {
            blocking_task_ids.insert(node.id().clone());
        }
    }

    RenderBlockingSets {
        excluded_script_urls,
        blocking_task_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lampion_graph::Node;
    use lampion_test_helpers::{request, task};
    use lampion_types::{RequestPriority, ResourceType, TaskGroup};

    const CUTOFF_MS: f64 = 800.0;

    fn document_root() -> Node {
        let mut root = Node::network(
            request("1")
                .url("https://example.com/")
                .resource_type(ResourceType::Document)
                .priority(RequestPriority::VeryHigh)
                .window(0.0, 100.0)
                .build(),
        );
        root.set_main_document(true);
        root
    }

    fn script_node(id: &str, url: &str, start: f64, end: f64) -> Node {
        Node::network(
            request(id)
                .url(url)
                .resource_type(ResourceType::Script)
                .priority(RequestPriority::High)
                .window(start, end)
                .build(),
        )
    }

    fn cpu_node(id: &str, start: f64, end: f64, group: TaskGroup, urls: &[&str]) -> Node {
        Node::cpu(NodeId::new(id), task(start, end).group(group).urls(urls).build())
    }

    fn names(graph: &DependencyGraph) -> Vec<String> {
        let mut out: Vec<String> = graph
            .nodes()
            .map(|(_, node)| node.id().as_str().to_string())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn script_evaluated_after_the_paint_is_excluded() {
        let mut graph = DependencyGraph::new(document_root());
        let script = script_node("2", "https://example.com/s.js", 100.0, 300.0);
        let script = graph.add_node(script);
        graph.add_dependency(script, 0).unwrap();
        let eval = graph.add_node(cpu_node(
            "cpu-0",
            900.0,
            1000.0,
            TaskGroup::ScriptEvaluation,
            &["https://example.com/s.js"],
        ));
        graph.add_dependency(eval, script).unwrap();

        let filtered =
            first_paint_based_graph(&graph, CUTOFF_MS, |_| true, |_| false).unwrap();
        assert_eq!(names(&filtered), vec!["1"]);
    }

    #[test]
    fn script_evaluated_before_the_paint_keeps_its_eval_task() {
        let mut graph = DependencyGraph::new(document_root());
        let script = graph.add_node(script_node("2", "https://example.com/s.js", 100.0, 300.0));
        graph.add_dependency(script, 0).unwrap();
        let eval = graph.add_node(cpu_node(
            "cpu-0",
            400.0,
            600.0,
            TaskGroup::ScriptEvaluation,
            &["https://example.com/s.js"],
        ));
        graph.add_dependency(eval, script).unwrap();

        let filtered =
            first_paint_based_graph(&graph, CUTOFF_MS, |_| true, |_| false).unwrap();
        assert_eq!(names(&filtered), vec!["1", "2", "cpu-0"]);
    }

    #[test]
    fn main_document_survives_ending_after_the_paint() {
        let mut root = Node::network(
            request("1")
                .url("https://example.com/")
                .resource_type(ResourceType::Document)
                .priority(RequestPriority::VeryHigh)
                .window(0.0, 900.0)
                .build(),
        );
        root.set_main_document(true);
        let mut graph = DependencyGraph::new(root);
        let late = graph.add_node(script_node("2", "https://example.com/s.js", 850.0, 950.0));
        graph.add_dependency(late, 0).unwrap();

        let filtered =
            first_paint_based_graph(&graph, CUTOFF_MS, |_| true, |_| false).unwrap();
        assert_eq!(names(&filtered), vec!["1"]);
    }

    #[test]
    fn first_layout_paint_and_parse_are_kept() {
        let mut graph = DependencyGraph::new(document_root());
        for (id, start, end, group) in [
            ("cpu-0", 50.0, 100.0, TaskGroup::ParseHtml),
            ("cpu-1", 100.0, 200.0, TaskGroup::Layout),
            ("cpu-2", 200.0, 250.0, TaskGroup::Paint),
            ("cpu-3", 250.0, 300.0, TaskGroup::Layout),
            ("cpu-4", 300.0, 320.0, TaskGroup::Other),
        ] {
            let index = graph.add_node(cpu_node(id, start, end, group, &[]));
            graph.add_dependency(index, 0).unwrap();
        }

        let filtered =
            first_paint_based_graph(&graph, CUTOFF_MS, |_| true, |_| false).unwrap();
        // Only the first of each group; the second layout and the
        // unclassified task stay out.
        assert_eq!(names(&filtered), vec!["1", "cpu-0", "cpu-1", "cpu-2"]);
    }

    #[test]
    fn extra_blocking_filter_admits_more_tasks() {
        let mut graph = DependencyGraph::new(document_root());
        for (id, start, end) in [("cpu-0", 100.0, 200.0), ("cpu-1", 250.0, 300.0)] {
            let index = graph.add_node(cpu_node(id, start, end, TaskGroup::Layout, &[]));
            graph.add_dependency(index, 0).unwrap();
        }

        let filtered = first_paint_based_graph(&graph, CUTOFF_MS, |_| true, |task| {
            task.performs_layout()
        })
        .unwrap();
        assert_eq!(names(&filtered), vec!["1", "cpu-0", "cpu-1"]);
    }

    #[test]
    fn optimistic_fcp_drops_non_blocking_priorities() {
        let fixture = lampion_test_helpers::PageFixture::simple();
        let graph = fixture.graph();

        let optimistic =
            FirstContentfulPaint::optimistic_graph(&graph, &fixture.trace).unwrap();
        let pessimistic =
            FirstContentfulPaint::pessimistic_graph(&graph, &fixture.trace).unwrap();

        // Script and image finish after the 800ms paint; only the document
        // and stylesheet remain on either reading.
        assert_eq!(names(&optimistic), vec!["1", "2"]);
        assert!(pessimistic.len() >= optimistic.len());
    }
}
