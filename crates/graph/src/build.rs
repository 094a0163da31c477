//! Assembles the page dependency graph from normalized records.
//!
//! The root is the first hop of the navigation's redirect chain; the main
//! document is the last hop. Network nodes hang off their initiators,
//! redirect hops chain sequentially, and CPU tasks wedge between the
//! responses they consumed and the requests they issued.

use crate::error::GraphError;
use crate::graph::DependencyGraph;
use crate::node::{Node, NodeId, NodeIndex};
use lampion_types::{CpuTask, NetworkRequest, RequestId, ResourceType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// A task may depend on a response that finishes up to this long after the
/// task began. Script evaluation regularly starts before the body has
/// fully streamed in.
const ATTRIBUTION_WINDOW_MS: f64 = 100.0;

/// Resource types that become dependents of the CPU task that issued them.
/// Linking every type here degrades paint estimates, so only request-like
/// fetches qualify.
const fn is_linkable_to_cpu(resource_type: ResourceType) -> bool {
    matches!(
        resource_type,
        ResourceType::Xhr | ResourceType::Fetch | ResourceType::Script
    )
}

/// Builds the dependency graph for one navigation.
///
/// Record payloads are shared with the caller; the graph owns only its
/// structure. Audio and video payloads are excluded up front since they
/// stream outside the critical path.
pub fn build_graph(
    requests: &[Arc<NetworkRequest>],
    tasks: &[Arc<CpuTask>],
) -> Result<DependencyGraph, GraphError> {
    let by_request_id: HashMap<&RequestId, &Arc<NetworkRequest>> = requests
        .iter()
        .map(|request| (&request.request_id, request))
        .collect();

    let root_request = find_root_request(requests, &by_request_id)?;
    let main_document_id = resolve_main_document(root_request, &by_request_id);

    let mut graph = DependencyGraph::new(Node::network(Arc::clone(root_request)));
    let mut by_url: HashMap<&str, Vec<NodeIndex>> = HashMap::new();
    by_url
        .entry(root_request.url.as_str())
        .or_default()
        .push(graph.root());

    for request in requests {
        if Arc::ptr_eq(request, root_request) {
            continue;
        }
        if request.resource_type == ResourceType::Media {
            continue;
        }
        // Devtools logs occasionally repeat a request id. Suffix later
        // occurrences so ids stay unique; links by id resolve to the first.
        let mut id = NodeId::new(request.request_id.as_str());
        while graph.index_of(&id).is_some() {
            id = NodeId::new(format!("{}:duplicate", id.as_str()));
        }
        let index = graph.add_node(Node::network_with_id(id, Arc::clone(request)));
        by_url.entry(request.url.as_str()).or_default().push(index);
    }
    let network_count = graph.len() as NodeIndex;

    if let Some(main_index) = graph.index_of(&NodeId::new(main_document_id.as_str())) {
        graph.node_mut(main_index).set_main_document(true);
    }

    link_network_nodes(&mut graph, network_count, &by_url)?;
    link_cpu_nodes(&mut graph, network_count, tasks, &by_url)?;

    if let Some(node_id) = graph.find_cycle() {
        return Err(GraphError::Cycle { node_id });
    }

    debug!(
        nodes = graph.len(),
        requests = requests.len(),
        tasks = tasks.len(),
        "Built page dependency graph"
    );
    Ok(graph)
}

/// The earliest document request, walked back to the front of its
/// redirect chain.
fn find_root_request<'a>(
    requests: &'a [Arc<NetworkRequest>],
    by_request_id: &HashMap<&RequestId, &'a Arc<NetworkRequest>>,
) -> Result<&'a Arc<NetworkRequest>, GraphError> {
    let mut earliest: Option<&'a Arc<NetworkRequest>> = None;
    for request in requests {
        if request.resource_type != ResourceType::Document {
            continue;
        }
        let earlier = earliest
            .map_or(true, |current| {
                request.network_request_time < current.network_request_time
            });
        if earlier {
            earliest = Some(request);
        }
    }
    let mut root = earliest.ok_or(GraphError::MissingRoot)?;

    let mut seen = HashSet::from([&root.request_id]);
    while let Some(&source) = root
        .redirect_source
        .as_ref()
        .and_then(|id| by_request_id.get(id))
    {
        if !seen.insert(&source.request_id) {
            break;
        }
        root = source;
    }
    Ok(root)
}

/// The final hop of the root's redirect chain.
fn resolve_main_document<'a>(
    root: &'a Arc<NetworkRequest>,
    by_request_id: &HashMap<&RequestId, &'a Arc<NetworkRequest>>,
) -> RequestId {
    let mut main = root;
    let mut seen = HashSet::from([&main.request_id]);
    while let Some(&next) = main
        .redirect_destination
        .as_ref()
        .and_then(|id| by_request_id.get(id))
    {
        if !seen.insert(&next.request_id) {
            break;
        }
        main = next;
    }
    main.request_id.clone()
}

fn link_network_nodes(
    graph: &mut DependencyGraph,
    network_count: NodeIndex,
    by_url: &HashMap<&str, Vec<NodeIndex>>,
) -> Result<(), GraphError> {
    for index in 0..network_count {
        let Some(request) = graph.node(index).as_network().map(Arc::clone) else {
            continue;
        };

        // Redirect hops complete strictly in sequence; the source hop is
        // the only initiator that matters.
        if let Some(source_id) = &request.redirect_source {
            if let Some(source) = graph.index_of(&NodeId::new(source_id.as_str())) {
                if source != index {
                    graph.add_dependency(index, source)?;
                    continue;
                }
            }
        }

        if index == graph.root() {
            continue;
        }

        let initiator = request
            .initiator_request_id
            .as_ref()
            .and_then(|id| graph.index_of(&NodeId::new(id.as_str())))
            .unwrap_or_else(|| graph.root());
        let can_depend_on_initiator = initiator != index
            && !graph.is_dependent_on(initiator, index)
            && graph.node(index).can_depend_on(graph.node(initiator));

        if let Some(url) = &request.initiator_url {
            // An initiator URL only links when it names exactly one earlier
            // request; ambiguous or circular matches fall back to the
            // direct initiator.
            let candidates = by_url.get(url.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let unambiguous = match candidates {
                &[parent] => (parent != index
                    && graph.node(parent).start_time() <= graph.node(index).start_time()
                    && !graph.is_dependent_on(parent, index))
                .then_some(parent),
                _ => None,
            };
            if let Some(parent) = unambiguous {
                graph.add_dependency(index, parent)?;
            } else if can_depend_on_initiator {
                graph.add_dependency(index, initiator)?;
            }
        } else if can_depend_on_initiator {
            graph.add_dependency(index, initiator)?;
        }

        if graph.node(index).dependencies().is_empty() {
            debug!(node = %graph.node(index).id(), "Network node has no attachment to the graph");
        }
    }
    Ok(())
}

fn link_cpu_nodes(
    graph: &mut DependencyGraph,
    network_count: NodeIndex,
    tasks: &[Arc<CpuTask>],
    by_url: &HashMap<&str, Vec<NodeIndex>>,
) -> Result<(), GraphError> {
    let mut cpu_indices = Vec::with_capacity(tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        let id = NodeId::new(format!("cpu-{i}"));
        cpu_indices.push(graph.add_node(Node::cpu(id, Arc::clone(task))));
    }

    for &cpu_index in &cpu_indices {
        let Some(task) = graph.node(cpu_index).as_cpu().map(Arc::clone) else {
            continue;
        };

        // The task depends on the closest response for each URL it touched.
        for url in &task.attributable_urls {
            let mut best: Option<(NodeIndex, f64)> = None;
            for &candidate in by_url.get(url.as_str()).map(Vec::as_slice).unwrap_or(&[]) {
                let node = graph.node(candidate);
                if task.start_time <= node.start_time() {
                    continue;
                }
                let distance = task.start_time - node.end_time();
                if distance < -ATTRIBUTION_WINDOW_MS {
                    continue;
                }
                if best.map_or(true, |(_, closest)| distance < closest) {
                    best = Some((candidate, distance));
                }
            }
            if let Some((parent, _)) = best {
                graph.add_dependency(cpu_index, parent)?;
            }
        }

        // Requests issued while the task was on the main thread wait for it.
        if !task.attributable_urls.is_empty() {
            for network_index in 0..network_count {
                let Some(request) = graph.node(network_index).as_network().map(Arc::clone) else {
                    continue;
                };
                if !is_linkable_to_cpu(request.resource_type) {
                    continue;
                }
                let started_during_task = request.network_request_time > task.start_time
                    && request.network_request_time <= task.end_time;
                if !started_during_task {
                    continue;
                }
                let initiated_here = request
                    .initiator_url
                    .as_deref()
                    .is_some_and(|url| task.attributable_urls.iter().any(|u| u == url));
                if initiated_here {
                    graph.add_dependency(network_index, cpu_index)?;
                }
            }
        }

        if graph.node(cpu_index).dependencies().is_empty() {
            graph.add_dependency(cpu_index, graph.root())?;
        }
    }
    Ok(())
}
