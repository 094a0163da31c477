//! Arena-backed dependency graph.
//!
//! Nodes live in a flat arena and reference each other by index, so
//! redirect chains and initiator back-references never create ownership
//! cycles. The root is always index 0. Traversal order is the schedulable
//! universe: a node appears only once every one of its dependencies has
//! appeared, and a node whose dependency chain never resolves (or that has
//! no path from the root at all) is absent from the order entirely.

use crate::error::GraphError;
use crate::node::{Node, NodeId, NodeIndex};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    by_id: HashMap<NodeId, NodeIndex>,
}

impl DependencyGraph {
    /// Creates a graph holding only `root`. The root never has
    /// dependencies of its own.
    pub fn new(root: Node) -> Self {
        let mut by_id = HashMap::new();
        by_id.insert(root.id().clone(), 0);
        Self {
            nodes: vec![root],
            by_id,
        }
    }

    pub const fn root(&self) -> NodeIndex {
        0
    }

    pub fn root_node(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index as usize]
    }

    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.nodes[index as usize]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (i as NodeIndex, node))
    }

    pub fn index_of(&self, id: &NodeId) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    /// Adds a node with no edges and returns its index. Ids are assumed
    /// unique; a duplicate id shadows the earlier entry in id lookups.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        let index = self.nodes.len() as NodeIndex;
        self.by_id.insert(node.id().clone(), index);
        self.nodes.push(node);
        index
    }

    /// Records that `node` cannot start until `dependency` completes.
    /// Duplicate edges are ignored.
    pub fn add_dependency(
        &mut self,
        node: NodeIndex,
        dependency: NodeIndex,
    ) -> Result<(), GraphError> {
        if node == dependency {
            return Err(GraphError::SelfDependency {
                node_id: self.nodes[node as usize].id().clone(),
            });
        }
        if self.nodes[node as usize].dependencies.contains(&dependency) {
            return Ok(());
        }
        self.nodes[node as usize].dependencies.push(dependency);
        self.nodes[dependency as usize].dependents.push(node);
        Ok(())
    }

    /// Whether `node` transitively depends on `ancestor`.
    pub fn is_dependent_on(&self, node: NodeIndex, ancestor: NodeIndex) -> bool {
        if node == ancestor {
            return false;
        }
        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([node]);
        seen[node as usize] = true;
        while let Some(current) = queue.pop_front() {
            for &dep in &self.nodes[current as usize].dependencies {
                if dep == ancestor {
                    return true;
                }
                if !seen[dep as usize] {
                    seen[dep as usize] = true;
                    queue.push_back(dep);
                }
            }
        }
        false
    }

    /// Dependency-respecting visit order starting from the root.
    ///
    /// A node is emitted only after all of its dependencies have been
    /// emitted. Nodes that are disconnected from the root, or whose
    /// dependency chain includes such a node, do not appear. The order is
    /// deterministic: ties break by edge insertion order.
    pub fn traverse_order(&self) -> Vec<NodeIndex> {
        let mut deps_left: Vec<usize> = self
            .nodes
            .iter()
            .map(|node| node.dependencies.len())
            .collect();
        let mut emitted = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::new();

        if deps_left[0] == 0 {
            queue.push_back(self.root());
        }
        while let Some(index) = queue.pop_front() {
            if emitted[index as usize] {
                continue;
            }
            emitted[index as usize] = true;
            order.push(index);
            for &dependent in &self.nodes[index as usize].dependents {
                deps_left[dependent as usize] -= 1;
                if deps_left[dependent as usize] == 0 {
                    queue.push_back(dependent);
                }
            }
        }
        order
    }

    /// Visits every schedulable node in dependency order.
    pub fn traverse(&self, mut visitor: impl FnMut(NodeIndex, &Node)) {
        for index in self.traverse_order() {
            visitor(index, &self.nodes[index as usize]);
        }
    }

    /// New graph containing exactly the nodes for which `predicate` holds,
    /// with edges restricted to the retained set. Edges through removed
    /// nodes are elided, never rewired, so callers must check target
    /// reachability when they care about a specific node.
    pub fn clone_with_relationships(
        &self,
        predicate: impl Fn(&Node) -> bool,
    ) -> Result<DependencyGraph, GraphError> {
        if !predicate(self.root_node()) {
            return Err(GraphError::RootExcluded {
                node_id: self.root_node().id().clone(),
            });
        }

        let mut remap: Vec<Option<NodeIndex>> = vec![None; self.nodes.len()];
        let mut clone = DependencyGraph::new(self.root_node().without_relationships());
        remap[0] = Some(0);
        for (index, node) in self.nodes.iter().enumerate().skip(1) {
            if predicate(node) {
                remap[index] = Some(clone.add_node(node.without_relationships()));
            }
        }

        for (index, node) in self.nodes.iter().enumerate() {
            let Some(new_index) = remap[index] else {
                continue;
            };
            for &dep in &node.dependencies {
                if let Some(new_dep) = remap[dep as usize] {
                    clone.add_dependency(new_index, new_dep)?;
                }
            }
        }
        Ok(clone)
    }

    /// Index of `id`, verified schedulable: the node must exist and every
    /// transitive dependency must be reachable from the root.
    pub fn ensure_reachable(&self, id: &NodeId) -> Result<NodeIndex, GraphError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| GraphError::TargetUnreachable {
                node_id: id.clone(),
            })?;
        if self.traverse_order().contains(&index) {
            Ok(index)
        } else {
            Err(GraphError::TargetUnreachable {
                node_id: id.clone(),
            })
        }
    }

    /// Some node on a dependency cycle, if any exists anywhere in the
    /// arena. The scheduler refuses graphs where this returns `Some`.
    pub fn find_cycle(&self) -> Option<NodeId> {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;
        let mut color = vec![WHITE; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if color[start] != WHITE {
                continue;
            }
            let mut stack: Vec<(NodeIndex, usize)> = vec![(start as NodeIndex, 0)];
            color[start] = GRAY;
            while let Some(frame) = stack.last_mut() {
                let (index, cursor) = *frame;
                let dependents = &self.nodes[index as usize].dependents;
                if cursor == dependents.len() {
                    color[index as usize] = BLACK;
                    stack.pop();
                    continue;
                }
                frame.1 += 1;
                let next = dependents[cursor];
                match color[next as usize] {
                    WHITE => {
                        color[next as usize] = GRAY;
                        stack.push((next, 0));
                    }
                    GRAY => return Some(self.nodes[next as usize].id().clone()),
                    _ => {}
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lampion_types::{CpuTask, NetworkRequest, RequestId, RequestPriority, ResourceType, TaskGroup};
    use std::sync::Arc;

    fn request(id: &str, start: f64, end: f64) -> Node {
        Node::network(Arc::new(NetworkRequest {
            request_id: RequestId(id.to_string()),
            url: format!("https://example.com/{id}"),
            origin: "https://example.com".to_string(),
            protocol: "http/1.1".to_string(),
            priority: RequestPriority::High,
            resource_type: ResourceType::Script,
            transfer_size: 1000,
            resource_size: 1000,
            network_request_time: start,
            network_end_time: end,
            timing: None,
            initiator_url: None,
            initiator_request_id: None,
            redirect_source: None,
            redirect_destination: None,
            connection_id: 1,
            connection_reused: false,
            from_disk_cache: false,
        }))
    }

    fn cpu(id: &str, start: f64, end: f64) -> Node {
        Node::cpu(
            NodeId::new(id),
            Arc::new(CpuTask {
                start_time: start,
                end_time: end,
                attributable_urls: vec![],
                group: TaskGroup::Other,
            }),
        )
    }

    /// root -> a -> c, root -> b -> c
    fn diamond() -> DependencyGraph {
        let mut graph = DependencyGraph::new(request("root", 0.0, 100.0));
        let a = graph.add_node(request("a", 100.0, 200.0));
        let b = graph.add_node(request("b", 100.0, 300.0));
        let c = graph.add_node(cpu("c", 300.0, 400.0));
        graph.add_dependency(a, 0).unwrap();
        graph.add_dependency(b, 0).unwrap();
        graph.add_dependency(c, a).unwrap();
        graph.add_dependency(c, b).unwrap();
        graph
    }

    #[test]
    fn traverse_emits_dependencies_first() {
        let graph = diamond();
        let order = graph.traverse_order();
        assert_eq!(order.len(), 4);
        let position = |id: &str| {
            order
                .iter()
                .position(|&i| graph.node(i).id().as_str() == id)
                .unwrap()
        };
        assert_eq!(position("root"), 0);
        assert!(position("a") < position("c"));
        assert!(position("b") < position("c"));
    }

    #[test]
    fn traverse_skips_nodes_disconnected_from_root() {
        let mut graph = diamond();
        // No edge to the root: not schedulable.
        graph.add_node(request("stray", 0.0, 10.0));
        assert_eq!(graph.traverse_order().len(), 4);
    }

    #[test]
    fn self_dependency_is_rejected() {
        let mut graph = diamond();
        let err = graph.add_dependency(1, 1).unwrap_err();
        assert!(matches!(err, GraphError::SelfDependency { .. }));
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut graph = DependencyGraph::new(request("root", 0.0, 100.0));
        let a = graph.add_node(request("a", 100.0, 200.0));
        graph.add_dependency(a, 0).unwrap();
        graph.add_dependency(a, 0).unwrap();
        assert_eq!(graph.node(a).dependencies().len(), 1);
        assert_eq!(graph.node(0).dependents().len(), 1);
    }

    #[test]
    fn is_dependent_on_walks_transitively() {
        let graph = diamond();
        let c = graph.index_of(&NodeId::new("c")).unwrap();
        assert!(graph.is_dependent_on(c, 0));
        assert!(!graph.is_dependent_on(0, c));
        assert!(!graph.is_dependent_on(c, c));
    }

    #[test]
    fn clone_keeps_exactly_matching_nodes() {
        let graph = diamond();
        let clone = graph
            .clone_with_relationships(|node| node.is_network())
            .unwrap();
        assert_eq!(clone.len(), 3);
        assert!(clone.index_of(&NodeId::new("c")).is_none());
        let a = clone.index_of(&NodeId::new("a")).unwrap();
        assert_eq!(clone.node(a).dependencies(), &[0]);
        assert!(clone.node(a).dependents().is_empty());
    }

    #[test]
    fn clone_rejects_predicate_excluding_root() {
        let graph = diamond();
        let err = graph
            .clone_with_relationships(|node| node.id().as_str() != "root")
            .unwrap_err();
        assert!(matches!(err, GraphError::RootExcluded { .. }));
    }

    #[test]
    fn clone_residue_is_flagged_unreachable() {
        // root -> a -> c with a filtered out: c survives the predicate but
        // loses its only path from the root.
        let mut graph = DependencyGraph::new(request("root", 0.0, 100.0));
        let a = graph.add_node(request("a", 100.0, 200.0));
        let c = graph.add_node(request("c", 200.0, 300.0));
        graph.add_dependency(a, 0).unwrap();
        graph.add_dependency(c, a).unwrap();

        let clone = graph
            .clone_with_relationships(|node| node.id().as_str() != "a")
            .unwrap();
        assert_eq!(clone.len(), 2);
        let err = clone.ensure_reachable(&NodeId::new("c")).unwrap_err();
        assert!(matches!(err, GraphError::TargetUnreachable { .. }));
        assert!(clone.ensure_reachable(&NodeId::new("root")).is_ok());
    }

    #[test]
    fn find_cycle_reports_a_cycle_member() {
        let mut graph = DependencyGraph::new(request("root", 0.0, 100.0));
        let a = graph.add_node(request("a", 100.0, 200.0));
        let b = graph.add_node(request("b", 100.0, 200.0));
        graph.add_dependency(a, 0).unwrap();
        graph.add_dependency(b, a).unwrap();
        assert!(graph.find_cycle().is_none());

        graph.add_dependency(a, b).unwrap();
        assert!(graph.find_cycle().is_some());
    }
}
