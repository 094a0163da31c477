//! Graph nodes: one unit of simulated work.

use lampion_types::{CpuTask, NetworkRequest};
use std::fmt;
use std::sync::Arc;

/// Arena index of a node within its graph. Stable for the lifetime of the
/// graph; filtered clones assign fresh indices.
pub type NodeIndex = u32;

/// Stable node identity, preserved across filtered clones.
///
/// Network nodes reuse the devtools request id; CPU nodes get a
/// builder-assigned `cpu-<n>` id. Results are keyed by `NodeId` so the
/// timings of the same logical node can be correlated across the
/// optimistic and pessimistic runs.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Node payload. The scheduler switches on this tag; there is no dynamic
/// dispatch in the simulation loop.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Network(Arc<NetworkRequest>),
    Cpu(Arc<CpuTask>),
}

/// One unit of work: a network fetch or a main-thread task.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    is_main_document: bool,
    pub(crate) dependencies: Vec<NodeIndex>,
    pub(crate) dependents: Vec<NodeIndex>,
}

impl Node {
    /// A network node, identified by its request id.
    pub fn network(request: Arc<NetworkRequest>) -> Self {
        let id = NodeId::new(request.request_id.as_str());
        Self::network_with_id(id, request)
    }

    /// A network node with an explicit id. The builder uses this to keep
    /// ids unique when a devtools log repeats a request id.
    pub fn network_with_id(id: NodeId, request: Arc<NetworkRequest>) -> Self {
        Self {
            id,
            kind: NodeKind::Network(request),
            is_main_document: false,
            dependencies: Vec::new(),
            dependents: Vec::new(),
        }
    }

    /// A CPU node with an explicit id.
    pub fn cpu(id: NodeId, task: Arc<CpuTask>) -> Self {
        Self {
            id,
            kind: NodeKind::Cpu(task),
            is_main_document: false,
            dependencies: Vec::new(),
            dependents: Vec::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_network(&self) -> bool {
        matches!(self.kind, NodeKind::Network(_))
    }

    pub fn is_cpu(&self) -> bool {
        matches!(self.kind, NodeKind::Cpu(_))
    }

    pub fn as_network(&self) -> Option<&Arc<NetworkRequest>> {
        match &self.kind {
            NodeKind::Network(request) => Some(request),
            NodeKind::Cpu(_) => None,
        }
    }

    pub fn as_cpu(&self) -> Option<&Arc<CpuTask>> {
        match &self.kind {
            NodeKind::Cpu(task) => Some(task),
            NodeKind::Network(_) => None,
        }
    }

    /// Observed start, ms from time origin.
    pub fn start_time(&self) -> f64 {
        match &self.kind {
            NodeKind::Network(request) => request.network_request_time,
            NodeKind::Cpu(task) => task.start_time,
        }
    }

    /// Observed end, ms from time origin.
    pub fn end_time(&self) -> f64 {
        match &self.kind {
            NodeKind::Network(request) => request.network_end_time,
            NodeKind::Cpu(task) => task.end_time,
        }
    }

    /// Whether this is the final document of the navigation's redirect
    /// chain. Set by the builder; preserved by filtered clones.
    pub fn is_main_document(&self) -> bool {
        self.is_main_document
    }

    pub fn set_main_document(&mut self, is_main: bool) {
        self.is_main_document = is_main;
    }

    /// Network work that never opens a connection: disk cache hits and
    /// non-network schemes. These bypass the connection pool entirely.
    pub fn is_connectionless(&self) -> bool {
        match &self.kind {
            NodeKind::Network(request) => {
                request.from_disk_cache || request.is_non_network_protocol()
            }
            NodeKind::Cpu(_) => false,
        }
    }

    /// A node may only depend on work that started no later than it did.
    pub fn can_depend_on(&self, other: &Node) -> bool {
        other.start_time() <= self.start_time()
    }

    /// Indices of nodes that must complete before this one starts.
    pub fn dependencies(&self) -> &[NodeIndex] {
        &self.dependencies
    }

    /// Indices of nodes waiting on this one.
    pub fn dependents(&self) -> &[NodeIndex] {
        &self.dependents
    }

    /// Copy of this node with identity and payload but no edges.
    pub(crate) fn without_relationships(&self) -> Node {
        Node {
            id: self.id.clone(),
            kind: self.kind.clone(),
            is_main_document: self.is_main_document,
            dependencies: Vec::new(),
            dependents: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lampion_types::{RequestPriority, ResourceType, TaskGroup};

    fn request(id: &str) -> Arc<NetworkRequest> {
        Arc::new(NetworkRequest {
            request_id: lampion_types::RequestId(id.to_string()),
            url: "https://example.com/".to_string(),
            origin: "https://example.com".to_string(),
            protocol: "http/1.1".to_string(),
            priority: RequestPriority::High,
            resource_type: ResourceType::Document,
            transfer_size: 1000,
            resource_size: 1000,
            network_request_time: 10.0,
            network_end_time: 40.0,
            timing: None,
            initiator_url: None,
            initiator_request_id: None,
            redirect_source: None,
            redirect_destination: None,
            connection_id: 1,
            connection_reused: false,
            from_disk_cache: false,
        })
    }

    #[test]
    fn network_node_takes_request_id() {
        let node = Node::network(request("12.34"));
        assert_eq!(node.id().as_str(), "12.34");
        assert!(node.is_network());
        assert_eq!(node.start_time(), 10.0);
        assert_eq!(node.end_time(), 40.0);
    }

    #[test]
    fn disk_cache_hit_is_connectionless() {
        let mut req = (*request("1")).clone();
        req.from_disk_cache = true;
        let node = Node::network(Arc::new(req));
        assert!(node.is_connectionless());
    }

    #[test]
    fn data_uri_is_connectionless() {
        let mut req = (*request("1")).clone();
        req.url = "data:image/png;base64,AAAA".to_string();
        req.protocol = "data".to_string();
        let node = Node::network(Arc::new(req));
        assert!(node.is_connectionless());
    }

    #[test]
    fn cpu_node_reports_task_window() {
        let task = Arc::new(CpuTask {
            start_time: 100.0,
            end_time: 150.0,
            attributable_urls: vec![],
            group: TaskGroup::Layout,
        });
        let node = Node::cpu(NodeId::new("cpu-0"), task);
        assert!(node.is_cpu());
        assert!(!node.is_connectionless());
        assert_eq!(node.start_time(), 100.0);
        assert_eq!(node.end_time(), 150.0);
    }

    #[test]
    fn can_depend_on_requires_earlier_start() {
        let early = Node::network(request("1"));
        let mut late_req = (*request("2")).clone();
        late_req.network_request_time = 50.0;
        let late = Node::network(Arc::new(late_req));
        assert!(late.can_depend_on(&early));
        assert!(!early.can_depend_on(&late));
    }
}
