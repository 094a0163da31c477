//! Graph construction and traversal errors.

use crate::node::NodeId;
use thiserror::Error;

/// Errors raised while building or reshaping a dependency graph.
///
/// All variants are `Clone` so cached computation results can hand the
/// same error to every caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// No document request could serve as the graph root.
    #[error("no root document request found in the record set")]
    MissingRoot,

    /// A node was asked to depend on itself.
    #[error("node {node_id} cannot depend on itself")]
    SelfDependency { node_id: NodeId },

    /// Dependency edges form a cycle through the named node.
    #[error("dependency cycle detected at node {node_id}")]
    Cycle { node_id: NodeId },

    /// A filtered clone would have dropped the root node.
    #[error("filter predicate excluded the root node {node_id}")]
    RootExcluded { node_id: NodeId },

    /// The named node exists but cannot be scheduled because some
    /// transitive dependency is missing from the graph.
    #[error("target node {node_id} is unreachable from the root")]
    TargetUnreachable { node_id: NodeId },
}
