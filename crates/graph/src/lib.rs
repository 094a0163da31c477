//! Dependency graph of network requests and CPU tasks.
//!
//! The graph is an arena: nodes live in a flat `Vec` addressed by
//! [`NodeIndex`], and edges are index references in both directions
//! (dependencies and dependents). Payloads are shared behind `Arc`, so a
//! filtered clone copies structure but not record data.
//!
//! Traversal is topological from the root: a node is only visited once
//! every one of its dependencies has been visited. For filtered clones
//! this means nodes cut off from the root (directly, or through a
//! dependency that was filtered out) are not visited, and the scheduler
//! simulates exactly the traversable set.

pub mod build;
pub mod error;
pub mod graph;
pub mod node;

pub use build::build_graph;
pub use error::GraphError;
pub use graph::DependencyGraph;
pub use node::{Node, NodeId, NodeIndex, NodeKind};
