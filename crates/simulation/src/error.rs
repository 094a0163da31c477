use lampion_graph::NodeId;
use thiserror::Error;

/// Failures raised while preparing or running a simulation.
///
/// Every variant is `Clone` so cached simulation results can hand the
/// same error to multiple callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// The simulator was configured with unusable throttling values.
    #[error("invalid simulation options: {0}")]
    InvalidOptions(String),

    /// The graph contains a dependency cycle through the named node.
    #[error("cannot simulate a graph with a cycle through node {node_id}")]
    CyclicGraph { node_id: NodeId },

    /// No in-flight work remained but the named node could not be started.
    #[error("simulation stalled at {elapsed_ms}ms with node {node_id} still queued")]
    Stalled { node_id: NodeId, elapsed_ms: f64 },

    /// The scheduler failed to converge within its iteration limit.
    #[error("simulation exceeded {iterations} iterations with node {node_id} still incomplete")]
    DepthExceeded { node_id: NodeId, iterations: u64 },

    /// A schedulable node never reached completion.
    #[error("node {node_id} never completed")]
    IncompleteNode { node_id: NodeId },
}
