use lampion_graph::GraphError;
use lampion_simulation::SimulationError;
use thiserror::Error;

/// Failures raised while estimating a metric.
///
/// Every variant is `Clone` so cached estimates can hand the same error
/// to multiple callers. Target-event variants are expected on real pages
/// (not every navigation paints an LCP image) and callers report those
/// metrics as unavailable rather than failing the whole evaluation; see
/// [`MetricError::is_unavailable`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    /// The trace never recorded a largest contentful paint.
    #[error("trace contains no largest contentful paint event")]
    NoLcp,

    /// The largest contentful paint element was text, not an image.
    #[error("largest contentful paint was not an image")]
    LcpNotAnImage,

    /// The LCP image URL matched no request in the dependency graph.
    #[error("no request matched the LCP image url {url}")]
    LcpRequestNotFound { url: String },

    /// The LCP request survived filtering but received no simulated
    /// timing, which indicates a bug in the filtered clone.
    #[error("LCP request {url} has no simulated timing")]
    LcpTimingMissing { url: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

impl MetricError {
    /// Whether this error means the metric does not apply to the page,
    /// as opposed to the computation itself failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            MetricError::NoLcp | MetricError::LcpNotAnImage | MetricError::LcpRequestNotFound { .. }
        )
    }
}
