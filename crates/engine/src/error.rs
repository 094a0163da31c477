use lampion_analysis::AnalysisError;
use lampion_graph::GraphError;
use lampion_metrics::MetricError;
use lampion_simulation::SimulationError;
use thiserror::Error;

/// Any failure an evaluation can surface, one variant per layer.
///
/// `Clone` because computed results are cached, errors included; every
/// caller asking for a failed artifact receives the same error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Metric(#[from] MetricError),
}

impl EngineError {
    /// True when the metric simply does not apply to this page, as
    /// opposed to the computation failing. Callers report these as
    /// missing values and keep going.
    pub fn is_unavailable(&self) -> bool {
        match self {
            EngineError::Metric(error) => error.is_unavailable(),
            _ => false,
        }
    }
}
