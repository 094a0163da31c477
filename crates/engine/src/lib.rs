//! Evaluation orchestration for the Lampion workspace.
//!
//! The [`Engine`] is the context an evaluation runs in. Callers wrap
//! their normalized records in a [`PageInput`], which mints the cache
//! identity every derived artifact is memoized under: the network
//! analysis, the dependency graph, the throttled simulator, each metric
//! outcome, and the diagnostic timeline. Artifacts are computed exactly
//! once per context, concurrent requests collapse onto the first
//! computation, and independent metrics fan out across the rayon pool.
//!
//! The engine owns no I/O. Deserializing fixtures and rendering reports
//! belongs to the caller; see `lampion-cli` for the reference binary.

pub mod engine;
pub mod error;
pub mod input;

pub use engine::{CacheStats, Engine, MetricOutcome};
pub use error::EngineError;
pub use input::{InputId, PageInput};
