//! The unit of evaluation and its cache identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lampion_types::{CpuTask, NetworkRequest, SimulationSettings, TraceSummary};

static NEXT_INPUT_ID: AtomicU64 = AtomicU64::new(0);

/// Handle identity of one [`PageInput`], used as the memoization key for
/// every artifact derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InputId(u64);

impl InputId {
    fn next() -> Self {
        Self(NEXT_INPUT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything one evaluation consumes: the normalized records, the trace
/// summary, and the settings under which metrics should be derived.
///
/// Construction mints a fresh [`InputId`]; build one input per page load
/// and hand the same value to every artifact request so the engine's
/// caches take effect. Two inputs built from identical records are still
/// distinct keys. The fields are read-only after construction, which is
/// what lets the id stand in for the contents. Clones share the identity.
#[derive(Debug, Clone)]
pub struct PageInput {
    id: InputId,
    records: Vec<Arc<NetworkRequest>>,
    tasks: Vec<Arc<CpuTask>>,
    trace: TraceSummary,
    settings: SimulationSettings,
}

impl PageInput {
    pub fn new(
        records: Vec<Arc<NetworkRequest>>,
        tasks: Vec<Arc<CpuTask>>,
        trace: TraceSummary,
        settings: SimulationSettings,
    ) -> Self {
        Self {
            id: InputId::next(),
            records,
            tasks,
            trace,
            settings,
        }
    }

    pub fn id(&self) -> InputId {
        self.id
    }

    pub fn records(&self) -> &[Arc<NetworkRequest>] {
        &self.records
    }

    pub fn tasks(&self) -> &[Arc<CpuTask>] {
        &self.tasks
    }

    pub fn trace(&self) -> &TraceSummary {
        &self.trace
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }
}
