//! Normalized main-thread task records.

use serde::{Deserialize, Serialize};

/// Classification of a main-thread task, from the trace's top-level event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskGroup {
    ScriptEvaluation,
    ParseHtml,
    Layout,
    Paint,
    Other,
}

/// One observed main-thread task.
///
/// Times are milliseconds relative to the navigation time origin. The
/// attributable URLs tie the task back to the resources it executed or
/// parsed, which is how CPU work gets linked into the dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuTask {
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub attributable_urls: Vec<String>,
    pub group: TaskGroup,
}

impl CpuTask {
    /// Observed duration in milliseconds.
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    /// Layout tasks scale differently under simulated CPU throttling.
    pub fn performs_layout(&self) -> bool {
        self.group == TaskGroup::Layout
    }

    /// URLs of scripts this task evaluated, if it is a script task.
    pub fn evaluated_script_urls(&self) -> &[String] {
        if self.group == TaskGroup::ScriptEvaluation {
            &self.attributable_urls
        } else {
            &[]
        }
    }
}
