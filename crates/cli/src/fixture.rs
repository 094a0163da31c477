//! Evaluation fixtures loaded from disk.
//!
//! A fixture file is the JSON rendering of the in-memory record types:
//! a request log, an optional task log, the trace summary, and optional
//! settings and coefficient overrides. The format is whatever serde
//! derives for those types, not a separate contract; fixtures are
//! produced by serializing gathered records, so the two stay in sync
//! by construction.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use lampion_engine::PageInput;
use lampion_metrics::CoefficientTable;
use lampion_types::{CpuTask, NetworkRequest, SimulationSettings, TraceSummary};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a fixture file.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("reading fixture {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing fixture")]
    Json(#[from] serde_json::Error),
}

/// One page evaluation, as stored on disk.
///
/// `tasks`, `settings`, and `coefficients` may be omitted; a fixture
/// with only a request log and a trace evaluates under the default
/// throttling condition with the stock coefficients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalFixture {
    pub records: Vec<NetworkRequest>,
    #[serde(default)]
    pub tasks: Vec<CpuTask>,
    pub trace: TraceSummary,
    #[serde(default)]
    pub settings: SimulationSettings,
    #[serde(default)]
    pub coefficients: CoefficientTable,
}

impl EvalFixture {
    /// Read and parse a fixture file.
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let text = fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse a fixture from JSON text.
    pub fn from_json(text: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Convert into an engine input, sharing the records behind `Arc`s.
    pub fn into_input(self) -> PageInput {
        let records = self.records.into_iter().map(Arc::new).collect();
        let tasks = self.tasks.into_iter().map(Arc::new).collect();
        PageInput::new(records, tasks, self.trace, self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lampion_test_helpers::PageFixture;
    use lampion_types::ThrottlingMethod;

    fn fixture_json() -> String {
        let page = PageFixture::simple();
        let fixture = EvalFixture {
            records: page.records.iter().map(|r| (**r).clone()).collect(),
            tasks: page.tasks.iter().map(|t| (**t).clone()).collect(),
            trace: page.trace.clone(),
            settings: SimulationSettings::default(),
            coefficients: CoefficientTable::default(),
        };
        serde_json::to_string(&fixture).expect("fixture serializes")
    }

    #[test]
    fn a_fixture_roundtrips_through_json() {
        let json = fixture_json();
        let fixture = EvalFixture::from_json(&json).expect("fixture parses");
        let page = PageFixture::simple();
        assert_eq!(fixture.records.len(), page.records.len());
        assert_eq!(fixture.tasks.len(), page.tasks.len());
        assert_eq!(fixture.trace, page.trace);
    }

    #[test]
    fn omitted_sections_fall_back_to_defaults() {
        let mut value: serde_json::Value =
            serde_json::from_str(&fixture_json()).expect("fixture parses");
        let object = value.as_object_mut().expect("fixture is an object");
        object.remove("tasks");
        object.remove("settings");
        object.remove("coefficients");

        let fixture = EvalFixture::from_json(&value.to_string()).expect("fixture parses");
        assert!(fixture.tasks.is_empty());
        assert_eq!(fixture.settings, SimulationSettings::default());
        assert_eq!(fixture.coefficients, CoefficientTable::default());
        assert_eq!(fixture.settings.throttling_method, ThrottlingMethod::Simulate);
    }

    #[test]
    fn malformed_json_reports_a_parse_error() {
        let error = EvalFixture::from_json("{ records: oops").expect_err("parse fails");
        assert!(matches!(error, FixtureError::Json(_)));
    }

    #[test]
    fn into_input_keeps_every_record() {
        let json = fixture_json();
        let fixture = EvalFixture::from_json(&json).expect("fixture parses");
        let record_count = fixture.records.len();
        let task_count = fixture.tasks.len();

        let input = fixture.into_input();
        assert_eq!(input.records().len(), record_count);
        assert_eq!(input.tasks().len(), task_count);
    }
}
