//! Navigation trace summary.

use serde::{Deserialize, Serialize};

/// Key paint events extracted from a navigation trace.
///
/// `time_origin` is an epoch-like millisecond timestamp; the paint fields
/// are milliseconds relative to it, matching the request and task records.
/// LCP fields are optional because short traces can end before the
/// largest contentful paint candidate settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub time_origin: f64,
    pub first_contentful_paint: f64,
    #[serde(default)]
    pub largest_contentful_paint: Option<f64>,
    /// URL of the LCP element's image, when the LCP element was an image.
    #[serde(default)]
    pub lcp_image_url: Option<String>,
}

impl TraceSummary {
    /// Convert a relative timing into an epoch-like timestamp.
    pub fn timestamp_for(&self, timing_ms: f64) -> f64 {
        self.time_origin + timing_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_offset_from_time_origin() {
        let trace = TraceSummary {
            time_origin: 1_000_000.0,
            first_contentful_paint: 1234.5,
            largest_contentful_paint: None,
            lcp_image_url: None,
        };
        assert_eq!(trace.timestamp_for(1234.5), 1_001_234.5);
    }
}
