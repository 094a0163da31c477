//! Calibration coefficients for blending simulation passes.
//!
//! Each metric runs an optimistic and a pessimistic simulation and reports
//! a weighted combination of the two. The weights are calibration data,
//! fitted against field measurements, so they live in a table that
//! deployments can override from JSON rather than in the estimator code.

use serde::{Deserialize, Serialize};

use crate::metric::MetricKind;

/// Blend weights for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricCoefficients {
    /// Constant offset, in milliseconds.
    pub intercept: f64,
    /// Weight on the optimistic pass estimate.
    pub optimistic: f64,
    /// Weight on the pessimistic pass estimate.
    pub pessimistic: f64,
}

impl MetricCoefficients {
    /// Combines the two pass estimates into a final timing.
    ///
    /// A positive intercept is scaled down on very fast pages so that the
    /// constant term never dominates an estimate smaller than itself: the
    /// multiplier ramps linearly from 0 to 1 as the optimistic estimate
    /// approaches one second.
    pub fn blend(self, optimistic_ms: f64, pessimistic_ms: f64) -> f64 {
        let intercept_multiplier = if self.intercept > 0.0 {
            (optimistic_ms / 1000.0).min(1.0)
        } else {
            1.0
        };
        self.intercept * intercept_multiplier
            + self.optimistic * optimistic_ms
            + self.pessimistic * pessimistic_ms
    }
}

/// Coefficients for every metric, loadable from JSON.
///
/// The built-in defaults weight both passes equally with no intercept,
/// which keeps estimates centered between the best and worst case until a
/// deployment substitutes fitted constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoefficientTable {
    pub first_contentful_paint: MetricCoefficients,
    pub largest_contentful_paint: MetricCoefficients,
    pub lcp_load_delay: MetricCoefficients,
}

impl Default for CoefficientTable {
    fn default() -> Self {
        let even = MetricCoefficients {
            intercept: 0.0,
            optimistic: 0.5,
            pessimistic: 0.5,
        };
        Self {
            first_contentful_paint: even,
            largest_contentful_paint: even,
            lcp_load_delay: even,
        }
    }
}

impl CoefficientTable {
    pub fn for_kind(&self, kind: MetricKind) -> MetricCoefficients {
        match kind {
            MetricKind::FirstContentfulPaint => self.first_contentful_paint,
            MetricKind::LargestContentfulPaint => self.largest_contentful_paint,
            MetricKind::LcpLoadDelay => self.lcp_load_delay,
        }
    }
}
