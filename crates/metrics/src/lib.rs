//! Paint metric estimators over simulated page-load schedules.
//!
//! Every estimator follows the same recipe, captured by the [`Metric`]
//! trait: derive an optimistic and a pessimistic filtered clone of the
//! page's dependency graph, replay each through the simulator, reduce the
//! passes to milliseconds, and blend them with per-metric calibration
//! coefficients.
//!
//! The filters are where the metrics differ:
//!
//! - [`FirstContentfulPaint`] works backwards from the FCP timestamp,
//!   keeping render-blocking fetches and the main-thread work that
//!   provably preceded the paint.
//! - [`LargestContentfulPaint`] reuses the same machinery with the LCP
//!   timestamp and excludes offscreen (low-priority) images.
//! - [`LcpLoadDelay`] cuts the graph at the LCP image request's start to
//!   estimate how long the page waited before asking for the image.
//!
//! [`LcpBreakdown`] derives phase boundaries from an LCP estimate without
//! running any additional simulation, and [`MetricKind::observed`] reads
//! values straight from the trace for runs that were throttled while
//! recording.

pub mod breakdown;
pub mod coefficients;
pub mod error;
pub mod first_contentful_paint;
pub mod largest_contentful_paint;
pub mod lcp_load_delay;
pub mod metric;

pub use breakdown::LcpBreakdown;
pub use coefficients::{CoefficientTable, MetricCoefficients};
pub use error::MetricError;
pub use first_contentful_paint::FirstContentfulPaint;
pub use largest_contentful_paint::LargestContentfulPaint;
pub use lcp_load_delay::LcpLoadDelay;
pub use metric::{Metric, MetricEstimate, MetricKind, MetricValue, PassEstimate};
