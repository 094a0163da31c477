//! Fixture builders shared by Lampion integration tests.
//!
//! [`PageFixture`] provides a small, internally consistent page load:
//! the records link into a well-formed dependency graph, the CPU tasks
//! attribute to real script URLs, and the trace summary's paint events
//! land after the requests that produce them. Tests that only need a
//! record or two use the chainable [`request`]/[`task`] builders instead.
//!
//! # Example
//!
//! ```rust
//! use lampion_test_helpers::PageFixture;
//!
//! let fixture = PageFixture::simple();
//! let graph = fixture.graph();
//! assert_eq!(graph.root_node().id().as_str(), "1");
//! assert!(graph.len() > 4);
//! ```

pub mod builders;

pub use builders::{request, task, RequestBuilder, TaskBuilder};

use std::sync::Arc;

use lampion_graph::{build_graph, DependencyGraph};
use lampion_types::{
    CpuTask, NetworkRequest, RequestPriority, ResourceType, TaskGroup, TimingBreakdown,
    TraceSummary,
};

/// A canonical single-navigation fixture: document, stylesheet, script,
/// LCP hero image, and the main-thread work the script causes.
#[derive(Debug, Clone)]
pub struct PageFixture {
    pub records: Vec<Arc<NetworkRequest>>,
    pub tasks: Vec<Arc<CpuTask>>,
    pub trace: TraceSummary,
}

impl PageFixture {
    /// Single-origin page over one H2 connection.
    ///
    /// Observed schedule: document 0-500, stylesheet and script start at
    /// 500 when the document lands, the hero image finishes at 1400 and
    /// paints as LCP at 1450.
    pub fn simple() -> Self {
        let document_url = "https://example.com/";
        let script_url = "https://example.com/app.js";
        let image_url = "https://example.com/hero.png";

        let records = vec![
            request("1")
                .url(document_url)
                .resource_type(ResourceType::Document)
                .priority(RequestPriority::VeryHigh)
                .transfer_size(20_000)
                .resource_size(60_000)
                .window(0.0, 500.0)
                .timing(document_timing())
                .build(),
            request("2")
                .url("https://example.com/style.css")
                .resource_type(ResourceType::Stylesheet)
                .priority(RequestPriority::VeryHigh)
                .transfer_size(5_000)
                .resource_size(15_000)
                .window(500.0, 700.0)
                .initiated_by_url(document_url)
                .build(),
            request("3")
                .url(script_url)
                .resource_type(ResourceType::Script)
                .priority(RequestPriority::High)
                .transfer_size(50_000)
                .resource_size(150_000)
                .window(500.0, 900.0)
                .initiated_by_url(document_url)
                .build(),
            request("4")
                .url(image_url)
                .resource_type(ResourceType::Image)
                .priority(RequestPriority::High)
                .transfer_size(120_000)
                .resource_size(120_000)
                .window(900.0, 1400.0)
                .initiated_by_url(document_url)
                .build(),
        ];

        let tasks = vec![
            task(900.0, 1100.0)
                .group(TaskGroup::ScriptEvaluation)
                .urls(&[script_url])
                .build(),
            task(1100.0, 1200.0).group(TaskGroup::Layout).build(),
        ];

        let trace = TraceSummary {
            time_origin: 250_000.0,
            first_contentful_paint: 800.0,
            largest_contentful_paint: Some(1450.0),
            lcp_image_url: Some(image_url.to_string()),
        };

        Self {
            records,
            tasks,
            trace,
        }
    }

    /// [`PageFixture::simple`] plus a render-blocking font stylesheet from
    /// a CDN origin with its own connect timing, so network analysis sees
    /// two origins with different round-trip characteristics.
    pub fn cross_origin() -> Self {
        let mut fixture = Self::simple();
        fixture.records.push(
            request("5")
                .url("https://cdn.example.com/fonts.css")
                .resource_type(ResourceType::Stylesheet)
                .priority(RequestPriority::VeryHigh)
                .transfer_size(3_000)
                .resource_size(8_000)
                .window(520.0, 820.0)
                .initiated_by_url("https://example.com/")
                .connection(2, false)
                .timing(cdn_timing())
                .build(),
        );
        fixture
    }

    /// Builds the dependency graph for this fixture's records and tasks.
    pub fn graph(&self) -> DependencyGraph {
        build_graph(&self.records, &self.tasks).expect("fixture graph builds")
    }

    pub fn document_url(&self) -> &str {
        &self.records[0].url
    }

    pub fn lcp_image_url(&self) -> Option<&str> {
        self.trace.lcp_image_url.as_deref()
    }
}

/// Connect timing for the document origin: 50ms RTT, 30ms server latency.
fn document_timing() -> TimingBreakdown {
    TimingBreakdown {
        dns_start: 0.0,
        dns_end: 10.0,
        connect_start: 10.0,
        connect_end: 110.0,
        ssl_start: 60.0,
        ssl_end: 110.0,
        send_start: 110.0,
        send_end: 115.0,
        receive_headers_end: 195.0,
    }
}

/// Connect timing for the CDN origin: 80ms RTT, 20ms server latency.
fn cdn_timing() -> TimingBreakdown {
    TimingBreakdown {
        dns_start: 0.0,
        dns_end: 15.0,
        connect_start: 15.0,
        connect_end: 175.0,
        ssl_start: 95.0,
        ssl_end: 175.0,
        send_start: 175.0,
        send_end: 180.0,
        receive_headers_end: 280.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lampion_graph::NodeId;

    #[test]
    fn simple_fixture_builds_a_connected_graph() {
        let fixture = PageFixture::simple();
        let graph = fixture.graph();

        // 4 requests + 2 CPU tasks, all reachable from the root.
        assert_eq!(graph.len(), 6);
        assert_eq!(graph.traverse_order().len(), 6);
        assert!(graph.root_node().is_main_document());
    }

    #[test]
    fn script_task_depends_on_the_script_request() {
        let fixture = PageFixture::simple();
        let graph = fixture.graph();

        let script = graph.index_of(&NodeId::new("3")).unwrap();
        let eval = graph.index_of(&NodeId::new("cpu-0")).unwrap();
        assert!(graph.node(eval).dependencies().contains(&script));
    }

    #[test]
    fn cross_origin_fixture_adds_a_second_origin() {
        let fixture = PageFixture::cross_origin();
        let origins: std::collections::BTreeSet<&str> = fixture
            .records
            .iter()
            .map(|record| record.origin.as_str())
            .collect();
        assert_eq!(origins.len(), 2);
        assert_eq!(fixture.graph().traverse_order().len(), 7);
    }
}
