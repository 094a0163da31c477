//! Chainable builders for request and task records.
//!
//! Every field has a sensible default so a test only states what it
//! cares about. Builders hand back `Arc`-wrapped records, which is the
//! shape the graph builder and the engine consume.

use std::sync::Arc;

use lampion_types::{
    CpuTask, NetworkRequest, RequestId, RequestPriority, ResourceType, TaskGroup, TimingBreakdown,
};

/// Start building a network request with the given devtools id.
///
/// # Example
///
/// ```rust
/// use lampion_test_helpers::request;
/// use lampion_types::ResourceType;
///
/// let record = request("1")
///     .url("https://example.com/")
///     .resource_type(ResourceType::Document)
///     .window(0.0, 400.0)
///     .build();
/// assert_eq!(record.origin, "https://example.com");
/// ```
pub fn request(id: &str) -> RequestBuilder {
    RequestBuilder {
        inner: NetworkRequest {
            request_id: RequestId::new(id),
            url: "https://example.com/resource".to_string(),
            origin: "https://example.com".to_string(),
            protocol: "h2".to_string(),
            priority: RequestPriority::Medium,
            resource_type: ResourceType::Script,
            transfer_size: 1000,
            resource_size: 1000,
            network_request_time: 0.0,
            network_end_time: 100.0,
            timing: None,
            initiator_url: None,
            initiator_request_id: None,
            redirect_source: None,
            redirect_destination: None,
            connection_id: 1,
            connection_reused: false,
            from_disk_cache: false,
        },
    }
}

/// Start building a CPU task covering `[start_ms, end_ms)`.
pub fn task(start_ms: f64, end_ms: f64) -> TaskBuilder {
    TaskBuilder {
        inner: CpuTask {
            start_time: start_ms,
            end_time: end_ms,
            attributable_urls: Vec::new(),
            group: TaskGroup::Other,
        },
    }
}

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    inner: NetworkRequest,
}

impl RequestBuilder {
    /// Sets the URL and derives the origin from its scheme and host.
    pub fn url(mut self, url: &str) -> Self {
        self.inner.origin = origin_of(url);
        self.inner.url = url.to_string();
        self
    }

    pub fn protocol(mut self, protocol: &str) -> Self {
        self.inner.protocol = protocol.to_string();
        self
    }

    pub fn priority(mut self, priority: RequestPriority) -> Self {
        self.inner.priority = priority;
        self
    }

    pub fn resource_type(mut self, resource_type: ResourceType) -> Self {
        self.inner.resource_type = resource_type;
        self
    }

    pub fn transfer_size(mut self, bytes: u64) -> Self {
        self.inner.transfer_size = bytes;
        self
    }

    pub fn resource_size(mut self, bytes: u64) -> Self {
        self.inner.resource_size = bytes;
        self
    }

    /// Observed fetch window, ms from the time origin.
    pub fn window(mut self, start_ms: f64, end_ms: f64) -> Self {
        self.inner.network_request_time = start_ms;
        self.inner.network_end_time = end_ms;
        self
    }

    pub fn timing(mut self, timing: TimingBreakdown) -> Self {
        self.inner.timing = Some(timing);
        self
    }

    pub fn initiated_by_url(mut self, url: &str) -> Self {
        self.inner.initiator_url = Some(url.to_string());
        self
    }

    pub fn initiated_by_request(mut self, id: &str) -> Self {
        self.inner.initiator_request_id = Some(RequestId::new(id));
        self
    }

    pub fn redirected_from(mut self, id: &str) -> Self {
        self.inner.redirect_source = Some(RequestId::new(id));
        self
    }

    pub fn redirects_to(mut self, id: &str) -> Self {
        self.inner.redirect_destination = Some(RequestId::new(id));
        self
    }

    pub fn connection(mut self, id: u32, reused: bool) -> Self {
        self.inner.connection_id = id;
        self.inner.connection_reused = reused;
        self
    }

    pub fn from_disk_cache(mut self) -> Self {
        self.inner.from_disk_cache = true;
        self
    }

    pub fn build(self) -> Arc<NetworkRequest> {
        Arc::new(self.inner)
    }
}

#[derive(Debug, Clone)]
pub struct TaskBuilder {
    inner: CpuTask,
}

impl TaskBuilder {
    pub fn group(mut self, group: TaskGroup) -> Self {
        self.inner.group = group;
        self
    }

    /// URLs of the resources this task is attributed to.
    pub fn urls(mut self, urls: &[&str]) -> Self {
        self.inner.attributable_urls = urls.iter().map(|url| url.to_string()).collect();
        self
    }

    pub fn build(self) -> Arc<CpuTask> {
        Arc::new(self.inner)
    }
}

/// `scheme://host[:port]` prefix of a URL, or the scheme alone for
/// non-hierarchical URLs such as `data:`.
fn origin_of(url: &str) -> String {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => url[..scheme_end + 3 + path_start].to_string(),
                None => url.to_string(),
            }
        }
        None => url.split(':').next().unwrap_or(url).to_string(),
    }
}
