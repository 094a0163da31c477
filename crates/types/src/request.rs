//! Normalized network request records.
//!
//! A [`NetworkRequest`] is one observed fetch from a devtools protocol log,
//! already flattened by the gathering layer: redirects are separate records
//! linked by id, and the timing breakdown keeps the protocol's `-1`
//! sentinel for sub-phases that were not observed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Devtools-assigned request identifier.
///
/// Opaque and unique within one request log. Redirect hops share a prefix
/// in practice (`"1000.1:redirect"`) but no structure is assumed here.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chrome resource fetch priority, lowest to highest.
///
/// The derived ordering is used for network admission: a `VeryHigh` request
/// is admitted to a free connection before a `Low` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RequestPriority {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RequestPriority {
    /// True for the two lowest levels, which several metric predicates
    /// treat as deferrable.
    pub fn is_low(self) -> bool {
        matches!(self, RequestPriority::VeryLow | RequestPriority::Low)
    }
}

/// Coarse resource classification from the devtools log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Document,
    Script,
    Stylesheet,
    Image,
    Font,
    Media,
    Xhr,
    Fetch,
    Other,
}

/// Connection-level timing sub-phases for one request, in milliseconds
/// relative to the request's send.
///
/// The devtools protocol reports `-1` for phases that did not happen or
/// were not measured (reused connections, proxies, unfinished requests).
/// Accessors return `None` for sentinel values so callers cannot misread
/// a sentinel as a duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingBreakdown {
    pub dns_start: f64,
    pub dns_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub ssl_start: f64,
    pub ssl_end: f64,
    pub send_start: f64,
    pub send_end: f64,
    /// Offset at which response headers finished arriving.
    pub receive_headers_end: f64,
}

impl Default for TimingBreakdown {
    fn default() -> Self {
        Self {
            dns_start: -1.0,
            dns_end: -1.0,
            connect_start: -1.0,
            connect_end: -1.0,
            ssl_start: -1.0,
            ssl_end: -1.0,
            send_start: -1.0,
            send_end: -1.0,
            receive_headers_end: -1.0,
        }
    }
}

fn observed(value: f64) -> Option<f64> {
    (value.is_finite() && value >= 0.0).then_some(value)
}

impl TimingBreakdown {
    /// TCP handshake span, when both endpoints were observed.
    pub fn connect_span(&self) -> Option<f64> {
        let start = observed(self.connect_start)?;
        let end = observed(self.connect_end)?;
        (end >= start).then_some(end - start)
    }

    /// TLS negotiation span, when both endpoints were observed.
    pub fn ssl_span(&self) -> Option<f64> {
        let start = observed(self.ssl_start)?;
        let end = observed(self.ssl_end)?;
        (end >= start).then_some(end - start)
    }

    pub fn ssl_start_observed(&self) -> Option<f64> {
        observed(self.ssl_start)
    }

    pub fn ssl_end_observed(&self) -> Option<f64> {
        observed(self.ssl_end)
    }

    pub fn connect_start_observed(&self) -> Option<f64> {
        observed(self.connect_start)
    }

    pub fn connect_end_observed(&self) -> Option<f64> {
        observed(self.connect_end)
    }

    pub fn send_start_observed(&self) -> Option<f64> {
        observed(self.send_start)
    }

    pub fn send_end_observed(&self) -> Option<f64> {
        observed(self.send_end)
    }

    pub fn receive_headers_end_observed(&self) -> Option<f64> {
        observed(self.receive_headers_end)
    }
}

/// One normalized network request record.
///
/// Times are milliseconds relative to the navigation time origin. Sizes
/// are bytes: `transfer_size` is what crossed the wire (compressed,
/// including headers), `resource_size` is the decoded body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub request_id: RequestId,
    pub url: String,
    /// Security origin, `scheme://host[:port]`.
    pub origin: String,
    /// Negotiated protocol: `"http/1.1"`, `"h2"`, `"h3"`, `"data"`, ...
    pub protocol: String,
    pub priority: RequestPriority,
    pub resource_type: ResourceType,
    pub transfer_size: u64,
    pub resource_size: u64,
    /// Observed fetch start, ms from time origin.
    pub network_request_time: f64,
    /// Observed fetch end, ms from time origin.
    pub network_end_time: f64,
    #[serde(default)]
    pub timing: Option<TimingBreakdown>,
    /// URL of the resource that triggered this fetch, when known.
    #[serde(default)]
    pub initiator_url: Option<String>,
    /// Request that triggered this fetch, when the log links it directly.
    #[serde(default)]
    pub initiator_request_id: Option<RequestId>,
    /// Previous hop when this record is the target of a redirect.
    #[serde(default)]
    pub redirect_source: Option<RequestId>,
    /// Next hop when this record was redirected.
    #[serde(default)]
    pub redirect_destination: Option<RequestId>,
    /// Observed socket id; 0 when the protocol did not report one.
    #[serde(default)]
    pub connection_id: u32,
    /// Whether the observed fetch reused an already-open connection.
    #[serde(default)]
    pub connection_reused: bool,
    #[serde(default)]
    pub from_disk_cache: bool,
}

impl NetworkRequest {
    /// Hostname portion of the origin, for DNS bookkeeping.
    pub fn host(&self) -> &str {
        let rest = match self.origin.find("://") {
            Some(idx) => &self.origin[idx + 3..],
            None => self.origin.as_str(),
        };
        match rest.rfind(':') {
            Some(idx) => &rest[..idx],
            None => rest,
        }
    }

    /// True when the origin requires a TLS handshake.
    pub fn is_tls(&self) -> bool {
        self.origin.starts_with("https://") || self.origin.starts_with("wss://")
    }

    /// True when the request was multiplexed over HTTP/2 or later.
    pub fn is_h2(&self) -> bool {
        self.protocol == "h2" || self.protocol.starts_with("h3")
    }

    /// True for schemes that never touch the network (`data:`, `blob:`,
    /// `about:`, extension pages).
    pub fn is_non_network_protocol(&self) -> bool {
        matches!(
            self.protocol.as_str(),
            "data" | "blob" | "about" | "filesystem" | "chrome-extension" | "file"
        )
    }

    /// The observed wall-clock duration of the fetch.
    pub fn observed_duration(&self) -> f64 {
        (self.network_end_time - self.network_request_time).max(0.0)
    }

    /// Whether the browser would hold rendering for this request.
    ///
    /// `VeryHigh` requests always qualify; `High` qualifies for scripts
    /// and documents, which the parser blocks on.
    pub fn is_render_blocking_priority(&self) -> bool {
        match self.priority {
            RequestPriority::VeryHigh => true,
            RequestPriority::High => matches!(
                self.resource_type,
                ResourceType::Script | ResourceType::Document
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_to(origin: &str, protocol: &str) -> NetworkRequest {
        NetworkRequest {
            request_id: RequestId::new("1"),
            url: format!("{origin}/index.html"),
            origin: origin.to_string(),
            protocol: protocol.to_string(),
            priority: RequestPriority::VeryHigh,
            resource_type: ResourceType::Document,
            transfer_size: 1024,
            resource_size: 4096,
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
        }
    }

    #[test]
    fn host_strips_scheme_and_port() {
        assert_eq!(request_to("https://example.com", "h2").host(), "example.com");
        assert_eq!(
            request_to("https://example.com:8443", "h2").host(),
            "example.com"
        );
        assert_eq!(request_to("http://localhost:8080", "http/1.1").host(), "localhost");
    }

    #[test]
    fn tls_detection_follows_scheme() {
        assert!(request_to("https://example.com", "h2").is_tls());
        assert!(!request_to("http://example.com", "http/1.1").is_tls());
    }

    #[test]
    fn priority_ordering_is_low_to_high() {
        assert!(RequestPriority::VeryLow < RequestPriority::Low);
        assert!(RequestPriority::Low < RequestPriority::Medium);
        assert!(RequestPriority::Medium < RequestPriority::High);
        assert!(RequestPriority::High < RequestPriority::VeryHigh);
        assert!(RequestPriority::Low.is_low());
        assert!(!RequestPriority::Medium.is_low());
    }

    #[test]
    fn render_blocking_priority_rules() {
        let mut req = request_to("https://example.com", "h2");
        assert!(req.is_render_blocking_priority());

        req.priority = RequestPriority::High;
        req.resource_type = ResourceType::Script;
        assert!(req.is_render_blocking_priority());

        req.resource_type = ResourceType::Image;
        assert!(!req.is_render_blocking_priority());

        req.priority = RequestPriority::Low;
        req.resource_type = ResourceType::Script;
        assert!(!req.is_render_blocking_priority());
    }

    #[test]
    fn timing_sentinels_read_as_none() {
        let timing = TimingBreakdown::default();
        assert_eq!(timing.connect_span(), None);
        assert_eq!(timing.ssl_span(), None);
        assert_eq!(timing.send_start_observed(), None);

        let timing = TimingBreakdown {
            connect_start: 10.0,
            connect_end: 40.0,
            ssl_start: 25.0,
            ssl_end: 40.0,
            ..TimingBreakdown::default()
        };
        assert_eq!(timing.connect_span(), Some(30.0));
        assert_eq!(timing.ssl_span(), Some(15.0));
    }

    #[test]
    fn timing_rejects_inverted_spans() {
        let timing = TimingBreakdown {
            connect_start: 40.0,
            connect_end: 10.0,
            ..TimingBreakdown::default()
        };
        assert_eq!(timing.connect_span(), None);
    }

    #[test]
    fn request_roundtrips_through_json() {
        let req = request_to("https://example.com", "h2");
        let json = serde_json::to_string(&req).unwrap();
        let back: NetworkRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }
}
