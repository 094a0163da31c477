//! RTT, throughput, and server-latency estimation.

use crate::error::AnalysisError;
use lampion_types::{NetworkRequest, RequestId, ResourceType};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Synthetic origin aggregating every observed origin. Lookup fallback for
/// origins the log never measured directly.
pub const SUMMARY_ORIGIN: &str = "__SUMMARY__";

/// Transfers at or below the initial congestion window finish in one round
/// trip and tell us nothing about sustained latency.
const INITIAL_CONGESTION_WINDOW_BYTES: f64 = 14.0 * 1024.0;

/// An RTT estimate never goes below this. Degenerate logs otherwise
/// produce zero and disable congestion modeling downstream.
const MINIMUM_RTT_MS: f64 = 3.0;

/// Per-origin sample sets keyed by origin string.
type Estimates = BTreeMap<String, Vec<f64>>;

/// What the simulator consumes: base RTT, link throughput, and per-origin
/// adjustments on top of the base.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkAnalysis {
    /// Minimum observed round trip across all origins, milliseconds.
    pub rtt_ms: f64,
    /// Observed link throughput in bytes per second. Infinite when the log
    /// contains no complete downloads.
    pub throughput_bytes_per_sec: f64,
    /// Extra round-trip latency per origin beyond the base RTT.
    pub additional_rtt_by_origin: BTreeMap<String, f64>,
    /// Median estimated server think-time per origin, milliseconds.
    pub server_response_time_by_origin: BTreeMap<String, f64>,
}

/// Distribution summary of one origin's samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
}

impl Summary {
    fn from_values(values: &mut [f64]) -> Option<Summary> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        let len = values.len();
        let median = if len % 2 == 0 {
            (values[len / 2 - 1] + values[len / 2]) / 2.0
        } else {
            values[len / 2]
        };
        Some(Summary {
            min: values[0],
            max: values[len - 1],
            avg: values.iter().sum::<f64>() / len as f64,
            median,
        })
    }
}

/// Knobs for [`estimate_rtt_by_origin`]. Defaults mirror production use;
/// the switches exist so tests can isolate a single estimation method.
#[derive(Debug, Clone, Copy)]
pub struct RttEstimateOptions {
    /// Ignore connection timing even when present.
    pub force_coarse_estimates: bool,
    /// Coarse estimates include noise from scheduling and server time, so
    /// they get deflated by this factor.
    pub coarse_estimate_multiplier: f64,
    pub use_download_estimates: bool,
    pub use_send_start_estimates: bool,
    pub use_headers_end_estimates: bool,
}

impl Default for RttEstimateOptions {
    fn default() -> Self {
        Self {
            force_coarse_estimates: false,
            coarse_estimate_multiplier: 0.3,
            use_download_estimates: true,
            use_send_start_estimates: true,
            use_headers_end_estimates: true,
        }
    }
}

/// Full analysis of an observed log.
pub fn analyze(records: &[Arc<NetworkRequest>]) -> Result<NetworkAnalysis, AnalysisError> {
    let rtt_summaries = estimate_rtt_by_origin(records, &RttEstimateOptions::default())?;
    let rtt_by_origin: BTreeMap<String, f64> = rtt_summaries
        .iter()
        .map(|(origin, summary)| (origin.clone(), summary.min))
        .collect();
    let minimum_rtt = rtt_by_origin
        .values()
        .fold(f64::INFINITY, |a, &b| a.min(b));

    let response_summaries = estimate_server_response_time_by_origin(records, &rtt_by_origin);

    let mut additional_rtt_by_origin = BTreeMap::new();
    let mut server_response_time_by_origin = BTreeMap::new();
    for (origin, summary) in &response_summaries {
        let origin_rtt = rtt_by_origin.get(origin).copied().unwrap_or(minimum_rtt);
        additional_rtt_by_origin.insert(origin.clone(), origin_rtt - minimum_rtt);
        server_response_time_by_origin.insert(origin.clone(), summary.median);
    }

    let throughput_bytes_per_sec = estimate_throughput(records);
    debug!(
        rtt_ms = minimum_rtt,
        throughput_bytes_per_sec,
        origins = additional_rtt_by_origin.len(),
        "Analyzed devtools log"
    );
    Ok(NetworkAnalysis {
        rtt_ms: minimum_rtt,
        throughput_bytes_per_sec,
        additional_rtt_by_origin,
        server_response_time_by_origin,
    })
}

/// Per-origin RTT summaries, preferring connection sub-phase timing and
/// falling back to coarse heuristics when none of it survived.
pub fn estimate_rtt_by_origin(
    records: &[Arc<NetworkRequest>],
    options: &RttEstimateOptions,
) -> Result<BTreeMap<String, Summary>, AnalysisError> {
    let reused = estimate_connection_reuse(records, false);

    let mut estimates = rtt_via_connect_timing(records, &reused);
    if estimates.is_empty() || options.force_coarse_estimates {
        debug!("No usable connection timing; falling back to coarse RTT estimates");
        estimates.clear();
        if options.use_download_estimates {
            merge(&mut estimates, rtt_via_download_timing(records, &reused));
        }
        if options.use_send_start_estimates {
            merge(&mut estimates, rtt_via_send_start(records, &reused));
        }
        if options.use_headers_end_estimates {
            merge(&mut estimates, rtt_via_headers_end(records, &reused));
        }
        for samples in estimates.values_mut() {
            for sample in samples.iter_mut() {
                *sample *= options.coarse_estimate_multiplier;
            }
        }
    }

    if estimates.is_empty() {
        return Err(AnalysisError::NoTimingData);
    }
    Ok(summarize(estimates))
}

/// Per-origin server think-time summaries: TTFB minus the origin's round
/// trip, floored at zero.
pub fn estimate_server_response_time_by_origin(
    records: &[Arc<NetworkRequest>],
    rtt_by_origin: &BTreeMap<String, f64>,
) -> BTreeMap<String, Summary> {
    let mut estimates = Estimates::new();
    for record in records {
        let Some(timing) = &record.timing else {
            continue;
        };
        let (Some(send_end), Some(headers_end)) =
            (timing.send_end_observed(), timing.receive_headers_end_observed())
        else {
            continue;
        };
        let ttfb = headers_end - send_end;
        let rtt = rtt_by_origin
            .get(&record.origin)
            .or_else(|| rtt_by_origin.get(SUMMARY_ORIGIN))
            .copied()
            .unwrap_or(0.0);
        push_sample(&mut estimates, &record.origin, (ttfb - rtt).max(0.0));
    }
    summarize(estimates)
}

/// Observed link throughput in bytes per second.
///
/// Bytes are summed over the union of download intervals, so concurrent
/// downloads are not double counted. Infinite when nothing downloaded.
pub fn estimate_throughput(records: &[Arc<NetworkRequest>]) -> f64 {
    let mut total_bytes = 0u64;
    let mut boundaries: Vec<(f64, bool)> = Vec::new();
    for record in records {
        if record.is_non_network_protocol() || record.transfer_size == 0 {
            continue;
        }
        let start = record.network_request_time
            + record
                .timing
                .as_ref()
                .and_then(|t| t.receive_headers_end_observed())
                .unwrap_or(0.0);
        let end = record.network_end_time;
        if !start.is_finite() || !end.is_finite() || end < start {
            continue;
        }
        total_bytes += record.transfer_size;
        boundaries.push((start, true));
        boundaries.push((end, false));
    }
    if boundaries.is_empty() {
        return f64::INFINITY;
    }
    boundaries.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut in_flight = 0u32;
    let mut current_start = 0.0;
    let mut duration_ms = 0.0;
    for (time, is_start) in boundaries {
        if is_start {
            if in_flight == 0 {
                current_start = time;
            }
            in_flight += 1;
        } else {
            in_flight -= 1;
            if in_flight == 0 {
                duration_ms += time - current_start;
            }
        }
    }
    if duration_ms <= 0.0 {
        return f64::INFINITY;
    }
    total_bytes as f64 * 1000.0 / duration_ms
}

/// Whether each request reused an existing connection.
///
/// Connection ids from the protocol are trusted when they look coherent:
/// more than one id in play and every id's first use marked fresh.
/// Otherwise reuse is inferred per origin: the first request is fresh,
/// anything starting after the first response ended may reuse, and H2
/// multiplexes everything after the first.
pub fn estimate_connection_reuse(
    records: &[Arc<NetworkRequest>],
    force_coarse: bool,
) -> HashMap<RequestId, bool> {
    if !force_coarse {
        let connection_ids: HashSet<u32> =
            records.iter().map(|record| record.connection_id).collect();
        let mut id_was_started: HashMap<u32, bool> = HashMap::new();
        for record in records {
            let started = id_was_started
                .get(&record.connection_id)
                .copied()
                .unwrap_or(false)
                || !record.connection_reused;
            id_was_started.insert(record.connection_id, started);
        }
        if connection_ids.len() > 1 && id_was_started.values().all(|&started| started) {
            return records
                .iter()
                .map(|record| (record.request_id.clone(), record.connection_reused))
                .collect();
        }
    }

    let mut reused = HashMap::new();
    for origin_records in group_by_origin(records).values() {
        let earliest_reuse_possible = origin_records
            .iter()
            .map(|record| record.network_end_time)
            .fold(f64::INFINITY, f64::min);

        for record in origin_records {
            let can_reuse =
                record.network_request_time >= earliest_reuse_possible || record.protocol == "h2";
            reused.insert(record.request_id.clone(), can_reuse);
        }

        if let Some(first) = origin_records.iter().min_by(|a, b| {
            a.network_request_time.total_cmp(&b.network_request_time)
        }) {
            reused.insert(first.request_id.clone(), false);
        }
    }
    reused
}

// ─── RTT estimators ───

/// An SSL handshake yields two samples, one for the TLS negotiation and
/// one for the TCP handshake underneath it. SSL can take more than one
/// round trip but we assume false start.
fn rtt_via_connect_timing(
    records: &[Arc<NetworkRequest>],
    reused: &HashMap<RequestId, bool>,
) -> Estimates {
    let mut estimates = Estimates::new();
    for record in records {
        if was_reused(reused, record) {
            continue;
        }
        let Some(timing) = &record.timing else {
            continue;
        };
        match (
            timing.ssl_start_observed(),
            timing.ssl_end_observed(),
            timing.connect_start_observed(),
            timing.connect_end_observed(),
        ) {
            (Some(ssl_start), Some(_), Some(connect_start), Some(connect_end)) => {
                push_sample(&mut estimates, &record.origin, connect_end - ssl_start);
                push_sample(&mut estimates, &record.origin, ssl_start - connect_start);
            }
            (None, _, Some(connect_start), Some(connect_end)) => {
                push_sample(&mut estimates, &record.origin, connect_end - connect_start);
            }
            _ => {}
        }
    }
    estimates
}

/// Download time past the first congestion window, amortized over the
/// doubling round trips it took to move that many bytes.
fn rtt_via_download_timing(
    records: &[Arc<NetworkRequest>],
    reused: &HashMap<RequestId, bool>,
) -> Estimates {
    let mut estimates = Estimates::new();
    for record in records {
        if was_reused(reused, record) {
            continue;
        }
        let Some(timing) = &record.timing else {
            continue;
        };
        if record.transfer_size as f64 <= INITIAL_CONGESTION_WINDOW_BYTES {
            continue;
        }
        if timing.send_end_observed().is_none() {
            continue;
        }
        let Some(headers_end) = timing.receive_headers_end_observed() else {
            continue;
        };

        let total_time = record.network_end_time - record.network_request_time;
        let download_after_first_byte = total_time - headers_end;
        let round_trips = (record.transfer_size as f64 / INITIAL_CONGESTION_WINDOW_BYTES).log2();
        // Past a handful of round trips bandwidth dominates latency.
        if round_trips > 5.0 {
            continue;
        }
        push_sample(
            &mut estimates,
            &record.origin,
            download_after_first_byte / round_trips,
        );
    }
    estimates
}

/// Everything before `sendStart` is DNS plus the handshakes, so divide by
/// the number of round trips those take.
fn rtt_via_send_start(
    records: &[Arc<NetworkRequest>],
    reused: &HashMap<RequestId, bool>,
) -> Estimates {
    let mut estimates = Estimates::new();
    for record in records {
        if was_reused(reused, record) {
            continue;
        }
        let Some(send_start) = record
            .timing
            .as_ref()
            .and_then(|t| t.send_start_observed())
        else {
            continue;
        };

        let mut round_trips = 1.0;
        if !record.protocol.starts_with("h3") {
            round_trips += 1.0; // TCP handshake
        }
        if record.is_tls() {
            round_trips += 1.0; // TLS negotiation
        }
        push_sample(&mut estimates, &record.origin, send_start / round_trips);
    }
    estimates
}

/// TTFB minus the share of it we expect the server spent thinking,
/// divided by the round trips in front of the response.
fn rtt_via_headers_end(
    records: &[Arc<NetworkRequest>],
    reused: &HashMap<RequestId, bool>,
) -> Estimates {
    let mut estimates = Estimates::new();
    for record in records {
        let Some(headers_end) = record
            .timing
            .as_ref()
            .and_then(|t| t.receive_headers_end_observed())
        else {
            continue;
        };

        let server_share = server_response_share(record.resource_type);
        let estimated_server_time = headers_end * server_share;

        let mut round_trips = 1.0; // the request itself
        if !was_reused(reused, record) {
            round_trips += 1.0; // TCP handshake
            if record.is_tls() {
                round_trips += 1.0; // TLS negotiation
            }
        }
        push_sample(
            &mut estimates,
            &record.origin,
            ((headers_end - estimated_server_time) / round_trips).max(MINIMUM_RTT_MS),
        );
    }
    estimates
}

/// Share of TTFB attributable to server think-time. Dynamic responses
/// spend most of their TTFB in application code.
fn server_response_share(resource_type: ResourceType) -> f64 {
    match resource_type {
        ResourceType::Document | ResourceType::Xhr | ResourceType::Fetch => 0.9,
        _ => 0.4,
    }
}

// ─── Helpers ───

fn was_reused(reused: &HashMap<RequestId, bool>, record: &NetworkRequest) -> bool {
    reused.get(&record.request_id).copied().unwrap_or(false)
}

fn group_by_origin(records: &[Arc<NetworkRequest>]) -> BTreeMap<&str, Vec<&Arc<NetworkRequest>>> {
    let mut grouped: BTreeMap<&str, Vec<&Arc<NetworkRequest>>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.origin.as_str()).or_default().push(record);
    }
    grouped
}

/// Samples that are not finite non-negative numbers are dropped rather
/// than poisoning a minimum.
fn push_sample(estimates: &mut Estimates, origin: &str, value: f64) {
    if value.is_finite() && value >= 0.0 {
        estimates.entry(origin.to_string()).or_default().push(value);
    }
}

fn merge(into: &mut Estimates, from: Estimates) {
    for (origin, samples) in from {
        into.entry(origin).or_default().extend(samples);
    }
}

/// Per-origin summaries plus the [`SUMMARY_ORIGIN`] aggregate over every
/// sample.
fn summarize(estimates: Estimates) -> BTreeMap<String, Summary> {
    let mut summaries = BTreeMap::new();
    let mut all_samples = Vec::new();
    for (origin, mut samples) in estimates {
        all_samples.extend_from_slice(&samples);
        if let Some(summary) = Summary::from_values(&mut samples) {
            summaries.insert(origin, summary);
        }
    }
    if let Some(summary) = Summary::from_values(&mut all_samples) {
        summaries.insert(SUMMARY_ORIGIN.to_string(), summary);
    }
    summaries
}
