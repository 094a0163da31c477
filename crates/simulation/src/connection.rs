//! TCP connection model: handshake latency, slow-start growth, and H2 reuse.

/// Bytes carried per TCP segment (MSS).
pub const TCP_SEGMENT_SIZE_BYTES: f64 = 1460.0;

/// Segments in flight before the first ACK arrives.
const INITIAL_CONGESTION_WINDOW_SEGMENTS: f64 = 10.0;

/// Handshake breakdown for the slice in which a download finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionTiming {
    /// Time spent resolving the host, zero on a warm connection.
    pub dns_resolution_ms: f64,
    /// TCP handshake plus request dispatch, net of DNS.
    pub connect_ms: f64,
    /// TLS negotiation round trip, absent on plaintext or warm connections.
    pub ssl_ms: Option<f64>,
    /// Total latency until the first response byte.
    pub time_to_first_byte_ms: f64,
}

/// Outcome of simulating a download for a bounded amount of time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Full round trips consumed, including handshake trips.
    pub round_trips: u32,
    /// Milliseconds elapsed within this slice.
    pub time_elapsed_ms: f64,
    /// Bytes of the requested payload downloaded, capped at the request size.
    pub bytes_downloaded: f64,
    /// Bytes downloaded beyond the payload; only H2 connections carry these
    /// forward to the next request on the same connection.
    pub extra_bytes_downloaded: f64,
    /// Congestion window after this slice, in segments.
    pub congestion_window: f64,
    /// Handshake breakdown observed during this slice.
    pub timing: ConnectionTiming,
}

/// A single simulated TCP connection.
///
/// The download math mirrors classic slow start: the congestion window
/// doubles each round trip until it reaches the bandwidth-delay product,
/// and the first window of bytes arrives while the time-to-first-byte
/// clock is still running. State that persists across requests on the
/// same connection (warmth, the window, H2 overflow bytes) is mutated by
/// the scheduler between slices; `simulate_download_until` itself is pure.
#[derive(Debug, Clone)]
pub struct TcpConnection {
    rtt_ms: f64,
    throughput_bytes_per_sec: f64,
    server_latency_ms: f64,
    tls: bool,
    h2: bool,
    warmed: bool,
    congestion_window: f64,
    h2_overflow_bytes_downloaded: f64,
}

impl TcpConnection {
    pub fn new(
        rtt_ms: f64,
        throughput_bytes_per_sec: f64,
        server_latency_ms: f64,
        tls: bool,
        h2: bool,
    ) -> Self {
        Self {
            rtt_ms,
            throughput_bytes_per_sec,
            server_latency_ms,
            tls,
            h2,
            warmed: false,
            congestion_window: INITIAL_CONGESTION_WINDOW_SEGMENTS,
            h2_overflow_bytes_downloaded: 0.0,
        }
    }

    /// Number of connections a link can keep saturated at once: each
    /// connection moves one segment per round trip, so more connections
    /// than `throughput / (segment_size * trips_per_second)` would starve.
    pub fn maximum_saturated_connections(rtt_ms: f64, throughput_bytes_per_sec: f64) -> usize {
        let round_trips_per_second = 1000.0 / rtt_ms;
        let bytes_per_second_per_connection = TCP_SEGMENT_SIZE_BYTES * round_trips_per_second;
        (throughput_bytes_per_sec / bytes_per_second_per_connection).floor() as usize
    }

    pub fn is_warm(&self) -> bool {
        self.warmed
    }

    pub fn set_warmed(&mut self, warmed: bool) {
        self.warmed = warmed;
    }

    pub fn is_h2(&self) -> bool {
        self.h2
    }

    pub fn congestion_window(&self) -> f64 {
        self.congestion_window
    }

    pub fn set_congestion_window(&mut self, congestion_window: f64) {
        self.congestion_window = congestion_window;
    }

    pub fn set_throughput(&mut self, throughput_bytes_per_sec: f64) {
        self.throughput_bytes_per_sec = throughput_bytes_per_sec;
    }

    pub fn set_h2_overflow_bytes_downloaded(&mut self, bytes: f64) {
        self.h2_overflow_bytes_downloaded = bytes;
    }

    /// Largest congestion window the link can sustain, in segments.
    fn maximum_congestion_window_in_segments(&self) -> f64 {
        let bytes_per_round_trip = self.throughput_bytes_per_sec * (self.rtt_ms / 1000.0);
        (bytes_per_round_trip / TCP_SEGMENT_SIZE_BYTES).floor()
    }

    /// Simulates downloading `bytes_to_download` starting from
    /// `time_already_elapsed_ms` into the request, stopping once
    /// `maximum_time_to_elapse_ms` of new time has passed. Pass
    /// `f64::INFINITY` to run to completion.
    pub fn simulate_download_until(
        &self,
        bytes_to_download: f64,
        time_already_elapsed_ms: f64,
        maximum_time_to_elapse_ms: f64,
        dns_resolution_time_ms: f64,
    ) -> DownloadProgress {
        let mut bytes_to_download = bytes_to_download;
        if self.warmed && self.h2 {
            bytes_to_download -= self.h2_overflow_bytes_downloaded;
        }

        let two_way_latency_ms = self.rtt_ms;
        let one_way_latency_ms = two_way_latency_ms / 2.0;

        let handshake_and_request_ms = if self.warmed {
            one_way_latency_ms
        } else {
            // DNS, then SYN / SYN-ACK / ACK carrying the request, then a
            // full round trip of TLS negotiation when applicable.
            dns_resolution_time_ms
                + one_way_latency_ms * 3.0
                + if self.tls { two_way_latency_ms } else { 0.0 }
        };

        let mut round_trips = (handshake_and_request_ms / two_way_latency_ms).ceil();
        let mut time_to_first_byte_ms =
            handshake_and_request_ms + self.server_latency_ms + one_way_latency_ms;
        if self.warmed && self.h2 {
            time_to_first_byte_ms = 0.0;
        }

        let timing = if self.warmed {
            ConnectionTiming {
                dns_resolution_ms: 0.0,
                connect_ms: 0.0,
                ssl_ms: None,
                time_to_first_byte_ms,
            }
        } else {
            ConnectionTiming {
                dns_resolution_ms: dns_resolution_time_ms,
                connect_ms: handshake_and_request_ms - dns_resolution_time_ms,
                ssl_ms: self.tls.then_some(two_way_latency_ms),
                time_to_first_byte_ms,
            }
        };

        let time_elapsed_for_ttfb_ms = (time_to_first_byte_ms - time_already_elapsed_ms).max(0.0);
        let maximum_download_time_ms = maximum_time_to_elapse_ms - time_elapsed_for_ttfb_ms;

        let mut congestion_window = self.congestion_window;
        let maximum_congestion_window = self.maximum_congestion_window_in_segments();

        // The first window arrives while the TTFB clock is still running.
        // When resuming past TTFB it was already accounted for.
        let mut total_bytes_downloaded = 0.0;
        if time_elapsed_for_ttfb_ms > 0.0 {
            total_bytes_downloaded = congestion_window * TCP_SEGMENT_SIZE_BYTES;
        } else {
            round_trips = 0.0;
        }

        let mut download_time_elapsed_ms = 0.0;
        let mut bytes_remaining = bytes_to_download - total_bytes_downloaded;
        while bytes_remaining > 0.0 && download_time_elapsed_ms <= maximum_download_time_ms {
            round_trips += 1.0;
            download_time_elapsed_ms += two_way_latency_ms;
            congestion_window = (congestion_window * 2.0)
                .min(maximum_congestion_window)
                .max(1.0);

            let bytes_in_window = congestion_window * TCP_SEGMENT_SIZE_BYTES;
            total_bytes_downloaded += bytes_in_window;
            bytes_remaining -= bytes_in_window;
        }

        let time_elapsed_ms = time_elapsed_for_ttfb_ms + download_time_elapsed_ms;
        let extra_bytes_downloaded = if self.h2 {
            (total_bytes_downloaded - bytes_to_download).max(0.0)
        } else {
            0.0
        };
        let bytes_downloaded = total_bytes_downloaded.min(bytes_to_download).max(0.0);

        DownloadProgress {
            round_trips: round_trips as u32,
            time_elapsed_ms,
            bytes_downloaded,
            extra_bytes_downloaded,
            congestion_window,
            timing,
        }
    }
}
