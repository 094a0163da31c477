//! Per-origin connection pooling.
//!
//! Connections are created lazily, the first time an origin needs one, and
//! live for the whole run so warmth and congestion-window state carry over
//! between requests. H1 origins may open several parallel connections; an
//! H2 origin multiplexes everything over a single one.

use std::collections::{BTreeMap, HashMap};

use lampion_types::NetworkRequest;

use crate::connection::TcpConnection;
use crate::simulator::SimulatorOptions;

/// Server response latency assumed for origins the analysis saw no
/// samples for.
const DEFAULT_SERVER_RESPONSE_TIME_MS: f64 = 30.0;

/// Identifies one connection within the pool that issued it. Handles stay
/// valid for the lifetime of the pool; connections are never dropped
/// mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    origin: u32,
    slot: u32,
}

#[derive(Debug)]
struct OriginPool {
    connections: Vec<TcpConnection>,
    in_use: Vec<bool>,
    limit: usize,
}

/// Lends connections to network requests, at most `limit` per origin.
#[derive(Debug)]
pub struct ConnectionPool {
    rtt_ms: f64,
    throughput_bytes_per_sec: f64,
    max_connections_per_origin: usize,
    additional_rtt_by_origin: BTreeMap<String, f64>,
    server_response_time_by_origin: BTreeMap<String, f64>,
    origin_index: HashMap<String, usize>,
    origins: Vec<OriginPool>,
}

impl ConnectionPool {
    pub fn new(options: &SimulatorOptions) -> Self {
        Self {
            rtt_ms: options.rtt_ms,
            throughput_bytes_per_sec: options.throughput_bytes_per_sec,
            max_connections_per_origin: options.max_connections_per_origin,
            additional_rtt_by_origin: options.additional_rtt_by_origin.clone(),
            server_response_time_by_origin: options.server_response_time_by_origin.clone(),
            origin_index: HashMap::new(),
            origins: Vec::new(),
        }
    }

    /// Borrows a connection for `request`, preferring the free connection
    /// with the largest congestion window. Returns `None` when the origin
    /// is at its connection limit.
    pub fn acquire(&mut self, request: &NetworkRequest) -> Option<ConnectionHandle> {
        let origin = self.origin_slot(request);
        let rtt_ms = self.rtt_ms
            + self
                .additional_rtt_by_origin
                .get(&request.origin)
                .copied()
                .unwrap_or(0.0);
        let server_latency_ms = self
            .server_response_time_by_origin
            .get(&request.origin)
            .copied()
            .unwrap_or(DEFAULT_SERVER_RESPONSE_TIME_MS);
        let throughput = self.throughput_bytes_per_sec;

        let pool = &mut self.origins[origin];
        let mut best: Option<(usize, f64)> = None;
        for (slot, connection) in pool.connections.iter().enumerate() {
            if pool.in_use[slot] {
                continue;
            }
            let window = connection.congestion_window();
            if best.is_none_or(|(_, best_window)| window > best_window) {
                best = Some((slot, window));
            }
        }

        let slot = match best {
            Some((slot, _)) => slot,
            None => {
                if pool.connections.len() >= pool.limit {
                    return None;
                }
                pool.connections.push(TcpConnection::new(
                    rtt_ms,
                    throughput,
                    server_latency_ms,
                    request.is_tls(),
                    request.is_h2(),
                ));
                pool.in_use.push(false);
                pool.connections.len() - 1
            }
        };

        pool.in_use[slot] = true;
        Some(ConnectionHandle {
            origin: origin as u32,
            slot: slot as u32,
        })
    }

    /// Returns the connection to the pool for reuse by later requests.
    pub fn release(&mut self, handle: ConnectionHandle) {
        self.origins[handle.origin as usize].in_use[handle.slot as usize] = false;
    }

    pub fn connection(&self, handle: ConnectionHandle) -> &TcpConnection {
        &self.origins[handle.origin as usize].connections[handle.slot as usize]
    }

    pub fn connection_mut(&mut self, handle: ConnectionHandle) -> &mut TcpConnection {
        &mut self.origins[handle.origin as usize].connections[handle.slot as usize]
    }

    /// Applies a per-connection throughput share to every borrowed
    /// connection. Idle connections keep the full link rate until lent out
    /// again.
    pub fn set_in_use_throughput(&mut self, throughput_bytes_per_sec: f64) {
        for pool in &mut self.origins {
            for (slot, connection) in pool.connections.iter_mut().enumerate() {
                if pool.in_use[slot] {
                    connection.set_throughput(throughput_bytes_per_sec);
                }
            }
        }
    }

    pub fn in_use_count(&self) -> usize {
        self.origins
            .iter()
            .map(|pool| pool.in_use.iter().filter(|used| **used).count())
            .sum()
    }

    fn origin_slot(&mut self, request: &NetworkRequest) -> usize {
        if let Some(&index) = self.origin_index.get(&request.origin) {
            return index;
        }
        let limit = if request.is_h2() {
            1
        } else {
            self.max_connections_per_origin
        };
        let index = self.origins.len();
        self.origins.push(OriginPool {
            connections: Vec::new(),
            in_use: Vec::new(),
            limit,
        });
        self.origin_index.insert(request.origin.clone(), index);
        index
    }
}
