//! Simulated DNS resolution with a per-host cache.

use std::collections::HashMap;

/// A DNS lookup costs two round trips: one to the recursive resolver and
/// one from the resolver to the authoritative server.
const DNS_RESOLUTION_RTT_MULTIPLIER: f64 = 2.0;

/// Tracks when each host's name resolution completes so that later
/// requests to the same host wait only for the in-flight lookup, or not
/// at all once it has landed.
#[derive(Debug)]
pub struct DnsCache {
    rtt_ms: f64,
    resolved_at_by_host: HashMap<String, f64>,
}

impl DnsCache {
    pub fn new(rtt_ms: f64) -> Self {
        Self {
            rtt_ms,
            resolved_at_by_host: HashMap::new(),
        }
    }

    /// Milliseconds a request issued at `requested_at_ms` spends waiting on
    /// DNS. Records the resolution time so overlapping lookups share it.
    pub fn time_until_resolution(&mut self, host: &str, requested_at_ms: f64) -> f64 {
        let time_until_resolved = match self.resolved_at_by_host.get(host) {
            Some(resolved_at) => (resolved_at - requested_at_ms).max(0.0),
            None => self.rtt_ms * DNS_RESOLUTION_RTT_MULTIPLIER,
        };

        let resolved_at = requested_at_ms + time_until_resolved;
        self.resolved_at_by_host
            .entry(host.to_string())
            .and_modify(|existing| *existing = existing.min(resolved_at))
            .or_insert(resolved_at);

        time_until_resolved
    }

    #[cfg(test)]
    fn set_resolved_at(&mut self, host: &str, resolved_at_ms: f64) {
        self.resolved_at_by_host
            .insert(host.to_string(), resolved_at_ms);
    }
}
