//! The discrete-event scheduler.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, warn};

use lampion_graph::{DependencyGraph, NodeId, NodeIndex, NodeKind};
use lampion_types::{kbps_to_bytes_per_sec, NetworkRequest, RequestPriority, ThrottlingPreset};

use crate::connection::{ConnectionTiming, TcpConnection};
use crate::dns::DnsCache;
use crate::error::SimulationError;
use crate::pool::{ConnectionHandle, ConnectionPool};
use crate::timing::{NodeTiming, Phase, ProgressEntry};

/// Ceiling on a single simulated CPU task. Observed tasks longer than
/// this are usually blocked on I/O rather than compute, so scaling them
/// by the full slowdown multiplier would overestimate.
const MAXIMUM_CPU_TASK_DURATION_MS: f64 = 10_000.0;

/// Iteration ceiling before a run is declared divergent.
const MAXIMUM_ITERATIONS: u64 = 100_000;

/// Throttling and scheduling knobs for a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorOptions {
    /// Link round-trip time.
    pub rtt_ms: f64,
    /// Downlink capacity, shared evenly by all active connections.
    pub throughput_bytes_per_sec: f64,
    /// Cap on concurrently in-flight connected requests. The effective cap
    /// is further limited by how many connections the link can saturate.
    pub maximum_concurrent_requests: usize,
    /// Parallel connections allowed per H1 origin. H2 origins always
    /// multiplex over one.
    pub max_connections_per_origin: usize,
    /// Scale applied to observed CPU task durations.
    pub cpu_slowdown_multiplier: f64,
    /// Fraction of the CPU multiplier applied to layout tasks, which are
    /// less compute-bound than script.
    pub layout_task_multiplier: f64,
    /// Extra round-trip latency per origin, from network analysis.
    pub additional_rtt_by_origin: BTreeMap<String, f64>,
    /// Server response latency per origin, from network analysis.
    pub server_response_time_by_origin: BTreeMap<String, f64>,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        let preset = ThrottlingPreset::MOBILE_SLOW_4G;
        Self {
            rtt_ms: preset.rtt_ms,
            throughput_bytes_per_sec: kbps_to_bytes_per_sec(preset.throughput_kbps),
            maximum_concurrent_requests: 10,
            max_connections_per_origin: 6,
            cpu_slowdown_multiplier: preset.cpu_slowdown_multiplier,
            layout_task_multiplier: 0.5,
            additional_rtt_by_origin: BTreeMap::new(),
            server_response_time_by_origin: BTreeMap::new(),
        }
    }
}

impl SimulatorOptions {
    fn validate(&self) -> Result<(), SimulationError> {
        if !self.rtt_ms.is_finite() || self.rtt_ms <= 0.0 {
            return Err(SimulationError::InvalidOptions(format!(
                "rtt must be finite and positive, got {}",
                self.rtt_ms
            )));
        }
        if !self.throughput_bytes_per_sec.is_finite() || self.throughput_bytes_per_sec <= 0.0 {
            return Err(SimulationError::InvalidOptions(format!(
                "throughput must be finite and positive, got {}",
                self.throughput_bytes_per_sec
            )));
        }
        if self.maximum_concurrent_requests == 0 {
            return Err(SimulationError::InvalidOptions(
                "maximum_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.max_connections_per_origin == 0 {
            return Err(SimulationError::InvalidOptions(
                "max_connections_per_origin must be at least 1".to_string(),
            ));
        }
        if !self.cpu_slowdown_multiplier.is_finite() || self.cpu_slowdown_multiplier <= 0.0 {
            return Err(SimulationError::InvalidOptions(format!(
                "cpu_slowdown_multiplier must be finite and positive, got {}",
                self.cpu_slowdown_multiplier
            )));
        }
        if !self.layout_task_multiplier.is_finite() || self.layout_task_multiplier <= 0.0 {
            return Err(SimulationError::InvalidOptions(format!(
                "layout_task_multiplier must be finite and positive, got {}",
                self.layout_task_multiplier
            )));
        }
        Ok(())
    }
}

/// Full output of one run: the simulated schedule per node and the time
/// at which the last node completed.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub total_ms: f64,
    /// Keyed by node id so timings of the same logical node can be
    /// compared across runs over filtered graph clones.
    pub node_timings: BTreeMap<NodeId, NodeTiming>,
}

impl SimulationResult {
    pub fn timing(&self, id: &NodeId) -> Option<&NodeTiming> {
        self.node_timings.get(id)
    }
}

/// Admission key for the network lane. Higher fetch priority goes first;
/// within a priority level, nodes start in the order they became ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AdmissionKey {
    priority: RequestPriority,
    sequence: u64,
}

impl Ord for AdmissionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.priority.cmp(&self.priority) {
            Ordering::Equal => self.sequence.cmp(&other.sequence),
            ordering => ordering,
        }
    }
}

impl PartialOrd for AdmissionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Discrete-event scheduler for a page-load dependency graph.
///
/// The simulator itself is immutable and reusable; every [`simulate`]
/// call builds fresh run state, so the same instance can replay many
/// graph variants and always produce identical results for identical
/// inputs.
///
/// [`simulate`]: Simulator::simulate
#[derive(Debug, Clone)]
pub struct Simulator {
    options: SimulatorOptions,
    /// Effective in-flight request cap after accounting for how many
    /// connections the link can saturate.
    maximum_concurrent_requests: usize,
    cpu_multiplier: f64,
    layout_multiplier: f64,
}

impl Simulator {
    pub fn new(options: SimulatorOptions) -> Result<Self, SimulationError> {
        options.validate()?;
        let saturated = TcpConnection::maximum_saturated_connections(
            options.rtt_ms,
            options.throughput_bytes_per_sec,
        );
        let maximum_concurrent_requests =
            saturated.min(options.maximum_concurrent_requests).max(1);
        let cpu_multiplier = options.cpu_slowdown_multiplier;
        let layout_multiplier = options.cpu_slowdown_multiplier * options.layout_task_multiplier;
        debug!(
            rtt_ms = options.rtt_ms,
            throughput_bytes_per_sec = options.throughput_bytes_per_sec,
            maximum_concurrent_requests,
            "Created simulator"
        );
        Ok(Self {
            options,
            maximum_concurrent_requests,
            cpu_multiplier,
            layout_multiplier,
        })
    }

    pub fn options(&self) -> &SimulatorOptions {
        &self.options
    }

    /// Replays the graph under the configured conditions.
    ///
    /// Only the schedulable universe is simulated: nodes disconnected from
    /// the root (residue of a filtered clone) receive no timing. Cycles
    /// anywhere in the arena are rejected up front, since the traversal
    /// would otherwise silently drop the cycle's members.
    pub fn simulate(
        &self,
        graph: &DependencyGraph,
    ) -> Result<SimulationResult, SimulationError> {
        if let Some(node_id) = graph.find_cycle() {
            return Err(SimulationError::CyclicGraph { node_id });
        }
        Run::new(self, graph).execute()
    }
}

/// Mutable state for one simulation run.
struct Run<'a> {
    simulator: &'a Simulator,
    graph: &'a DependencyGraph,
    /// Schedulable nodes in dependency order.
    universe: Vec<NodeIndex>,
    progress: Vec<ProgressEntry>,
    /// Network nodes awaiting admission, in (priority, readiness) order.
    network_ready: BTreeMap<AdmissionKey, NodeIndex>,
    /// CPU nodes awaiting the single main-thread lane, FIFO.
    cpu_ready: VecDeque<NodeIndex>,
    in_progress: BTreeSet<NodeIndex>,
    /// In-flight network nodes currently holding a pooled connection.
    connected_in_flight: usize,
    cpu_in_flight: usize,
    /// Monotonic readiness counter; breaks admission ties first-come.
    sequence: u64,
    pool: ConnectionPool,
    dns: DnsCache,
    total_elapsed_ms: f64,
}

impl<'a> Run<'a> {
    fn new(simulator: &'a Simulator, graph: &'a DependencyGraph) -> Self {
        Self {
            simulator,
            graph,
            universe: graph.traverse_order(),
            progress: ProgressEntry::column(graph.len()),
            network_ready: BTreeMap::new(),
            cpu_ready: VecDeque::new(),
            in_progress: BTreeSet::new(),
            connected_in_flight: 0,
            cpu_in_flight: 0,
            sequence: 0,
            pool: ConnectionPool::new(&simulator.options),
            dns: DnsCache::new(simulator.options.rtt_ms),
            total_elapsed_ms: 0.0,
        }
    }

    fn execute(mut self) -> Result<SimulationResult, SimulationError> {
        if let Some(&root) = self.universe.first() {
            self.mark_ready(root, 0.0);
        }

        let mut iteration: u64 = 0;
        while !self.network_ready.is_empty()
            || !self.cpu_ready.is_empty()
            || !self.in_progress.is_empty()
        {
            self.admit_ready_nodes();

            if self.in_progress.is_empty() {
                let node_id = self.first_queued_node_id();
                warn!(
                    node = %node_id,
                    elapsed_ms = self.total_elapsed_ms,
                    "Ready work exists but nothing could be admitted"
                );
                return Err(SimulationError::Stalled {
                    node_id,
                    elapsed_ms: self.total_elapsed_ms,
                });
            }

            if self.connected_in_flight > 0 {
                self.pool.set_in_use_throughput(
                    self.simulator.options.throughput_bytes_per_sec
                        / self.connected_in_flight as f64,
                );
            }

            let in_flight: Vec<NodeIndex> = self.in_progress.iter().copied().collect();
            let mut slice_ms = f64::INFINITY;
            for &index in &in_flight {
                slice_ms = slice_ms.min(self.estimate_time_remaining(index));
            }

            if !slice_ms.is_finite() || iteration >= MAXIMUM_ITERATIONS {
                let node_id = self.earliest_incomplete_node_id();
                return Err(SimulationError::DepthExceeded {
                    node_id,
                    iterations: iteration,
                });
            }

            iteration += 1;
            self.total_elapsed_ms += slice_ms;
            let now_ms = self.total_elapsed_ms;
            for &index in &in_flight {
                self.apply_progress(index, slice_ms, now_ms);
            }
        }

        for &index in &self.universe {
            if self.progress[index as usize].phase != Phase::Complete {
                return Err(SimulationError::IncompleteNode {
                    node_id: self.graph.node(index).id().clone(),
                });
            }
        }

        let mut node_timings = BTreeMap::new();
        for &index in &self.universe {
            let entry = &self.progress[index as usize];
            node_timings.insert(
                self.graph.node(index).id().clone(),
                NodeTiming {
                    start_ms: entry.started_at_ms,
                    end_ms: entry.end_ms,
                    connection: entry.connection_timing,
                },
            );
        }
        debug!(
            total_ms = self.total_elapsed_ms,
            nodes = node_timings.len(),
            iterations = iteration,
            "Simulation complete"
        );
        Ok(SimulationResult {
            total_ms: self.total_elapsed_ms,
            node_timings,
        })
    }

    fn mark_ready(&mut self, index: NodeIndex, queued_at_ms: f64) {
        let entry = &mut self.progress[index as usize];
        entry.phase = Phase::Ready;
        entry.queued_at_ms = queued_at_ms;
        let sequence = self.sequence;
        self.sequence += 1;
        match self.graph.node(index).kind() {
            NodeKind::Network(request) => {
                self.network_ready.insert(
                    AdmissionKey {
                        priority: request.priority,
                        sequence,
                    },
                    index,
                );
            }
            NodeKind::Cpu(_) => self.cpu_ready.push_back(index),
        }
    }

    /// Moves every ready node that the resource limits allow into flight.
    fn admit_ready_nodes(&mut self) {
        // An origin at its connection cap does not block later requests to
        // other origins, so the whole queue is scanned each pass.
        let queued: Vec<(AdmissionKey, NodeIndex)> = self
            .network_ready
            .iter()
            .map(|(key, index)| (*key, *index))
            .collect();
        for (key, index) in queued {
            if self.try_start_network(index) {
                self.network_ready.remove(&key);
            }
        }

        if self.cpu_in_flight == 0 {
            if let Some(index) = self.cpu_ready.pop_front() {
                self.begin(index, None);
            }
        }
    }

    fn try_start_network(&mut self, index: NodeIndex) -> bool {
        let node = self.graph.node(index);
        let NodeKind::Network(request) = node.kind() else {
            return false;
        };
        // Disk cache hits and non-network schemes neither occupy a
        // connection nor count against the request cap.
        if node.is_connectionless() {
            self.begin(index, None);
            return true;
        }
        if self.connected_in_flight >= self.simulator.maximum_concurrent_requests {
            return false;
        }
        let request = request.clone();
        let Some(handle) = self.pool.acquire(&request) else {
            return false;
        };
        self.begin(index, Some(handle));
        true
    }

    fn begin(&mut self, index: NodeIndex, connection: Option<ConnectionHandle>) {
        let now_ms = self.total_elapsed_ms;
        let entry = &mut self.progress[index as usize];
        entry.phase = Phase::InProgress;
        entry.started_at_ms = now_ms;
        entry.connection = connection;
        self.in_progress.insert(index);
        if self.graph.node(index).is_cpu() {
            self.cpu_in_flight += 1;
        } else if connection.is_some() {
            self.connected_in_flight += 1;
        }
    }

    /// Milliseconds this node still needs under current link conditions.
    /// The result is also recorded on the node so the progress pass can
    /// tell exactly which nodes the chosen slice completes.
    fn estimate_time_remaining(&mut self, index: NodeIndex) -> f64 {
        let kind = self.graph.node(index).kind().clone();
        let estimate = match &kind {
            NodeKind::Cpu(task) => {
                let multiplier = if task.performs_layout() {
                    self.simulator.layout_multiplier
                } else {
                    self.simulator.cpu_multiplier
                };
                let total = (task.duration() * multiplier)
                    .round()
                    .min(MAXIMUM_CPU_TASK_DURATION_MS);
                total - self.progress[index as usize].time_elapsed_ms
            }
            NodeKind::Network(request) => self.estimate_network_time_remaining(index, request),
        };
        self.progress[index as usize].estimated_time_elapsed_ms = estimate;
        estimate
    }

    fn estimate_network_time_remaining(&mut self, index: NodeIndex, request: &NetworkRequest) -> f64 {
        let entry = &self.progress[index as usize];
        match entry.connection {
            None => {
                let size_mb = request.resource_size as f64 / 1024.0 / 1024.0;
                // Disk seek plus sequential read, or data-URI decode time.
                let total = if request.from_disk_cache {
                    8.0 + 20.0 * size_mb
                } else {
                    2.0 + 10.0 * size_mb
                };
                total - entry.time_elapsed_ms + entry.time_elapsed_overshoot_ms
            }
            Some(handle) => {
                let started_at = entry.started_at_ms;
                let time_elapsed = entry.time_elapsed_ms;
                let overshoot = entry.time_elapsed_overshoot_ms;
                let bytes_remaining = request.transfer_size as f64 - entry.bytes_downloaded;
                let dns_ms = self.dns.time_until_resolution(request.host(), started_at);
                let calc = self.pool.connection(handle).simulate_download_until(
                    bytes_remaining,
                    time_elapsed,
                    f64::INFINITY,
                    dns_ms,
                );
                calc.time_elapsed_ms + overshoot
            }
        }
    }

    /// Applies `slice_ms` of simulated time to one in-flight node,
    /// completing it when its own estimate chose the slice.
    fn apply_progress(&mut self, index: NodeIndex, slice_ms: f64, now_ms: f64) {
        let kind = self.graph.node(index).kind().clone();
        let entry = &self.progress[index as usize];
        // Exact comparison: slice_ms is the minimum over these same
        // estimates, so the finishing node's value is bit-identical.
        let finished = entry.estimated_time_elapsed_ms == slice_ms;
        let connection = entry.connection;

        let (request, handle) = match (&kind, connection) {
            (NodeKind::Network(request), Some(handle)) => (request, handle),
            _ => {
                // CPU work and connectionless fetches have fixed service
                // times with nothing to persist between slices.
                if finished {
                    self.complete(index, now_ms, None);
                } else {
                    self.progress[index as usize].time_elapsed_ms += slice_ms;
                }
                return;
            }
        };

        let started_at = entry.started_at_ms;
        let time_elapsed = entry.time_elapsed_ms;
        let overshoot = entry.time_elapsed_overshoot_ms;
        let bytes_remaining = request.transfer_size as f64 - entry.bytes_downloaded;

        let dns_ms = self.dns.time_until_resolution(request.host(), started_at);
        let calc = self.pool.connection(handle).simulate_download_until(
            bytes_remaining,
            time_elapsed,
            slice_ms - overshoot,
            dns_ms,
        );

        let pooled = self.pool.connection_mut(handle);
        pooled.set_congestion_window(calc.congestion_window);
        pooled.set_h2_overflow_bytes_downloaded(calc.extra_bytes_downloaded);

        if finished {
            pooled.set_warmed(true);
            self.pool.release(handle);
            self.complete(index, now_ms, Some(calc.timing));
        } else {
            let entry = &mut self.progress[index as usize];
            entry.time_elapsed_ms += calc.time_elapsed_ms;
            entry.time_elapsed_overshoot_ms += calc.time_elapsed_ms - slice_ms;
            entry.bytes_downloaded += calc.bytes_downloaded;
        }
    }

    fn complete(&mut self, index: NodeIndex, end_ms: f64, timing: Option<ConnectionTiming>) {
        {
            let entry = &mut self.progress[index as usize];
            entry.phase = Phase::Complete;
            entry.end_ms = end_ms;
            entry.connection_timing = timing;
        }
        self.in_progress.remove(&index);
        let node = self.graph.node(index);
        if node.is_cpu() {
            self.cpu_in_flight -= 1;
        } else if self.progress[index as usize].connection.is_some() {
            self.connected_in_flight -= 1;
        }

        let dependents: Vec<NodeIndex> = node.dependents().to_vec();
        for dependent in dependents {
            if self.progress[dependent as usize].phase != Phase::Pending {
                continue;
            }
            let all_complete = self
                .graph
                .node(dependent)
                .dependencies()
                .iter()
                .all(|&dep| self.progress[dep as usize].phase == Phase::Complete);
            if all_complete {
                self.mark_ready(dependent, end_ms);
            }
        }
    }

    fn first_queued_node_id(&self) -> NodeId {
        let index = self
            .network_ready
            .values()
            .next()
            .copied()
            .or_else(|| self.cpu_ready.front().copied())
            .unwrap_or(self.graph.root());
        self.graph.node(index).id().clone()
    }

    fn earliest_incomplete_node_id(&self) -> NodeId {
        let index = self
            .universe
            .iter()
            .copied()
            .find(|&index| self.progress[index as usize].phase != Phase::Complete)
            .unwrap_or(self.graph.root());
        self.graph.node(index).id().clone()
    }
}
