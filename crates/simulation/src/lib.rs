//! Discrete-event page-load simulator.
//!
//! Replays a dependency graph of network requests and CPU tasks against a
//! modeled device and link, producing a start/end time for every node and
//! the total time to quiesce. The simulator advances a virtual clock in
//! variable-length slices: each iteration admits every ready node the
//! resource limits allow, asks each in-flight node how long it needs to
//! finish under current conditions, jumps the clock forward by the smallest
//! of those estimates, and applies that much progress to everyone.
//!
//! ```text
//!                      ┌──────────────────┐
//!                      │  DependencyGraph │
//!                      └────────┬─────────┘
//!                               │ readiness (all deps complete)
//!                ┌──────────────┴───────────────┐
//!                ▼                              ▼
//!       ┌────────────────┐             ┌────────────────┐
//!       │  network lane  │             │    CPU lane    │
//!       │ priority desc, │             │  FIFO, width 1 │
//!       │ discovery FIFO │             └────────┬───────┘
//!       └───────┬────────┘                      │
//!               ▼                               ▼
//!       ┌────────────────┐             ┌────────────────┐
//!       │ ConnectionPool │             │ slowdown model │
//!       │ per-origin cap │             │ (multipliers,  │
//!       └───────┬────────┘             │  10s task cap) │
//!               ▼                      └────────────────┘
//!       ┌────────────────┐
//!       │ TcpConnection  │  slow start, TTFB, H2 reuse
//!       └────────────────┘
//! ```
//!
//! Network time comes from a TCP model (DNS, handshake, slow start) fed by
//! per-origin RTT and server-latency overrides; CPU time is the observed
//! task duration under a slowdown multiplier. Runs are pure functions of
//! the graph and options: simulating the same input twice yields identical
//! results.

mod connection;
mod dns;
mod error;
mod pool;
mod simulator;
mod timing;

pub use connection::{ConnectionTiming, DownloadProgress, TcpConnection, TCP_SEGMENT_SIZE_BYTES};
pub use dns::DnsCache;
pub use error::SimulationError;
pub use pool::{ConnectionHandle, ConnectionPool};
pub use simulator::{SimulationResult, Simulator, SimulatorOptions};
pub use timing::NodeTiming;
