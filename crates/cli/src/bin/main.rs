//! Lampion CLI
//!
//! Estimate page-load metrics from a recorded fixture.
//!
//! # Example
//!
//! ```bash
//! # Simulate under the default slow-4G condition
//! lampion page.json
//!
//! # Simulate a custom link, with engine logs
//! RUST_LOG=lampion_engine=debug lampion page.json --rtt-ms 70 --throughput-kbps 2048
//!
//! # Trust the observed trace instead of simulating
//! lampion page.json --provided
//! ```

use clap::Parser;
use lampion_analysis::SUMMARY_ORIGIN;
use lampion_cli::EvalFixture;
use lampion_engine::{Engine, MetricOutcome};
use lampion_metrics::MetricKind;
use lampion_types::ThrottlingMethod;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Lampion
///
/// Loads a fixture captured from a real page load and estimates paint
/// metrics under the configured throttling condition.
#[derive(Parser, Debug)]
#[command(name = "lampion")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a JSON fixture file
    fixture: PathBuf,

    /// Trust the observed trace instead of simulating
    #[arg(long)]
    provided: bool,

    /// Override the simulated round-trip time in milliseconds
    #[arg(long)]
    rtt_ms: Option<f64>,

    /// Override the simulated link throughput in kilobits per second
    #[arg(long)]
    throughput_kbps: Option<f64>,

    /// Override the CPU slowdown multiplier
    #[arg(long)]
    cpu_slowdown: Option<f64>,

    /// Print the simulated schedule of every graph node
    #[arg(long)]
    timeline: bool,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,lampion=info")),
        )
        .init();

    let args = Args::parse();

    let mut fixture = EvalFixture::load(&args.fixture).expect("Failed to load fixture");

    // Command-line flags override whatever the fixture carries.
    if args.provided {
        fixture.settings.throttling_method = ThrottlingMethod::Provided;
    }
    if args.rtt_ms.is_some() {
        fixture.settings.rtt_ms = args.rtt_ms;
    }
    if args.throughput_kbps.is_some() {
        fixture.settings.throughput_kbps = args.throughput_kbps;
    }
    if let Some(multiplier) = args.cpu_slowdown {
        fixture.settings.cpu_slowdown_multiplier = multiplier;
    }

    info!(
        fixture = %args.fixture.display(),
        records = fixture.records.len(),
        tasks = fixture.tasks.len(),
        method = ?fixture.settings.throttling_method,
        "Evaluating fixture"
    );

    let engine = Engine::with_coefficients(fixture.coefficients);
    let input = fixture.into_input();

    let report = engine.estimate_all(&input);

    println!("\n=== Metrics ===");
    for kind in MetricKind::ALL {
        match &report[&kind] {
            Ok(MetricOutcome::Simulated(estimate)) => println!(
                "{:<26} {:>9.1} ms   (optimistic {:.1}, pessimistic {:.1})",
                kind.as_str(),
                estimate.timing_ms,
                estimate.optimistic.time_ms,
                estimate.pessimistic.time_ms
            ),
            Ok(MetricOutcome::Observed(value)) => println!(
                "{:<26} {:>9.1} ms   (observed)",
                kind.as_str(),
                value.timing_ms
            ),
            Err(error) if error.is_unavailable() => {
                println!("{:<26} unavailable: {error}", kind.as_str());
            }
            Err(error) => println!("{:<26} failed: {error}", kind.as_str()),
        }
    }

    println!("\n=== LCP breakdown ===");
    match engine.lcp_breakdown(&input) {
        Ok(breakdown) => {
            println!("time to first byte   {:>9.1} ms", breakdown.ttfb_ms);
            match (breakdown.load_start_ms, breakdown.load_end_ms) {
                (Some(start), Some(end)) => {
                    println!("image load start     {:>9.1} ms", start);
                    println!("image load end       {:>9.1} ms", end);
                }
                _ => println!("no image load phase (LCP element was not a loaded image)"),
            }
        }
        Err(error) if error.is_unavailable() => println!("unavailable: {error}"),
        Err(error) => println!("failed: {error}"),
    }

    println!("\n=== Network ===");
    match engine.network_analysis(&input) {
        Ok(analysis) => {
            println!("observed RTT         {:>9.1} ms", analysis.rtt_ms);
            if analysis.throughput_bytes_per_sec.is_finite() {
                println!(
                    "observed throughput  {:>9.0} kbps",
                    analysis.throughput_bytes_per_sec * 8.0 / 1024.0
                );
            } else {
                println!("observed throughput  unknown (no complete downloads)");
            }
            let origins = analysis
                .additional_rtt_by_origin
                .keys()
                .filter(|origin| origin.as_str() != SUMMARY_ORIGIN)
                .count();
            println!("origins measured     {origins:>9}");
        }
        Err(error) => println!("failed: {error}"),
    }

    if args.timeline {
        println!("\n=== Timeline ===");
        match engine.timeline(&input) {
            Ok(timeline) => {
                let mut rows: Vec<_> = timeline.node_timings.iter().collect();
                rows.sort_by(|a, b| a.1.start_ms.total_cmp(&b.1.start_ms));
                for (id, timing) in rows {
                    println!("{:>9.1} .. {:>9.1}  {id}", timing.start_ms, timing.end_ms);
                }
                println!("total: {:.1} ms", timeline.total_ms);
            }
            Err(error) => println!("failed: {error}"),
        }
    }

    let stats = engine.cache_stats();
    info!(hits = stats.hits, misses = stats.misses, "Cache statistics");
}
