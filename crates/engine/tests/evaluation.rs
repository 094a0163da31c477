//! End-to-end evaluation behavior: artifact memoization, parallel metric
//! fan-out, per-metric failure isolation, and the dispatch between
//! simulated and observed metric values.

use std::sync::Arc;

use lampion_engine::{Engine, MetricOutcome, PageInput};
use lampion_metrics::MetricKind;
use lampion_test_helpers::PageFixture;
use lampion_types::{SimulationSettings, ThrottlingMethod};

fn simulate_input(fixture: &PageFixture) -> PageInput {
    PageInput::new(
        fixture.records.clone(),
        fixture.tasks.clone(),
        fixture.trace.clone(),
        SimulationSettings::default(),
    )
}

fn provided_input(fixture: &PageFixture) -> PageInput {
    PageInput::new(
        fixture.records.clone(),
        fixture.tasks.clone(),
        fixture.trace.clone(),
        SimulationSettings {
            throttling_method: ThrottlingMethod::Provided,
            ..SimulationSettings::default()
        },
    )
}

#[test]
fn an_artifact_is_computed_once_per_input() {
    let engine = Engine::new();
    let input = simulate_input(&PageFixture::cross_origin());

    let first = engine.network_analysis(&input).unwrap();
    let second = engine.network_analysis(&input).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    let stats = engine.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[test]
fn a_metric_reuses_the_shared_artifacts() {
    let engine = Engine::new();
    let input = simulate_input(&PageFixture::simple());

    let first = engine
        .metric(&input, MetricKind::LargestContentfulPaint)
        .unwrap();
    // One miss each for the metric, the graph, the simulator, and the
    // network analysis behind it.
    assert_eq!(engine.cache_stats().misses, 4);

    let second = engine
        .metric(&input, MetricKind::LargestContentfulPaint)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.cache_stats().misses, 4);
}

#[test]
fn distinct_inputs_do_not_share_artifacts() {
    let engine = Engine::new();
    let fixture = PageFixture::simple();
    let first = engine.network_analysis(&simulate_input(&fixture)).unwrap();
    let second = engine.network_analysis(&simulate_input(&fixture)).unwrap();

    // Identical records, but each input carries its own identity.
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(engine.cache_stats().misses, 2);
}

#[test]
fn estimate_all_covers_every_metric_without_recomputation() {
    let engine = Engine::new();
    let input = simulate_input(&PageFixture::simple());

    let report = engine.estimate_all(&input);
    assert_eq!(report.len(), MetricKind::ALL.len());
    for kind in MetricKind::ALL {
        let outcome = report[&kind].as_ref().unwrap();
        assert!(matches!(outcome, MetricOutcome::Simulated(_)));
        assert!(outcome.value().timing_ms > 0.0);
    }

    // Three metric misses plus the graph, simulator, and analysis they
    // share, regardless of how the parallel fan-out interleaved.
    let after_first = engine.cache_stats();
    assert_eq!(after_first.misses, 6);

    let again = engine.estimate_all(&input);
    let after_second = engine.cache_stats();
    assert_eq!(after_second.misses, after_first.misses);
    assert_eq!(after_second.hits - after_first.hits, 3);
    for kind in MetricKind::ALL {
        assert_eq!(report[&kind], again[&kind]);
    }
}

#[test]
fn one_metrics_failure_leaves_its_siblings_standing() {
    let mut fixture = PageFixture::simple();
    fixture.trace.largest_contentful_paint = None;
    fixture.trace.lcp_image_url = None;
    let engine = Engine::new();
    let input = simulate_input(&fixture);

    let report = engine.estimate_all(&input);

    assert!(report[&MetricKind::FirstContentfulPaint].is_ok());
    for kind in [
        MetricKind::LargestContentfulPaint,
        MetricKind::LcpLoadDelay,
    ] {
        let error = report[&kind].as_ref().unwrap_err();
        assert!(error.is_unavailable());
    }

    // The failure is remembered like any other outcome.
    let misses = engine.cache_stats().misses;
    let repeat = engine
        .metric(&input, MetricKind::LargestContentfulPaint)
        .unwrap_err();
    assert!(repeat.is_unavailable());
    assert_eq!(engine.cache_stats().misses, misses);
}

#[test]
fn provided_throttling_reads_the_trace_not_the_simulator() {
    let engine = Engine::new();
    let input = provided_input(&PageFixture::simple());

    let fcp = engine
        .metric(&input, MetricKind::FirstContentfulPaint)
        .unwrap();
    assert!(matches!(fcp, MetricOutcome::Observed(_)));
    assert_eq!(fcp.value().timing_ms, 800.0);
    assert_eq!(fcp.value().timestamp_ms, 250_800.0);

    // Observed load delay is the image request's start relative to the
    // time origin.
    let delay = engine.metric(&input, MetricKind::LcpLoadDelay).unwrap();
    assert_eq!(delay.value().timing_ms, 900.0);
    assert_eq!(delay.value().timestamp_ms, 250_900.0);
}

#[test]
fn breakdown_phases_follow_the_throttling_method() {
    let fixture = PageFixture::simple();
    let engine = Engine::new();

    let observed = engine.lcp_breakdown(&provided_input(&fixture)).unwrap();
    assert_eq!(observed.ttfb_ms, 195.0);
    assert_eq!(observed.load_start_ms, Some(900.0));
    assert_eq!(observed.load_end_ms, Some(1400.0));

    let input = simulate_input(&fixture);
    let simulated = engine.lcp_breakdown(&input).unwrap();
    let lcp = engine
        .metric(&input, MetricKind::LargestContentfulPaint)
        .unwrap();

    assert_eq!(simulated.ttfb_ms, 195.0);
    let start = simulated.load_start_ms.unwrap();
    let end = simulated.load_end_ms.unwrap();
    assert!(simulated.ttfb_ms <= start);
    assert!(start <= end);
    assert!(end <= lcp.value().timing_ms);
}

#[test]
fn the_timeline_schedules_every_graph_node() {
    let engine = Engine::new();
    let input = simulate_input(&PageFixture::simple());

    let timeline = engine.timeline(&input).unwrap();
    let graph = engine.dependency_graph(&input).unwrap();
    assert_eq!(timeline.node_timings.len(), graph.len());

    let last_end = timeline
        .node_timings
        .values()
        .fold(0.0, |acc: f64, timing| acc.max(timing.end_ms));
    assert_eq!(timeline.total_ms, last_end);

    let again = engine.timeline(&input).unwrap();
    assert!(Arc::ptr_eq(&timeline, &again));
}
