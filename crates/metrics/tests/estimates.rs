//! End-to-end metric estimation over the shared page fixture: filtered
//! passes, coefficient blending, observed fallbacks, and the breakdown.

use lampion_metrics::{
    CoefficientTable, LcpBreakdown, Metric, MetricCoefficients, MetricError, MetricKind,
};
use lampion_simulation::{Simulator, SimulatorOptions};
use lampion_test_helpers::PageFixture;

fn slow_4g() -> Simulator {
    Simulator::new(SimulatorOptions::default()).expect("default options are valid")
}

fn defaults() -> CoefficientTable {
    CoefficientTable::default()
}

#[test]
fn estimates_blend_the_two_passes_with_their_coefficients() {
    let fixture = PageFixture::simple();
    let graph = fixture.graph();
    let simulator = slow_4g();

    for kind in MetricKind::ALL {
        let estimate = kind
            .estimate(&graph, &fixture.trace, &simulator, defaults().for_kind(kind))
            .expect("fixture supports every metric");

        let blended = 0.5 * estimate.optimistic.time_ms + 0.5 * estimate.pessimistic.time_ms;
        assert_eq!(estimate.timing_ms, blended, "{kind}");
        assert_eq!(
            estimate.timestamp_ms,
            fixture.trace.timestamp_for(estimate.timing_ms),
            "{kind}"
        );
    }
}

#[test]
fn pessimistic_passes_never_beat_optimistic_passes() {
    let fixture = PageFixture::cross_origin();
    let graph = fixture.graph();
    let simulator = slow_4g();

    for kind in MetricKind::ALL {
        let estimate = kind
            .estimate(&graph, &fixture.trace, &simulator, defaults().for_kind(kind))
            .expect("fixture supports every metric");
        assert!(
            estimate.pessimistic.time_ms >= estimate.optimistic.time_ms,
            "{kind}: pessimistic {} < optimistic {}",
            estimate.pessimistic.time_ms,
            estimate.optimistic.time_ms
        );
    }
}

#[test]
fn lcp_never_lands_before_fcp_on_the_fixture_page() {
    let fixture = PageFixture::simple();
    let graph = fixture.graph();
    let simulator = slow_4g();

    let fcp = MetricKind::FirstContentfulPaint
        .estimate(&graph, &fixture.trace, &simulator, defaults().first_contentful_paint)
        .expect("fcp");
    let lcp = MetricKind::LargestContentfulPaint
        .estimate(&graph, &fixture.trace, &simulator, defaults().largest_contentful_paint)
        .expect("lcp");

    // The LCP cutoff retains the script, the hero image, and the
    // main-thread work; FCP keeps only the document and stylesheet.
    assert!(lcp.timing_ms >= fcp.timing_ms);
    assert!(lcp.optimistic.node_timings.len() > fcp.optimistic.node_timings.len());
}

#[test]
fn load_delay_passes_split_on_main_thread_work() {
    let fixture = PageFixture::simple();
    let graph = fixture.graph();
    let simulator = slow_4g();

    let estimate = MetricKind::LcpLoadDelay
        .estimate(&graph, &fixture.trace, &simulator, defaults().lcp_load_delay)
        .expect("load delay");

    let optimistic_has_cpu = estimate
        .optimistic
        .node_timings
        .keys()
        .any(|id| id.as_str().starts_with("cpu-"));
    let pessimistic_has_cpu = estimate
        .pessimistic
        .node_timings
        .keys()
        .any(|id| id.as_str().starts_with("cpu-"));
    assert!(!optimistic_has_cpu, "optimistic pass must drop CPU nodes");
    assert!(pessimistic_has_cpu, "pessimistic pass must keep CPU nodes");
}

#[test]
fn a_fitted_intercept_shifts_the_blend() {
    let fixture = PageFixture::simple();
    let graph = fixture.graph();
    let simulator = slow_4g();

    let even = defaults().lcp_load_delay;
    let fitted = MetricCoefficients {
        intercept: 300.0,
        ..even
    };

    let baseline = MetricKind::LcpLoadDelay
        .estimate(&graph, &fixture.trace, &simulator, even)
        .expect("baseline");
    let shifted = MetricKind::LcpLoadDelay
        .estimate(&graph, &fixture.trace, &simulator, fitted)
        .expect("shifted");

    assert_eq!(
        shifted.timing_ms,
        fitted.blend(baseline.optimistic.time_ms, baseline.pessimistic.time_ms)
    );
    assert!(shifted.timing_ms > baseline.timing_ms);
}

#[test]
fn observed_values_read_straight_from_the_trace() {
    let fixture = PageFixture::simple();
    let graph = fixture.graph();

    let fcp = MetricKind::FirstContentfulPaint
        .observed(&graph, &fixture.trace)
        .expect("fcp");
    assert_eq!(fcp.timing_ms, 800.0);
    assert_eq!(fcp.timestamp_ms, 250_800.0);

    let lcp = MetricKind::LargestContentfulPaint
        .observed(&graph, &fixture.trace)
        .expect("lcp");
    assert_eq!(lcp.timing_ms, 1450.0);

    // The hero image went out at 900ms.
    let load_delay = MetricKind::LcpLoadDelay
        .observed(&graph, &fixture.trace)
        .expect("load delay");
    assert_eq!(load_delay.timing_ms, 900.0);
    assert_eq!(load_delay.timestamp_ms, 250_900.0);
}

#[test]
fn lcp_metrics_are_unavailable_without_an_lcp_event() {
    let mut fixture = PageFixture::simple();
    fixture.trace.largest_contentful_paint = None;
    fixture.trace.lcp_image_url = None;
    let graph = fixture.graph();
    let simulator = slow_4g();

    for kind in [MetricKind::LargestContentfulPaint, MetricKind::LcpLoadDelay] {
        let err = kind
            .estimate(&graph, &fixture.trace, &simulator, defaults().for_kind(kind))
            .unwrap_err();
        assert_eq!(err, MetricError::NoLcp, "{kind}");
        assert!(err.is_unavailable(), "{kind}");
    }

    // The paint metrics that need no LCP event continue to work.
    MetricKind::FirstContentfulPaint
        .estimate(
            &graph,
            &fixture.trace,
            &simulator,
            defaults().first_contentful_paint,
        )
        .expect("fcp is independent of the lcp event");
}

#[test]
fn breakdown_spans_are_ordered() {
    let fixture = PageFixture::simple();
    let graph = fixture.graph();
    let simulator = slow_4g();

    let lcp = MetricKind::LargestContentfulPaint
        .estimate(
            &graph,
            &fixture.trace,
            &simulator,
            defaults().largest_contentful_paint,
        )
        .expect("lcp");
    let breakdown = LcpBreakdown::from_estimate(&graph, &fixture.trace, &lcp).expect("breakdown");

    let load_start = breakdown.load_start_ms.expect("image page has a load start");
    let load_end = breakdown.load_end_ms.expect("image page has a load end");
    assert!(breakdown.ttfb_ms <= load_start);
    assert!(load_start <= load_end);
    assert!(load_end <= lcp.timing_ms);
}

#[test]
fn estimators_and_kind_dispatch_agree() {
    let fixture = PageFixture::simple();
    let graph = fixture.graph();
    let simulator = slow_4g();
    let coefficients = defaults().largest_contentful_paint;

    let via_kind = MetricKind::LargestContentfulPaint
        .estimate(&graph, &fixture.trace, &simulator, coefficients)
        .expect("kind dispatch");
    let via_type = lampion_metrics::LargestContentfulPaint::estimate(
        &graph,
        &fixture.trace,
        &simulator,
        coefficients,
    )
    .expect("typed estimator");

    assert_eq!(via_kind, via_type);
}
