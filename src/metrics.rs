use std::sync::LazyLock;

use prometheus::*;

static METRIC_COMPARISON_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "facecheck_comparison_count",
        "count of the comparisons by outcome",
        &["outcome"]
    )
    .unwrap()
});

static METRIC_COMPARE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "facecheck_compare_duration",
        "duration of the face comparison request in seconds"
    )
    .unwrap()
});

static METRIC_MAX_SIMILARITY: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "facecheck_max_similarity",
        "max similarity of the per-comparison matches",
        (50..=100).step_by(5).map(|x| x as f64).collect()
    )
    .unwrap()
});

/// 按结果类型计数
pub fn inc_comparison(outcome: &str) {
    METRIC_COMPARISON_COUNT.with_label_values(&[outcome]).inc();
}

pub fn inc_compare_duration(duration: f32) {
    METRIC_COMPARE_DURATION.observe(duration as f64);
}

pub fn inc_max_similarity(score: f64) {
    METRIC_MAX_SIMILARITY.observe(score);
}
