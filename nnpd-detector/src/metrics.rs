use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Number of verdicts currently held in the Verdict Registry.
pub static REGISTERED_VERDICTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(Opts::new(
        "detector_registered_verdicts",
        "Number of verdicts currently present in the verdict registry",
    ))
    .expect("failed to create detector_registered_verdicts")
});

/// Incremented by the log watcher on every pattern match, labeled by
/// the matched rule name.
pub static NPD_DETECTOR_LOG_PROBLEM_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("npd_detector_log_problem_count", "Log watcher pattern matches"),
        &["check"],
    )
    .expect("failed to create npd_detector_log_problem_count")
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(REGISTERED_VERDICTS.clone()))
        .expect("failed to register detector_registered_verdicts");
    registry
        .register(Box::new(NPD_DETECTOR_LOG_PROBLEM_COUNT.clone()))
        .expect("failed to register npd_detector_log_problem_count");

    #[cfg(target_os = "linux")]
    {
        let process_collector = prometheus::process_collector::ProcessCollector::for_self();
        let _ = registry.register(Box::new(process_collector));
    }
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("failed to encode metrics");
    String::from_utf8(buffer).expect("metrics are valid UTF-8")
}
