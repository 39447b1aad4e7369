use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder,
};

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

pub static AGGREGATOR_CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("aggregator_cycles_total", "Total aggregator cycle attempts"),
        &["dc"],
    )
    .expect("failed to create aggregator_cycles_total")
});

pub static AGGREGATOR_PROCESSING_TIME: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("aggregator_processing_time", "Seconds spent processing the last cycle"),
        &["dc"],
    )
    .expect("failed to create aggregator_processing_time")
});

pub static NODES_TOTAL: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(Opts::new("nodes_total", "Total nodes observed this cycle"), &["dc"])
        .expect("failed to create nodes_total")
});

pub static NODES_ELIGIBLE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(Opts::new("nodes_eligible", "Eligible nodes observed this cycle"), &["dc"])
        .expect("failed to create nodes_eligible")
});

pub static NODE_HANDLE_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("node_handle_errors", "Per-node handling errors"), &["dc"])
        .expect("failed to create node_handle_errors")
});

pub static NODE_HANDLE_SKIPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("node_handle_skips", "Per-node handling skips"), &["dc"])
        .expect("failed to create node_handle_skips")
});

pub static NODE_HEALTHY: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("node_healthy", "Nodes observed healthy"), &["dc"])
        .expect("failed to create node_healthy")
});

pub static NODE_UNHEALTHY: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("node_unhealthy", "Nodes observed unhealthy"), &["dc"])
        .expect("failed to create node_unhealthy")
});

pub static NODE_HEALTH_STATE_CHANGES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("node_health_state_changes", "Nodes whose health state changed this cycle"),
        &["dc"],
    )
    .expect("failed to create node_health_state_changes")
});

fn register_metrics(registry: &Registry) {
    registry.register(Box::new(AGGREGATOR_CYCLES_TOTAL.clone())).unwrap();
    registry.register(Box::new(AGGREGATOR_PROCESSING_TIME.clone())).unwrap();
    registry.register(Box::new(NODES_TOTAL.clone())).unwrap();
    registry.register(Box::new(NODES_ELIGIBLE.clone())).unwrap();
    registry.register(Box::new(NODE_HANDLE_ERRORS.clone())).unwrap();
    registry.register(Box::new(NODE_HANDLE_SKIPS.clone())).unwrap();
    registry.register(Box::new(NODE_HEALTHY.clone())).unwrap();
    registry.register(Box::new(NODE_UNHEALTHY.clone())).unwrap();
    registry.register(Box::new(NODE_HEALTH_STATE_CHANGES.clone())).unwrap();

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
    encoder.encode(&metric_families, &mut buffer).expect("failed to encode metrics");
    String::from_utf8(buffer).expect("metrics are valid UTF-8")
}
