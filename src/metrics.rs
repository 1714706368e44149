use std::time::Duration;

use cdp_adapter::metrics as cdp_metrics;
use lazy_static::lazy_static;
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{
    core::Collector, histogram_opts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry,
};
use tracing::error;

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

lazy_static! {
    static ref WORKFLOWS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("renewal_workflows_total", "Renewal workflows by outcome"),
        &["workflow", "outcome"]
    )
    .unwrap();
    static ref WORKFLOW_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "renewal_workflow_duration_seconds",
            "Wall time of a renewal workflow",
            vec![1.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0]
        ),
        &["workflow"]
    )
    .unwrap();
    static ref SESSIONS_RELEASED_TOTAL: IntCounter = IntCounter::new(
        "renewal_sessions_released_total",
        "Browser sessions released after a workflow"
    )
    .unwrap();
    static ref SESSIONS_ACTIVE: IntGauge =
        IntGauge::new("renewal_sessions_active", "Browser sessions currently open").unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register renewal metric");
        }
    }
}

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        register(registry, WORKFLOWS_TOTAL.clone());
        register(registry, WORKFLOW_DURATION.clone());
        register(registry, SESSIONS_RELEASED_TOTAL.clone());
        register(registry, SESSIONS_ACTIVE.clone());
        cdp_metrics::register_metrics(registry);
    });
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

pub fn record_workflow(workflow: &str, outcome: &str, elapsed: Duration) {
    WORKFLOWS_TOTAL
        .with_label_values(&[workflow, outcome])
        .inc();
    WORKFLOW_DURATION
        .with_label_values(&[workflow])
        .observe(elapsed.as_secs_f64());
}

pub fn session_opened() {
    SESSIONS_ACTIVE.inc();
}

pub fn session_released() {
    SESSIONS_ACTIVE.dec();
    SESSIONS_RELEASED_TOTAL.inc();
}

pub fn sessions_released_total() -> u64 {
    SESSIONS_RELEASED_TOTAL.get()
}

pub fn workflows_total(workflow: &str, outcome: &str) -> u64 {
    WORKFLOWS_TOTAL.with_label_values(&[workflow, outcome]).get()
}
