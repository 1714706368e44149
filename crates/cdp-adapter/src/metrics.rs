use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, histogram_opts, HistogramVec, IntCounter, IntCounterVec, Registry,
};
use tracing::error;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdapterMetricsSnapshot {
    pub commands: u64,
    pub command_failures: u64,
    pub command_latency_total_us: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
}

static COMMANDS: AtomicU64 = AtomicU64::new(0);
static COMMAND_FAILURES: AtomicU64 = AtomicU64::new(0);
static COMMAND_LATENCY_TOTAL_US: AtomicU64 = AtomicU64::new(0);
static SESSIONS_OPENED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_CLOSED: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref CDP_COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("renewal_cdp_commands_total", "Total browser commands executed"),
        &["method"]
    )
    .unwrap();
    static ref CDP_COMMAND_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "renewal_cdp_command_failures_total",
            "Total browser command failures"
        ),
        &["method"]
    )
    .unwrap();
    static ref CDP_COMMAND_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "renewal_cdp_command_duration_seconds",
            "Browser command latency",
            vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]
        ),
        &["method"]
    )
    .unwrap();
    static ref CDP_SESSIONS_OPENED_TOTAL: IntCounter = IntCounter::new(
        "renewal_cdp_sessions_opened_total",
        "Browser sessions launched"
    )
    .unwrap();
    static ref CDP_SESSIONS_CLOSED_TOTAL: IntCounter = IntCounter::new(
        "renewal_cdp_sessions_closed_total",
        "Browser sessions torn down"
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register cdp metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, CDP_COMMANDS_TOTAL.clone());
    register(registry, CDP_COMMAND_FAILURES_TOTAL.clone());
    register(registry, CDP_COMMAND_DURATION.clone());
    register(registry, CDP_SESSIONS_OPENED_TOTAL.clone());
    register(registry, CDP_SESSIONS_CLOSED_TOTAL.clone());
}

pub fn record_command(method: &str, duration: Duration, ok: bool) {
    COMMANDS.fetch_add(1, Ordering::Relaxed);
    CDP_COMMANDS_TOTAL.with_label_values(&[method]).inc();
    if ok {
        let micros = duration.as_micros().min(u64::MAX as u128) as u64;
        COMMAND_LATENCY_TOTAL_US.fetch_add(micros, Ordering::Relaxed);
        CDP_COMMAND_DURATION
            .with_label_values(&[method])
            .observe(duration.as_secs_f64());
    } else {
        COMMAND_FAILURES.fetch_add(1, Ordering::Relaxed);
        CDP_COMMAND_FAILURES_TOTAL
            .with_label_values(&[method])
            .inc();
    }
}

pub fn record_session_opened() {
    SESSIONS_OPENED.fetch_add(1, Ordering::Relaxed);
    CDP_SESSIONS_OPENED_TOTAL.inc();
}

pub fn record_session_closed() {
    SESSIONS_CLOSED.fetch_add(1, Ordering::Relaxed);
    CDP_SESSIONS_CLOSED_TOTAL.inc();
}

pub fn snapshot() -> AdapterMetricsSnapshot {
    AdapterMetricsSnapshot {
        commands: COMMANDS.load(Ordering::Relaxed),
        command_failures: COMMAND_FAILURES.load(Ordering::Relaxed),
        command_latency_total_us: COMMAND_LATENCY_TOTAL_US.load(Ordering::Relaxed),
        sessions_opened: SESSIONS_OPENED.load(Ordering::Relaxed),
        sessions_closed: SESSIONS_CLOSED.load(Ordering::Relaxed),
    }
}
