//! Prometheus counters for the Conduit server.
//!
//! Per-command invocation counts and durations, plus manifest hash resolution
//! counters broken down by tier.

use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Command metrics
pub static COMMANDS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "conduit_commands_total",
            "Total number of commands executed by command name",
        ),
        &["command"],
    )
    .expect("metric creation failed")
});

pub static COMMAND_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "conduit_command_duration_seconds",
            "Time taken to execute a command",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0,
        ]),
        &["command"],
    )
    .expect("metric creation failed")
});

pub static COMMAND_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "conduit_command_failures_total",
            "Total number of commands that returned an execution error",
        ),
        &["command"],
    )
    .expect("metric creation failed")
});

pub static PROTOCOL_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "conduit_protocol_errors_total",
        "Total number of payloads that did not deserialize to a command",
    )
    .expect("metric creation failed")
});

// Manifest hash metrics
pub static MANIFEST_HASH_MEMORY_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "conduit_manifest_hash_memory_cache_hits_total",
        "Manifest hashes served from the in-memory cache",
    )
    .expect("metric creation failed")
});

pub static MANIFEST_HASH_MEMORY_WRITES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "conduit_manifest_hash_memory_cache_writes_total",
        "Manifest hashes written to the in-memory cache",
    )
    .expect("metric creation failed")
});

pub static MANIFEST_HASH_PERSISTENT_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "conduit_manifest_hash_persistent_cache_hits_total",
        "Manifest hashes served from the persistent cache",
    )
    .expect("metric creation failed")
});

pub static MANIFEST_HASH_PERSISTENT_WRITES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "conduit_manifest_hash_persistent_cache_writes_total",
        "Manifest hashes written to the persistent cache",
    )
    .expect("metric creation failed")
});

pub static MANIFEST_HASH_LOCAL_COMPUTATIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "conduit_manifest_hash_local_computations_total",
        "Manifest hashes computed from local file content",
    )
    .expect("metric creation failed")
});

pub static MANIFEST_HASH_COMPUTATION_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "conduit_manifest_hash_computation_failures_total",
        "Manifest hash resolutions that failed",
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent: calls after the first are no-ops, so tests and embedders may
/// construct several servers in one process.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(COMMANDS_TOTAL.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(COMMAND_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(COMMAND_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PROTOCOL_ERRORS.clone()))
            .expect("metric registration failed");

        REGISTRY
            .register(Box::new(MANIFEST_HASH_MEMORY_HITS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MANIFEST_HASH_MEMORY_WRITES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MANIFEST_HASH_PERSISTENT_HITS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MANIFEST_HASH_PERSISTENT_WRITES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MANIFEST_HASH_LOCAL_COMPUTATIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MANIFEST_HASH_COMPUTATION_FAILURES.clone()))
            .expect("metric registration failed");
    });
}

/// Render every registered metric in the Prometheus text format.
pub fn render_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {e}"))?;
    String::from_utf8(buffer).map_err(|e| format!("Failed to encode metrics: {e}"))
}

/// Log the final value of every registered counter.
pub fn log_final_counters() {
    for family in REGISTRY.gather() {
        for metric in family.get_metric() {
            let labels: Vec<String> = metric
                .get_label()
                .iter()
                .map(|l| format!("{}={}", l.get_name(), l.get_value()))
                .collect();
            if metric.has_counter() {
                tracing::info!(
                    metric = family.get_name(),
                    labels = %labels.join(","),
                    value = metric.get_counter().get_value(),
                    "final counter"
                );
            } else if metric.has_histogram() {
                let histogram = metric.get_histogram();
                tracing::info!(
                    metric = family.get_name(),
                    labels = %labels.join(","),
                    count = histogram.get_sample_count(),
                    sum_seconds = histogram.get_sample_sum(),
                    "final duration"
                );
            }
        }
    }
}
