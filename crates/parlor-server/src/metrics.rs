//! Metrics collection and export for Parlor.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use parlor_core::{ChatError, SweepReport};
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const PARTICIPANTS_JOINED: &str = "parlor_participants_joined_total";
    pub const PARTICIPANTS_EVICTED: &str = "parlor_participants_evicted_total";
    pub const PARTICIPANTS_ACTIVE: &str = "parlor_participants_active";
    pub const MESSAGES_TOTAL: &str = "parlor_messages_total";
    pub const SWEEPS_TOTAL: &str = "parlor_sweeps_total";
    pub const SWEEP_FAILURES: &str = "parlor_sweep_failures_total";
    pub const SWEEP_SECONDS: &str = "parlor_sweep_seconds";
    pub const ERRORS_TOTAL: &str = "parlor_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(names::PARTICIPANTS_JOINED, "Total number of successful joins");
    metrics::describe_counter!(
        names::PARTICIPANTS_EVICTED,
        "Total number of participants evicted for inactivity"
    );
    metrics::describe_gauge!(
        names::PARTICIPANTS_ACTIVE,
        "Participants in the room at the last sweep"
    );
    metrics::describe_counter!(names::MESSAGES_TOTAL, "Total number of messages posted");
    metrics::describe_counter!(names::SWEEPS_TOTAL, "Total number of completed sweeps");
    metrics::describe_counter!(
        names::SWEEP_FAILURES,
        "Sweeps aborted plus individual evictions that failed"
    );
    metrics::describe_histogram!(names::SWEEP_SECONDS, "Sweep duration in seconds");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of request errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a join.
pub fn record_join() {
    counter!(names::PARTICIPANTS_JOINED).increment(1);
}

/// Record a posted message.
pub fn record_message(kind: &str) {
    counter!(names::MESSAGES_TOTAL, "kind" => kind.to_string()).increment(1);
}

/// Record a request error.
pub fn record_error(error: &ChatError) {
    counter!(names::ERRORS_TOTAL, "type" => error.kind()).increment(1);
}

/// Record the outcome of a scheduled sweep.
pub fn record_sweep(result: &Result<SweepReport, ChatError>) {
    match result {
        Ok(report) => {
            counter!(names::SWEEPS_TOTAL).increment(1);
            counter!(names::PARTICIPANTS_EVICTED).increment(report.evicted.len() as u64);
            counter!(names::SWEEP_FAILURES).increment(report.failed as u64);
            gauge!(names::PARTICIPANTS_ACTIVE)
                .set(report.scanned.saturating_sub(report.evicted.len()) as f64);
            histogram!(names::SWEEP_SECONDS).record(report.elapsed.as_secs_f64());
        }
        Err(_) => counter!(names::SWEEP_FAILURES).increment(1),
    }
}
