//! Prometheus metrics for the syslog monitor

use once_cell::sync::Lazy;
use prometheus::{opts, register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

/// GPU driver errors detected, per node
static GPU_DRIVER_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "syslog_monitor_gpu_driver_errors_total",
            "Total number of GPU driver errors detected"
        ),
        &["node"]
    )
    .expect("Failed to create gpu_driver_errors metric")
});

/// GPU driver errors reported as health events, per node and GPU
static GPU_DRIVER_ERRORS_REPORTED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "syslog_monitor_gpu_driver_errors_reported_total",
            "Total number of GPU driver errors reported per GPU"
        ),
        &["node", "gpu_id"]
    )
    .expect("Failed to create gpu_driver_errors_reported metric")
});

/// Lines read by the monitor
static LINES_PROCESSED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "syslog_monitor_lines_processed_total",
        "Total number of log lines processed"
    ))
    .expect("Failed to create lines_processed metric")
});

/// Handler failures, per handler
static HANDLER_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "syslog_monitor_handler_errors_total",
            "Total number of line handler errors"
        ),
        &["handler"]
    )
    .expect("Failed to create handler_errors metric")
});

/// Counters recorded when a GPU driver error is detected
///
/// Increments are fire-and-forget: they cannot fail and must not block.
pub trait DriverErrorMetrics: Send + Sync {
    /// Count one detection on `node`
    fn inc_detected(&self, node: &str);

    /// Count one reported event for `gpu_id` on `node`
    fn inc_reported(&self, node: &str, gpu_id: &str);
}

/// Counters recorded by the line monitor
pub trait MonitorMetrics: Send + Sync {
    /// Count one processed line
    fn inc_lines_processed(&self);

    /// Count one handler failure
    fn inc_handler_error(&self, handler: &str);
}

/// Metrics backed by the default Prometheus registry
pub struct PrometheusMetrics;

impl PrometheusMetrics {
    /// Create a new metrics handle
    pub fn new() -> Self {
        // Force initialization of lazy statics
        let _ = &*GPU_DRIVER_ERRORS;
        let _ = &*GPU_DRIVER_ERRORS_REPORTED;
        let _ = &*LINES_PROCESSED;
        let _ = &*HANDLER_ERRORS;
        Self
    }
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverErrorMetrics for PrometheusMetrics {
    fn inc_detected(&self, node: &str) {
        GPU_DRIVER_ERRORS.with_label_values(&[node]).inc();
    }

    fn inc_reported(&self, node: &str, gpu_id: &str) {
        GPU_DRIVER_ERRORS_REPORTED
            .with_label_values(&[node, gpu_id])
            .inc();
    }
}

impl MonitorMetrics for PrometheusMetrics {
    fn inc_lines_processed(&self) {
        LINES_PROCESSED.inc();
    }

    fn inc_handler_error(&self, handler: &str) {
        HANDLER_ERRORS.with_label_values(&[handler]).inc();
    }
}

/// Metrics sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl DriverErrorMetrics for NoopMetrics {
    fn inc_detected(&self, _node: &str) {}

    fn inc_reported(&self, _node: &str, _gpu_id: &str) {}
}

impl MonitorMetrics for NoopMetrics {
    fn inc_lines_processed(&self) {}

    fn inc_handler_error(&self, _handler: &str) {}
}
