//! GPU driver error handler
//!
//! Detects nvidia-modeset failures where the driver gives up waiting for GPU
//! progress. These mean the driver never came up on the GPU, so every match is
//! reported as fatal with a bare-metal restart as remediation.
//!
//! Example line:
//! `nvidia-modeset: ERROR: GPU:2: Error while waiting for GPU progress: 0x0000c77d:0 2:0:4048:4040`

use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::event::{Entity, HealthEvent, HealthEvents, RecommendedAction, HEALTH_EVENT_VERSION};
use crate::handler::{HandlerError, LineHandler};
use crate::metrics::{DriverErrorMetrics, PrometheusMetrics};

/// Error code tag attached to every event from this handler
pub const GPU_DRIVER_ERROR_CODE: &str = "GPU_DRIVER_ERROR";

/// Captures: GPU index, error code (hex with optional `:sub-index`), detail tuple
static GPU_DRIVER_ERROR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"nvidia-modeset: ERROR: GPU:(\d+): Error while waiting for GPU progress: (0x[0-9a-fA-F:]+)\s+(\d+:\d+:\d+:\d+)",
    )
    .expect("Failed to compile GPU driver error pattern")
});

/// Fields extracted from a matching line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuDriverError {
    /// GPU index as it appeared in the line
    pub gpu_id: String,
    /// Error code, e.g. `0x0000c77d:0`
    pub error_code: String,
    /// Four-part detail tuple, e.g. `2:0:4048:4040`
    pub error_details: String,
    /// Original line
    pub message: String,
}

impl GpuDriverError {
    /// Try to parse a GPU driver error from a log line
    pub fn parse(line: &str) -> Option<Self> {
        let caps = GPU_DRIVER_ERROR_PATTERN.captures(line)?;

        Some(Self {
            gpu_id: caps.get(1)?.as_str().to_string(),
            error_code: caps.get(2)?.as_str().to_string(),
            error_details: caps.get(3)?.as_str().to_string(),
            message: line.to_string(),
        })
    }
}

/// Stateless handler that reports GPU driver errors immediately
pub struct GpuDriverErrorHandler {
    node_name: String,
    default_agent_name: String,
    default_component_class: String,
    check_name: String,
    metrics: Arc<dyn DriverErrorMetrics>,
}

impl GpuDriverErrorHandler {
    /// Create a handler reporting to the Prometheus registry
    pub fn new(
        node_name: impl Into<String>,
        default_agent_name: impl Into<String>,
        default_component_class: impl Into<String>,
        check_name: impl Into<String>,
    ) -> Result<Self, HandlerError> {
        Self::with_metrics(
            node_name,
            default_agent_name,
            default_component_class,
            check_name,
            Arc::new(PrometheusMetrics::new()),
        )
    }

    /// Create a handler with a custom metrics sink
    pub fn with_metrics(
        node_name: impl Into<String>,
        default_agent_name: impl Into<String>,
        default_component_class: impl Into<String>,
        check_name: impl Into<String>,
        metrics: Arc<dyn DriverErrorMetrics>,
    ) -> Result<Self, HandlerError> {
        Ok(Self {
            node_name: node_name.into(),
            default_agent_name: default_agent_name.into(),
            default_component_class: default_component_class.into(),
            check_name: check_name.into(),
            metrics,
        })
    }

    /// Classify one line, returning a health event container on match
    pub fn process_line(&self, line: &str) -> Result<Option<HealthEvents>, HandlerError> {
        let Some(error) = GpuDriverError::parse(line) else {
            return Ok(None);
        };

        self.metrics.inc_detected(&self.node_name);

        info!(
            gpu_id = %error.gpu_id,
            error_code = %error.error_code,
            node = %self.node_name,
            "GPU driver error detected"
        );

        Ok(Some(self.build_events(&error)))
    }

    fn build_events(&self, error: &GpuDriverError) -> HealthEvents {
        self.metrics.inc_reported(&self.node_name, &error.gpu_id);

        let message = format!(
            "GPU {}: nvidia-modeset driver error detected. \
             Error code: {}, Details: {}. \
             This indicates the GPU driver is not coming up properly. \
             nvidia-driver-daemonset and device-plugin daemonset may be crashing. \
             Original message: {}",
            error.gpu_id, error.error_code, error.error_details, error.message
        );

        HealthEvents::single(HealthEvent {
            version: HEALTH_EVENT_VERSION,
            agent: self.default_agent_name.clone(),
            check_name: self.check_name.clone(),
            component_class: self.default_component_class.clone(),
            generated_timestamp: Utc::now(),
            entities_impacted: vec![Entity::gpu(error.gpu_id.as_str())],
            message,
            is_fatal: true,
            is_healthy: false,
            node_name: self.node_name.clone(),
            recommended_action: RecommendedAction::RestartBm,
            error_code: vec![GPU_DRIVER_ERROR_CODE.to_string()],
        })
    }
}

impl LineHandler for GpuDriverErrorHandler {
    fn name(&self) -> &str {
        "gpu_driver"
    }

    fn process_line(&self, line: &str) -> Result<Option<HealthEvents>, HandlerError> {
        GpuDriverErrorHandler::process_line(self, line)
    }
}
