//! Syslog Monitor Core Library
//!
//! Classifies kernel/driver log lines and turns recognized GPU failure
//! signatures into structured health events.

pub mod event;
pub mod handler;
pub mod handlers;
pub mod metrics;
pub mod monitor;

// Re-export common types
pub use event::{Entity, HealthEvent, HealthEvents, RecommendedAction};
pub use handler::{HandlerError, LineHandler};
pub use handlers::{GpuDriverError, GpuDriverErrorHandler};
pub use metrics::{DriverErrorMetrics, MonitorMetrics, NoopMetrics, PrometheusMetrics};
pub use monitor::{LineMonitor, MonitorStats};
