//! Line handlers
//!
//! One handler per recognized failure signature:
//! - GPU driver: nvidia-modeset errors while waiting for GPU progress

mod gpu_driver;

pub use gpu_driver::{GpuDriverError, GpuDriverErrorHandler, GPU_DRIVER_ERROR_CODE};
