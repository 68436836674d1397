//! Line handler trait and common types
//!
//! A handler recognizes one failure signature in a single log line and turns
//! it into health events. Handlers hold no per-line state.

use thiserror::Error;

use crate::event::HealthEvents;

/// Errors reported by line handlers
///
/// No shipped handler produces these per line; the channel exists so a
/// handler can reject its own setup.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Handler could not be set up from the supplied configuration
    #[error("Handler setup failed: {0}")]
    Setup(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

/// Line handler trait
///
/// Implementations must be thread-safe: the same handler may classify lines
/// from several log streams concurrently.
pub trait LineHandler: Send + Sync {
    /// Short name used in logs and metric labels
    fn name(&self) -> &str;

    /// Classify one log line
    ///
    /// Returns `Ok(None)` when the line is not an instance of the handled
    /// failure class.
    fn process_line(&self, line: &str) -> Result<Option<HealthEvents>, HandlerError>;
}
