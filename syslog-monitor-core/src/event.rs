//! Health event model
//!
//! Structured records handed to downstream delivery. Field names follow the
//! camelCase wire format used by the health-event aggregation pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current version tag for health events and containers
pub const HEALTH_EVENT_VERSION: u32 = 1;

/// Entity type used for GPU impacted entities
pub const ENTITY_TYPE_GPU: &str = "GPU";

/// Remediation hint attached to a health event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    /// No action required
    #[default]
    None,
    /// Reset the affected component
    ComponentReset,
    /// Escalate to hardware support
    ContactSupport,
    /// Run field diagnostics
    RunFieldDiag,
    /// Restart the virtual machine
    RestartVm,
    /// Restart the bare-metal host
    RestartBm,
    /// Replace the virtual machine
    ReplaceVm,
    /// Remediation cannot be determined
    Unknown,
}

impl RecommendedAction {
    /// Human-readable description of the remediation
    pub fn description(&self) -> &'static str {
        match self {
            RecommendedAction::None => "no action required.",
            RecommendedAction::ComponentReset => "reset the affected component.",
            RecommendedAction::ContactSupport => "contact hardware support.",
            RecommendedAction::RunFieldDiag => "run field diagnostics.",
            RecommendedAction::RestartVm => "restart the virtual machine.",
            RecommendedAction::RestartBm => "restart the bare-metal host.",
            RecommendedAction::ReplaceVm => "replace the virtual machine.",
            RecommendedAction::Unknown => "unknown remediation.",
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendedAction::None => write!(f, "NONE"),
            RecommendedAction::ComponentReset => write!(f, "COMPONENT_RESET"),
            RecommendedAction::ContactSupport => write!(f, "CONTACT_SUPPORT"),
            RecommendedAction::RunFieldDiag => write!(f, "RUN_FIELD_DIAG"),
            RecommendedAction::RestartVm => write!(f, "RESTART_VM"),
            RecommendedAction::RestartBm => write!(f, "RESTART_BM"),
            RecommendedAction::ReplaceVm => write!(f, "REPLACE_VM"),
            RecommendedAction::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Hardware unit affected by a fault
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Entity kind (e.g. "GPU")
    pub entity_type: String,
    /// Identifier of the entity as reported by the source
    pub entity_value: String,
}

impl Entity {
    /// Create a GPU entity
    pub fn gpu(index: impl Into<String>) -> Self {
        Self {
            entity_type: ENTITY_TYPE_GPU.to_string(),
            entity_value: index.into(),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_value)
    }
}

/// A single detected fault condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEvent {
    /// Schema version
    pub version: u32,
    /// Reporting agent
    pub agent: String,
    /// Monitoring check that produced the event
    pub check_name: String,
    /// Subsystem class (e.g. "GPU")
    pub component_class: String,
    /// When the event was constructed
    pub generated_timestamp: DateTime<Utc>,
    /// Affected hardware units
    pub entities_impacted: Vec<Entity>,
    /// Human-readable explanation
    pub message: String,
    /// Whether the fault requires remediation
    pub is_fatal: bool,
    /// Whether the event reports a healthy condition
    pub is_healthy: bool,
    /// Node the event originated from
    pub node_name: String,
    /// Remediation hint
    pub recommended_action: RecommendedAction,
    /// Failure class tags
    pub error_code: Vec<String>,
}

/// Container of health events produced from one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEvents {
    /// Schema version
    pub version: u32,
    /// Events in this batch
    pub events: Vec<HealthEvent>,
}

impl HealthEvents {
    /// Wrap a single event
    pub fn single(event: HealthEvent) -> Self {
        Self {
            version: HEALTH_EVENT_VERSION,
            events: vec![event],
        }
    }
}
