use chrono::{DateTime, Utc};
use serde_json::{json, Value};

// ============================================================================
// Component Health
// ============================================================================

/// Result of the latest probe of one component.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    /// Still serving, but something needs attention (or has not reported yet).
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    /// `/health` answers 503 only in this state.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded(_) => "degraded",
            HealthStatus::Unhealthy(_) => "unhealthy",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            HealthStatus::Healthy => None,
            HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => Some(reason),
        }
    }
}

/// Probe outcome as held by the health monitor, keyed by component name.
#[derive(Debug, Clone)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub details: Option<String>,
    pub last_check: DateTime<Utc>,
}

impl ComponentHealth {
    pub fn probed(status: HealthStatus, details: Option<String>) -> Self {
        Self {
            status,
            details,
            last_check: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "status": self.status.label(),
            "reason": self.status.reason(),
            "details": self.details,
            "lastCheck": self.last_check,
        })
    }
}
