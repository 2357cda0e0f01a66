//! Endpoint health types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classified liveness of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Liveness route answered below 400.
    Healthy,
    /// Liveness route answered 4xx.
    Degraded,
    /// Liveness route answered 5xx, timed out or refused the connection.
    Unhealthy,
    /// Never probed, or the probe failed for a reason not attributable
    /// to the endpoint.
    #[default]
    Unknown,
}

impl HealthStatus {
    /// The lowercase name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-known health of one endpoint.
///
/// Replaced wholesale by each probe or manual override, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthState {
    /// Classified status.
    pub status: HealthStatus,
    /// When the state was produced. `None` means the endpoint was never probed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
    /// Free-form diagnostic.
    #[serde(default)]
    pub detail: String,
}

impl HealthState {
    /// The initial state of an endpoint entering a registry.
    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }

    /// A state with the given status and no timestamp or detail.
    ///
    /// Used for manual overrides.
    #[must_use]
    pub fn with_status(status: HealthStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// A probe result stamped with the current time.
    pub fn checked(status: HealthStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            checked_at: Some(Utc::now()),
            detail: detail.into(),
        }
    }

    /// Returns true if the status is [`HealthStatus::Healthy`].
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Returns true if this state came from a probe.
    #[must_use]
    pub const fn was_probed(&self) -> bool {
        self.checked_at.is_some()
    }
}
