//! Health check for a gateway instance

use crate::config::{GatewaySettings, InstanceSettings};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

/// Result shown to whoever triggered the check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub message: String,
}

impl HealthCheckResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Ok,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

/// Check raw instance settings. Never fails; problems are reported in the result.
pub fn check_instance_health(instance: &InstanceSettings) -> HealthCheckResult {
    match GatewaySettings::from_instance(instance) {
        Ok(settings) => check_settings_health(&settings),
        Err(e) => {
            warn!(error = %e, "Unable to load settings");
            HealthCheckResult::error("Unable to load settings")
        }
    }
}

/// Check already parsed settings
pub fn check_settings_health(settings: &GatewaySettings) -> HealthCheckResult {
    if settings.api_key().is_none() {
        return HealthCheckResult::error("API key is missing");
    }
    HealthCheckResult::ok("Data source is working")
}
