//! Top-level configuration document.
//!
//! One YAML or JSON file carries every section; each section is optional and
//! falls back to its defaults.
//!
//! ```yaml
//! routing:
//!   routes:
//!     director: { provider: openai, model: gpt-4o }
//!   fallbacks:
//!     openai: { provider: google, model: gemini-3-pro-preview }
//! health:
//!   unhealthy_threshold: 3
//! retry:
//!   max_attempts: 5
//!   base_delay_ms: 250
//! verification:
//!   gates:
//!     perf: { enabled: false }
//! healing:
//!   max_attempts: 2
//! ```

use crate::healing::{HealingConfig, SelfHealer};
use crate::pipeline::HealingPipeline;
use crate::resilience::{ResilientExecutor, RetryConfig};
use crate::routing::{HealthConfig, HealthStore, ProviderRouter, RoutingConfig};
use crate::verification::{GateVerifier, VerificationConfig};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Environment variable naming the config file read by [`OrchestratorConfig::from_env`].
pub const CONFIG_ENV_VAR: &str = "HEALING_ORCHESTRATOR_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub routing: RoutingConfig,
    pub health: HealthConfig,
    pub retry: RetryConfig,
    pub verification: VerificationConfig,
    pub healing: HealingConfig,
}

impl OrchestratorConfig {
    /// Load from a file: `.json` as JSON, anything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to read config file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("orchestrator_config"),
            )
        })?;
        debug!(path = %path.display(), "loading orchestrator config");

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load the file named by `HEALING_ORCHESTRATOR_CONFIG`, or defaults when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_path(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.routing.validate()?;
        if self.health.unhealthy_threshold == 0 {
            return Err(Error::configuration_with_context(
                "unhealthy_threshold must be at least 1",
                ErrorContext::new()
                    .with_field_path("health.unhealthy_threshold")
                    .with_source("orchestrator_config"),
            ));
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(Error::configuration_with_context(
                "backoff_factor must be a finite number >= 1.0",
                ErrorContext::new()
                    .with_field_path("retry.backoff_factor")
                    .with_details(self.retry.backoff_factor.to_string())
                    .with_source("orchestrator_config"),
            ));
        }
        Ok(())
    }

    pub fn build_router(&self) -> ProviderRouter {
        ProviderRouter::with_health_store(
            self.routing.clone(),
            Arc::new(HealthStore::new(self.health.clone())),
        )
    }

    pub fn build_executor(&self) -> ResilientExecutor {
        ResilientExecutor::new(self.retry.clone())
    }

    pub fn build_verifier(&self) -> GateVerifier {
        GateVerifier::new(self.verification.clone())
    }

    pub fn build_healer(&self) -> SelfHealer {
        SelfHealer::from_config(&self.healing)
    }

    pub fn build_pipeline(&self) -> HealingPipeline {
        HealingPipeline::new(self.build_verifier(), self.build_healer())
    }
}
