//! Routing tables: role → primary target, provider → fallback target.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Provider of the hard-coded last-resort route.
pub const ULTIMATE_FALLBACK_PROVIDER: &str = "anthropic";
/// Model of the hard-coded last-resort route.
pub const ULTIMATE_FALLBACK_MODEL: &str = "claude-sonnet-4-6";

/// A concrete (provider, model) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteTarget {
    pub provider: String,
    pub model: String,
}

impl RouteTarget {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    pub fn ultimate_fallback() -> Self {
        Self::new(ULTIMATE_FALLBACK_PROVIDER, ULTIMATE_FALLBACK_MODEL)
    }
}

fn default_ultimate_fallback() -> RouteTarget {
    RouteTarget::ultimate_fallback()
}

/// Immutable routing configuration.
///
/// `routes` is also accepted under the key `routing` when loading documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default, alias = "routing")]
    pub routes: BTreeMap<String, RouteTarget>,
    #[serde(default)]
    pub fallbacks: BTreeMap<String, RouteTarget>,
    #[serde(default = "default_ultimate_fallback")]
    pub ultimate_fallback: RouteTarget,
}

impl Default for RoutingConfig {
    /// The built-in team routing table.
    fn default() -> Self {
        Self::empty()
            .with_route("director", "anthropic", "claude-opus-4-6")
            .with_route("design_system", "google", "gemini-3-pro-preview")
            .with_route("frontend_dev", "anthropic", "claude-sonnet-4-6")
            .with_route("backend_dev", "anthropic", "claude-sonnet-4-6")
            .with_route("accessibility", "anthropic", "claude-haiku-4-5")
            .with_route("performance", "google", "gemini-3-flash-preview")
            .with_route("seo_content", "openai", "gpt-4o")
            .with_route("qa", "xai", "grok-3")
            .with_fallback("anthropic", "google", "gemini-3-pro-preview")
            .with_fallback("google", "anthropic", "claude-sonnet-4-6")
            .with_fallback("openai", "anthropic", "claude-sonnet-4-6")
            .with_fallback("xai", "google", "gemini-3-flash-preview")
    }
}

impl RoutingConfig {
    /// A configuration with no routes; every role resolves to the ultimate fallback.
    pub fn empty() -> Self {
        Self {
            routes: BTreeMap::new(),
            fallbacks: BTreeMap::new(),
            ultimate_fallback: RouteTarget::ultimate_fallback(),
        }
    }

    pub fn with_route(
        mut self,
        role: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.routes
            .insert(role.into(), RouteTarget::new(provider, model));
        self
    }

    pub fn with_fallback(
        mut self,
        for_provider: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.fallbacks
            .insert(for_provider.into(), RouteTarget::new(provider, model));
        self
    }

    pub fn with_ultimate_fallback(mut self, target: RouteTarget) -> Self {
        self.ultimate_fallback = target;
        self
    }

    pub fn route(&self, role: &str) -> Option<&RouteTarget> {
        self.routes.get(role)
    }

    /// Configured fallback for `provider`, or the ultimate fallback.
    pub fn fallback_for(&self, provider: &str) -> &RouteTarget {
        self.fallbacks
            .get(provider)
            .unwrap_or(&self.ultimate_fallback)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(|s| s.as_str())
    }

    /// Load from a file: `.json` as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to read routing config: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("routing_config"),
            )
        })?;
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

    /// Reject empty provider or model names.
    pub fn validate(&self) -> Result<()> {
        let tables = [("routes", &self.routes), ("fallbacks", &self.fallbacks)];
        for (table, entries) in tables {
            for (key, target) in entries.iter() {
                check_target(&format!("{}.{}", table, key), target)?;
            }
        }
        check_target("ultimate_fallback", &self.ultimate_fallback)
    }
}

fn check_target(path: &str, target: &RouteTarget) -> Result<()> {
    for (field, value) in [("provider", &target.provider), ("model", &target.model)] {
        if value.trim().is_empty() {
            return Err(Error::configuration_with_context(
                format!("{} must not be empty", field),
                ErrorContext::new()
                    .with_field_path(format!("{}.{}", path, field))
                    .with_source("routing_config"),
            ));
        }
    }
    Ok(())
}
