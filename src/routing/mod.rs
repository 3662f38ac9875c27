//! Health-aware provider routing.
//!
//! This module maps logical roles (e.g. `"director"`) to concrete
//! `(provider, model)` pairs and keeps per-provider health so that a provider
//! with too many consecutive failures stops being chosen up front.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`config`] | Routing tables and the built-in default table |
//! | [`health`] | Health records, thresholds, recovery policy |
//! | [`router`] | Role resolution and `call_with_fallback` |
//!
//! ```rust,no_run
//! use healing_orchestrator::routing::{CallOptions, ProviderRouter, RoutingConfig};
//!
//! # async fn demo() -> healing_orchestrator::Result<()> {
//! let router = ProviderRouter::new(RoutingConfig::default());
//! let route = router.resolve("director");
//! println!("{} / {}", route.provider, route.model);
//!
//! let answer = router
//!     .call_with_fallback(
//!         "director",
//!         |provider, model| async move { Ok::<_, String>(format!("{provider}:{model}")) },
//!         CallOptions::default(),
//!     )
//!     .await?;
//! # let _ = answer;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod health;
pub mod router;

pub use config::{RouteTarget, RoutingConfig, ULTIMATE_FALLBACK_MODEL, ULTIMATE_FALLBACK_PROVIDER};
pub use health::{HealthConfig, HealthSnapshot, HealthStore, ProviderHealth, ProviderStatus};
pub use router::{CallOptions, ProviderRouter, RouteResult};
