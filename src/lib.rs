//! # healing-orchestrator
//!
//! 多模型编排的弹性核心：健康感知路由、重试退避、质量门验证与自愈循环。
//!
//! Resilient orchestration core for multi-agent, multi-provider LLM systems.
//!
//! ## Overview
//!
//! Agents ask the core which provider and model to use for their role, run
//! provider calls through retry and fallback, verify generated content through
//! eight quality gates, and feed failures into a bounded diagnose/fix/re-verify
//! loop that escalates when it cannot converge.
//!
//! ```text
//! role ──► ProviderRouter ──► call (retry + fallback) ──► content
//!                                                          │
//!          SelfHealer ◄── diagnose ◄── GateVerifier ◄──────┘
//!              │                           ▲
//!              └──── fix ──► re-verify ────┘   (≤ max_attempts, then escalate)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use healing_orchestrator::{CallOptions, ProviderRouter};
//!
//! #[tokio::main]
//! async fn main() -> healing_orchestrator::Result<()> {
//!     let router = ProviderRouter::default();
//!
//!     let reply: String = router
//!         .call_with_fallback(
//!             "frontend_dev",
//!             |provider, model| async move {
//!                 // Call the provider's API here.
//!                 Ok::<_, std::io::Error>(format!("{provider}/{model}"))
//!             },
//!             CallOptions::new(),
//!         )
//!         .await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`routing`] | Role routing table, provider health, fallback chains |
//! | [`resilience`] | Backoff schedule and the generic retry executor |
//! | [`verification`] | The eight quality gates and their report |
//! | [`healing`] | Failure categorisation, diagnosis and the heal cycle |
//! | [`pipeline`] | Verify → heal control flow over one piece of content |
//! | [`config`] | Single YAML/JSON document configuring all of the above |
//! | [`logging`] | `tracing` subscriber setup for binaries |

pub mod config;
pub mod healing;
pub mod logging;
pub mod pipeline;
pub mod resilience;
pub mod routing;
pub mod verification;

pub use config::OrchestratorConfig;
pub use healing::{
    Diagnosis, FailureCategory, HealAttempt, HealCycleResult, HealResult, HealingConfig,
    SelfHealer,
};
pub use pipeline::{HealingPipeline, PipelineOutcome};
pub use resilience::{ExecutionResult, ResilientExecutor, RetryConfig};
pub use routing::{CallOptions, ProviderRouter, ProviderStatus, RouteResult, RoutingConfig};
pub use verification::{
    Gate, GateResult, GateStatus, GateVerifier, VerificationContext, VerificationReport,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
