//! Retry and backoff primitives.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`backoff`] | Exponential delay schedule with optional cap |
//! | [`executor`] | Generic retrying executor with fallback chains |
//!
//! ```rust,no_run
//! use healing_orchestrator::resilience::{ResilientExecutor, RetryConfig};
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let executor = ResilientExecutor::new(
//!     RetryConfig::new()
//!         .with_max_attempts(4)
//!         .with_base_delay(Duration::from_millis(200)),
//! );
//! let result = executor.execute(|| async { Ok::<_, String>(42) }).await;
//! assert!(result.success);
//! # }
//! ```

pub mod backoff;
pub mod executor;

pub use backoff::Backoff;
pub use executor::{boxed_operation, BoxOperation, ExecutionResult, ResilientExecutor, RetryConfig};
