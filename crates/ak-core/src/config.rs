//! Configuration for the flow engine.
//!
//! Values are loaded from environment variables (and a `.env` file when
//! present), falling back to defaults for anything absent or unparseable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of failed attempts a single stage may accumulate.
pub const DEFAULT_MAX_STAGE_ATTEMPTS: u32 = 5;

/// Default lifetime of a persisted plan, in seconds.
pub const DEFAULT_PLAN_TTL_SECONDS: u64 = 1800;

/// Longest accepted plan lifetime, in seconds (30 days).
pub const MAX_PLAN_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executor configuration.
    pub executor: ExecutorConfig,
}

/// Flow executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Failed attempts on one stage after which the flow aborts.
    pub max_stage_attempts: u32,
    /// Lifetime of a persisted plan in the session store.
    pub plan_ttl_seconds: u64,
    /// Where a completed flow sends the client when the plan has no redirect.
    pub default_redirect: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_stage_attempts: DEFAULT_MAX_STAGE_ATTEMPTS,
            plan_ttl_seconds: DEFAULT_PLAN_TTL_SECONDS,
            default_redirect: "/".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Returns the plan lifetime as a [`Duration`].
    #[must_use]
    pub const fn plan_ttl(&self) -> Duration {
        Duration::from_secs(self.plan_ttl_seconds)
    }
}

impl EngineConfig {
    /// Loads configuration from environment variables.
    ///
    /// | Variable                | Default |
    /// |-------------------------|---------|
    /// | `AK_MAX_STAGE_ATTEMPTS` | `5`     |
    /// | `AK_PLAN_TTL`           | `1800`, at most 30 days |
    /// | `AK_DEFAULT_REDIRECT`   | `/`     |
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let defaults = ExecutorConfig::default();

        let max_stage_attempts = std::env::var("AK_MAX_STAGE_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v: &u32| *v > 0)
            .unwrap_or(defaults.max_stage_attempts);

        let plan_ttl_seconds = std::env::var("AK_PLAN_TTL")
            .ok()
            .and_then(|v| parse_plan_ttl(&v))
            .unwrap_or(defaults.plan_ttl_seconds);

        let default_redirect = std::env::var("AK_DEFAULT_REDIRECT")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.default_redirect);

        Self {
            executor: ExecutorConfig {
                max_stage_attempts,
                plan_ttl_seconds,
                default_redirect,
            },
        }
    }

    /// Creates a configuration for testing with a low retry ceiling.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            executor: ExecutorConfig {
                max_stage_attempts: 3,
                plan_ttl_seconds: 60,
                default_redirect: "/".to_string(),
            },
        }
    }
}

/// Parses a plan lifetime, rejecting zero and anything above
/// [`MAX_PLAN_TTL_SECONDS`].
fn parse_plan_ttl(value: &str) -> Option<u64> {
    value
        .trim()
        .parse()
        .ok()
        .filter(|ttl| (1..=MAX_PLAN_TTL_SECONDS).contains(ttl))
}
