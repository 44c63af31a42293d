//! Application state management.
//!
//! This module defines the shared state that is passed to all request handlers.

use std::sync::Arc;

use ak_core::{Error, Result};
use ak_flows::{FlowExecutor, PolicyEngine, StageRegistry, StaticPolicyEngine};
use ak_model::Flow;
use ak_storage::{FlowProvider, InMemoryFlowProvider, InMemoryPlanStore, PlanStore};

use crate::config::ServerConfig;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Flow definitions.
    pub flows: Arc<dyn FlowProvider>,

    /// Persisted plans, keyed by session.
    pub plans: Arc<dyn PlanStore>,

    /// Flow executor.
    pub executor: FlowExecutor,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates state backed by in-memory stores, seeded with `flows`.
    ///
    /// ## Errors
    ///
    /// Returns `Error::Validation` if a definition is rejected, and
    /// `Error::Config` if a flow binds a stage type without an implementation.
    pub fn in_memory(
        config: ServerConfig,
        registry: StageRegistry,
        flows: Vec<Flow>,
    ) -> Result<Self> {
        registry
            .validate_required(&flows)
            .map_err(|e| Error::Config(e.to_string()))?;

        let flows: Arc<dyn FlowProvider> = Arc::new(
            InMemoryFlowProvider::with_flows(flows).map_err(|e| Error::Validation(e.to_string()))?,
        );
        let plans: Arc<dyn PlanStore> = Arc::new(InMemoryPlanStore::new());
        let policies: Arc<dyn PolicyEngine> = Arc::new(StaticPolicyEngine::denying(
            config.denied_policies.iter().cloned(),
        ));

        let executor = FlowExecutor::new(
            Arc::clone(&flows),
            Arc::clone(&plans),
            policies,
            Arc::new(registry),
            config.engine.executor.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            flows,
            plans,
            executor,
        })
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the stage registry.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        self.executor.registry()
    }
}
