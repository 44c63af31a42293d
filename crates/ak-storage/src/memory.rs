//! In-memory provider implementations.
//!
//! For development, single-instance deployments and tests. With multiple
//! instances the plan store must be shared (e.g. Redis) so a session can
//! continue on any node.

use std::collections::HashMap;
use std::time::Duration;

use ak_model::{validate_flow, Flow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::flow::FlowProvider;
use crate::plan::PlanStore;

/// In-memory flow provider.
#[derive(Debug, Default)]
pub struct InMemoryFlowProvider {
    flows: RwLock<HashMap<String, Flow>>,
}

impl InMemoryFlowProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider holding the given flows.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::InvalidData` for the first definition that
    /// fails validation.
    pub fn with_flows(flows: impl IntoIterator<Item = Flow>) -> StorageResult<Self> {
        let provider = Self::new();
        for flow in flows {
            provider.insert(flow)?;
        }
        Ok(provider)
    }

    fn insert(&self, flow: Flow) -> StorageResult<()> {
        validate_flow(&flow).map_err(|e| StorageError::InvalidData(e.to_string()))?;
        self.flows.write().insert(flow.slug.clone(), flow);
        Ok(())
    }

    /// Returns the number of stored flows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flows.read().len()
    }

    /// Returns whether no flows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flows.read().is_empty()
    }
}

#[async_trait]
impl FlowProvider for InMemoryFlowProvider {
    async fn get_by_slug(&self, slug: &str) -> StorageResult<Option<Flow>> {
        Ok(self.flows.read().get(slug).cloned())
    }

    async fn list(&self) -> StorageResult<Vec<Flow>> {
        let mut flows: Vec<Flow> = self.flows.read().values().cloned().collect();
        flows.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(flows)
    }

    async fn save(&self, flow: Flow) -> StorageResult<()> {
        self.insert(flow)
    }

    async fn delete(&self, slug: &str) -> StorageResult<()> {
        self.flows
            .write()
            .remove(slug)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("Flow", slug))
    }
}

#[derive(Debug, Clone)]
struct StoredPlan {
    data: Vec<u8>,
    expires_at: DateTime<Utc>,
}

impl StoredPlan {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// In-memory plan store with per-entry expiry.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: DashMap<String, StoredPlan>,
}

impl InMemoryPlanStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored plans, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Returns whether the store holds no plans.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn load(&self, session_id: &str) -> StorageResult<Option<Vec<u8>>> {
        let now = Utc::now();
        let expired = match self.plans.get(session_id) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.data.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            tracing::debug!(session_id, "Dropping expired plan");
            self.plans.remove(session_id);
        }
        Ok(None)
    }

    async fn save(&self, session_id: &str, data: &[u8], ttl: Duration) -> StorageResult<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::Internal(format!("invalid plan ttl: {e}")))?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| StorageError::Internal("plan ttl out of range".to_string()))?;
        self.plans.insert(
            session_id.to_string(),
            StoredPlan {
                data: data.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> StorageResult<()> {
        self.plans.remove(session_id);
        Ok(())
    }

    async fn purge_expired(&self) -> StorageResult<u64> {
        let now = Utc::now();
        let before = self.plans.len();
        self.plans.retain(|_, plan| !plan.is_expired(now));
        let removed = before.saturating_sub(self.plans.len());
        Ok(removed as u64)
    }
}
