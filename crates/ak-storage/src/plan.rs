//! Plan store trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Session store for in-progress plans.
///
/// The store is opaque to plan structure: it keeps the serialized bytes the
/// executor hands it, keyed by session. A plan that outlives its TTL reads
/// as absent.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Loads the plan stored for a session.
    async fn load(&self, session_id: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores (or replaces) the plan for a session.
    async fn save(&self, session_id: &str, data: &[u8], ttl: Duration) -> StorageResult<()>;

    /// Removes the plan for a session.
    ///
    /// Returns `Ok(())` even if nothing was stored.
    async fn delete(&self, session_id: &str) -> StorageResult<()>;

    /// Removes expired plans.
    ///
    /// Returns the number of plans removed.
    async fn purge_expired(&self) -> StorageResult<u64>;
}
