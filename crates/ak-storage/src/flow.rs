//! Flow storage provider trait.

use ak_model::Flow;
use async_trait::async_trait;

use crate::error::StorageResult;

/// Provider for flow definitions.
///
/// Implementations must be thread-safe and support concurrent access.
#[async_trait]
pub trait FlowProvider: Send + Sync {
    /// Resolves a flow by slug.
    async fn get_by_slug(&self, slug: &str) -> StorageResult<Option<Flow>>;

    /// Lists all flows.
    async fn list(&self) -> StorageResult<Vec<Flow>>;

    /// Creates or replaces a flow.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::InvalidData` if the definition fails validation.
    async fn save(&self, flow: Flow) -> StorageResult<()>;

    /// Deletes a flow by slug.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the flow doesn't exist.
    async fn delete(&self, slug: &str) -> StorageResult<()>;

    /// Checks if a flow exists.
    async fn exists(&self, slug: &str) -> StorageResult<bool> {
        Ok(self.get_by_slug(slug).await?.is_some())
    }
}
