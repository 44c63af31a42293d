//! Stage registry.
//!
//! Maps stage type tags (see `StageKind::type_tag`) to the view that
//! implements them. The executor resolves the view for the current stage
//! through this registry.

use std::sync::Arc;

use ak_model::Flow;
use dashmap::DashMap;

use crate::error::{FlowError, FlowResult};
use crate::stage::StageView;

/// Registry of stage implementations.
#[derive(Default)]
pub struct StageRegistry {
    views: DashMap<&'static str, Arc<dyn StageView>>,
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("types", &self.types())
            .finish()
    }
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the view for a stage type, replacing any previous one.
    pub fn register(&self, type_tag: &'static str, view: Arc<dyn StageView>) {
        if self.views.insert(type_tag, view).is_some() {
            tracing::debug!(type_tag, "Replaced stage implementation");
        }
    }

    /// Registers a view and returns the registry.
    #[must_use]
    pub fn with(self, type_tag: &'static str, view: impl StageView + 'static) -> Self {
        self.register(type_tag, Arc::new(view));
        self
    }

    /// Looks up the view for a stage type.
    #[must_use]
    pub fn get(&self, type_tag: &str) -> Option<Arc<dyn StageView>> {
        self.views.get(type_tag).map(|entry| Arc::clone(entry.value()))
    }

    /// Checks if a stage type is registered.
    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.views.contains_key(type_tag)
    }

    /// Lists registered stage types, sorted.
    #[must_use]
    pub fn types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.views.iter().map(|entry| *entry.key()).collect();
        types.sort_unstable();
        types
    }

    /// Returns the number of registered stage types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Checks that every stage bound in the given flows has an implementation.
    ///
    /// ## Errors
    ///
    /// Returns `FlowError::UnknownStageType` for the first missing type.
    pub fn validate_required<'a>(
        &self,
        flows: impl IntoIterator<Item = &'a Flow>,
    ) -> FlowResult<()> {
        for flow in flows {
            for binding in &flow.bindings {
                let type_tag = binding.stage.type_tag();
                if !self.contains(type_tag) {
                    return Err(FlowError::UnknownStageType(type_tag.to_string()));
                }
            }
        }
        Ok(())
    }
}
