//! Plan context.
//!
//! The context is the per-execution key/value state that stages read and
//! write. Keys the engine itself relies on are typed fields; everything else
//! lives in a namespaced scratch area so stages cannot clobber each other.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Context key consulted by the redirect stage before its configured targets.
pub const PLAN_CONTEXT_REDIRECT_STAGE_TARGET: &str = "redirect_stage_target";

/// Context key holding the identifier entered during identification.
pub const PLAN_CONTEXT_PENDING_USER_IDENTIFIER: &str = "pending_user_identifier";

/// Context key holding where the client goes once the flow completes.
pub const PLAN_CONTEXT_REDIRECT: &str = "redirect";

/// Well-known context keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// Runtime override for the redirect stage.
    RedirectStageTarget,
    /// Identifier entered by the user.
    PendingUserIdentifier,
    /// Final redirect after completion.
    Redirect,
}

impl ContextKey {
    /// Returns the wire name of the key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RedirectStageTarget => PLAN_CONTEXT_REDIRECT_STAGE_TARGET,
            Self::PendingUserIdentifier => PLAN_CONTEXT_PENDING_USER_IDENTIFIER,
            Self::Redirect => PLAN_CONTEXT_REDIRECT,
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            PLAN_CONTEXT_REDIRECT_STAGE_TARGET => Some(Self::RedirectStageTarget),
            PLAN_CONTEXT_PENDING_USER_IDENTIFIER => Some(Self::PendingUserIdentifier),
            PLAN_CONTEXT_REDIRECT => Some(Self::Redirect),
            _ => None,
        }
    }
}

/// Per-execution state shared by the stages of a plan.
///
/// The `id` identifies the mapping itself. A flow switch with
/// `keep_context` carries the same context (and id) into the new plan;
/// without it the new plan starts from a fresh context with a new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanContext {
    id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redirect_stage_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending_user_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redirect: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    scratch: BTreeMap<String, Value>,
}

impl Default for PlanContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            redirect_stage_target: None,
            pending_user_identifier: None,
            redirect: None,
            scratch: BTreeMap::new(),
        }
    }

    /// Identity of this context mapping.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns whether no value is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.redirect_stage_target.is_none()
            && self.pending_user_identifier.is_none()
            && self.redirect.is_none()
            && self.scratch.is_empty()
    }

    /// Runtime target for the redirect stage, if any.
    #[must_use]
    pub fn redirect_stage_target(&self) -> Option<&str> {
        self.redirect_stage_target.as_deref()
    }

    /// Sets the runtime target for the redirect stage.
    pub fn set_redirect_stage_target(&mut self, target: impl Into<String>) {
        self.redirect_stage_target = Some(target.into());
    }

    /// Identifier entered by the user, if any.
    #[must_use]
    pub fn pending_user_identifier(&self) -> Option<&str> {
        self.pending_user_identifier.as_deref()
    }

    /// Sets the identifier entered by the user.
    pub fn set_pending_user_identifier(&mut self, identifier: impl Into<String>) {
        self.pending_user_identifier = Some(identifier.into());
    }

    /// Final redirect, if any.
    #[must_use]
    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    /// Sets the final redirect.
    pub fn set_redirect(&mut self, redirect: impl Into<String>) {
        self.redirect = Some(redirect.into());
    }

    /// Reads a well-known key as a string.
    #[must_use]
    pub fn get(&self, key: ContextKey) -> Option<&str> {
        match key {
            ContextKey::RedirectStageTarget => self.redirect_stage_target(),
            ContextKey::PendingUserIdentifier => self.pending_user_identifier(),
            ContextKey::Redirect => self.redirect(),
        }
    }

    /// Writes a well-known key.
    pub fn set(&mut self, key: ContextKey, value: impl Into<String>) {
        let value = Some(value.into());
        match key {
            ContextKey::RedirectStageTarget => self.redirect_stage_target = value,
            ContextKey::PendingUserIdentifier => self.pending_user_identifier = value,
            ContextKey::Redirect => self.redirect = value,
        }
    }

    /// Clears a well-known key, returning the previous value.
    pub fn remove(&mut self, key: ContextKey) -> Option<String> {
        match key {
            ContextKey::RedirectStageTarget => self.redirect_stage_target.take(),
            ContextKey::PendingUserIdentifier => self.pending_user_identifier.take(),
            ContextKey::Redirect => self.redirect.take(),
        }
    }

    /// Reads a stage-private value.
    #[must_use]
    pub fn scratch(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.scratch.get(&scratch_key(namespace, key))
    }

    /// Writes a stage-private value.
    pub fn set_scratch(&mut self, namespace: &str, key: &str, value: Value) {
        self.scratch.insert(scratch_key(namespace, key), value);
    }

    /// Seeds the context from request parameters.
    ///
    /// Well-known keys are routed to their typed fields; string values for
    /// anything else land in the `request` namespace.
    pub fn seed<'a>(&mut self, params: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (name, value) in params {
            match ContextKey::parse(name) {
                Some(key) => self.set(key, value),
                None => self.set_scratch("request", name, Value::String(value.to_string())),
            }
        }
    }
}

fn scratch_key(namespace: &str, key: &str) -> String {
    format!("{namespace}.{key}")
}
