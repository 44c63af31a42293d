//! Challenge/response codec.
//!
//! A challenge is what the client is asked to render; a response is what it
//! submits back. Both are tagged by `component`, the shared vocabulary
//! between engine and client. The wire format is JSON:
//!
//! ```json
//! {"component": "xak-flow-redirect", "to": "/if/flow/recovery/", "position": 3}
//! ```

use std::collections::BTreeMap;

use ak_model::{Flow, FlowLayout, UserField};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{FlowError, FlowResult};

/// Component identifiers.
pub mod components {
    /// Redirect the client to `to`.
    pub const REDIRECT: &str = "xak-flow-redirect";
    /// Ask for a user identifier.
    pub const IDENTIFICATION: &str = "ak-stage-identification";
    /// Show an access denied message.
    pub const ACCESS_DENIED: &str = "ak-stage-access-denied";
    /// Accept any submission.
    pub const DUMMY: &str = "ak-stage-dummy";
    /// Show a flow failure.
    pub const FLOW_ERROR: &str = "ak-stage-flow-error";
}

/// Variant-specific challenge payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "component")]
pub enum ChallengeKind {
    /// Navigate to `to`.
    #[serde(rename = "xak-flow-redirect")]
    Redirect {
        /// Target URL or interface path.
        to: String,
    },
    /// Ask for a user identifier.
    #[serde(rename = "ak-stage-identification")]
    Identification {
        /// Fields the user may identify with.
        user_fields: Vec<UserField>,
        /// Label of the submit button.
        primary_action: String,
    },
    /// Access denied.
    #[serde(rename = "ak-stage-access-denied")]
    AccessDenied {
        /// Message shown to the user.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
    /// Dummy challenge.
    #[serde(rename = "ak-stage-dummy")]
    Dummy,
    /// The flow failed.
    #[serde(rename = "ak-stage-flow-error")]
    FlowError {
        /// Message shown to the user.
        error: String,
    },
}

impl ChallengeKind {
    /// Returns the component identifier.
    #[must_use]
    pub const fn component(&self) -> &'static str {
        match self {
            Self::Redirect { .. } => components::REDIRECT,
            Self::Identification { .. } => components::IDENTIFICATION,
            Self::AccessDenied { .. } => components::ACCESS_DENIED,
            Self::Dummy => components::DUMMY,
            Self::FlowError { .. } => components::FLOW_ERROR,
        }
    }
}

/// Flow metadata attached to challenges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowInfo {
    /// Slug of the flow currently executing.
    pub slug: String,
    /// Title shown to the user.
    pub title: String,
    /// Layout hint.
    pub layout: FlowLayout,
    /// Where to send the user to abandon the flow.
    pub cancel_url: String,
}

impl FlowInfo {
    /// Builds flow info from a definition.
    #[must_use]
    pub fn from_flow(flow: &Flow) -> Self {
        Self {
            slug: flow.slug.clone(),
            title: flow.title.clone(),
            layout: flow.layout,
            cancel_url: format!("/api/v3/flows/executor/{}/", flow.slug),
        }
    }
}

/// A single validation error attached to a re-issued challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Message.
    pub string: String,
    /// Machine-readable code.
    pub code: String,
}

impl ErrorDetail {
    /// Creates an `invalid` error detail.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            string: message.into(),
            code: "invalid".to_string(),
        }
    }
}

/// Field name used for errors not tied to one field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// A challenge sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Component and payload.
    #[serde(flatten)]
    pub kind: ChallengeKind,
    /// Flow metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_info: Option<FlowInfo>,
    /// Errors from the previous response, keyed by field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub response_errors: BTreeMap<String, Vec<ErrorDetail>>,
    /// Plan that issued the challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<Uuid>,
    /// Plan position the challenge was issued at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
}

impl Challenge {
    /// Creates a bare challenge.
    #[must_use]
    pub const fn new(kind: ChallengeKind) -> Self {
        Self {
            kind,
            flow_info: None,
            response_errors: BTreeMap::new(),
            plan_id: None,
            position: None,
        }
    }

    /// Redirect challenge.
    #[must_use]
    pub fn redirect(to: impl Into<String>) -> Self {
        Self::new(ChallengeKind::Redirect { to: to.into() })
    }

    /// Flow error challenge.
    #[must_use]
    pub fn flow_error(error: impl Into<String>) -> Self {
        Self::new(ChallengeKind::FlowError {
            error: error.into(),
        })
    }

    /// Attaches flow metadata.
    #[must_use]
    pub fn with_flow_info(mut self, info: FlowInfo) -> Self {
        self.flow_info = Some(info);
        self
    }

    /// Stamps the issuing plan and position.
    #[must_use]
    pub const fn with_stamp(mut self, plan_id: Uuid, position: u64) -> Self {
        self.plan_id = Some(plan_id);
        self.position = Some(position);
        self
    }

    /// Attaches an error for a field.
    #[must_use]
    pub fn with_error(mut self, field: impl Into<String>, detail: ErrorDetail) -> Self {
        self.response_errors
            .entry(field.into())
            .or_default()
            .push(detail);
        self
    }

    /// Returns the component identifier.
    #[must_use]
    pub const fn component(&self) -> &'static str {
        self.kind.component()
    }
}

/// Variant-specific response payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "component")]
pub enum ChallengeResponseKind {
    /// Acknowledges a redirect.
    #[serde(rename = "xak-flow-redirect")]
    Redirect,
    /// Submits a user identifier.
    #[serde(rename = "ak-stage-identification")]
    Identification {
        /// The identifier entered.
        uid_field: String,
    },
    /// Acknowledges an access denied page.
    #[serde(rename = "ak-stage-access-denied")]
    AccessDenied,
    /// Dummy response.
    #[serde(rename = "ak-stage-dummy")]
    Dummy,
}

impl ChallengeResponseKind {
    /// Returns the component identifier.
    #[must_use]
    pub const fn component(&self) -> &'static str {
        match self {
            Self::Redirect => components::REDIRECT,
            Self::Identification { .. } => components::IDENTIFICATION,
            Self::AccessDenied => components::ACCESS_DENIED,
            Self::Dummy => components::DUMMY,
        }
    }
}

/// A response submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// Component and payload.
    #[serde(flatten)]
    pub kind: ChallengeResponseKind,
    /// Plan the answered challenge came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<Uuid>,
    /// Position of the answered challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
}

impl ChallengeResponse {
    /// Creates an unstamped response.
    #[must_use]
    pub const fn new(kind: ChallengeResponseKind) -> Self {
        Self {
            kind,
            plan_id: None,
            position: None,
        }
    }

    /// Stamps the response with the plan and position it answers.
    #[must_use]
    pub const fn answering(mut self, plan_id: Uuid, position: u64) -> Self {
        self.plan_id = Some(plan_id);
        self.position = Some(position);
        self
    }

    /// Decodes a response from JSON.
    ///
    /// ## Errors
    ///
    /// Returns `FlowError::InvalidResponse` if `component` is missing or
    /// unknown, or the payload does not match it.
    pub fn from_value(value: Value) -> FlowResult<Self> {
        if value.get("component").and_then(Value::as_str).is_none() {
            return Err(FlowError::InvalidResponse(
                "component: This field is required.".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| FlowError::InvalidResponse(e.to_string()))
    }

    /// Returns the component identifier.
    #[must_use]
    pub const fn component(&self) -> &'static str {
        self.kind.component()
    }
}
