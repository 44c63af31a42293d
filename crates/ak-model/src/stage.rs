//! Stage definitions.
//!
//! A stage is a named, typed unit of work. The set of stage types is closed:
//! each variant of [`StageKind`] carries its own configuration, and the
//! executor dispatches on [`StageKind::type_tag`] to find the implementation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stage definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Unique identifier.
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    /// Unique, human-readable name.
    pub name: String,
    /// Variant-specific configuration.
    #[serde(flatten)]
    pub kind: StageKind,
}

impl Stage {
    /// Creates a new stage definition.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            kind,
        }
    }

    /// Returns the registry tag of this stage's type.
    #[must_use]
    pub const fn type_tag(&self) -> &'static str {
        self.kind.type_tag()
    }
}

/// Stage variants and their configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageKind {
    /// Asks the user to identify themselves.
    Identification(IdentificationStage),
    /// Sends the user to a URL or switches execution to another flow.
    Redirect(RedirectStage),
    /// Unconditionally denies access.
    Deny(DenyStage),
    /// Accepts any response; used for testing flows.
    Dummy(DummyStage),
}

impl StageKind {
    /// Returns the registry tag for this stage type.
    #[must_use]
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::Identification(_) => "identification",
            Self::Redirect(_) => "redirect",
            Self::Deny(_) => "deny",
            Self::Dummy(_) => "dummy",
        }
    }

    /// Returns the admin form component used to edit this stage type.
    #[must_use]
    pub const fn component(&self) -> &'static str {
        match self {
            Self::Identification(_) => "ak-stage-identification-form",
            Self::Redirect(_) => "ak-stage-redirect-form",
            Self::Deny(_) => "ak-stage-deny-form",
            Self::Dummy(_) => "ak-stage-dummy-form",
        }
    }

    /// Human-readable name of the stage type.
    #[must_use]
    pub const fn verbose_name(&self) -> &'static str {
        match self {
            Self::Identification(_) => "Identification Stage",
            Self::Redirect(_) => "Redirect Stage",
            Self::Deny(_) => "Deny Stage",
            Self::Dummy(_) => "Dummy Stage",
        }
    }
}

/// Fields a user may identify with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserField {
    /// E-mail address.
    Email,
    /// Username.
    Username,
    /// User principal name.
    Upn,
}

/// Configuration of the identification stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentificationStage {
    /// Fields the user may enter.
    #[serde(default = "default_user_fields")]
    pub user_fields: Vec<UserField>,
    /// Match the identifier case-insensitively.
    #[serde(default = "default_true")]
    pub case_insensitive_matching: bool,
}

impl Default for IdentificationStage {
    fn default() -> Self {
        Self {
            user_fields: default_user_fields(),
            case_insensitive_matching: true,
        }
    }
}

fn default_user_fields() -> Vec<UserField> {
    vec![UserField::Username, UserField::Email]
}

/// Configuration of the redirect stage.
///
/// At least one of `target_static` and `target_flow` must be set; this is
/// checked when the stage is saved (see [`crate::validate::validate_stage`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectStage {
    /// Carry the current plan context into the target flow.
    #[serde(default = "default_true")]
    pub keep_context: bool,
    /// Static URL to send the user to.
    #[serde(default)]
    pub target_static: Option<String>,
    /// Slug of the flow to switch execution to.
    #[serde(default)]
    pub target_flow: Option<String>,
}

impl Default for RedirectStage {
    fn default() -> Self {
        Self {
            keep_context: true,
            target_static: None,
            target_flow: None,
        }
    }
}

impl RedirectStage {
    /// Redirect to a static URL.
    #[must_use]
    pub fn to_static(url: impl Into<String>) -> Self {
        Self {
            target_static: Some(url.into()),
            ..Self::default()
        }
    }

    /// Switch execution to the flow with the given slug.
    #[must_use]
    pub fn to_flow(slug: impl Into<String>, keep_context: bool) -> Self {
        Self {
            keep_context,
            target_static: None,
            target_flow: Some(slug.into()),
        }
    }

    /// Returns the static target, treating empty strings as unset.
    #[must_use]
    pub fn static_target(&self) -> Option<&str> {
        self.target_static.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns the flow target, treating empty strings as unset.
    #[must_use]
    pub fn flow_target(&self) -> Option<&str> {
        self.target_flow.as_deref().filter(|s| !s.is_empty())
    }
}

/// Configuration of the deny stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyStage {
    /// Message shown to the user.
    #[serde(default)]
    pub deny_message: Option<String>,
}

/// Configuration of the dummy stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DummyStage {
    /// Fail when asked for a challenge.
    #[serde(default)]
    pub throw_error: bool,
}

const fn default_true() -> bool {
    true
}
