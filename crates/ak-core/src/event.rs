//! Structured events for flow execution.
//!
//! Every state transition the executor performs produces a [`FlowEvent`].
//! Events carry enough context for operators to reconstruct a user's walk
//! through a flow: which flow, which session, which stage, and the outcome.
//! The specific reason for a terminal failure is recorded here even when the
//! end user only sees a generic message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowEventType {
    /// A plan was computed for a flow.
    FlowPlanned,
    /// A challenge was emitted for the current stage.
    StageChallenged,
    /// A stage accepted a response and the plan advanced.
    StageCompleted,
    /// A stage asked for the challenge to be re-issued.
    StageRetried,
    /// A stage was removed because its policies no longer pass.
    StageSkipped,
    /// Execution was moved to a different flow.
    FlowSwitched,
    /// The plan was exhausted.
    FlowCompleted,
    /// The flow reached a terminal failure.
    FlowAborted,
    /// A response for an already-advanced position was replayed.
    ResponseReplayed,
    /// The client cancelled the flow.
    FlowCancelled,
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

/// A flow execution event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: FlowEventType,
    /// Outcome of the event.
    pub outcome: EventOutcome,
    /// Slug of the flow being executed.
    pub flow: Option<String>,
    /// Session executing the flow.
    pub session_id: Option<String>,
    /// Name of the stage involved.
    pub stage: Option<String>,
    /// Plan position when the event happened.
    pub position: Option<u64>,
    /// Error message (for failure events).
    pub error: Option<String>,
    /// Additional details as key-value pairs.
    pub details: Vec<(String, String)>,
}

impl FlowEvent {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: FlowEventType) -> FlowEventBuilder {
        FlowEventBuilder::new(event_type)
    }

    /// Writes the event to the tracing framework.
    ///
    /// Failures are logged at WARN so operators see terminal flow errors
    /// with their specific reason.
    pub fn emit(&self) {
        match self.outcome {
            EventOutcome::Success => tracing::info!(
                event_id = %self.id,
                event_type = ?self.event_type,
                flow = ?self.flow,
                session_id = ?self.session_id,
                stage = ?self.stage,
                position = ?self.position,
                details = ?self.details,
                "flow_event"
            ),
            EventOutcome::Failure => tracing::warn!(
                event_id = %self.id,
                event_type = ?self.event_type,
                flow = ?self.flow,
                session_id = ?self.session_id,
                stage = ?self.stage,
                position = ?self.position,
                error = ?self.error,
                details = ?self.details,
                "flow_event"
            ),
        }
    }
}

/// Builder for creating events.
#[derive(Debug)]
pub struct FlowEventBuilder {
    event_type: FlowEventType,
    outcome: EventOutcome,
    flow: Option<String>,
    session_id: Option<String>,
    stage: Option<String>,
    position: Option<u64>,
    error: Option<String>,
    details: Vec<(String, String)>,
}

impl FlowEventBuilder {
    /// Creates a new event builder.
    #[must_use]
    pub const fn new(event_type: FlowEventType) -> Self {
        Self {
            event_type,
            outcome: EventOutcome::Success,
            flow: None,
            session_id: None,
            stage: None,
            position: None,
            error: None,
            details: Vec::new(),
        }
    }

    /// Sets the outcome to failure with an error message.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = EventOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Sets the flow slug.
    #[must_use]
    pub fn flow(mut self, slug: impl Into<String>) -> Self {
        self.flow = Some(slug.into());
        self
    }

    /// Sets the session ID.
    #[must_use]
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the stage name.
    #[must_use]
    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Sets the plan position.
    #[must_use]
    pub const fn position(mut self, position: u64) -> Self {
        self.position = Some(position);
        self
    }

    /// Adds a detail key-value pair.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> FlowEvent {
        FlowEvent {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            outcome: self.outcome,
            flow: self.flow,
            session_id: self.session_id,
            stage: self.stage,
            position: self.position,
            error: self.error,
            details: self.details,
        }
    }

    /// Builds and emits the event.
    pub fn emit(self) {
        self.build().emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_creates_success_event() {
        let event = FlowEvent::builder(FlowEventType::StageCompleted)
            .flow("default-authentication-flow")
            .session("s-1")
            .stage("identification")
            .position(2)
            .build();

        assert_eq!(event.event_type, FlowEventType::StageCompleted);
        assert_eq!(event.outcome, EventOutcome::Success);
        assert_eq!(event.flow.as_deref(), Some("default-authentication-flow"));
        assert_eq!(event.stage.as_deref(), Some("identification"));
        assert_eq!(event.position, Some(2));
        assert!(event.error.is_none());
    }

    #[test]
    fn builder_creates_failure_event() {
        let event = FlowEvent::builder(FlowEventType::FlowAborted)
            .failure("target flow missing")
            .detail("target", "enroll")
            .build();

        assert_eq!(event.outcome, EventOutcome::Failure);
        assert_eq!(event.error.as_deref(), Some("target flow missing"));
        assert_eq!(event.details, vec![("target".to_string(), "enroll".to_string())]);
    }

    #[test]
    fn event_type_wire_format() {
        let json = serde_json::to_string(&FlowEventType::FlowSwitched).unwrap();
        assert_eq!(json, "\"FLOW_SWITCHED\"");
    }
}
