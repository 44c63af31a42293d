//! # ak-flows
//!
//! Flow planning and execution.
//!
//! A flow is planned into a [`FlowPlan`] for one session and then driven,
//! one request at a time, by the [`FlowExecutor`]. Each stage type plugs in
//! through the [`StageView`] trait and is looked up in a [`StageRegistry`].
//!
//! ## Execution
//!
//! - The [`FlowPlanner`] evaluates flow and binding policies and schedules stages
//! - The executor asks the current stage for a [`Challenge`]
//! - The client answers with a [`ChallengeResponse`]
//! - The stage reports a [`StageOutcome`]: advance, retry, abort, or switch flows
//!
//! ## Example
//!
//! ```ignore
//! use ak_flows::{FlowExecutor, FlowRequest, ExecutorResponse};
//!
//! let request = FlowRequest::new(session_id, "default-authentication-flow");
//! match executor.get(&request).await? {
//!     ExecutorResponse::Challenge(challenge) => render(challenge),
//!     ExecutorResponse::Completed { to } => redirect(to),
//!     ExecutorResponse::Aborted { error, .. } => show_error(error.public_message()),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod challenge;
pub mod context;
pub mod error;
pub mod executor;
pub mod plan;
pub mod planner;
pub mod policy;
pub mod registry;
pub mod stage;

pub use challenge::{
    components, Challenge, ChallengeKind, ChallengeResponse, ChallengeResponseKind, ErrorDetail,
    FlowInfo, NON_FIELD_ERRORS,
};
pub use context::{ContextKey, PlanContext, PLAN_CONTEXT_REDIRECT_STAGE_TARGET};
pub use error::{FlowError, FlowResult};
pub use executor::{ExecutorResponse, FlowExecutor, FlowRequest};
pub use plan::{ExecutionState, FlowPlan, PlannedStage};
pub use planner::FlowPlanner;
pub use policy::{PolicyEngine, PolicyResult, StaticPolicyEngine};
pub use registry::StageRegistry;
pub use stage::{StageContext, StageOutcome, StageView};
