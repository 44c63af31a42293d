//! # ak-model
//!
//! Definitions of flows, stages and policy bindings.
//!
//! These are the administrator-authored inputs to the planner. They are
//! read-only during execution: the executor never mutates a [`Flow`].
//!
//! Definition-time checks (for example "a redirect stage needs a target")
//! live in [`validate`] and run when a definition is saved, never during
//! execution.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod flow;
pub mod policy;
pub mod stage;
pub mod validate;

pub use flow::{interface_path, Flow, FlowDesignation, FlowLayout, FlowStageBinding};
pub use policy::{PolicyBinding, PolicyEngineMode};
pub use stage::{
    DenyStage, DummyStage, IdentificationStage, RedirectStage, Stage, StageKind, UserField,
};
pub use validate::{validate_flow, validate_stage, ValidationError};
