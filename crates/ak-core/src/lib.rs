//! # ak-core
//!
//! Core configuration, error handling and flow events for the flow engine.
//!
//! This crate provides the foundational types shared by the planner, the
//! executor, the built-in stages and the HTTP layer.
//!
//! ## Contents
//!
//! - [`EngineConfig`] - executor limits and defaults, loadable from the environment
//! - [`Error`] - top-level error type
//! - [`FlowEvent`] - structured audit events for flow execution

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;

pub use config::{EngineConfig, ExecutorConfig};
pub use error::{Error, Result};
pub use event::{FlowEvent, FlowEventBuilder, FlowEventType};
