//! # ak-storage
//!
//! Storage abstraction traits for the flow engine.
//!
//! The engine treats persistence as an external collaborator. This crate
//! defines the two interfaces it consumes and in-memory implementations
//! suitable for a single process and for tests.
//!
//! ## Provider Traits
//!
//! - [`FlowProvider`] - lookup and storage of flow definitions
//! - [`PlanStore`] - per-session persistence of in-progress plans

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod flow;
pub mod memory;
pub mod plan;

pub use error::{StorageError, StorageResult};
pub use flow::FlowProvider;
pub use memory::{InMemoryFlowProvider, InMemoryPlanStore};
pub use plan::PlanStore;
