//! End-to-End Integration Tests
//!
//! These tests run the complete server in-process on an ephemeral port and
//! drive flows over HTTP.

mod definitions;
mod flow_execution;
mod redirect;
