//! Core domain types
//!
//! Shared between the orchestrator (which persists instances and runs their
//! containers) and anything that talks to its API.

pub mod instance;
pub mod port;
