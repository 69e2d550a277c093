//! Service Module
//!
//! Business logic layer for the orchestrator.
//! The registry owns instance persistence; the orchestrator ties it to the
//! container lifecycle.

pub mod cache;
pub mod orchestrator;
pub mod registry;

pub use cache::InstanceCache;
pub use orchestrator::{LifecycleError, Orchestrator};
pub use registry::{InstanceError, InstanceRegistry};
