//! Instance DTOs for the orchestrator API

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::port::Port;

/// Request to create an instance with an explicit config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstance {
    pub config: Value,
}

/// Request to replace the config of an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    pub config: Value,
    /// Member recorded as the author of the new version
    pub actor_id: String,
}

/// Whether the engine container of an organization is running
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub running: bool,
}

/// Ports an instance is expected to expose
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSummary {
    pub api: Port,
    pub configured: Vec<Port>,
}

/// Container created by a start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedInstance {
    pub container_id: String,
}
