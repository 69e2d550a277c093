//! Pipeline instance domain types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The persisted pipeline of one organization.
///
/// Created once per organization and mutated in place when its config
/// changes. Every creation or update also appends a
/// [`PipelineInstanceVersion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInstance {
    pub id: Uuid,
    pub org_id: String,
    pub config: Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl PipelineInstance {
    /// Returns the config as a structured document.
    ///
    /// Older rows store the config as a serialized YAML/JSON string rather
    /// than a document; those are parsed on the way out.
    pub fn parsed_config(&self) -> Result<Value, serde_yaml::Error> {
        match &self.config {
            Value::String(raw) => serde_yaml::from_str(raw),
            other => Ok(other.clone()),
        }
    }
}

/// Append-only snapshot of an instance config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInstanceVersion {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub config: Value,
    /// Starts at 1 and increases by one per update of the instance
    pub version_number: i32,
    /// Member id of the author
    pub created_by: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
