//! Orchestrator
//!
//! Entry point for callers: instance persistence through the registry and
//! engine lifecycle through the container manager. Starts and stops of one
//! organization never overlap within this process.

use serde_json::Value;
use sift_core::domain::instance::{PipelineInstance, PipelineInstanceVersion};
use sift_core::dto::instance::PortSummary;
use sift_core::ports::{analyze_ports, api_port};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::container::ContainerManager;
use crate::service::registry::{InstanceError, InstanceRegistry};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error(transparent)]
    Runtime(#[from] anyhow::Error),

    #[error("failed to render engine config: {0}")]
    Render(#[from] serde_yaml::Error),

    #[error("container {container} not ready after {attempts} probe(s)")]
    StartupTimeout { container: String, attempts: u32 },
}

pub struct Orchestrator {
    registry: InstanceRegistry,
    containers: ContainerManager,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(registry: InstanceRegistry, containers: ContainerManager) -> Self {
        Self {
            registry,
            containers,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn ensure_default_instance(
        &self,
        org_id: &str,
    ) -> Result<PipelineInstance, InstanceError> {
        self.registry.ensure_default(org_id).await
    }

    pub async fn create_instance(
        &self,
        org_id: &str,
        config: Value,
    ) -> Result<PipelineInstance, InstanceError> {
        self.registry.create_instance(org_id, config).await
    }

    pub async fn get_instance(&self, org_id: &str) -> Result<PipelineInstance, InstanceError> {
        self.registry.get_instance(org_id).await
    }

    /// Stores a new config; a running engine keeps its old one until restarted
    pub async fn update_config(
        &self,
        org_id: &str,
        config: Value,
        actor_id: &str,
    ) -> Result<PipelineInstanceVersion, InstanceError> {
        self.registry.update_config(org_id, config, actor_id).await
    }

    pub async fn list_versions(
        &self,
        org_id: &str,
    ) -> Result<Vec<PipelineInstanceVersion>, InstanceError> {
        self.registry.list_versions(org_id).await
    }

    /// Ports the organization's engine is expected to expose
    pub async fn configured_ports(&self, org_id: &str) -> Result<PortSummary, LifecycleError> {
        let config = self.registry.get_instance(org_id).await?.parsed_config()?;

        Ok(PortSummary {
            api: api_port(self.containers.settings().api_port),
            configured: analyze_ports(&config),
        })
    }

    /// Starts the engine with the current config, replacing a running one
    pub async fn start_instance(&self, org_id: &str) -> Result<String, LifecycleError> {
        let lock = self.org_lock(org_id);
        let _guard = lock.lock().await;

        let instance = self.registry.get_instance(org_id).await?;
        self.containers.start(&instance).await
    }

    pub async fn stop_instance(&self, org_id: &str) {
        let lock = self.org_lock(org_id);
        let _guard = lock.lock().await;

        self.containers.stop(org_id).await;
    }

    pub async fn is_running(&self, org_id: &str) -> bool {
        self.containers.is_running(org_id).await
    }

    fn org_lock(&self, org_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(org_id.to_string())
            .or_default()
            .clone()
    }
}
