//! Instance Registry
//!
//! Business logic for pipeline instances and their version history.
//! Every organization owns one instance; it is created from the default
//! template the first time it is asked for.

use serde_json::Value;
use sift_core::domain::instance::{PipelineInstance, PipelineInstanceVersion};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::repository::InstanceStore;
use crate::service::cache::InstanceCache;
use crate::template::TemplateLoader;

/// Service error type
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("organization {0} not found")]
    OrganizationNotFound(String),

    #[error("organization {0} already has a pipeline instance")]
    AlreadyExists(String),

    #[error("organization {0} has no members to own its instance")]
    OwnerNotFound(String),

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct InstanceRegistry {
    store: Arc<dyn InstanceStore>,
    cache: InstanceCache,
    templates: TemplateLoader,
}

impl InstanceRegistry {
    pub fn new(store: Arc<dyn InstanceStore>, cache: InstanceCache, templates: TemplateLoader) -> Self {
        Self {
            store,
            cache,
            templates,
        }
    }

    /// Returns the organization's instance, creating it from the default
    /// template when there is none
    pub async fn ensure_default(&self, org_id: &str) -> Result<PipelineInstance, InstanceError> {
        if !self.store.organization_exists(org_id).await? {
            return Err(InstanceError::OrganizationNotFound(org_id.to_string()));
        }

        if let Some(existing) = self.store.find_by_org(org_id).await?.into_iter().next() {
            return Ok(existing);
        }

        let config = self.templates.load().await;
        let owner = self.owner(org_id).await?;
        let instance = self.insert_with_first_version(org_id, config, &owner).await?;

        info!(
            "Created default instance {} for organization {}",
            instance.id, org_id
        );
        Ok(instance)
    }

    /// Creates the organization's instance with an explicit config
    pub async fn create_instance(
        &self,
        org_id: &str,
        config: Value,
    ) -> Result<PipelineInstance, InstanceError> {
        let config = document_config(config)?;

        if !self.store.find_by_org(org_id).await?.is_empty() {
            return Err(InstanceError::AlreadyExists(org_id.to_string()));
        }

        let owner = self.owner(org_id).await?;
        let instance = self.insert_with_first_version(org_id, config, &owner).await?;

        info!("Created instance {} for organization {}", instance.id, org_id);
        Ok(instance)
    }

    /// Looks up the organization's instance
    ///
    /// Served from cache while fresh. With no row the default instance is
    /// created; with several (left behind by racing creations) the oldest
    /// wins and the others are left alone.
    pub async fn get_instance(&self, org_id: &str) -> Result<PipelineInstance, InstanceError> {
        if let Some(cached) = self.cache.get(org_id) {
            return Ok(cached);
        }

        let mut rows = self.store.find_by_org(org_id).await?;
        let instance = match rows.len() {
            0 => self.ensure_default(org_id).await?,
            1 => rows.remove(0),
            n => {
                warn!(
                    "Organization {} has {} pipeline instances, using the oldest ({})",
                    org_id, n, rows[0].id
                );
                rows.remove(0)
            }
        };

        self.cache.insert(instance.clone());
        Ok(instance)
    }

    /// Replaces the organization's config and records the next version
    ///
    /// If recording the version fails the config stays updated; unlike
    /// creation there is nothing to roll back to.
    pub async fn update_config(
        &self,
        org_id: &str,
        config: Value,
        actor_id: &str,
    ) -> Result<PipelineInstanceVersion, InstanceError> {
        let config = document_config(config)?;
        let instance = self.get_instance(org_id).await?;

        let next_version = self
            .store
            .latest_version_number(instance.id)
            .await?
            .map_or(1, |latest| latest + 1);

        self.store.update_config(org_id, &config).await?;

        let version = self
            .store
            .insert_version(instance.id, &config, next_version, actor_id)
            .await
            .inspect_err(|e| {
                error!(
                    "Config of organization {} updated but version {} was not recorded: {}",
                    org_id, next_version, e
                )
            })?;

        info!(
            "Organization {} config updated to version {} by {}",
            org_id, next_version, actor_id
        );
        Ok(version)
    }

    /// Version history of the organization's instance, oldest first
    pub async fn list_versions(
        &self,
        org_id: &str,
    ) -> Result<Vec<PipelineInstanceVersion>, InstanceError> {
        let instance = self.get_instance(org_id).await?;
        Ok(self.store.list_versions(instance.id).await?)
    }

    async fn owner(&self, org_id: &str) -> Result<String, InstanceError> {
        self.store
            .first_member(org_id)
            .await?
            .ok_or_else(|| InstanceError::OwnerNotFound(org_id.to_string()))
    }

    /// Inserts the instance row and its version 1; the row is deleted again
    /// if the version cannot be written
    async fn insert_with_first_version(
        &self,
        org_id: &str,
        config: Value,
        owner: &str,
    ) -> Result<PipelineInstance, InstanceError> {
        let instance = self.store.insert_instance(org_id, &config).await?;

        if let Err(e) = self
            .store
            .insert_version(instance.id, &config, 1, owner)
            .await
        {
            warn!(
                "Rolling back instance {} of organization {}: {}",
                instance.id, org_id, e
            );
            if let Err(cleanup) = self.store.delete_instance(instance.id).await {
                error!("Failed to roll back instance {}: {}", instance.id, cleanup);
            }
            return Err(e.into());
        }

        Ok(instance)
    }
}

/// Accepts a config as a mapping or as serialized YAML/JSON text
fn document_config(config: Value) -> Result<Value, InstanceError> {
    let config = match config {
        Value::String(raw) => serde_yaml::from_str::<Value>(&raw)
            .map_err(|e| InstanceError::InvalidConfig(e.to_string()))?,
        other => other,
    };

    if !config.is_object() {
        return Err(InstanceError::InvalidConfig(
            "config must be a mapping of sources, transforms and sinks".to_string(),
        ));
    }

    Ok(config)
}
