//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository handles database operations for a specific table; the
//! [`InstanceStore`] trait bundles them behind one seam so the registry can
//! run against Postgres or, in tests, against memory.

pub mod instance;
#[cfg(test)]
pub mod memory;
pub mod organization;
pub mod version;

// Re-export for convenience
pub use instance as instance_repository;
pub use organization as organization_repository;
pub use version as version_repository;

use async_trait::async_trait;
use serde_json::Value;
use sift_core::domain::instance::{PipelineInstance, PipelineInstanceVersion};
use sqlx::PgPool;
use uuid::Uuid;

/// Storage for instances, their versions and the organization lookups
#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn organization_exists(&self, org_id: &str) -> Result<bool, sqlx::Error>;

    /// Earliest member of the organization, used as default version author
    async fn first_member(&self, org_id: &str) -> Result<Option<String>, sqlx::Error>;

    /// All instances of an organization, oldest first
    async fn find_by_org(&self, org_id: &str) -> Result<Vec<PipelineInstance>, sqlx::Error>;

    async fn insert_instance(
        &self,
        org_id: &str,
        config: &Value,
    ) -> Result<PipelineInstance, sqlx::Error>;

    async fn delete_instance(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    /// Replaces the config of every instance row of the organization
    async fn update_config(&self, org_id: &str, config: &Value) -> Result<bool, sqlx::Error>;

    async fn latest_version_number(&self, instance_id: Uuid) -> Result<Option<i32>, sqlx::Error>;

    async fn insert_version(
        &self,
        instance_id: Uuid,
        config: &Value,
        version_number: i32,
        created_by: &str,
    ) -> Result<PipelineInstanceVersion, sqlx::Error>;

    /// Versions of an instance, lowest number first
    async fn list_versions(
        &self,
        instance_id: Uuid,
    ) -> Result<Vec<PipelineInstanceVersion>, sqlx::Error>;
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgInstanceStore {
    pool: PgPool,
}

impl PgInstanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstanceStore for PgInstanceStore {
    async fn organization_exists(&self, org_id: &str) -> Result<bool, sqlx::Error> {
        organization_repository::exists(&self.pool, org_id).await
    }

    async fn first_member(&self, org_id: &str) -> Result<Option<String>, sqlx::Error> {
        organization_repository::first_member(&self.pool, org_id).await
    }

    async fn find_by_org(&self, org_id: &str) -> Result<Vec<PipelineInstance>, sqlx::Error> {
        instance_repository::find_by_org(&self.pool, org_id).await
    }

    async fn insert_instance(
        &self,
        org_id: &str,
        config: &Value,
    ) -> Result<PipelineInstance, sqlx::Error> {
        instance_repository::create(&self.pool, org_id, config).await
    }

    async fn delete_instance(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        instance_repository::delete(&self.pool, id).await
    }

    async fn update_config(&self, org_id: &str, config: &Value) -> Result<bool, sqlx::Error> {
        instance_repository::update_config(&self.pool, org_id, config).await
    }

    async fn latest_version_number(&self, instance_id: Uuid) -> Result<Option<i32>, sqlx::Error> {
        version_repository::latest_number(&self.pool, instance_id).await
    }

    async fn insert_version(
        &self,
        instance_id: Uuid,
        config: &Value,
        version_number: i32,
        created_by: &str,
    ) -> Result<PipelineInstanceVersion, sqlx::Error> {
        version_repository::create(&self.pool, instance_id, config, version_number, created_by)
            .await
    }

    async fn list_versions(
        &self,
        instance_id: Uuid,
    ) -> Result<Vec<PipelineInstanceVersion>, sqlx::Error> {
        version_repository::list_by_instance(&self.pool, instance_id).await
    }
}
