//! In-memory instance store used by the service tests

use async_trait::async_trait;
use serde_json::Value;
use sift_core::domain::instance::{PipelineInstance, PipelineInstanceVersion};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use super::InstanceStore;

#[derive(Default)]
pub struct MemoryInstanceStore {
    /// org id -> member ids in join order
    organizations: Mutex<HashMap<String, Vec<String>>>,
    instances: Mutex<Vec<PipelineInstance>>,
    versions: Mutex<Vec<PipelineInstanceVersion>>,
    fail_version_inserts: AtomicBool,
    lookups: AtomicUsize,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an organization and its members
    pub fn with_organization(self, org_id: &str, members: &[&str]) -> Self {
        self.organizations.lock().unwrap().insert(
            org_id.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    /// Inserts a row as is, bypassing the version history
    pub fn push_instance(&self, instance: PipelineInstance) {
        self.instances.lock().unwrap().push(instance);
    }

    pub fn fail_version_inserts(&self, fail: bool) {
        self.fail_version_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn instances_of(&self, org_id: &str) -> Vec<PipelineInstance> {
        self.instances
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.org_id == org_id)
            .cloned()
            .collect()
    }

    pub fn versions_of(&self, instance_id: Uuid) -> Vec<PipelineInstanceVersion> {
        self.versions
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.instance_id == instance_id)
            .cloned()
            .collect()
    }

    /// Number of `find_by_org` calls served
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn organization_exists(&self, org_id: &str) -> Result<bool, sqlx::Error> {
        Ok(self.organizations.lock().unwrap().contains_key(org_id))
    }

    async fn first_member(&self, org_id: &str) -> Result<Option<String>, sqlx::Error> {
        Ok(self
            .organizations
            .lock()
            .unwrap()
            .get(org_id)
            .and_then(|members| members.first().cloned()))
    }

    async fn find_by_org(&self, org_id: &str) -> Result<Vec<PipelineInstance>, sqlx::Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.instances_of(org_id);
        rows.sort_by_key(|i| i.created_at);
        Ok(rows)
    }

    async fn insert_instance(
        &self,
        org_id: &str,
        config: &Value,
    ) -> Result<PipelineInstance, sqlx::Error> {
        let now = chrono::Utc::now();
        let instance = PipelineInstance {
            id: Uuid::new_v4(),
            org_id: org_id.to_string(),
            config: config.clone(),
            created_at: now,
            updated_at: now,
        };
        self.instances.lock().unwrap().push(instance.clone());
        Ok(instance)
    }

    async fn delete_instance(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut instances = self.instances.lock().unwrap();
        let before = instances.len();
        instances.retain(|i| i.id != id);
        Ok(instances.len() < before)
    }

    async fn update_config(&self, org_id: &str, config: &Value) -> Result<bool, sqlx::Error> {
        let mut updated = false;
        for instance in self.instances.lock().unwrap().iter_mut() {
            if instance.org_id == org_id {
                instance.config = config.clone();
                instance.updated_at = chrono::Utc::now();
                updated = true;
            }
        }
        Ok(updated)
    }

    async fn latest_version_number(&self, instance_id: Uuid) -> Result<Option<i32>, sqlx::Error> {
        Ok(self
            .versions_of(instance_id)
            .iter()
            .map(|v| v.version_number)
            .max())
    }

    async fn insert_version(
        &self,
        instance_id: Uuid,
        config: &Value,
        version_number: i32,
        created_by: &str,
    ) -> Result<PipelineInstanceVersion, sqlx::Error> {
        if self.fail_version_inserts.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("version insert rejected".to_string()));
        }

        let mut versions = self.versions.lock().unwrap();
        if versions
            .iter()
            .any(|v| v.instance_id == instance_id && v.version_number == version_number)
        {
            return Err(sqlx::Error::Protocol(format!(
                "duplicate version {} for instance {}",
                version_number, instance_id
            )));
        }

        let version = PipelineInstanceVersion {
            id: Uuid::new_v4(),
            instance_id,
            config: config.clone(),
            version_number,
            created_by: created_by.to_string(),
            created_at: chrono::Utc::now(),
        };
        versions.push(version.clone());
        Ok(version)
    }

    async fn list_versions(
        &self,
        instance_id: Uuid,
    ) -> Result<Vec<PipelineInstanceVersion>, sqlx::Error> {
        let mut versions = self.versions_of(instance_id);
        versions.sort_by_key(|v| v.version_number);
        Ok(versions)
    }
}
