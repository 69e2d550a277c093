//! Instance cache
//!
//! Short-lived lookups of instances by organization. Entries expire by age
//! only; writes through the registry do not invalidate them, so a reader can
//! see a stale config for up to one TTL after an update.

use sift_core::domain::instance::PipelineInstance;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct InstanceCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, PipelineInstance)>>,
}

impl InstanceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached instance if it is younger than the TTL
    pub fn get(&self, org_id: &str) -> Option<PipelineInstance> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get(org_id) {
            Some((stored_at, instance)) if stored_at.elapsed() < self.ttl => Some(instance.clone()),
            Some(_) => {
                entries.remove(org_id);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, instance: PipelineInstance) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(instance.org_id.clone(), (Instant::now(), instance));
    }
}
