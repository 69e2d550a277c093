//! In-memory control plane
//!
//! Mirrors the admin API's write rules (PUT only creates, PATCH and DELETE
//! need an existing document) and can be told to fail requests, so the
//! synchronizer's best-effort paths can be exercised without a proxy.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::document::ServerBlock;
use crate::error::{ProxyError, Result};
use crate::ControlPlane;

#[derive(Debug, Default)]
pub struct MemoryControlPlane {
    servers: Mutex<BTreeMap<String, ServerBlock>>,
    failing: AtomicBool,
    failing_reads: AtomicBool,
    writes: Mutex<Vec<String>>,
}

impl MemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a document as if another writer had created it
    pub fn insert(&self, name: &str, block: ServerBlock) {
        self.lock_servers().insert(name.to_string(), block);
    }

    pub fn server(&self, name: &str) -> Option<ServerBlock> {
        self.lock_servers().get(name).cloned()
    }

    pub fn server_names(&self) -> Vec<String> {
        self.lock_servers().keys().cloned().collect()
    }

    /// Makes every following request fail with a 500
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes following GETs fail with a 500 while writes keep working
    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    /// Successful writes in order, e.g. `PUT srv9000`
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock_servers(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, ServerBlock>> {
        self.servers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProxyError::api_error(500, "control plane unavailable"));
        }
        Ok(())
    }

    fn record(&self, verb: &str, name: &str) {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("{} {}", verb, name));
    }
}

#[async_trait]
impl ControlPlane for MemoryControlPlane {
    async fn get_server(&self, name: &str) -> Result<Option<ServerBlock>> {
        self.check_failing()?;
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(ProxyError::api_error(500, "read timed out"));
        }
        Ok(self.server(name))
    }

    async fn put_server(&self, name: &str, block: &ServerBlock) -> Result<()> {
        self.check_failing()?;
        {
            let mut servers = self.lock_servers();
            if servers.contains_key(name) {
                return Err(ProxyError::api_error(409, format!("key already exists: {}", name)));
            }
            servers.insert(name.to_string(), block.clone());
        }
        self.record("PUT", name);
        Ok(())
    }

    async fn patch_server(&self, name: &str, block: &ServerBlock) -> Result<()> {
        self.check_failing()?;
        {
            let mut servers = self.lock_servers();
            let Some(existing) = servers.get_mut(name) else {
                return Err(ProxyError::api_error(404, format!("unknown key: {}", name)));
            };
            *existing = block.clone();
        }
        self.record("PATCH", name);
        Ok(())
    }

    async fn delete_server(&self, name: &str) -> Result<()> {
        self.check_failing()?;
        if self.lock_servers().remove(name).is_none() {
            return Err(ProxyError::api_error(404, format!("unknown key: {}", name)));
        }
        self.record("DELETE", name);
        Ok(())
    }
}
