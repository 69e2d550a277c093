//! Route synchronization
//!
//! Adds and removes one tenant's routes in the per-port server documents.
//! Every change is a read-modify-write of a whole document. Writes to the
//! same document from this process are serialized through a per-document
//! lock; writers in other processes can still race and lose an update.
//!
//! Synchronization is best effort: control-plane failures are logged and
//! swallowed so they never fail a container start or teardown.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::ControlPlane;
use crate::document::{Route, ServerBlock, server_name, tenant_host};
use crate::error::Result;

/// Spacing between consecutive group ordinals
const GROUP_STEP: u32 = 2;

pub struct RouteSynchronizer {
    control_plane: Arc<dyn ControlPlane>,
    domain: String,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RouteSynchronizer {
    /// Creates a synchronizer publishing tenants as `<org>.<domain>`
    pub fn new(control_plane: Arc<dyn ControlPlane>, domain: impl Into<String>) -> Self {
        Self {
            control_plane,
            domain: domain.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn tenant_host(&self, org_id: &str) -> String {
        tenant_host(org_id, &self.domain)
    }

    /// Routes `<org>.<domain>:<port>` to `<container>:<port>` for every port
    pub async fn add_routes(&self, ports: &[String], org_id: &str, container_name: &str) {
        if ports.is_empty() {
            warn!("No ports to publish for organization {}", org_id);
            return;
        }

        let host = self.tenant_host(org_id);
        for port in distinct_ports(ports) {
            if let Err(e) = self.add_route(&port, &host, container_name).await {
                warn!("Failed to publish port {} for {}: {}", port, host, e);
            }
        }
    }

    /// Removes every route for the tenant host or the container on each port
    ///
    /// A route goes when either its host matches or any of its upstreams
    /// dials the container, so cleanup still happens if the two drifted
    /// apart. Documents left without routes are deleted.
    pub async fn remove_routes(&self, ports: &[String], org_id: &str, container_name: &str) {
        if ports.is_empty() {
            debug!("No ports to unpublish for organization {}", org_id);
            return;
        }

        let host = self.tenant_host(org_id);
        for port in distinct_ports(ports) {
            if let Err(e) = self.remove_route(&port, &host, container_name).await {
                warn!("Failed to unpublish port {} for {}: {}", port, host, e);
            }
        }
    }

    async fn add_route(&self, port: &str, host: &str, container_name: &str) -> Result<()> {
        let name = server_name(port);
        let lock = self.document_lock(&name);
        let _guard = lock.lock().await;

        let dial = format!("{}:{}", container_name, port);

        match self.control_plane.get_server(&name).await? {
            None => {
                let mut block = ServerBlock::envelope(port);
                block
                    .tenant_routes_mut()
                    .push(Route::tenant(host, &dial, GROUP_STEP));

                self.control_plane.put_server(&name, &block).await?;
                info!("Created server {} routing {} to {}", name, host, dial);
            }
            Some(mut block) => {
                if block.has_host(host) {
                    debug!("Server {} already routes {}", name, host);
                    return Ok(());
                }

                let Some(group) = block.max_group().checked_add(GROUP_STEP) else {
                    warn!("Server {} has no group ordinal left for {}", name, host);
                    return Ok(());
                };
                block
                    .tenant_routes_mut()
                    .push(Route::tenant(host, &dial, group));

                self.control_plane.patch_server(&name, &block).await?;
                info!(
                    "Added route group{} on {} for {} to {}",
                    group, name, host, dial
                );
            }
        }

        Ok(())
    }

    async fn remove_route(&self, port: &str, host: &str, container_name: &str) -> Result<()> {
        let name = server_name(port);
        let lock = self.document_lock(&name);
        let _guard = lock.lock().await;

        let Some(mut block) = self.control_plane.get_server(&name).await? else {
            debug!("Server {} does not exist, nothing to remove", name);
            return Ok(());
        };

        if !block.has_tenant_list() {
            warn!("Server {} has no tenant route list, leaving it alone", name);
            return Ok(());
        }

        let routes = block.tenant_routes_mut();
        let before = routes.len();
        routes.retain(|route| !(route.matches_host(host) || route.dials_container(container_name)));
        let removed = before - routes.len();

        if routes.is_empty() {
            self.control_plane.delete_server(&name).await?;
            info!("Deleted server {} after removing {}", name, host);
        } else if removed > 0 {
            self.control_plane.patch_server(&name, &block).await?;
            info!("Removed {} route(s) for {} from {}", removed, host, name);
        } else {
            debug!("Server {} had no routes for {}", name, host);
        }

        Ok(())
    }

    fn document_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(name.to_string()).or_default().clone()
    }
}

/// Port numbers without a leading colon, each once
fn distinct_ports(ports: &[String]) -> BTreeSet<String> {
    ports
        .iter()
        .map(|port| port.trim_start_matches(':').to_string())
        .filter(|port| !port.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryControlPlane;

    const DOMAIN: &str = "app.example.dev";

    fn setup() -> (Arc<MemoryControlPlane>, RouteSynchronizer) {
        let plane = Arc::new(MemoryControlPlane::new());
        let sync = RouteSynchronizer::new(plane.clone(), DOMAIN);
        (plane, sync)
    }

    fn ports(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    fn hosts(block: &ServerBlock) -> Vec<String> {
        block
            .tenant_routes()
            .iter()
            .flat_map(|route| route.matchers.iter().flatten())
            .flat_map(|m| m.host.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_first_tenant_creates_document() {
        let (plane, sync) = setup();

        sync.add_routes(&ports(&["9000"]), "org-1", "vector-org-1").await;

        let block = plane.server("srv9000").unwrap();
        assert!(block.automatic_https.disable);
        assert_eq!(block.listen, vec![":9000"]);
        assert_eq!(block.tenant_routes().len(), 1);

        let route = &block.tenant_routes()[0];
        assert_eq!(route.group.as_deref(), Some("group2"));
        assert!(route.matches_host("org-1.app.example.dev"));
        assert!(route.dials_container("vector-org-1"));
        assert_eq!(plane.writes(), vec!["PUT srv9000"]);
    }

    #[tokio::test]
    async fn test_second_tenant_appends_with_next_group() {
        let (plane, sync) = setup();

        sync.add_routes(&ports(&["9000"]), "org-1", "vector-org-1").await;
        sync.add_routes(&ports(&["9000"]), "org-2", "vector-org-2").await;

        let block = plane.server("srv9000").unwrap();
        assert_eq!(
            hosts(&block),
            vec!["org-1.app.example.dev", "org-2.app.example.dev"]
        );
        assert_eq!(block.tenant_routes()[1].group.as_deref(), Some("group4"));
        assert_eq!(plane.writes(), vec!["PUT srv9000", "PATCH srv9000"]);
    }

    #[tokio::test]
    async fn test_adding_known_host_is_a_no_op() {
        let (plane, sync) = setup();

        sync.add_routes(&ports(&["9000", "9000", ":9000"]), "org-1", "vector-org-1").await;
        sync.add_routes(&ports(&["9000"]), "org-1", "vector-org-1").await;

        assert_eq!(plane.server("srv9000").unwrap().tenant_routes().len(), 1);
        assert_eq!(plane.writes(), vec!["PUT srv9000"]);
    }

    #[tokio::test]
    async fn test_existing_empty_document_is_patched() {
        let (plane, sync) = setup();
        plane.insert("srv9000", ServerBlock::envelope("9000"));

        sync.add_routes(&ports(&["9000"]), "org-1", "vector-org-1").await;

        assert_eq!(plane.writes(), vec!["PATCH srv9000"]);
        assert_eq!(plane.server("srv9000").unwrap().tenant_routes().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_keeps_other_tenants() {
        let (plane, sync) = setup();
        sync.add_routes(&ports(&["9000"]), "org-1", "vector-org-1").await;
        sync.add_routes(&ports(&["9000"]), "org-2", "vector-org-2").await;

        sync.remove_routes(&ports(&["9000"]), "org-1", "vector-org-1").await;

        let block = plane.server("srv9000").unwrap();
        assert_eq!(hosts(&block), vec!["org-2.app.example.dev"]);
    }

    #[tokio::test]
    async fn test_removing_last_route_deletes_document() {
        let (plane, sync) = setup();
        sync.add_routes(&ports(&["9000", "8686"]), "org-1", "vector-org-1").await;

        sync.remove_routes(&ports(&["9000", "8686"]), "org-1", "vector-org-1").await;

        assert!(plane.server_names().is_empty());
    }

    #[tokio::test]
    async fn test_remove_matches_container_when_host_drifted() {
        let (plane, sync) = setup();
        let mut block = ServerBlock::envelope("9000");
        block.tenant_routes_mut().push(Route::tenant(
            "old-name.app.example.dev",
            "vector-org-1:9000",
            2,
        ));
        block.tenant_routes_mut().push(Route::tenant(
            "org-2.app.example.dev",
            "vector-org-2:9000",
            4,
        ));
        plane.insert("srv9000", block);

        sync.remove_routes(&ports(&["9000"]), "org-1", "vector-org-1").await;

        let block = plane.server("srv9000").unwrap();
        assert_eq!(hosts(&block), vec!["org-2.app.example.dev"]);
    }

    #[tokio::test]
    async fn test_remove_from_missing_document_is_quiet() {
        let (plane, sync) = setup();

        sync.remove_routes(&ports(&["9000"]), "org-1", "vector-org-1").await;

        assert!(plane.writes().is_empty());
    }

    #[tokio::test]
    async fn test_control_plane_failures_are_swallowed() {
        let (plane, sync) = setup();
        plane.set_failing(true);

        sync.add_routes(&ports(&["9000"]), "org-1", "vector-org-1").await;
        sync.remove_routes(&ports(&["9000"]), "org-1", "vector-org-1").await;

        plane.set_failing(false);
        assert!(plane.server_names().is_empty());
    }

    #[tokio::test]
    async fn test_failed_read_never_overwrites_document() {
        let (plane, sync) = setup();
        let mut seeded = ServerBlock::envelope("9000");
        seeded
            .tenant_routes_mut()
            .push(Route::tenant("org-1.app.example.dev", "vector-org-1:9000", 2));
        plane.insert("srv9000", seeded.clone());
        plane.set_failing_reads(true);

        sync.add_routes(&ports(&["9000"]), "org-2", "vector-org-2").await;
        sync.remove_routes(&ports(&["9000"]), "org-1", "vector-org-1").await;

        assert!(plane.writes().is_empty());
        assert_eq!(plane.server("srv9000"), Some(seeded));
    }

    #[tokio::test]
    async fn test_exhausted_group_ordinals_leave_document_alone() {
        let (plane, sync) = setup();
        let mut seeded = ServerBlock::envelope("9000");
        seeded.tenant_routes_mut().push(Route::tenant(
            "org-1.app.example.dev",
            "vector-org-1:9000",
            u32::MAX,
        ));
        plane.insert("srv9000", seeded.clone());

        sync.add_routes(&ports(&["9000"]), "org-2", "vector-org-2").await;

        assert!(plane.writes().is_empty());
        assert_eq!(plane.server("srv9000"), Some(seeded));
    }

    #[tokio::test]
    async fn test_concurrent_tenants_on_one_port_both_land() {
        let (plane, sync) = setup();
        let sync = Arc::new(sync);

        let first = {
            let sync = sync.clone();
            tokio::spawn(async move {
                sync.add_routes(&ports(&["9000"]), "org-1", "vector-org-1").await
            })
        };
        let second = {
            let sync = sync.clone();
            tokio::spawn(async move {
                sync.add_routes(&ports(&["9000"]), "org-2", "vector-org-2").await
            })
        };
        first.await.unwrap();
        second.await.unwrap();

        let mut found = hosts(&plane.server("srv9000").unwrap());
        found.sort();
        assert_eq!(
            found,
            vec!["org-1.app.example.dev", "org-2.app.example.dev"]
        );
    }
}
