//! Port detection
//!
//! Configured ports are only a prediction: push-only sources bind nothing,
//! and the engine may reject part of a config. The detector asks the
//! running container which sockets it actually listens on.

use sift_core::domain::port::Port;
use sift_core::ports::parse_listening_ports;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ContainerRuntime, Readiness};
use crate::service::LifecycleError;

/// Listening-socket dump; busybox images ship netstat, others only ss
const PROBE_SCRIPT: &str = "netstat -tuln 2>/dev/null || ss -tuln";

pub struct PortDetector {
    runtime: Arc<dyn ContainerRuntime>,
}

impl PortDetector {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Ports the container listens on; empty when the probe fails
    pub async fn detect(&self, container: &str) -> Vec<Port> {
        match self.probe(container).await {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Port detection failed for {}: {:#}", container, e);
                Vec::new()
            }
        }
    }

    /// Probes until `api_port` is listening
    ///
    /// Sleeps `readiness.interval` before every probe. Returns the ports seen
    /// by the first probe that includes the API port, or `StartupTimeout`
    /// once every attempt is used up. Without an API port the first probe
    /// that succeeds counts as ready.
    pub async fn wait_until_listening(
        &self,
        container: &str,
        api_port: Option<u16>,
        readiness: Readiness,
    ) -> Result<Vec<Port>, LifecycleError> {
        let api_port = api_port.map(|port| port.to_string());
        let is_ready = |ports: &[Port]| match &api_port {
            Some(api_port) => ports.iter().any(|p| &p.port == api_port),
            None => true,
        };

        for attempt in 1..=readiness.attempts {
            tokio::time::sleep(readiness.interval).await;

            match self.probe(container).await {
                Ok(ports) if is_ready(&ports) => {
                    debug!(
                        "{} ready after {} probe(s), listening on {} port(s)",
                        container,
                        attempt,
                        ports.len()
                    );
                    return Ok(ports);
                }
                Ok(ports) => debug!(
                    "{} not ready (attempt {}/{}): {} port(s) listening",
                    container,
                    attempt,
                    readiness.attempts,
                    ports.len()
                ),
                Err(e) => warn!(
                    "Readiness probe failed for {} (attempt {}/{}): {:#}",
                    container, attempt, readiness.attempts, e
                ),
            }
        }

        Err(LifecycleError::StartupTimeout {
            container: container.to_string(),
            attempts: readiness.attempts,
        })
    }

    async fn probe(&self, container: &str) -> anyhow::Result<Vec<Port>> {
        let cmd = vec!["sh".to_string(), "-c".to_string(), PROBE_SCRIPT.to_string()];
        let output = self.runtime.exec(container, &cmd).await?;
        Ok(parse_listening_ports(&output))
    }
}
