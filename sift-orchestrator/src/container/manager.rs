//! Container lifecycle
//!
//! Each organization runs one engine container named after it. The config
//! travels to the container as a base64 environment variable that the
//! entrypoint decodes into the engine's config file, so nothing is mounted
//! from the host. Containers are only reachable over the internal network;
//! the reverse proxy routes tenant hostnames to them.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use sift_core::domain::instance::PipelineInstance;
use sift_core::domain::port::Port;
use sift_core::ports::{analyze_ports, api_port, reachable_api_port};
use sift_core::preview::ConfigAugmenter;
use sift_proxy::RouteSynchronizer;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{ContainerRuntime, ContainerSettings, ContainerSpec, PortDetector, Readiness};
use crate::service::LifecycleError;

/// Environment variable carrying the base64 engine config
pub const CONFIG_ENV: &str = "VECTOR_CONFIG";

const CONFIG_PATH: &str = "/etc/vector/vector.yaml";

/// Lets containers reach services published on the docker host
const HOST_GATEWAY: &str = "host.docker.internal:host-gateway";

/// Name of the engine container of an organization
pub fn container_name(org_id: &str) -> String {
    format!("vector-{}", org_id)
}

pub struct ContainerManager {
    runtime: Arc<dyn ContainerRuntime>,
    detector: PortDetector,
    proxy: RouteSynchronizer,
    augmenter: Arc<dyn ConfigAugmenter>,
    settings: ContainerSettings,
    readiness: Readiness,
}

impl ContainerManager {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        proxy: RouteSynchronizer,
        augmenter: Arc<dyn ConfigAugmenter>,
        settings: ContainerSettings,
        readiness: Readiness,
    ) -> Self {
        Self {
            detector: PortDetector::new(runtime.clone()),
            runtime,
            proxy,
            augmenter,
            settings,
            readiness,
        }
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    /// (Re)creates and starts the organization's engine
    ///
    /// A container left over under the same name is stopped and removed
    /// first. Once the engine API listens on the port the booted config
    /// gives it, every detected port is published on the proxy. When that
    /// config leaves no reachable API, the first successful probe counts as
    /// ready. Returns the new container id.
    pub async fn start(&self, instance: &PipelineInstance) -> Result<String, LifecycleError> {
        let org_id = instance.org_id.as_str();
        let config = instance.parsed_config()?;
        let rendered = self.render_runtime_config(&config, org_id);
        let payload = encode_config(&rendered)?;
        let readiness_port = reachable_api_port(&rendered);

        let name = container_name(org_id);
        self.remove_existing(&name).await;

        let spec = self.container_spec(&name, &config, payload);
        info!(
            "Creating container {} for organization {} ({} exposed port(s))",
            name,
            org_id,
            spec.exposed_ports.len()
        );

        let id = self.runtime.create(&spec).await?;
        if let Err(e) = self.runtime.start(&id).await {
            self.discard(&name, &id).await;
            return Err(e.into());
        }

        let detected = match self
            .detector
            .wait_until_listening(&name, readiness_port, self.readiness)
            .await
        {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Container {} did not become ready: {}", name, e);
                self.discard(&name, &id).await;
                return Err(e);
            }
        };

        let ports: Vec<String> = detected.iter().map(|p| p.port.clone()).collect();
        self.proxy.add_routes(&ports, org_id, &name).await;

        if let Some(network) = &self.settings.telemetry_network {
            match self.runtime.connect_network(network, &name).await {
                Ok(()) => debug!("Container {} joined network {}", name, network),
                Err(e) => warn!(
                    "Failed to attach container {} to network {}: {:#}",
                    name, network, e
                ),
            }
        }

        info!("Container {} started for organization {}", name, org_id);
        Ok(id)
    }

    /// Stops and removes the organization's engine, unpublishing its ports
    ///
    /// A missing container is not an error. Runtime failures on the way
    /// down are logged only.
    pub async fn stop(&self, org_id: &str) {
        let name = container_name(org_id);

        let info = match self.runtime.inspect(&name).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                debug!("No container {} to stop", name);
                return;
            }
            Err(e) => {
                warn!("Failed to inspect container {}: {:#}", name, e);
                return;
            }
        };

        // Listening sockets are gone once the container stops
        if info.running {
            let ports: Vec<String> = self
                .detector
                .detect(&name)
                .await
                .into_iter()
                .map(|p| p.port)
                .collect();
            self.proxy.remove_routes(&ports, org_id, &name).await;
        }

        self.discard(&name, &info.id).await;
        info!("Container {} stopped for organization {}", name, org_id);
    }

    /// False when the container is missing or the runtime cannot tell
    pub async fn is_running(&self, org_id: &str) -> bool {
        let name = container_name(org_id);
        match self.runtime.inspect(&name).await {
            Ok(info) => info.is_some_and(|info| info.running),
            Err(e) => {
                debug!("Failed to inspect container {}: {:#}", name, e);
                false
            }
        }
    }

    /// The config the engine boots with
    ///
    /// Starts from an enabled API listener, then overlays the augmented
    /// pipeline; keys of the pipeline document win.
    pub fn render_runtime_config(&self, config: &Value, org_id: &str) -> Value {
        let mut rendered = json!({
            "api": {
                "enabled": true,
                "address": format!("0.0.0.0:{}", self.settings.api_port),
            }
        });

        if let (Value::Object(base), Value::Object(document)) = (
            &mut rendered,
            self.augmenter.augment(config.clone(), org_id),
        ) {
            base.extend(document);
        }

        rendered
    }

    /// API port followed by the configured ports, without duplicates
    pub fn exposed_ports(&self, config: &Value) -> Vec<Port> {
        let mut seen = HashSet::new();
        std::iter::once(api_port(self.settings.api_port))
            .chain(analyze_ports(config))
            .filter(|p| seen.insert((p.port.clone(), p.protocol)))
            .collect()
    }

    fn container_spec(&self, name: &str, config: &Value, payload: String) -> ContainerSpec {
        let script = format!(
            "echo \"${}\" | base64 -d > {} && exec vector --config {}",
            CONFIG_ENV, CONFIG_PATH, CONFIG_PATH
        );

        ContainerSpec {
            name: name.to_string(),
            hostname: name.to_string(),
            image: self.settings.image.clone(),
            network: self.settings.network.clone(),
            exposed_ports: self.exposed_ports(config),
            env: vec![(CONFIG_ENV.to_string(), payload)],
            extra_hosts: vec![HOST_GATEWAY.to_string()],
            entrypoint: vec!["sh".to_string(), "-c".to_string(), script],
            restart_policy: "no".to_string(),
        }
    }

    /// Stops and removes a stale container, ignoring failures
    async fn remove_existing(&self, name: &str) {
        match self.runtime.inspect(name).await {
            Ok(Some(existing)) => {
                info!("Replacing existing container {} ({})", name, existing.id);
                if let Err(e) = self.runtime.stop(&existing.id).await {
                    debug!("Failed to stop container {}: {:#}", existing.id, e);
                }
                if let Err(e) = self.runtime.remove(&existing.id).await {
                    debug!("Failed to remove container {}: {:#}", existing.id, e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to inspect container {}: {:#}", name, e),
        }
    }

    async fn discard(&self, name: &str, id: &str) {
        if let Err(e) = self.runtime.stop(id).await {
            warn!("Failed to stop container {}: {:#}", name, e);
        }
        if let Err(e) = self.runtime.remove(id).await {
            error!("Failed to remove container {}: {:#}", name, e);
        }
    }
}

fn encode_config(config: &Value) -> Result<String, LifecycleError> {
    let yaml = serde_yaml::to_string(config)?;
    Ok(STANDARD.encode(yaml))
}
