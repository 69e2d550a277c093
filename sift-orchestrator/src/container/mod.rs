//! Container Module
//!
//! Engine containers, one per organization:
//! - `ContainerRuntime`: the seam over the container engine
//! - `CliRuntime`: drives docker or podman through their CLI
//! - `PortDetector`: finds the sockets a running engine listens on
//! - `ContainerManager`: start/stop sequences, proxy publication included

pub mod cli;
pub mod detector;
#[cfg(test)]
pub mod fake;
pub mod manager;

pub use cli::CliRuntime;
pub use detector::PortDetector;
pub use manager::ContainerManager;

use anyhow::Result;
use async_trait::async_trait;
use sift_core::domain::port::Port;
use std::time::Duration;

/// State of an existing container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub running: bool,
}

/// Everything needed to create an engine container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub hostname: String,
    pub image: String,
    pub network: String,
    /// Declared only; nothing is published on the host
    pub exposed_ports: Vec<Port>,
    pub env: Vec<(String, String)>,
    /// `host:ip` entries added to /etc/hosts
    pub extra_hosts: Vec<String>,
    /// Entrypoint executable followed by its arguments
    pub entrypoint: Vec<String>,
    pub restart_policy: String,
}

/// Container engine operations used by the manager
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Looks a container up by name or id; `None` when it does not exist
    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>>;

    /// Creates the container and returns its id
    async fn create(&self, spec: &ContainerSpec) -> Result<String>;

    async fn start(&self, id: &str) -> Result<()>;

    async fn stop(&self, id: &str) -> Result<()>;

    async fn remove(&self, id: &str) -> Result<()>;

    /// Runs a command in a running container and returns its stdout
    async fn exec(&self, name: &str, cmd: &[String]) -> Result<String>;

    async fn connect_network(&self, network: &str, container: &str) -> Result<()>;
}

/// Where and how engine containers run
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSettings {
    pub image: String,
    pub network: String,
    /// Joined after start when set; failures are only logged
    pub telemetry_network: Option<String>,
    pub api_port: u16,
}

/// Probe schedule after a container start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readiness {
    /// Sleep before each probe
    pub interval: Duration,
    pub attempts: u32,
}
