//! CLI container runtime
//!
//! Drives docker (or podman, which accepts the same arguments) by spawning
//! the binary for each operation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::{ContainerInfo, ContainerRuntime, ContainerSpec};

pub struct CliRuntime {
    binary: String,
}

impl CliRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Checks the binary is installed and answering
    pub async fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("Failed to execute '{} --version'. Is it installed?", self.binary))?;

        if !output.status.success() {
            anyhow::bail!("{} is not working correctly", self.binary);
        }

        info!(
            "Container runtime is available: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    async fn run(&self, args: &[String]) -> Result<Output> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to execute {} {}", self.binary, first_arg(args)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("{} {} stderr: {}", self.binary, first_arg(args), stderr.trim());
        }

        Ok(output)
    }

    /// Runs the command and returns stdout, failing on a non-zero exit
    async fn run_checked(&self, args: &[String]) -> Result<String> {
        let output = self.run(args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if !output.status.success() {
            let error_msg = format!(
                "{} {} failed: exit_code={}, stdout='{}', stderr='{}'",
                self.binary,
                first_arg(args),
                output.status.code().unwrap_or(-1),
                stdout.trim(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            error!("{}", error_msg);
            anyhow::bail!("{}", error_msg);
        }

        Ok(stdout)
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let args = strings(&[
            "inspect",
            "--type",
            "container",
            "--format",
            "{{.Id}} {{.State.Running}}",
            name,
        ]);
        let output = self.run(&args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
            if stderr.contains("no such") || stderr.contains("not found") {
                return Ok(None);
            }
            anyhow::bail!("Failed to inspect container {}: {}", name, stderr.trim());
        }

        parse_inspect(&String::from_utf8_lossy(&output.stdout))
            .map(Some)
            .with_context(|| format!("Unexpected inspect output for container {}", name))
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let stdout = self.run_checked(&create_args(spec)).await?;
        let id = stdout.trim().to_string();

        info!("Container {} created with ID: {}", spec.name, id);
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.run_checked(&strings(&["start", id])).await?;
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.run_checked(&strings(&["stop", id])).await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.run_checked(&strings(&["rm", "-f", id])).await?;
        Ok(())
    }

    async fn exec(&self, name: &str, cmd: &[String]) -> Result<String> {
        let mut args = strings(&["exec", name]);
        args.extend(cmd.iter().cloned());
        self.run_checked(&args).await
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<()> {
        self.run_checked(&strings(&["network", "connect", network, container]))
            .await?;
        Ok(())
    }
}

/// Arguments of the `create` call for a spec
pub fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = strings(&[
        "create",
        "--name",
        spec.name.as_str(),
        "--hostname",
        spec.hostname.as_str(),
        "--network",
        spec.network.as_str(),
        "--restart",
        spec.restart_policy.as_str(),
    ]);

    for host in &spec.extra_hosts {
        args.push("--add-host".to_string());
        args.push(host.clone());
    }

    for port in &spec.exposed_ports {
        args.push("--expose".to_string());
        args.push(port.exposed_key());
    }

    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }

    let (entrypoint, command) = match spec.entrypoint.split_first() {
        Some((entrypoint, command)) => (Some(entrypoint), command),
        None => (None, &[][..]),
    };

    if let Some(entrypoint) = entrypoint {
        args.push("--entrypoint".to_string());
        args.push(entrypoint.clone());
    }

    args.push(spec.image.clone());
    args.extend(command.iter().cloned());
    args
}

fn parse_inspect(stdout: &str) -> Option<ContainerInfo> {
    let mut fields = stdout.split_whitespace();
    let id = fields.next()?.to_string();
    let running = fields.next()? == "true";
    Some(ContainerInfo { id, running })
}

fn first_arg(args: &[String]) -> &str {
    args.first().map(String::as_str).unwrap_or_default()
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}
