//! Scripted container runtime for tests
//!
//! Keeps containers in memory, records every call in order and answers
//! probes with a configurable listening-socket dump.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ContainerInfo, ContainerRuntime, ContainerSpec};

pub const DEFAULT_PROBE: &str = "\
Active Internet connections (only servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State
tcp        0      0 0.0.0.0:8686            0.0.0.0:*               LISTEN
tcp        0      0 0.0.0.0:9000            0.0.0.0:*               LISTEN
";

#[derive(Default)]
struct State {
    /// name -> (id, running)
    containers: HashMap<String, (String, bool)>,
    calls: Vec<String>,
    specs: Vec<ContainerSpec>,
    next_id: usize,
    probe: String,
    fail_probe: bool,
    fail_start: bool,
    fail_connect: bool,
}

pub struct FakeRuntime {
    state: Mutex<State>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                probe: DEFAULT_PROBE.to_string(),
                ..State::default()
            }),
        }
    }

    /// Calls in order, e.g. `create vector-org-7` or `stop c1`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn specs(&self) -> Vec<ContainerSpec> {
        self.state.lock().unwrap().specs.clone()
    }

    pub fn container(&self, name: &str) -> Option<ContainerInfo> {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(name)
            .map(|(id, running)| ContainerInfo {
                id: id.clone(),
                running: *running,
            })
    }

    pub fn container_count(&self) -> usize {
        self.state.lock().unwrap().containers.len()
    }

    pub fn set_probe_output(&self, output: &str) {
        self.state.lock().unwrap().probe = output.to_string();
    }

    pub fn set_fail_probe(&self, fail: bool) {
        self.state.lock().unwrap().fail_probe = fail;
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.state.lock().unwrap().fail_start = fail;
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.state.lock().unwrap().fail_connect = fail;
    }
}

impl State {
    fn name_of(&self, id: &str) -> Option<String> {
        self.containers
            .iter()
            .find(|(name, entry)| entry.0 == id || name.as_str() == id)
            .map(|(name, _)| name.clone())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("inspect {}", name));
        Ok(state
            .containers
            .get(name)
            .map(|(id, running)| ContainerInfo {
                id: id.clone(),
                running: *running,
            }))
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create {}", spec.name));

        if state.containers.contains_key(&spec.name) {
            anyhow::bail!("container name {} is already in use", spec.name);
        }

        state.next_id += 1;
        let id = format!("c{}", state.next_id);
        state
            .containers
            .insert(spec.name.clone(), (id.clone(), false));
        state.specs.push(spec.clone());
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("start {}", id));

        if state.fail_start {
            anyhow::bail!("container {} failed to start", id);
        }

        let name = state
            .name_of(id)
            .ok_or_else(|| anyhow::anyhow!("no such container {}", id))?;
        if let Some(entry) = state.containers.get_mut(&name) {
            entry.1 = true;
        }
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("stop {}", id));

        let name = state
            .name_of(id)
            .ok_or_else(|| anyhow::anyhow!("no such container {}", id))?;
        if let Some(entry) = state.containers.get_mut(&name) {
            entry.1 = false;
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("remove {}", id));

        let name = state
            .name_of(id)
            .ok_or_else(|| anyhow::anyhow!("no such container {}", id))?;
        state.containers.remove(&name);
        Ok(())
    }

    async fn exec(&self, name: &str, _cmd: &[String]) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("exec {}", name));

        match state.containers.get(name) {
            Some((_, true)) => {}
            _ => anyhow::bail!("container {} is not running", name),
        }

        if state.fail_probe {
            anyhow::bail!("probe failed in {}", name);
        }

        Ok(state.probe.clone())
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("connect {} {}", network, container));

        if state.fail_connect {
            anyhow::bail!("network {} not found", network);
        }
        Ok(())
    }
}
