//! Port domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport protocol of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A network port an engine listens on
///
/// Comes in two flavors: *configured* ports are predicted from the pipeline
/// config, *detected* ports are observed inside the running container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    pub port: String,
    pub protocol: Protocol,
    pub description: String,
}

impl Port {
    pub fn new(port: impl Into<String>, protocol: Protocol, description: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            protocol,
            description: description.into(),
        }
    }

    /// Container runtime notation, e.g. `8686/tcp`
    pub fn exposed_key(&self) -> String {
        format!("{}/{}", self.port, self.protocol)
    }
}
