//! Server document model
//!
//! One proxy server document exists per listening port, shared by every
//! tenant that exposes that port. Its shape is a fixed envelope:
//!
//! ```text
//! { automatic_https: { disable: true },
//!   listen: [":<port>"],
//!   routes: [ { handle: [ { handler: "subroute", routes: [ <tenant routes> ] } ],
//!               terminal: true } ] }
//! ```
//!
//! Each tenant route carries a `group<N>` ordinal, matches on the tenant
//! hostname and reverse-proxies to `<container>:<port>`.
//!
//! Fields the model does not know about are kept in `extra` so a
//! read-modify-write never drops configuration written by someone else.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SUBROUTE_HANDLER: &str = "subroute";
pub const REVERSE_PROXY_HANDLER: &str = "reverse_proxy";

/// Server document for one listening port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerBlock {
    #[serde(default)]
    pub automatic_https: AutomaticHttps,
    #[serde(default)]
    pub listen: Vec<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutomaticHttps {
    #[serde(default)]
    pub disable: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A route at any depth of the handler tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub handle: Vec<Handler>,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub matchers: Option<Vec<HostMatch>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Handler {
    pub handler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Route>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstreams: Option<Vec<Upstream>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMatch {
    #[serde(default)]
    pub host: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Upstream {
    pub dial: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Name of the server document bound to `port`, e.g. `srv9000`
pub fn server_name(port: &str) -> String {
    format!("srv{}", port.trim_start_matches(':'))
}

/// Hostname under which a tenant's listeners are published
pub fn tenant_host(org_id: &str, domain: &str) -> String {
    format!("{}.{}", org_id, domain)
}

impl ServerBlock {
    /// The fixed envelope with no tenant routes
    pub fn envelope(port: &str) -> Self {
        Self {
            automatic_https: AutomaticHttps {
                disable: true,
                extra: Map::new(),
            },
            listen: vec![format!(":{}", port.trim_start_matches(':'))],
            routes: vec![Route::envelope()],
            extra: Map::new(),
        }
    }

    /// Tenant routes nested in the envelope, empty if the document is malformed
    pub fn tenant_routes(&self) -> &[Route] {
        self.routes
            .first()
            .and_then(|route| route.handle.first())
            .and_then(|handler| handler.routes.as_deref())
            .unwrap_or(&[])
    }

    /// True when the envelope holds a tenant route list, even an empty one
    pub fn has_tenant_list(&self) -> bool {
        self.routes
            .first()
            .and_then(|route| route.handle.first())
            .is_some_and(|handler| handler.routes.is_some())
    }

    /// Mutable tenant routes, repairing a missing envelope first
    pub fn tenant_routes_mut(&mut self) -> &mut Vec<Route> {
        if self.routes.is_empty() {
            self.routes.push(Route::envelope());
        }

        let top = &mut self.routes[0];
        if top.handle.is_empty() {
            top.handle.push(Handler::subroute(Vec::new()));
        }

        top.handle[0].routes.get_or_insert_with(Vec::new)
    }

    /// Highest `group<N>` ordinal among the tenant routes, 0 when none
    pub fn max_group(&self) -> u32 {
        self.routes
            .iter()
            .flat_map(|route| &route.handle)
            .filter_map(|handler| handler.routes.as_ref())
            .flatten()
            .filter_map(|route| route.group.as_deref())
            .filter_map(|group| group.trim_start_matches("group").parse::<u32>().ok())
            .max()
            .unwrap_or(0)
    }

    pub fn has_host(&self, host: &str) -> bool {
        self.tenant_routes().iter().any(|route| route.matches_host(host))
    }
}

impl Route {
    fn envelope() -> Self {
        Self {
            handle: vec![Handler::subroute(Vec::new())],
            terminal: Some(true),
            ..Default::default()
        }
    }

    /// Route sending `host` traffic to `dial`
    pub fn tenant(host: &str, dial: &str, group: u32) -> Self {
        let upstream = Route {
            handle: vec![Handler::reverse_proxy(dial)],
            ..Default::default()
        };

        Self {
            group: Some(format!("group{}", group)),
            handle: vec![Handler::subroute(vec![upstream])],
            matchers: Some(vec![HostMatch {
                host: vec![host.to_string()],
                extra: Map::new(),
            }]),
            ..Default::default()
        }
    }

    pub fn matches_host(&self, host: &str) -> bool {
        self.matchers
            .iter()
            .flatten()
            .any(|m| m.host.iter().any(|h| h == host))
    }

    /// True if any upstream under this route dials `container`
    pub fn dials_container(&self, container: &str) -> bool {
        self.handle.iter().any(|handler| handler.dials_container(container))
    }
}

impl Handler {
    pub fn subroute(routes: Vec<Route>) -> Self {
        Self {
            handler: SUBROUTE_HANDLER.to_string(),
            routes: Some(routes),
            ..Default::default()
        }
    }

    pub fn reverse_proxy(dial: &str) -> Self {
        Self {
            handler: REVERSE_PROXY_HANDLER.to_string(),
            upstreams: Some(vec![Upstream {
                dial: dial.to_string(),
                extra: Map::new(),
            }]),
            ..Default::default()
        }
    }

    fn dials_container(&self, container: &str) -> bool {
        let direct = self.upstreams.iter().flatten().any(|upstream| {
            let host = upstream
                .dial
                .rsplit_once(':')
                .map_or(upstream.dial.as_str(), |(host, _)| host);
            host == container
        });

        direct
            || self
                .routes
                .iter()
                .flatten()
                .any(|route| route.dials_container(container))
    }
}
