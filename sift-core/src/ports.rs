//! Port analysis
//!
//! Two views of the ports a pipeline engine listens on:
//! - [`analyze_ports`] predicts listeners statically from a config document.
//!   The prediction seeds the container's exposed ports before the engine runs.
//! - [`parse_listening_ports`] reads a `netstat`/`ss` dump taken inside the
//!   running container. Only the engine knows which sources actually bound a
//!   socket (push-only sources bind nothing).

use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::domain::port::{Port, Protocol};

static TRAILING_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+)$").expect("valid trailing port regex"));

static LISTEN_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S*):(\d+)\s").expect("valid listen address regex"));

/// Description attached to every port found by probing a container
pub const DETECTED_DESCRIPTION: &str = "detected";

/// The engine API listener, present on every instance
pub fn api_port(port: u16) -> Port {
    Port::new(port.to_string(), Protocol::Tcp, "Pipeline engine API")
}

/// Port of the engine API as reachable from outside the container.
///
/// Reads the `api` block of the config the engine boots with. `None` when
/// the API is disabled, has no parsable port, or binds loopback only, since
/// no probe can then tell whether it is up.
pub fn reachable_api_port(config: &Value) -> Option<u16> {
    let api = config.get("api")?;
    if api.get("enabled").and_then(Value::as_bool) != Some(true) {
        return None;
    }

    let address = api.get("address")?.as_str()?;
    let (host, _) = address.rsplit_once(':')?;
    if is_loopback(host) {
        return None;
    }
    trailing_port(address)?.parse().ok()
}

/// Predicts the ports a config will listen on.
///
/// For every source block:
/// - trailing `:<digits>` of `address`
/// - an explicit `port` (udp when `mode` or `type` mentions udp)
/// - trailing `:<digits>` of `grpc.address` and `http.address`
///
/// Malformed or missing values are skipped; no range validation is done.
pub fn analyze_ports(config: &Value) -> Vec<Port> {
    let mut ports = Vec::new();

    let Some(sources) = config.get("sources").and_then(Value::as_object) else {
        return ports;
    };

    for (name, source) in sources {
        if let Some(port) = field_text(source.get("address")).and_then(|a| trailing_port(&a)) {
            ports.push(Port::new(
                port,
                Protocol::Tcp,
                format!("Source {} address listener", name),
            ));
        }

        if let Some(port) = field_text(source.get("port")) {
            ports.push(Port::new(
                port,
                source_protocol(source),
                format!("Source {} port listener", name),
            ));
        }

        let nested = [("grpc", "gRPC"), ("http", "HTTP")];
        for (key, label) in nested {
            let address = source.get(key).and_then(|block| block.get("address"));
            if let Some(port) = field_text(address).and_then(|a| trailing_port(&a)) {
                ports.push(Port::new(
                    port,
                    Protocol::Tcp,
                    format!("Source {} {} listener", name, label),
                ));
            }
        }
    }

    ports
}

/// Parses listening sockets out of `netstat -tuln` or `ss -tuln` output.
///
/// TCP sockets count when the line says `LISTEN`. UDP has no listen state, so
/// bound UDP sockets (`udp` rows of netstat, `UNCONN` rows of ss) count too.
/// The first `<host>:<port>` followed by whitespace is the local address.
/// Loopback-only sockets are skipped since nothing outside the container can
/// reach them. Duplicates (e.g. the IPv4 and IPv6 socket of one listener)
/// collapse into a single entry.
pub fn parse_listening_ports(output: &str) -> Vec<Port> {
    let mut seen = HashSet::new();
    let mut ports = Vec::new();

    for line in output.lines() {
        let udp =
            line.trim_start().to_lowercase().starts_with("udp") || line.contains("UNCONN");
        if !udp && !line.contains("LISTEN") {
            continue;
        }

        let Some(captures) = LISTEN_ADDRESS.captures(line) else {
            continue;
        };
        if is_loopback(&captures[1]) {
            continue;
        }

        let protocol = if udp { Protocol::Udp } else { Protocol::Tcp };
        let port = captures[2].to_string();
        if seen.insert((port.clone(), protocol)) {
            ports.push(Port::new(port, protocol, DETECTED_DESCRIPTION));
        }
    }

    ports
}

fn is_loopback(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.starts_with("127.")
        || host.starts_with("::ffff:127.")
        || host == "::1"
        || host == "localhost"
}

fn source_protocol(source: &Value) -> Protocol {
    let mentions_udp = |key: &str| {
        source
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|value| value.contains("udp"))
    };

    if mentions_udp("mode") || mentions_udp("type") {
        Protocol::Udp
    } else {
        Protocol::Tcp
    }
}

/// Scalar field as text; null, empty, false and zero count as absent.
fn field_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn trailing_port(address: &str) -> Option<String> {
    TRAILING_PORT
        .captures(address)
        .map(|captures| captures[1].to_string())
}
