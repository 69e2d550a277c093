//! Sift Proxy
//!
//! Keeps the edge reverse-proxy's routing table in step with the ports each
//! tenant's engine container exposes.
//!
//! - [`document`]: the per-port server document model
//! - [`ProxyClient`]: HTTP client for the proxy admin API
//! - [`ControlPlane`]: the seam the synchronizer writes through
//! - [`RouteSynchronizer`]: add/remove tenant routes, best effort
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sift_proxy::{ProxyClient, RouteSynchronizer};
//!
//! # async fn example() {
//! let client = Arc::new(ProxyClient::new("http://localhost:2019"));
//! let sync = RouteSynchronizer::new(client, "app.example.dev");
//!
//! sync.add_routes(&["9000".to_string()], "org-1", "vector-org-1").await;
//! # }
//! ```

pub mod document;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
mod servers;
mod sync;

pub use document::ServerBlock;
pub use error::{ProxyError, Result};
pub use sync::RouteSynchronizer;

use async_trait::async_trait;
use reqwest::Client;

/// Read/write access to per-port server documents
///
/// Writes follow the admin API's semantics: `put_server` creates a document
/// that must not exist yet, `patch_server` replaces one that must exist.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Fetches a server document, `None` if the proxy has no such server
    async fn get_server(&self, name: &str) -> Result<Option<ServerBlock>>;

    async fn put_server(&self, name: &str, block: &ServerBlock) -> Result<()>;

    async fn patch_server(&self, name: &str, block: &ServerBlock) -> Result<()>;

    async fn delete_server(&self, name: &str) -> Result<()>;
}

/// HTTP client for the reverse-proxy admin API
#[derive(Debug, Clone)]
pub struct ProxyClient {
    /// Base URL of the admin API (e.g., "http://localhost:2019")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl ProxyClient {
    /// Create a new admin API client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the admin API (e.g., "http://localhost:2019")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new admin API client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the admin API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn server_url(&self, name: &str) -> String {
        format!("{}/config/apps/http/servers/{}", self.base_url, name)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Turn a non-success status into an `ApiError` carrying the body
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProxyError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ProxyClient::new("http://localhost:2019");
        assert_eq!(client.base_url(), "http://localhost:2019");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ProxyClient::new("http://localhost:2019/");
        assert_eq!(client.base_url(), "http://localhost:2019");
    }

    #[test]
    fn test_server_url() {
        let client = ProxyClient::new("http://caddy:2019");
        assert_eq!(
            client.server_url("srv9000"),
            "http://caddy:2019/config/apps/http/servers/srv9000"
        );
    }
}
