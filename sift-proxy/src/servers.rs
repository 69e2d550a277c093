//! Server document endpoints of the admin API

use async_trait::async_trait;

use crate::document::ServerBlock;
use crate::error::{ProxyError, Result};
use crate::{ControlPlane, ProxyClient};

#[async_trait]
impl ControlPlane for ProxyClient {
    async fn get_server(&self, name: &str) -> Result<Option<ServerBlock>> {
        let response = self.client.get(self.server_url(name)).send().await?;

        let body = match self.check_status(response).await {
            Ok(response) => response.text().await?,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        // A path with nothing behind it reads back as `null`
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(None);
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| ProxyError::ParseError(format!("Invalid server document {}: {}", name, e)))
    }

    async fn put_server(&self, name: &str, block: &ServerBlock) -> Result<()> {
        let response = self
            .client
            .put(self.server_url(name))
            .json(block)
            .send()
            .await?;

        self.check_status(response).await?;
        Ok(())
    }

    async fn patch_server(&self, name: &str, block: &ServerBlock) -> Result<()> {
        let response = self
            .client
            .patch(self.server_url(name))
            .json(block)
            .send()
            .await?;

        self.check_status(response).await?;
        Ok(())
    }

    async fn delete_server(&self, name: &str) -> Result<()> {
        let response = self.client.delete(self.server_url(name)).send().await?;

        self.check_status(response).await?;
        Ok(())
    }
}
