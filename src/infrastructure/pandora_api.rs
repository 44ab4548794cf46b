// Pandora console REST API client
use crate::application::console_api::{ConsoleApi, Resource};
use crate::domain::console::Payload;
use anyhow::{Context, Result};
use async_trait::async_trait;

const REST_API_PAGE: &str = "include/rest-api/index";

#[derive(Debug, Clone)]
pub struct PandoraApi {
    base_url: String,
    client: reqwest::Client,
}

impl PandoraApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_url(&self, resource: Resource, console_id: u64) -> String {
        format!(
            "{}/ajax.php?page={}&{}=1&visualConsoleId={}",
            self.base_url,
            urlencoding::encode(REST_API_PAGE),
            resource.query_flag(),
            console_id
        )
    }
}

#[async_trait]
impl ConsoleApi for PandoraApi {
    async fn fetch(&self, resource: Resource, console_id: u64) -> Result<Payload> {
        let url = self.build_url(resource, console_id);
        tracing::debug!(
            target: "visual_console::api",
            "Requesting visual console {} {}: {}",
            console_id,
            resource,
            url
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to request visual console {}", resource))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Visual console API failed with status {}: {}", status, body);
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .context("Failed to parse visual console response")?;

        Ok(Payload::from_json(body))
    }
}
