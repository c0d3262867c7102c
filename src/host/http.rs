//! [`WindowHost`] over the host API, for callers in another process

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::WindowHost;
use crate::commands::{DispatchResult, NodeWindowCommand, WindowReady};
use crate::{Error, Result};

/// Reaches a running host through `/api/windows/{node_id}/...`
#[derive(Debug, Clone)]
pub struct HttpWindowHost {
    base: Url,
    client: reqwest::Client,
}

impl HttpWindowHost {
    /// Create a client for the host API at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if `base_url` is not a valid absolute URL
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base: Url::parse(base_url)?,
            client: reqwest::Client::new(),
        })
    }

    fn window_url(&self, node_id: &str, action: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("host url cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .extend(["api", "windows", node_id, action]);
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(node_id: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NodeNotFound(node_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Window(format!("host returned {status}: {body}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl WindowHost for HttpWindowHost {
    async fn ensure_node_window_ready(&self, node_id: &str) -> Result<WindowReady> {
        let url = self.window_url(node_id, "ensure")?;
        let response = self.client.post(url).send().await?;
        Self::read(node_id, response).await
    }

    async fn dispatch_node_window_command(
        &self,
        node_id: &str,
        command: &NodeWindowCommand,
    ) -> Result<DispatchResult> {
        let url = self.window_url(node_id, "commands")?;
        let response = self.client.post(url).json(command).send().await?;
        Self::read(node_id, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_urls_escape_node_ids() {
        let host = HttpWindowHost::new("http://127.0.0.1:29700/").unwrap();
        let url = host.window_url("node a/b", "commands").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:29700/api/windows/node%20a%2Fb/commands"
        );
    }

    #[test]
    fn rejects_relative_base() {
        assert!(HttpWindowHost::new("not a url").is_err());
    }
}
