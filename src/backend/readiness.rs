//! Bound-backend readiness probing

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Reports whether the bound backend can serve requests
#[async_trait]
pub trait BackendReadiness: Send + Sync {
    /// Poll until the backend is ready or `timeout` elapses
    ///
    /// A timeout is a `false` result, not an error.
    async fn wait_for_bound_backend_ready(&self, timeout: Duration, poll: Duration) -> bool;

    /// Most recent probe failure, if any
    fn last_error(&self) -> Option<String>;
}

/// Probes `GET {base_url}/rest/health` until it answers with a success status
#[derive(Debug)]
pub struct HttpBackendReadiness {
    health_url: String,
    client: reqwest::Client,
    last_error: Mutex<Option<String>>,
}

impl HttpBackendReadiness {
    /// Create a probe for the backend at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;
        Ok(Self {
            health_url: format!("{}/rest/health", base_url.trim_end_matches('/')),
            client,
            last_error: Mutex::new(None),
        })
    }

    fn set_last_error(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    async fn probe(&self) -> std::result::Result<(), String> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| format!("health probe failed: {e}"))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("health probe returned {}", response.status()))
        }
    }
}

#[async_trait]
impl BackendReadiness for HttpBackendReadiness {
    async fn wait_for_bound_backend_ready(&self, timeout: Duration, poll: Duration) -> bool {
        let wait = async {
            loop {
                match self.probe().await {
                    Ok(()) => return,
                    Err(e) => {
                        tracing::debug!(url = %self.health_url, error = %e, "bound backend not ready");
                        self.set_last_error(Some(e));
                    }
                }
                tokio::time::sleep(poll).await;
            }
        };

        if tokio::time::timeout(timeout, wait).await.is_ok() {
            self.set_last_error(None);
            true
        } else {
            let mut guard = self.last_error.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.is_none() {
                *guard = Some(format!(
                    "bound backend did not answer within {}ms",
                    timeout.as_millis()
                ));
            }
            false
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
