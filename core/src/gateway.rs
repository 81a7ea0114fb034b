//! Discovery persistence
//!
//! The engine asks a [`DiscoveryGateway`] to record "character found
//! resource" exactly once per completed gather run. It never retries and
//! treats both a `success: false` body and a transport error as a failed
//! discovery.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;

use forage_types::{CharacterId, ResourceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DiscoveryResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("discovery request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("discovery endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("discovery service unavailable: {0}")]
    Unavailable(String),
}

/// Persists the "resource discovered" fact for a character.
///
/// Calling it twice for an already discovered resource must be harmless.
pub trait DiscoveryGateway: Send + Sync + 'static {
    fn discover(
        &self,
        resource: &ResourceId,
        character: &CharacterId,
    ) -> impl Future<Output = Result<DiscoveryResponse, GatewayError>> + Send;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// POSTs to `{base_url}/characters/{character}/resources/{resource}/discover`
#[derive(Debug, Clone)]
pub struct HttpDiscoveryGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDiscoveryGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn endpoint(&self, resource: &ResourceId, character: &CharacterId) -> String {
        format!(
            "{}/characters/{}/resources/{}/discover",
            self.base_url, character, resource
        )
    }
}

impl DiscoveryGateway for HttpDiscoveryGateway {
    async fn discover(
        &self,
        resource: &ResourceId,
        character: &CharacterId,
    ) -> Result<DiscoveryResponse, GatewayError> {
        let url = self.endpoint(resource, character);
        tracing::debug!(%url, "Sending discovery");

        let response = self.client.post(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<DiscoveryResponse>().await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Local
// ─────────────────────────────────────────────────────────────────────────────

/// In-process gateway for offline play. Always succeeds and remembers what
/// was discovered.
#[derive(Debug, Default)]
pub struct LocalDiscoveryGateway {
    discovered: Mutex<HashSet<(CharacterId, ResourceId)>>,
}

impl LocalDiscoveryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_discovered(&self, resource: &ResourceId, character: &CharacterId) -> bool {
        self.discovered
            .lock()
            .map(|seen| seen.contains(&(character.clone(), resource.clone())))
            .unwrap_or(false)
    }
}

impl DiscoveryGateway for LocalDiscoveryGateway {
    async fn discover(
        &self,
        resource: &ResourceId,
        character: &CharacterId,
    ) -> Result<DiscoveryResponse, GatewayError> {
        let mut seen = self
            .discovered
            .lock()
            .map_err(|_| GatewayError::Unavailable("local discovery store poisoned".to_string()))?;
        let first = seen.insert((character.clone(), resource.clone()));
        Ok(DiscoveryResponse {
            success: true,
            message: (!first).then(|| "already discovered".to_string()),
        })
    }
}
