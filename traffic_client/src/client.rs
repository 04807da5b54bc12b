//! Snapshot client.
//!
//! Talks to the simulation server over HTTP/JSON:
//! - one-shot layout loads (obstacles, roads, destinations),
//! - the per-tick step + vehicle + traffic-light poll,
//! - configuration pushes (spawn rate, erratic-driver mode).
//!
//! The client holds no simulation state. Every call either yields parsed
//! records or a [`FetchError`]; callers decide what staleness means.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use traffic_shared::{
    config::ClientConfig,
    net::{
        endpoint, AgentRecord, ErraticModeRequest, InitRequest, LayoutRecord, LightRecord,
        MessageReply, Positions, Snapshot, SpawnRateRequest, StepReport,
    },
};

/// Why a request did not produce usable data.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection refused, reset, or timed out.
    #[error("network failure on /{endpoint}: {source}")]
    Network {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered, but not with what we expected.
    #[error("protocol failure on /{endpoint}: {detail}")]
    Protocol { endpoint: &'static str, detail: String },
}

impl FetchError {
    pub fn endpoint(&self) -> &'static str {
        match self {
            FetchError::Network { endpoint, .. } | FetchError::Protocol { endpoint, .. } => endpoint,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Network { .. })
    }
}

/// Source of server snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// (Re)initializes the server-side simulation.
    async fn init(&self, request: &InitRequest) -> Result<MessageReply, FetchError>;
    async fn agents(&self) -> Result<Vec<AgentRecord>, FetchError>;
    async fn traffic_lights(&self) -> Result<Vec<LightRecord>, FetchError>;
    async fn obstacles(&self) -> Result<Vec<LayoutRecord>, FetchError>;
    async fn roads(&self) -> Result<Vec<LayoutRecord>, FetchError>;
    async fn destinations(&self) -> Result<Vec<LayoutRecord>, FetchError>;
    /// Advances the simulation one step.
    async fn step(&self) -> Result<StepReport, FetchError>;
    async fn set_spawn_rate(&self, rate: u32) -> Result<MessageReply, FetchError>;
    async fn set_erratic_mode(&self, enabled: bool) -> Result<MessageReply, FetchError>;

    /// One tick: advance the server, then read the vehicles and lights it produced.
    ///
    /// All-or-nothing: any failed leg fails the tick.
    async fn tick(&self) -> Result<Snapshot, FetchError> {
        let step = self.step().await?;
        let vehicles = self.agents().await?;
        let lights = self.traffic_lights().await?;
        Ok(Snapshot {
            step,
            vehicles,
            lights,
        })
    }
}

/// HTTP implementation of [`SnapshotSource`].
#[derive(Debug, Clone)]
pub struct HttpSnapshotClient {
    http: Client,
    base: Url,
}

impl HttpSnapshotClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url).with_context(|| format!("parse server url {base_url}"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base })
    }

    pub fn from_config(cfg: &ClientConfig) -> anyhow::Result<Self> {
        Self::new(&cfg.server_url, cfg.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, endpoint: &'static str) -> Result<Url, FetchError> {
        self.base.join(endpoint).map_err(|e| FetchError::Protocol {
            endpoint,
            detail: format!("bad url: {e}"),
        })
    }

    async fn get<T: DeserializeOwned + Send>(&self, endpoint: &'static str) -> Result<T, FetchError> {
        let url = self.url(endpoint)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Network { endpoint, source })?;
        decode(endpoint, response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned + Send>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<T, FetchError> {
        let url = self.url(endpoint)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| FetchError::Network { endpoint, source })?;
        decode(endpoint, response).await
    }

    async fn positions<T: DeserializeOwned + Send>(&self, endpoint: &'static str) -> Result<Vec<T>, FetchError> {
        let body: Positions<T> = self.get(endpoint).await?;
        Ok(body.positions)
    }
}

async fn decode<T: DeserializeOwned + Send>(endpoint: &'static str, response: reqwest::Response) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Protocol {
            endpoint,
            detail: format!("HTTP {status}"),
        });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|source| FetchError::Network { endpoint, source })?;
    debug!(endpoint, bytes = bytes.len(), "Response received");
    serde_json::from_slice(&bytes).map_err(|e| FetchError::Protocol {
        endpoint,
        detail: format!("invalid JSON: {e}"),
    })
}

#[async_trait]
impl SnapshotSource for HttpSnapshotClient {
    async fn init(&self, request: &InitRequest) -> Result<MessageReply, FetchError> {
        self.post(endpoint::INIT, request).await
    }

    async fn agents(&self) -> Result<Vec<AgentRecord>, FetchError> {
        self.positions(endpoint::AGENTS).await
    }

    async fn traffic_lights(&self) -> Result<Vec<LightRecord>, FetchError> {
        self.positions(endpoint::TRAFFIC_LIGHTS).await
    }

    async fn obstacles(&self) -> Result<Vec<LayoutRecord>, FetchError> {
        self.positions(endpoint::OBSTACLES).await
    }

    async fn roads(&self) -> Result<Vec<LayoutRecord>, FetchError> {
        self.positions(endpoint::ROADS).await
    }

    async fn destinations(&self) -> Result<Vec<LayoutRecord>, FetchError> {
        self.positions(endpoint::DESTINATIONS).await
    }

    async fn step(&self) -> Result<StepReport, FetchError> {
        self.get(endpoint::UPDATE).await
    }

    async fn set_spawn_rate(&self, rate: u32) -> Result<MessageReply, FetchError> {
        self.post(endpoint::SPAWN_RATE, &SpawnRateRequest { rate }).await
    }

    async fn set_erratic_mode(&self, enabled: bool) -> Result<MessageReply, FetchError> {
        self.post(endpoint::ERRATIC_MODE, &ErraticModeRequest { enabled }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = HttpSnapshotClient::new("http://localhost:8585/sim", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8585/sim/");
        assert_eq!(
            client.url(endpoint::AGENTS).unwrap().as_str(),
            "http://localhost:8585/sim/getAgents"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HttpSnapshotClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_failure() {
        // Port 9 (discard) on loopback is not expected to accept HTTP.
        let client = HttpSnapshotClient::new("http://127.0.0.1:9/", Duration::from_millis(500)).unwrap();
        let err = client.agents().await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {err}");
        assert_eq!(err.endpoint(), endpoint::AGENTS);
    }
}
