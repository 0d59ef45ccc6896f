//! HTTP transport: JSON `POST {base_url}/{endpoint}`.

use std::time::Duration;

use {
    async_trait::async_trait,
    courier_config::GatewayConfig,
    serde_json::Value,
    tracing::{debug, warn},
    url::Url,
};

use crate::{
    error::{Error, Result},
    gateway::{Endpoint, GatewayClient, GatewayResponse},
};

/// [`GatewayClient`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Url,
    default_timeout: Duration,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::validation(format!("failed to build gateway HTTP client: {e}")))?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: reqwest::Client, config: &GatewayConfig) -> Result<Self> {
        // A trailing slash makes `join` append instead of replacing the
        // last path segment.
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| Error::validation(format!("invalid gateway base URL {base}: {e}")))?;
        Ok(Self {
            client,
            base_url,
            default_timeout: config.request_timeout(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url> {
        self.base_url
            .join(endpoint.as_str())
            .map_err(|e| Error::gateway(endpoint.as_str(), e.to_string()))
    }
}

#[async_trait]
impl GatewayClient for HttpGateway {
    async fn call(
        &self,
        endpoint: Endpoint,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<GatewayResponse> {
        let url = self.endpoint_url(endpoint)?;
        let timeout = timeout.unwrap_or(self.default_timeout);
        debug!(%endpoint, timeout_secs = timeout.as_secs(), "calling gateway");

        let resp = self
            .client
            .post(url)
            .json(&payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::gateway(endpoint.as_str(), e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%endpoint, %status, "gateway returned an error status");
            return Err(Error::gateway(
                endpoint.as_str(),
                format!("HTTP {status}: {body}"),
            ));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::gateway(endpoint.as_str(), e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| {
            Error::gateway(endpoint.as_str(), format!("undecodable response: {e}"))
        })
    }
}
