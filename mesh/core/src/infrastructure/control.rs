// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP control endpoints exposed by every mesh domain.
//!
//! Three endpoints are consumed: `/config?id=` for partial configuration
//! lookup, `/get_ca_certificate` and `/sign_ca_certificate?csr=` for the
//! trust bootstrap. Every call carries a bounded timeout and is never
//! retried at this layer; callers decide what a failure means.

use std::time::Duration;

use base64::Engine;
use serde::Deserialize;

use crate::domain::error::MeshError;

/// Bound on every control call. A slow domain must not hang a request
/// indefinitely.
pub const CONTROL_TIMEOUT: Duration = Duration::from_millis(3000);

/// Partial configuration served over HTTP; carries at least the path of
/// the full document on the remote host.
#[derive(Debug, Clone, Deserialize)]
pub struct PartialConfig {
    #[serde(rename = "ConfigPath", default)]
    pub config_path: String,
}

/// Client for one domain's control endpoint.
pub struct ControlEndpoint {
    client: reqwest::Client,
    base: String,
}

impl ControlEndpoint {
    pub fn new(domain: &str, port: u16) -> Result<Self, MeshError> {
        let client = reqwest::Client::builder()
            .timeout(CONTROL_TIMEOUT)
            .build()
            .map_err(MeshError::transport)?;
        Ok(Self {
            client,
            base: format!("http://{domain}:{port}"),
        })
    }

    /// `GET /config?id=<service_id>` — partial configuration lookup.
    pub async fn partial_config(&self, service_id: &str) -> Result<PartialConfig, MeshError> {
        let url = format!("{}/config?id={}", self.base, service_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(MeshError::transport)?;
        if !response.status().is_success() {
            return Err(MeshError::Transport(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        response.json().await.map_err(MeshError::transport)
    }

    /// `GET /get_ca_certificate` — the domain's CA certificate bytes.
    pub async fn ca_certificate(&self) -> Result<String, MeshError> {
        self.get_text(format!("{}/get_ca_certificate", self.base))
            .await
    }

    /// `GET /sign_ca_certificate?csr=<base64>` — submit a CSR for signing;
    /// the response body is the signed client certificate.
    pub async fn sign_certificate(&self, csr_pem: &str) -> Result<String, MeshError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(csr_pem);
        self.get_text(format!("{}/sign_ca_certificate?csr={}", self.base, encoded))
            .await
    }

    async fn get_text(&self, url: String) -> Result<String, MeshError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(MeshError::transport)?;
        if !response.status().is_success() {
            return Err(MeshError::Transport(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        response.text().await.map_err(MeshError::transport)
    }
}
