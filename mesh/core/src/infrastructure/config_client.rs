// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Client for the configuration authority.
//!
//! A thin wrapper over the generated `ConfigService` stub. Instances are
//! cheap clones over one shared channel and are cached process-wide by the
//! [`crate::infrastructure::registry::ClientRegistry`].

use std::time::Duration;

use aegis_mesh_proto::config::v1::config_service_client::ConfigServiceClient;
use aegis_mesh_proto::config::v1::{
    GetServiceConfigurationRequest, SetServiceConfigurationRequest,
};
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};

use crate::domain::config::ConfigDocument;
use crate::domain::error::MeshError;
use crate::domain::trust::TrustMaterial;

/// Bound on connect and on every call to the authority.
const CALL_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Clone)]
pub struct ConfigAuthorityClient {
    inner: ConfigServiceClient<Channel>,
}

impl ConfigAuthorityClient {
    /// Open a channel to the authority at `domain:port`. Connection
    /// failures are transport errors the resolver absorbs into fallbacks.
    pub async fn connect(domain: &str, port: u16) -> Result<Self, MeshError> {
        let channel = Channel::from_shared(format!("http://{domain}:{port}"))
            .map_err(MeshError::transport)?
            .connect_timeout(CALL_TIMEOUT)
            .timeout(CALL_TIMEOUT)
            .connect()
            .await
            .map_err(MeshError::transport)?;
        Ok(Self {
            inner: ConfigServiceClient::new(channel),
        })
    }

    /// Open a mutually authenticated channel using bootstrapped trust
    /// material. The key travels in its `client.pem` container form.
    pub async fn connect_secure(
        domain: &str,
        port: u16,
        material: &TrustMaterial,
    ) -> Result<Self, MeshError> {
        let ca = std::fs::read_to_string(&material.ca_cert)?;
        let cert = std::fs::read_to_string(&material.client_cert)?;
        let key = std::fs::read_to_string(&material.client_pem)?;
        let tls = ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(ca))
            .identity(Identity::from_pem(cert, key))
            .domain_name(domain);
        let channel = Channel::from_shared(format!("https://{domain}:{port}"))
            .map_err(MeshError::transport)?
            .tls_config(tls)
            .map_err(MeshError::transport)?
            .connect_timeout(CALL_TIMEOUT)
            .timeout(CALL_TIMEOUT)
            .connect()
            .await
            .map_err(MeshError::transport)?;
        Ok(Self {
            inner: ConfigServiceClient::new(channel),
        })
    }

    /// Fetch the document for `service_id`. An empty response counts as
    /// configuration absent, not as a transport defect.
    pub async fn get_service_configuration(
        &self,
        service_id: &str,
    ) -> Result<ConfigDocument, MeshError> {
        let mut client = self.inner.clone();
        let response = client
            .get_service_configuration(GetServiceConfigurationRequest {
                id: service_id.to_string(),
            })
            .await
            .map_err(MeshError::transport)?;
        ConfigDocument::from_json(service_id, &response.into_inner().config)
    }

    /// Store a whole document, replacing any prior version.
    pub async fn set_service_configuration(
        &self,
        document: &ConfigDocument,
    ) -> Result<(), MeshError> {
        let mut client = self.inner.clone();
        let response = client
            .set_service_configuration(SetServiceConfigurationRequest {
                config: document.to_json()?,
            })
            .await
            .map_err(MeshError::transport)?;
        if response.into_inner().result {
            Ok(())
        } else {
            Err(MeshError::Transport(
                "configuration authority rejected the document".to_string(),
            ))
        }
    }
}
