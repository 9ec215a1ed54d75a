// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Client for the policy authority.
//!
//! Used by the authorization pipeline to validate application, user and
//! resource access, and by services to authenticate and to write the
//! append-only operational log. Instances are cheap clones over one shared
//! channel, cached process-wide by `(domain, port)`.

use std::path::PathBuf;
use std::time::Duration;

use aegis_mesh_proto::policy::v1::policy_service_client::PolicyServiceClient;
use aegis_mesh_proto::policy::v1::{
    AuthenticateRequest, GetActionPermissionRequest, LogEntry, LogLevel, LogRequest,
    RemoveResourceRequest, Resource, SetResourceRequest, ValidateApplicationAccessRequest,
    ValidateApplicationResourceAccessRequest, ValidateUserAccessRequest,
    ValidateUserResourceAccessRequest,
};
use tonic::metadata::MetadataValue;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};
use tonic::Request;

use crate::domain::authorization::{
    METADATA_APPLICATION, METADATA_DOMAIN, METADATA_PATH, METADATA_TOKEN,
};
use crate::domain::error::MeshError;
use crate::domain::trust::TrustMaterial;

const CALL_TIMEOUT: Duration = Duration::from_millis(3000);

/// Identity attached to outbound calls. A missing token is looked up in
/// `<token_dir>/<domain>_token`, where the login flow drops it.
#[derive(Debug, Clone, Default)]
pub struct OutboundContext {
    pub domain: String,
    pub token: String,
    pub application: String,
    pub path: String,
}

#[derive(Clone)]
pub struct PolicyClient {
    inner: PolicyServiceClient<Channel>,
    domain: String,
    token_dir: PathBuf,
}

impl PolicyClient {
    pub async fn connect(domain: &str, port: u16) -> Result<Self, MeshError> {
        let channel = Channel::from_shared(format!("http://{domain}:{port}"))
            .map_err(MeshError::transport)?
            .connect_timeout(CALL_TIMEOUT)
            .timeout(CALL_TIMEOUT)
            .connect()
            .await
            .map_err(MeshError::transport)?;
        Ok(Self {
            inner: PolicyServiceClient::new(channel),
            domain: domain.to_string(),
            token_dir: std::env::temp_dir(),
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
            inner: PolicyServiceClient::new(channel),
            domain: domain.to_string(),
            token_dir: std::env::temp_dir(),
        })
    }

    /// Override where session tokens are read from.
    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = dir.into();
        self
    }

    pub async fn authenticate(&self, user: &str, password: &str) -> Result<String, MeshError> {
        let mut client = self.inner.clone();
        let response = client
            .authenticate(self.request(AuthenticateRequest {
                name: user.to_string(),
                password: password.to_string(),
            }))
            .await
            .map_err(MeshError::transport)?;
        Ok(response.into_inner().token)
    }

    pub async fn validate_user_access(
        &self,
        token: &str,
        method: &str,
    ) -> Result<bool, MeshError> {
        let mut client = self.inner.clone();
        let response = client
            .validate_user_access(self.request(ValidateUserAccessRequest {
                token: token.to_string(),
                method: method.to_string(),
            }))
            .await
            .map_err(MeshError::transport)?;
        Ok(response.into_inner().result)
    }

    pub async fn validate_application_access(
        &self,
        application: &str,
        method: &str,
    ) -> Result<bool, MeshError> {
        let mut client = self.inner.clone();
        let response = client
            .validate_application_access(self.request(ValidateApplicationAccessRequest {
                name: application.to_string(),
                method: method.to_string(),
            }))
            .await
            .map_err(MeshError::transport)?;
        Ok(response.into_inner().result)
    }

    pub async fn validate_user_resource_access(
        &self,
        token: &str,
        path: &str,
        method: &str,
        permission: i32,
    ) -> Result<bool, MeshError> {
        let mut client = self.inner.clone();
        let response = client
            .validate_user_resource_access(self.request(ValidateUserResourceAccessRequest {
                token: token.to_string(),
                path: path.to_string(),
                method: method.to_string(),
                permission,
            }))
            .await
            .map_err(MeshError::transport)?;
        Ok(response.into_inner().result)
    }

    pub async fn validate_application_resource_access(
        &self,
        application: &str,
        path: &str,
        method: &str,
        permission: i32,
    ) -> Result<bool, MeshError> {
        let mut client = self.inner.clone();
        let response = client
            .validate_application_resource_access(self.request(
                ValidateApplicationResourceAccessRequest {
                    name: application.to_string(),
                    path: path.to_string(),
                    method: method.to_string(),
                    permission,
                },
            ))
            .await
            .map_err(MeshError::transport)?;
        Ok(response.into_inner().result)
    }

    /// Permission bitmask required to touch resources through `method`, or
    /// `None` when the method has no resource permission defined.
    pub async fn get_action_permission(&self, method: &str) -> Result<Option<i32>, MeshError> {
        let mut client = self.inner.clone();
        let response = client
            .get_action_permission(self.request(GetActionPermissionRequest {
                method: method.to_string(),
            }))
            .await
            .map_err(MeshError::transport)?;
        match response.into_inner().permission {
            -1 => Ok(None),
            mask => Ok(Some(mask)),
        }
    }

    pub async fn set_resource(
        &self,
        path: &str,
        name: &str,
        modified: i64,
        size: i64,
    ) -> Result<(), MeshError> {
        let mut client = self.inner.clone();
        client
            .set_resource(self.request(SetResourceRequest {
                resource: Some(Resource {
                    path: path.to_string(),
                    name: name.to_string(),
                    modified,
                    size,
                }),
            }))
            .await
            .map_err(MeshError::transport)?;
        Ok(())
    }

    /// Remove a resource and its associated permissions.
    pub async fn remove_resource(&self, path: &str, name: &str) -> Result<(), MeshError> {
        let mut client = self.inner.clone();
        client
            .remove_resource(self.request(RemoveResourceRequest {
                resource: Some(Resource {
                    path: path.to_string(),
                    name: name.to_string(),
                    modified: 0,
                    size: 0,
                }),
            }))
            .await
            .map_err(MeshError::transport)?;
        Ok(())
    }

    /// Append one entry to the operational log.
    pub async fn log(
        &self,
        application: &str,
        user_id: &str,
        method: &str,
        message: &str,
        level: LogLevel,
    ) -> Result<(), MeshError> {
        let mut client = self.inner.clone();
        client
            .log(self.request(LogRequest {
                entry: Some(LogEntry {
                    application: application.to_string(),
                    user_id: user_id.to_string(),
                    method: method.to_string(),
                    message: message.to_string(),
                    level: level as i32,
                }),
            }))
            .await
            .map_err(MeshError::transport)?;
        Ok(())
    }

    fn request<T>(&self, message: T) -> Request<T> {
        self.request_with_context(message, &OutboundContext::default())
    }

    /// Wrap a message with the mesh metadata the receiving pipeline
    /// expects. Falls back to the client's own domain and to the session
    /// token dropped by the login flow when the context leaves them empty.
    pub fn request_with_context<T>(&self, message: T, ctx: &OutboundContext) -> Request<T> {
        let mut request = Request::new(message);
        let metadata = request.metadata_mut();

        let domain = if ctx.domain.is_empty() {
            self.domain.as_str()
        } else {
            ctx.domain.as_str()
        };
        if let Ok(value) = MetadataValue::try_from(domain) {
            metadata.insert(METADATA_DOMAIN, value);
        }

        let token = if ctx.token.is_empty() {
            self.stored_token(domain).unwrap_or_default()
        } else {
            ctx.token.clone()
        };
        if !token.is_empty() {
            if let Ok(value) = MetadataValue::try_from(token.as_str()) {
                metadata.insert(METADATA_TOKEN, value);
            }
        }

        if !ctx.application.is_empty() {
            if let Ok(value) = MetadataValue::try_from(ctx.application.as_str()) {
                metadata.insert(METADATA_APPLICATION, value);
            }
        }
        if !ctx.path.is_empty() {
            if let Ok(value) = MetadataValue::try_from(ctx.path.as_str()) {
                metadata.insert(METADATA_PATH, value);
            }
        }

        request
    }

    fn stored_token(&self, domain: &str) -> Option<String> {
        let path = self.token_dir.join(format!("{domain}_token"));
        std::fs::read_to_string(path)
            .ok()
            .map(|t| t.trim().to_string())
    }
}
