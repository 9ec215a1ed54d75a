// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration resolution and persistence.
//!
//! A document is resolved preferring the live configuration authority and
//! degrading gracefully: authority RPC, then the domain's HTTP partial
//! lookup (which points at a file), then the local fallback file.
//! Persistence runs the symmetric chain: authority first, local file on
//! any failure. Transport errors never surface from here — only the
//! exhaustion of every source does.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::domain::authorization::parse_authority;
use crate::domain::config::ConfigDocument;
use crate::domain::error::MeshError;
use crate::infrastructure::config_client::ConfigAuthorityClient;
use crate::infrastructure::control::ControlEndpoint;
use crate::infrastructure::registry::ClientRegistry;

pub struct ConfigResolver {
    clients: Arc<ClientRegistry<ConfigAuthorityClient>>,
    /// HTTP port of the control endpoint used for the partial-config
    /// fallback.
    control_port: u16,
}

impl ConfigResolver {
    pub fn new(clients: Arc<ClientRegistry<ConfigAuthorityClient>>) -> Self {
        Self {
            clients,
            control_port: 80,
        }
    }

    pub fn with_control_port(mut self, port: u16) -> Self {
        self.control_port = port;
        self
    }

    /// Resolve the document for `service_id` from the authority at
    /// `authority` (`domain[:port]`, port 80 by default), falling back to
    /// the HTTP partial lookup and finally to `local_fallback`.
    pub async fn resolve(
        &self,
        service_id: &str,
        authority: &str,
        local_fallback: Option<&Path>,
    ) -> Result<ConfigDocument, MeshError> {
        let (domain, port) = parse_authority(authority);

        match self
            .clients
            .get_or_create(&domain, port, || {
                ConfigAuthorityClient::connect(&domain, port)
            })
            .await
        {
            Ok(client) => match client.get_service_configuration(service_id).await {
                Ok(document) => return Ok(document),
                Err(err) => {
                    debug!(service_id, %err, "configuration authority lookup failed, falling back")
                }
            },
            Err(err) => debug!(service_id, %err, "configuration authority unreachable"),
        }

        if let Some(document) = self.partial_lookup(service_id, &domain).await {
            return Ok(document);
        }

        let path = local_fallback
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_fallback_path);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            MeshError::absent(
                service_id,
                format!("no source yielded a document ({}: {e})", path.display()),
            )
        })?;
        ConfigDocument::from_json(service_id, &raw)
    }

    /// Persist `document`, preferring the authority and overwriting the
    /// local fallback file in full on any failure. No partial writes, no
    /// merge.
    pub async fn persist(
        &self,
        service_id: &str,
        authority: &str,
        document: &ConfigDocument,
        local_fallback: Option<&Path>,
    ) -> Result<(), MeshError> {
        let (domain, port) = parse_authority(authority);

        let stored = match self
            .clients
            .get_or_create(&domain, port, || {
                ConfigAuthorityClient::connect(&domain, port)
            })
            .await
        {
            Ok(client) => client.set_service_configuration(document).await,
            Err(err) => Err(err),
        };

        match stored {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(service_id, %err, "configuration authority store failed, writing local file");
                let path = local_fallback
                    .map(Path::to_path_buf)
                    .unwrap_or_else(Self::default_fallback_path);
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                std::fs::write(&path, document.to_json()?)?;
                Ok(())
            }
        }
    }

    /// The domain's `/config?id=` endpoint returns a partial document whose
    /// `ConfigPath` points at the full document on the local filesystem.
    async fn partial_lookup(&self, service_id: &str, domain: &str) -> Option<ConfigDocument> {
        let control = ControlEndpoint::new(domain, self.control_port).ok()?;
        let partial = match control.partial_config(service_id).await {
            Ok(partial) => partial,
            Err(err) => {
                debug!(service_id, %err, "partial configuration lookup failed");
                return None;
            }
        };
        if partial.config_path.is_empty() {
            return None;
        }
        let raw = std::fs::read_to_string(&partial.config_path).ok()?;
        ConfigDocument::from_json(service_id, &raw).ok()
    }

    /// Default fallback: `config.json` next to the executable.
    pub fn default_fallback_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.json")
    }
}
