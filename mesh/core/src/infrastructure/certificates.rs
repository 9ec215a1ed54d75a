// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Certificate bootstrap: establishes mutual-TLS trust with a remote
//! domain before any secured channel is opened to it.
//!
//! Cross-domain trust runs the signing protocol against the remote
//! domain's control endpoint:
//!
//! ```text
//! ensure <root>/<domain>/
//!   └─ GET /get_ca_certificate            → ca.crt
//!   └─ generate private key               → client.key
//!   └─ CSR bound to CN=<domain>           → client.csr
//!   └─ GET /sign_ca_certificate?csr=...   → client.crt
//!   └─ PKCS#8 container for the transport → client.pem
//! ```
//!
//! Each step is skipped only when its own output file already exists, and
//! fails the whole bootstrap when a prerequisite artifact is missing —
//! partial trust material is never valid. Key and CSR generation go through
//! rcgen; there is no external toolchain invocation.

use std::sync::Arc;

use dashmap::DashMap;
use rcgen::{CertificateParams, DnType, KeyPair};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::error::MeshError;
use crate::domain::trust::{TrustMaterial, TrustStore};
use crate::infrastructure::control::ControlEndpoint;

/// Development passphrase recorded in the trust material so deployments can
/// re-encrypt keys at rest. Production must externalize this.
pub const DEV_PASSPHRASE: &str = "1111";

/// The host's own server-side material, used to derive client-role trust
/// when bootstrapping against the local domain.
#[derive(Debug, Clone, Default)]
pub struct ServerMaterial {
    pub ca_cert: String,
    pub cert: String,
    pub key: String,
}

pub struct CertificateBootstrap {
    store: TrustStore,
    passphrase: String,
    /// Serializes concurrent bootstraps per remote domain; key/CSR/signing
    /// steps must not run twice at once for the same domain.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CertificateBootstrap {
    pub fn new(store: TrustStore) -> Self {
        Self {
            store,
            passphrase: DEV_PASSPHRASE.to_string(),
            locks: DashMap::new(),
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = passphrase.into();
        self
    }

    /// Establish trust with `remote_domain`, reachable on `control_port`.
    ///
    /// Against the local domain no network round trip occurs: the host's
    /// server certificate and key paths are re-pointed to their client-role
    /// equivalents (server and client certificates are co-located and
    /// differ only by role marker in the file name).
    pub async fn establish_trust(
        &self,
        local_domain: &str,
        remote_domain: &str,
        control_port: u16,
        server: &ServerMaterial,
    ) -> Result<TrustMaterial, MeshError> {
        if remote_domain == local_domain {
            debug!(domain = remote_domain, "deriving client trust from local server material");
            return Ok(TrustMaterial::from_server_role(
                remote_domain,
                &server.ca_cert,
                &server.cert,
                &server.key,
            ));
        }

        let lock = self
            .locks
            .entry(remote_domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _serialized = lock.lock().await;

        self.bootstrap_remote(remote_domain, control_port).await
    }

    async fn bootstrap_remote(
        &self,
        remote_domain: &str,
        control_port: u16,
    ) -> Result<TrustMaterial, MeshError> {
        let material = self.store.material(remote_domain, &self.passphrase);
        std::fs::create_dir_all(&material.directory)?;

        let control = ControlEndpoint::new(remote_domain, control_port)?;

        // CA certificate first: without it there is nothing to trust, and
        // key generation would only leave partial material behind.
        if !material.ca_cert.exists() {
            let ca_pem = control.ca_certificate().await?;
            if ca_pem.trim().is_empty() {
                return Err(MeshError::toolchain(
                    "ca_fetch",
                    format!("{remote_domain} returned an empty CA certificate"),
                ));
            }
            std::fs::write(&material.ca_cert, ca_pem)?;
        }

        if !material.client_key.exists() {
            let key = KeyPair::generate().map_err(|e| MeshError::toolchain("key_generation", e))?;
            std::fs::write(&material.client_key, key.serialize_pem())?;
        }

        if !material.client_csr.exists() {
            let key_pem = std::fs::read_to_string(&material.client_key).map_err(|e| {
                MeshError::toolchain("csr_generation", format!("missing private key: {e}"))
            })?;
            let key = KeyPair::from_pem(&key_pem)
                .map_err(|e| MeshError::toolchain("csr_generation", e))?;
            let mut params = CertificateParams::new(vec![remote_domain.to_string()])
                .map_err(|e| MeshError::toolchain("csr_generation", e))?;
            params
                .distinguished_name
                .push(DnType::CommonName, remote_domain);
            let csr = params
                .serialize_request(&key)
                .map_err(|e| MeshError::toolchain("csr_generation", e))?;
            let csr_pem = csr
                .pem()
                .map_err(|e| MeshError::toolchain("csr_generation", e))?;
            std::fs::write(&material.client_csr, csr_pem)?;
        }

        if !material.client_cert.exists() {
            let csr_pem = std::fs::read_to_string(&material.client_csr).map_err(|e| {
                MeshError::toolchain("signing", format!("missing signing request: {e}"))
            })?;
            let signed = control.sign_certificate(&csr_pem).await?;
            if signed.trim().is_empty() {
                return Err(MeshError::toolchain(
                    "signing",
                    format!("{remote_domain} returned an empty certificate"),
                ));
            }
            std::fs::write(&material.client_cert, signed)?;
        }

        // The key is already PKCS#8; the .pem copy is the container the
        // transport credential loader reads.
        if !material.client_pem.exists() {
            let key_pem = std::fs::read_to_string(&material.client_key).map_err(|e| {
                MeshError::toolchain("pem_conversion", format!("missing private key: {e}"))
            })?;
            std::fs::write(&material.client_pem, key_pem)?;
        }

        info!(domain = remote_domain, dir = %material.directory.display(), "trust material ready");
        Ok(material)
    }
}
