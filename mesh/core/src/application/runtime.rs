// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-instance service runtime.
//!
//! Owns the service identity and its lifecycle: resolve configuration and
//! merge it over constructor defaults, bootstrap cross-domain trust when
//! TLS requires it, start the listener with the authorization pipeline
//! attached, and persist the identity after every state transition.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use http::{Request, Response};
use tokio::sync::Notify;
use tonic::body::BoxBody;
use tonic::server::NamedService;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tower::Service;
use tracing::{info, warn};

use crate::domain::error::MeshError;
use crate::domain::identity::{ServiceIdentity, ServiceOptions, ServiceState};
use crate::domain::trust::TrustStore;
use crate::infrastructure::certificates::{CertificateBootstrap, ServerMaterial};
use crate::infrastructure::policy_client::PolicyClient;
use crate::infrastructure::registry::ClientRegistry;
use crate::infrastructure::resolver::ConfigResolver;
use crate::presentation::interceptor::{AuthorizationLayer, AuthorizationPipeline};

/// Mesh-level settings a runtime needs beyond its own service options.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Address of the configuration authority, `domain[:port]`.
    pub authority: String,
    /// Domain of the local host; defaults to the machine hostname.
    pub local_domain: String,
    /// HTTP control port of mesh domains.
    pub control_port: u16,
    /// Root of the local trust namespace.
    pub trust_root: PathBuf,
    /// Local configuration fallback file; defaults to `config.json` next
    /// to the executable.
    pub local_fallback: Option<PathBuf>,
    /// Methods that bypass authorization (exact or prefix).
    pub allow_unauthenticated: Vec<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            authority: "localhost:10000".to_string(),
            local_domain: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "localhost".to_string()),
            control_port: 80,
            trust_root: PathBuf::from("/etc/aegis/tls"),
            local_fallback: None,
            allow_unauthenticated: Vec::new(),
        }
    }
}

/// Cloneable handle that releases a blocked [`ServiceRuntime::serve`].
#[derive(Clone)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    pub fn stop(&self) {
        self.0.notify_one();
    }
}

pub struct ServiceRuntime {
    identity: ServiceIdentity,
    settings: RuntimeSettings,
    resolver: Arc<ConfigResolver>,
    pipeline: Arc<AuthorizationPipeline>,
    fallback_path: PathBuf,
    shutdown: Arc<Notify>,
}

impl ServiceRuntime {
    /// Build a runtime: resolve and merge configuration, bootstrap trust
    /// when needed, mark the instance running and persist its identity.
    ///
    /// A missing configuration is not fatal: the instance runs on its
    /// constructor defaults and persists them. A certificate toolchain
    /// failure is fatal: a TLS-required service refuses to start without
    /// valid trust material.
    pub async fn bootstrap(
        opts: ServiceOptions,
        settings: RuntimeSettings,
        resolver: Arc<ConfigResolver>,
        policy_clients: Arc<ClientRegistry<PolicyClient>>,
    ) -> Result<Self, MeshError> {
        let mut identity = ServiceIdentity::from_options(&opts);

        match resolver
            .resolve(
                &opts.id,
                &settings.authority,
                settings.local_fallback.as_deref(),
            )
            .await
        {
            Ok(document) => identity.merge_document(&document),
            Err(MeshError::ConfigurationAbsent { service_id, reason }) => {
                warn!(service_id = %service_id, reason = %reason, "unconfigured, starting from defaults");
            }
            Err(other) => return Err(other),
        }

        if identity.tls && identity.domain != settings.local_domain {
            let bootstrap = CertificateBootstrap::new(TrustStore::new(&settings.trust_root));
            let server_material = ServerMaterial {
                ca_cert: identity.cert_authority_trust.clone(),
                cert: identity.cert_file.clone(),
                key: identity.key_file.clone(),
            };
            let material = bootstrap
                .establish_trust(
                    &settings.local_domain,
                    &identity.domain,
                    settings.control_port,
                    &server_material,
                )
                .await?;
            identity.cert_authority_trust = material.ca_cert.display().to_string();
            identity.cert_file = material.client_cert.display().to_string();
            identity.key_file = material.client_key.display().to_string();
        }

        let fallback_path = settings
            .local_fallback
            .clone()
            .unwrap_or_else(ConfigResolver::default_fallback_path);
        identity.config_path = fallback_path.display().to_string();
        identity.state = ServiceState::Running;
        identity.process = Some(std::process::id());

        resolver
            .persist(
                &identity.id,
                &settings.authority,
                &identity.to_document(),
                Some(&fallback_path),
            )
            .await?;

        let pipeline = AuthorizationPipeline::new(policy_clients)
            .allow_unauthenticated(settings.allow_unauthenticated.iter().cloned());

        Ok(Self {
            identity,
            settings,
            resolver,
            pipeline: Arc::new(pipeline),
            fallback_path,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Trigger listener shutdown; the blocked [`Self::serve`] returns.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    /// Bind the listener, attach the authorization pipeline, and block
    /// until shutdown is signalled. New calls stop being accepted on
    /// shutdown; in-flight calls complete.
    pub async fn serve<S>(&mut self, svc: S) -> Result<(), MeshError>
    where
        S: Service<Request<BoxBody>, Response = Response<BoxBody>, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        let addr: std::net::SocketAddr = format!("0.0.0.0:{}", self.identity.port)
            .parse()
            .map_err(MeshError::transport)?;

        let mut builder = Server::builder();
        if self.identity.tls {
            let cert = std::fs::read_to_string(&self.identity.cert_file)?;
            let key = std::fs::read_to_string(&self.identity.key_file)?;
            let ca = std::fs::read_to_string(&self.identity.cert_authority_trust)?;
            let tls = ServerTlsConfig::new()
                .identity(Identity::from_pem(cert, key))
                .client_ca_root(Certificate::from_pem(ca));
            builder = builder.tls_config(tls).map_err(MeshError::transport)?;
        }

        info!(
            service = %self.identity.name,
            addr = %addr,
            tls = self.identity.tls,
            "listening"
        );

        let shutdown = self.shutdown.clone();
        builder
            .layer(AuthorizationLayer::new(self.pipeline.clone()))
            .add_service(svc)
            .serve_with_shutdown(addr, async move {
                shutdown.notified().await;
            })
            .await
            .map_err(MeshError::transport)?;

        self.identity.state = ServiceState::Stopped;
        self.identity.process = None;
        self.resolver
            .persist(
                &self.identity.id,
                &self.settings.authority,
                &self.identity.to_document(),
                Some(&self.fallback_path),
            )
            .await?;
        info!(service = %self.identity.name, "stopped");

        Ok(())
    }
}
