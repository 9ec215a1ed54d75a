// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Authorization pipeline, attached to every server-side call.
//!
//! One strategy object, composed into the listener at startup, gates each
//! inbound call behind domain, application, user and resource checks:
//!
//! ```text
//! call arrives
//!   └─ extract domain/token/application/path from metadata (prefix match)
//!   └─ no mesh metadata                  → PROCEED (bootstrap bypass)
//!   └─ mesh metadata, empty domain       → DENY (PERMISSION_DENIED)
//!   └─ policy client for domain[:port]   ← process-wide registry
//!   └─ AND of every applicable check     → PROCEED | DENY
//! ```
//!
//! A check that cannot be executed (policy authority unreachable) counts
//! as denied. Denials are normal call outcomes: they become a status, are
//! never logged as system errors, and never propagate past this boundary.
//!
//! Positive decisions are memoized with a TTL keyed by
//! (authority, method, token, application, path) to keep load off the
//! policy authority; expired entries re-validate.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use http::{HeaderValue, Request, Response};
use tonic::body::{empty_body, BoxBody};
use tonic::Status;
use tower::{Layer, Service};
use tracing::debug;

use crate::domain::authorization::{parse_authority, CallContext};
use crate::infrastructure::policy_client::PolicyClient;
use crate::infrastructure::registry::ClientRegistry;

/// How long a positive decision stays valid before the authority is asked
/// again.
const DECISION_TTL: Duration = Duration::from_secs(60);

type DecisionKey = (String, u16, String, String, String, String);

/// The per-call decision logic, shared by every connection of a listener.
pub struct AuthorizationPipeline {
    clients: Arc<ClientRegistry<PolicyClient>>,
    decisions: DashMap<DecisionKey, Instant>,
    decision_ttl: Duration,
    /// Methods (exact or prefix) that bypass authorization entirely;
    /// infra endpoints must always be reachable.
    always_allow: Vec<String>,
}

impl AuthorizationPipeline {
    pub fn new(clients: Arc<ClientRegistry<PolicyClient>>) -> Self {
        Self {
            clients,
            decisions: DashMap::new(),
            decision_ttl: DECISION_TTL,
            always_allow: vec![
                "/grpc.health.v1.Health/".to_string(),
                "/grpc.reflection.".to_string(),
            ],
        }
    }

    pub fn with_decision_ttl(mut self, ttl: Duration) -> Self {
        self.decision_ttl = ttl;
        self
    }

    /// Register additional methods or method prefixes that bypass the
    /// pipeline.
    pub fn allow_unauthenticated(mut self, methods: impl IntoIterator<Item = String>) -> Self {
        self.always_allow.extend(methods);
        self
    }

    /// Run the pipeline for one call. `Ok` proceeds, `Err` carries the
    /// PERMISSION_DENIED status to send.
    pub async fn authorize(&self, ctx: &CallContext) -> Result<(), Status> {
        if self.is_always_allowed(&ctx.method) {
            return Ok(());
        }

        // Calls without any mesh metadata take the bootstrap bypass:
        // health probes and loopback tooling carry none.
        if !ctx.has_mesh_metadata() {
            return Ok(());
        }

        if ctx.domain.is_empty() {
            return Err(Status::permission_denied(format!(
                "permission denied to execute {}: no domain was given",
                ctx.method
            )));
        }

        // Nothing to validate: no application, no user, no resource. The
        // policy client stays unbuilt for such calls.
        if ctx.application.is_empty() && ctx.token.is_empty() && ctx.path.is_empty() {
            return Ok(());
        }

        let (domain, port) = parse_authority(&ctx.domain);
        let key: DecisionKey = (
            domain.clone(),
            port,
            ctx.method.clone(),
            ctx.token.clone(),
            ctx.application.clone(),
            ctx.path.clone(),
        );
        if self.cached_allow(&key) {
            return Ok(());
        }

        let policy = self
            .clients
            .get_or_create(&domain, port, || PolicyClient::connect(&domain, port))
            .await
            .map_err(|err| {
                debug!(%err, domain = %domain, port, "policy authority unreachable");
                Status::permission_denied(format!(
                    "permission denied to execute {}: policy authority unreachable",
                    ctx.method
                ))
            })?;

        let mut checked = false;
        let mut allowed = true;

        if !ctx.application.is_empty() {
            checked = true;
            allowed &= policy
                .validate_application_access(&ctx.application, &ctx.method)
                .await
                .unwrap_or(false);
        }

        if allowed && !ctx.token.is_empty() {
            checked = true;
            allowed &= policy
                .validate_user_access(&ctx.token, &ctx.method)
                .await
                .unwrap_or(false);
        }

        if allowed && !ctx.path.is_empty() {
            match policy.get_action_permission(&ctx.method).await {
                Ok(Some(permission)) => {
                    checked = true;
                    let user_ok = !ctx.token.is_empty()
                        && policy
                            .validate_user_resource_access(
                                &ctx.token,
                                &ctx.path,
                                &ctx.method,
                                permission,
                            )
                            .await
                            .unwrap_or(false);
                    let application_ok = !ctx.application.is_empty()
                        && policy
                            .validate_application_resource_access(
                                &ctx.application,
                                &ctx.path,
                                &ctx.method,
                                permission,
                            )
                            .await
                            .unwrap_or(false);
                    allowed &= user_ok || application_ok;
                }
                // no resource permission defined for the method
                Ok(None) => {}
                Err(_) => {
                    checked = true;
                    allowed = false;
                }
            }
        }

        if !allowed {
            return Err(Status::permission_denied(format!(
                "permission denied to execute {}",
                ctx.method
            )));
        }

        if checked {
            self.remember_allow(key);
        }
        Ok(())
    }

    fn is_always_allowed(&self, method: &str) -> bool {
        self.always_allow
            .iter()
            .any(|entry| method == entry || method.starts_with(entry.as_str()))
    }

    fn cached_allow(&self, key: &DecisionKey) -> bool {
        let expired = match self.decisions.get(key) {
            Some(expiry) => {
                if *expiry > Instant::now() {
                    return true;
                }
                true
            }
            None => false,
        };
        if expired {
            self.decisions.remove(key);
        }
        false
    }

    fn remember_allow(&self, key: DecisionKey) {
        self.decisions.insert(key, Instant::now() + self.decision_ttl);
    }
}

/// Tower layer wiring the pipeline in front of a tonic router.
#[derive(Clone)]
pub struct AuthorizationLayer {
    pipeline: Arc<AuthorizationPipeline>,
}

impl AuthorizationLayer {
    pub fn new(pipeline: Arc<AuthorizationPipeline>) -> Self {
        Self { pipeline }
    }
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = AuthorizedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizedService {
            inner,
            pipeline: self.pipeline.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthorizedService<S> {
    inner: S,
    pipeline: Arc<AuthorizationPipeline>,
}

impl<S> Service<Request<BoxBody>> for AuthorizedService<S>
where
    S: Service<Request<BoxBody>, Response = Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<BoxBody>) -> Self::Future {
        let pipeline = self.pipeline.clone();
        // take the ready inner service, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let context = CallContext::from_metadata(
                request.uri().path(),
                request
                    .headers()
                    .iter()
                    .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
            );

            match pipeline.authorize(&context).await {
                Ok(()) => inner.call(request).await,
                Err(status) => Ok(denied_response(&status)),
            }
        })
    }
}

/// Trailers-only gRPC response carrying the denial status.
fn denied_response(status: &Status) -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/grpc"),
    );
    headers.insert("grpc-status", HeaderValue::from(status.code() as i32));
    if let Ok(message) = HeaderValue::from_str(status.message()) {
        headers.insert("grpc-message", message);
    }
    response
}
