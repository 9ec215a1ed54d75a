// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy for the mesh substrate.
//!
//! Transport failures are absorbed at the boundary components
//! (configuration resolver, certificate bootstrap) and converted into
//! fallback attempts; only exhaustion of every fallback surfaces to the
//! caller. Permission denials are normal pipeline outcomes carried as call
//! status, never as system errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    /// HTTP or RPC dependency unreachable or timed out. Always recoverable
    /// via a fallback; never fatal on its own.
    #[error("transport failure: {0}")]
    Transport(String),

    /// No configuration source yielded a usable document. The service
    /// runtime applies constructor defaults or refuses to start; it never
    /// runs with an undefined identity.
    #[error("no configuration available for `{service_id}`: {reason}")]
    ConfigurationAbsent { service_id: String, reason: String },

    /// A key/CSR/signing step of the trust bootstrap failed. Fatal to the
    /// bootstrap; a TLS-required service must not start without it.
    #[error("certificate toolchain failure at {step}: {reason}")]
    CertificateToolchain { step: &'static str, reason: String },

    /// Normal authorization outcome, surfaced to the caller as a
    /// PERMISSION_DENIED call status naming the method.
    #[error("permission denied to execute {method}")]
    PermissionDenied { method: String },

    /// Local file I/O during persistence or trust-material handling.
    /// Surfaced synchronously, not retried.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A document could not be serialized for persistence.
    #[error("serialization failure: {0}")]
    Serialization(String),
}

impl MeshError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn toolchain(step: &'static str, err: impl std::fmt::Display) -> Self {
        Self::CertificateToolchain {
            step,
            reason: err.to_string(),
        }
    }

    pub fn absent(service_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigurationAbsent {
            service_id: service_id.into(),
            reason: reason.into(),
        }
    }
}

impl From<MeshError> for tonic::Status {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::PermissionDenied { method } => tonic::Status::permission_denied(format!(
                "permission denied to execute {method}"
            )),
            MeshError::ConfigurationAbsent { .. } => {
                tonic::Status::failed_precondition(err.to_string())
            }
            MeshError::Transport(_) => tonic::Status::unavailable(err.to_string()),
            other => tonic::Status::internal(other.to_string()),
        }
    }
}
