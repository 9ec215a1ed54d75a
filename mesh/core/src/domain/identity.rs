// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service identity: the per-instance state a runtime owns exclusively.
//!
//! An identity is created by merging a previously persisted document (when
//! one resolves) into constructor defaults, then mutated on every start and
//! stop transition and written back after each mutation.

use serde::{Deserialize, Serialize};

use crate::domain::config::ConfigDocument;

/// Lifecycle state of a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Running,
    Stopped,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Constructor defaults for a service instance. The resolved configuration
/// document, when one exists, overrides these field by field.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub port: u16,
    pub proxy: u16,
    pub publisher_id: String,
    pub version: String,
    pub tls: bool,
    pub allow_all_origins: bool,
    pub allowed_origins: Vec<String>,
    pub keep_alive: bool,
    pub keep_up_to_date: bool,
    pub proto_path: String,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: String::new(),
            domain: "localhost".to_string(),
            port: 10023,
            proxy: 10024,
            publisher_id: "aegis".to_string(),
            version: "0.0.1".to_string(),
            tls: false,
            allow_all_origins: false,
            allowed_origins: Vec::new(),
            keep_alive: false,
            keep_up_to_date: false,
            proto_path: String::new(),
        }
    }
}

/// Mutable identity of one service instance. Owned by exactly one
/// [`crate::application::runtime::ServiceRuntime`]; never shared.
///
/// `domain` combined with `port` uniquely addresses the instance on the
/// mesh. Trust material and policy clients are indexed by the same pair, so
/// both must stay stable for the process lifetime.
#[derive(Debug, Clone)]
pub struct ServiceIdentity {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub port: u16,
    pub proxy: u16,
    pub protocol: String,
    pub publisher_id: String,
    pub version: String,
    pub tls: bool,
    pub allow_all_origins: bool,
    pub allowed_origins: Vec<String>,
    pub keep_alive: bool,
    pub keep_up_to_date: bool,
    pub state: ServiceState,
    pub last_error: String,
    /// OS pid while running.
    pub process: Option<u32>,
    pub proxy_process: Option<u32>,
    pub executable_path: String,
    pub proto_path: String,
    pub config_path: String,
    // TLS material paths, filled by the trust bootstrap.
    pub cert_authority_trust: String,
    pub cert_file: String,
    pub key_file: String,
}

impl ServiceIdentity {
    pub fn from_options(opts: &ServiceOptions) -> Self {
        let executable_path = std::env::current_exe()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        Self {
            id: opts.id.clone(),
            name: opts.name.clone(),
            domain: opts.domain.clone(),
            port: opts.port,
            proxy: opts.proxy,
            protocol: "grpc".to_string(),
            publisher_id: opts.publisher_id.clone(),
            version: opts.version.clone(),
            tls: opts.tls,
            allow_all_origins: opts.allow_all_origins,
            allowed_origins: opts.allowed_origins.clone(),
            keep_alive: opts.keep_alive,
            keep_up_to_date: opts.keep_up_to_date,
            state: ServiceState::Stopped,
            last_error: String::new(),
            process: None,
            proxy_process: None,
            executable_path,
            proto_path: opts.proto_path.clone(),
            config_path: String::new(),
            cert_authority_trust: String::new(),
            cert_file: String::new(),
            key_file: String::new(),
        }
    }

    /// `domain:port` address of the instance.
    pub fn grpc_address(&self) -> String {
        format!("{}:{}", self.domain, self.port)
    }

    /// Overlay a persisted document onto this identity. Persisted values
    /// win over constructor defaults; runtime-only fields (state, pid) are
    /// not taken from the document.
    pub fn merge_document(&mut self, doc: &ConfigDocument) {
        self.id = doc.id.clone();
        self.name = doc.name.clone();
        self.domain = doc.domain.clone();
        self.port = doc.port;
        self.proxy = doc.proxy;
        self.protocol = doc.protocol.clone();
        self.publisher_id = doc.publisher_id.clone();
        self.version = doc.version.clone();
        self.tls = doc.tls;
        self.allow_all_origins = doc.allow_all_origins;
        self.allowed_origins = doc.allowed_origins.clone();
        self.keep_alive = doc.keep_alive;
        self.keep_up_to_date = doc.keep_up_to_date;
        if !doc.proto.is_empty() {
            self.proto_path = doc.proto.clone();
        }
        if !doc.config_path.is_empty() {
            self.config_path = doc.config_path.clone();
        }
        self.cert_authority_trust = doc.cert_authority_trust.clone();
        self.cert_file = doc.cert_file.clone();
        self.key_file = doc.key_file.clone();
    }

    /// Snapshot the identity into its persistence form.
    pub fn to_document(&self) -> ConfigDocument {
        ConfigDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            domain: self.domain.clone(),
            address: self.grpc_address(),
            port: self.port,
            proxy: self.proxy,
            protocol: self.protocol.clone(),
            publisher_id: self.publisher_id.clone(),
            version: self.version.clone(),
            tls: self.tls,
            allow_all_origins: self.allow_all_origins,
            allowed_origins: self.allowed_origins.clone(),
            keep_alive: self.keep_alive,
            keep_up_to_date: self.keep_up_to_date,
            process: self.process.map(i64::from).unwrap_or(-1),
            proxy_process: self.proxy_process.map(i64::from).unwrap_or(-1),
            state: self.state.to_string(),
            last_error: self.last_error.clone(),
            path: self.executable_path.clone(),
            proto: self.proto_path.clone(),
            config_path: self.config_path.clone(),
            mod_time: chrono::Utc::now().timestamp(),
            cert_authority_trust: self.cert_authority_trust.clone(),
            cert_file: self.cert_file.clone(),
            key_file: self.key_file.clone(),
        }
    }
}
