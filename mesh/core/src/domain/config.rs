// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The configuration document persisted for every service instance.
//!
//! The schema is exactly the service identity fields plus the TLS material
//! paths, serialized as one flat record with the wire names the
//! configuration authority stores (`Id`, `Name`, `Domain`, ...). Documents
//! are written whole and read whole; there is no partial update.

use serde::{Deserialize, Serialize};

use crate::domain::error::MeshError;

/// Externally visible configuration of a service instance.
///
/// `Id`, `Name`, `Domain` and `Port` are required: a record missing any of
/// them is rejected at the deserialization boundary rather than propagated
/// as missing-key lookups downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(rename = "Id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Domain")]
    pub domain: String,

    /// `domain:port` address of the instance on the mesh.
    #[serde(rename = "Address", default)]
    pub address: String,

    #[serde(rename = "Port")]
    pub port: u16,

    /// Reverse-proxy port for web-facing transports.
    #[serde(rename = "Proxy", default)]
    pub proxy: u16,

    #[serde(rename = "Protocol", default = "default_protocol")]
    pub protocol: String,

    #[serde(rename = "PublisherId", default)]
    pub publisher_id: String,

    #[serde(rename = "Version", default)]
    pub version: String,

    #[serde(rename = "TLS", default)]
    pub tls: bool,

    #[serde(rename = "AllowAllOrigins", default)]
    pub allow_all_origins: bool,

    #[serde(rename = "AllowedOrigins", default)]
    pub allowed_origins: Vec<String>,

    #[serde(rename = "KeepAlive", default)]
    pub keep_alive: bool,

    #[serde(rename = "KeepUpToDate", default)]
    pub keep_up_to_date: bool,

    /// OS pid of the running instance; -1 when stopped.
    #[serde(rename = "Process", default = "no_process")]
    pub process: i64,

    #[serde(rename = "ProxyProcess", default = "no_process")]
    pub proxy_process: i64,

    #[serde(rename = "State", default)]
    pub state: String,

    #[serde(rename = "LastError", default)]
    pub last_error: String,

    /// Path of the service executable.
    #[serde(rename = "Path", default)]
    pub path: String,

    /// Path of the service .proto contract.
    #[serde(rename = "Proto", default)]
    pub proto: String,

    #[serde(rename = "ConfigPath", default)]
    pub config_path: String,

    /// Seconds since the epoch at the last persist.
    #[serde(rename = "ModTime", default)]
    pub mod_time: i64,

    // TLS material paths.
    #[serde(rename = "CertAuthorityTrust", default)]
    pub cert_authority_trust: String,

    #[serde(rename = "CertFile", default)]
    pub cert_file: String,

    #[serde(rename = "KeyFile", default)]
    pub key_file: String,
}

fn default_protocol() -> String {
    "grpc".to_string()
}

fn no_process() -> i64 {
    -1
}

impl ConfigDocument {
    /// Parse a document from its JSON wire form.
    ///
    /// An empty or malformed payload is treated as "no configuration", not
    /// as a transport defect: sources that cannot produce a valid document
    /// simply do not count as a source.
    pub fn from_json(service_id: &str, raw: &str) -> Result<Self, MeshError> {
        if raw.trim().is_empty() {
            return Err(MeshError::absent(service_id, "empty document"));
        }
        serde_json::from_str(raw)
            .map_err(|e| MeshError::absent(service_id, format!("invalid document: {e}")))
    }

    /// Serialize the whole document for persistence.
    pub fn to_json(&self) -> Result<String, MeshError> {
        serde_json::to_string_pretty(self).map_err(|e| MeshError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfigDocument {
        ConfigDocument {
            id: "echo".into(),
            name: "echo.EchoService".into(),
            domain: "a.example".into(),
            address: "a.example:10001".into(),
            port: 10001,
            proxy: 10002,
            protocol: "grpc".into(),
            publisher_id: "aegis".into(),
            version: "0.0.1".into(),
            tls: false,
            allow_all_origins: true,
            allowed_origins: vec![],
            keep_alive: true,
            keep_up_to_date: false,
            process: 4242,
            proxy_process: -1,
            state: "running".into(),
            last_error: String::new(),
            path: "/opt/aegis/echo".into(),
            proto: "/opt/aegis/echo.proto".into(),
            config_path: "/etc/aegis/echo.json".into(),
            mod_time: 1_700_000_000,
            cert_authority_trust: String::new(),
            cert_file: String::new(),
            key_file: String::new(),
        }
    }

    #[test]
    fn test_round_trip_is_exact() {
        let doc = sample();
        let json = doc.to_json().unwrap();
        let back = ConfigDocument::from_json("echo", &json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn test_wire_names_are_pascal_case() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"Id\""));
        assert!(json.contains("\"TLS\""));
        assert!(json.contains("\"ConfigPath\""));
        assert!(json.contains("\"CertAuthorityTrust\""));
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn test_missing_required_field_fails_fast() {
        let err = ConfigDocument::from_json("echo", r#"{"Id":"echo","Name":"n","Port":1}"#)
            .unwrap_err();
        assert!(matches!(err, MeshError::ConfigurationAbsent { .. }));
    }

    #[test]
    fn test_empty_payload_is_absent() {
        let err = ConfigDocument::from_json("echo", "   ").unwrap_err();
        assert!(matches!(err, MeshError::ConfigurationAbsent { .. }));
    }

    #[test]
    fn test_optional_fields_default() {
        let doc =
            ConfigDocument::from_json("echo", r#"{"Id":"echo","Name":"n","Domain":"d","Port":1}"#)
                .unwrap();
        assert_eq!(doc.protocol, "grpc");
        assert_eq!(doc.process, -1);
        assert!(!doc.tls);
        assert!(doc.allowed_origins.is_empty());
    }
}
