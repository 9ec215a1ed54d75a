// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-call authorization context.
//!
//! Calls carry their caller identity in four metadata keys: `domain`,
//! `token`, `application` and `path`. Keys are matched by prefix on the
//! receiving side, mirroring how the calling side attaches them. The
//! context lives for exactly one call and is never persisted.

/// Metadata keys the mesh attaches to every authorized call.
pub const METADATA_DOMAIN: &str = "domain";
pub const METADATA_TOKEN: &str = "token";
pub const METADATA_APPLICATION: &str = "application";
pub const METADATA_PATH: &str = "path";

/// Transient record describing one inbound call to the pipeline.
/// Empty string means the key was absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    pub method: String,
    pub domain: String,
    pub application: String,
    pub token: String,
    pub path: String,
}

impl CallContext {
    /// Build a context from the call's metadata pairs. Each mesh key picks
    /// the first metadata entry whose name starts with it.
    pub fn from_metadata<'a, I>(method: &str, metadata: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut ctx = Self {
            method: method.to_string(),
            ..Self::default()
        };
        for (name, value) in metadata {
            if ctx.domain.is_empty() && name.starts_with(METADATA_DOMAIN) {
                ctx.domain = value.to_string();
            } else if ctx.token.is_empty() && name.starts_with(METADATA_TOKEN) {
                ctx.token = value.to_string();
            } else if ctx.application.is_empty() && name.starts_with(METADATA_APPLICATION) {
                ctx.application = value.to_string();
            } else if ctx.path.is_empty() && name.starts_with(METADATA_PATH) {
                ctx.path = value.to_string();
            }
        }
        ctx
    }

    /// True when the call carried at least one mesh key. Calls without any
    /// mesh metadata take the bootstrap bypass.
    pub fn has_mesh_metadata(&self) -> bool {
        !(self.domain.is_empty()
            && self.token.is_empty()
            && self.application.is_empty()
            && self.path.is_empty())
    }
}

/// Split an optional `:port` suffix out of a domain value. Falls back to
/// port 80 when the suffix is absent or not a number.
pub fn parse_authority(domain: &str) -> (String, u16) {
    match domain.split_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(80)),
        None => (domain.to_string(), 80),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_authority_with_port() {
        assert_eq!(
            parse_authority("example.com:9090"),
            ("example.com".to_string(), 9090)
        );
    }

    #[test]
    fn test_parse_authority_defaults_to_80() {
        assert_eq!(
            parse_authority("example.com"),
            ("example.com".to_string(), 80)
        );
    }

    #[test]
    fn test_parse_authority_unparsable_port_defaults_to_80() {
        assert_eq!(
            parse_authority("example.com:notanumber"),
            ("example.com".to_string(), 80)
        );
    }

    #[test]
    fn test_extraction_by_prefix_match() {
        let ctx = CallContext::from_metadata(
            "/mesh.echo.v1.EchoService/Echo",
            vec![
                ("te", "trailers"),
                ("domain", "a.example:9090"),
                ("application", "console"),
                ("user-agent", "grpc-rust"),
            ],
        );
        assert_eq!(ctx.domain, "a.example:9090");
        assert_eq!(ctx.application, "console");
        assert!(ctx.token.is_empty());
        assert!(ctx.has_mesh_metadata());
    }

    #[test]
    fn test_transport_headers_do_not_count_as_mesh_metadata() {
        let ctx = CallContext::from_metadata(
            "/mesh.echo.v1.EchoService/Echo",
            vec![("te", "trailers"), ("user-agent", "grpc-rust")],
        );
        assert!(!ctx.has_mesh_metadata());
    }

    #[test]
    fn test_first_matching_entry_wins() {
        let ctx = CallContext::from_metadata(
            "/m",
            vec![("token", "first"), ("token-refresh", "second")],
        );
        assert_eq!(ctx.token, "first");
    }
}
