// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Trust bootstrap against a mock control endpoint.

use aegis_mesh::domain::{parse_authority, TrustStore};
use aegis_mesh::infrastructure::certificates::ServerMaterial;
use aegis_mesh::infrastructure::CertificateBootstrap;
use aegis_mesh::MeshError;

const CA_PEM: &str = "-----BEGIN CERTIFICATE-----\nMOCKCA\n-----END CERTIFICATE-----\n";
const SIGNED_PEM: &str = "-----BEGIN CERTIFICATE-----\nMOCKSIGNED\n-----END CERTIFICATE-----\n";

fn server_material() -> ServerMaterial {
    ServerMaterial {
        ca_cert: "/tls/a.example/ca.crt".to_string(),
        cert: "/tls/a.example/server.crt".to_string(),
        key: "/tls/a.example/server.key".to_string(),
    }
}

#[tokio::test]
async fn test_same_domain_trust_never_touches_the_network() {
    let dir = tempfile::tempdir().unwrap();
    let bootstrap = CertificateBootstrap::new(TrustStore::new(dir.path()));

    // port 1 is dead; success proves no round trip happened
    let material = bootstrap
        .establish_trust("a.example", "a.example", 1, &server_material())
        .await
        .unwrap();

    assert_eq!(material.client_cert.to_str().unwrap(), "/tls/a.example/client.crt");
    assert_eq!(material.client_key.to_str().unwrap(), "/tls/a.example/client.key");
    assert_eq!(material.ca_cert.to_str().unwrap(), "/tls/a.example/ca.crt");
}

#[tokio::test]
async fn test_cross_domain_bootstrap_produces_all_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::new(dir.path());

    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/get_ca_certificate")
        .with_body(CA_PEM)
        .create_async()
        .await;
    server
        .mock("GET", "/sign_ca_certificate")
        .match_query(mockito::Matcher::Any)
        .with_body(SIGNED_PEM)
        .create_async()
        .await;
    let (remote, control_port) = parse_authority(&server.host_with_port());

    let bootstrap = CertificateBootstrap::new(store.clone());
    let material = bootstrap
        .establish_trust("a.example", &remote, control_port, &server_material())
        .await
        .unwrap();

    assert!(material.is_complete());
    assert_eq!(std::fs::read_to_string(&material.ca_cert).unwrap(), CA_PEM);
    assert_eq!(
        std::fs::read_to_string(&material.client_cert).unwrap(),
        SIGNED_PEM
    );
    let csr = std::fs::read_to_string(&material.client_csr).unwrap();
    assert!(csr.contains("CERTIFICATE REQUEST"));
    let key = std::fs::read_to_string(&material.client_key).unwrap();
    assert!(key.contains("PRIVATE KEY"));
    assert_eq!(
        std::fs::read_to_string(&material.client_pem).unwrap(),
        key
    );
}

#[tokio::test]
async fn test_bootstrap_is_idempotent_per_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::new(dir.path());

    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/get_ca_certificate")
        .with_body(CA_PEM)
        .create_async()
        .await;
    let sign = server
        .mock("GET", "/sign_ca_certificate")
        .match_query(mockito::Matcher::Any)
        .with_body(SIGNED_PEM)
        .expect(2)
        .create_async()
        .await;
    let (remote, control_port) = parse_authority(&server.host_with_port());

    let bootstrap = CertificateBootstrap::new(store.clone());
    let material = bootstrap
        .establish_trust("a.example", &remote, control_port, &server_material())
        .await
        .unwrap();
    let key_before = std::fs::read_to_string(&material.client_key).unwrap();

    // losing only the signed certificate re-runs only the signing step
    std::fs::remove_file(&material.client_cert).unwrap();
    let material = bootstrap
        .establish_trust("a.example", &remote, control_port, &server_material())
        .await
        .unwrap();

    sign.assert_async().await;
    assert_eq!(
        std::fs::read_to_string(&material.client_key).unwrap(),
        key_before
    );
    assert!(material.client_cert.exists());
}

#[tokio::test]
async fn test_failed_ca_fetch_stops_before_key_generation() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::new(dir.path());

    // no /get_ca_certificate mock: the control endpoint answers 501
    let mut server = mockito::Server::new_async().await;
    let (remote, control_port) = parse_authority(&server.host_with_port());

    let bootstrap = CertificateBootstrap::new(store.clone());
    let err = bootstrap
        .establish_trust("a.example", &remote, control_port, &server_material())
        .await
        .unwrap_err();

    assert!(matches!(err, MeshError::Transport(_)));
    let material = store.material(&remote, "1111");
    assert!(!material.client_key.exists());
    assert!(!material.client_csr.exists());
}

#[tokio::test]
async fn test_empty_ca_body_is_a_toolchain_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::new(dir.path());

    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/get_ca_certificate")
        .with_body("")
        .create_async()
        .await;
    let (remote, control_port) = parse_authority(&server.host_with_port());

    let bootstrap = CertificateBootstrap::new(store.clone());
    let err = bootstrap
        .establish_trust("a.example", &remote, control_port, &server_material())
        .await
        .unwrap_err();

    assert!(matches!(err, MeshError::CertificateToolchain { .. }));
    assert!(!store.material(&remote, "1111").client_key.exists());
}
