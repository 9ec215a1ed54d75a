// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service runtime lifecycle with every mesh authority unreachable: the
//! instance runs on constructor defaults, persists locally, serves, and
//! persists again on stop.

use std::sync::Arc;

use aegis_mesh::application::{RuntimeSettings, ServiceRuntime};
use aegis_mesh::domain::{ConfigDocument, ServiceOptions, ServiceState};
use aegis_mesh::infrastructure::{ClientRegistry, ConfigResolver};
use aegis_mesh_proto::echo::v1::echo_service_server::{EchoService, EchoServiceServer};
use aegis_mesh_proto::echo::v1::{EchoRequest, EchoResponse};
use tonic::{Request, Response, Status};

struct Echo;

#[tonic::async_trait]
impl EchoService for Echo {
    async fn echo(&self, request: Request<EchoRequest>) -> Result<Response<EchoResponse>, Status> {
        Ok(Response::new(EchoResponse {
            message: request.into_inner().message,
        }))
    }
}

fn test_settings(fallback: std::path::PathBuf, trust_root: std::path::PathBuf) -> RuntimeSettings {
    RuntimeSettings {
        authority: "127.0.0.1:1".to_string(),
        local_domain: "a.example".to_string(),
        control_port: 1,
        trust_root,
        local_fallback: Some(fallback),
        allow_unauthenticated: Vec::new(),
    }
}

fn echo_options() -> ServiceOptions {
    ServiceOptions {
        id: "echo-1".to_string(),
        name: "echo.EchoService".to_string(),
        domain: "a.example".to_string(),
        // ephemeral port so tests never collide
        port: 0,
        tls: false,
        ..ServiceOptions::default()
    }
}

async fn bootstrap(dir: &std::path::Path) -> ServiceRuntime {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("aegis_mesh=debug")
        .with_test_writer()
        .try_init();
    let resolver = Arc::new(
        ConfigResolver::new(Arc::new(ClientRegistry::new())).with_control_port(1),
    );
    ServiceRuntime::bootstrap(
        echo_options(),
        test_settings(dir.join("echo.json"), dir.join("tls")),
        resolver,
        Arc::new(ClientRegistry::new()),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_unconfigured_instance_starts_from_defaults_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = bootstrap(dir.path()).await;

    let identity = runtime.identity();
    assert_eq!(identity.state, ServiceState::Running);
    assert_eq!(identity.process, Some(std::process::id()));
    assert_eq!(identity.name, "echo.EchoService");

    let persisted = std::fs::read_to_string(dir.path().join("echo.json")).unwrap();
    let document = ConfigDocument::from_json("echo-1", &persisted).unwrap();
    assert_eq!(document.state, "running");
    assert_eq!(document.id, "echo-1");
    assert_eq!(i64::from(std::process::id()), document.process);
}

#[tokio::test]
async fn test_second_bootstrap_resolves_the_persisted_identity() {
    let dir = tempfile::tempdir().unwrap();
    let first = bootstrap(dir.path()).await;
    drop(first);

    // edit the persisted document the way an operator would
    let path = dir.path().join("echo.json");
    let mut document =
        ConfigDocument::from_json("echo-1", &std::fs::read_to_string(&path).unwrap()).unwrap();
    document.version = "9.9.9".to_string();
    document.keep_alive = true;
    std::fs::write(&path, document.to_json().unwrap()).unwrap();

    let second = bootstrap(dir.path()).await;
    // the persisted document won over constructor defaults
    assert_eq!(second.identity().version, "9.9.9");
    assert!(second.identity().keep_alive);
    assert_eq!(second.identity().id, "echo-1");
}

#[tokio::test]
async fn test_stop_releases_serve_and_persists_stopped_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut runtime = bootstrap(dir.path()).await;
    let handle = runtime.shutdown_handle();

    let task = tokio::spawn(async move {
        let result = runtime.serve(EchoServiceServer::new(Echo)).await;
        (runtime, result)
    });

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    handle.stop();
    let (runtime, result) = task.await.unwrap();
    result.unwrap();

    assert_eq!(runtime.identity().state, ServiceState::Stopped);
    assert_eq!(runtime.identity().process, None);

    let persisted = std::fs::read_to_string(dir.path().join("echo.json")).unwrap();
    let document = ConfigDocument::from_json("echo-1", &persisted).unwrap();
    assert_eq!(document.state, "stopped");
    assert_eq!(document.process, -1);
}
