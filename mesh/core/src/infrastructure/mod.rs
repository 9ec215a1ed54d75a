// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure for the mesh substrate: HTTP control-endpoint access,
//! certificate bootstrap, the shared client registry, authority clients,
//! and the configuration resolver.

pub mod certificates;
pub mod config_client;
pub mod control;
pub mod policy_client;
pub mod registry;
pub mod resolver;

pub use certificates::CertificateBootstrap;
pub use config_client::ConfigAuthorityClient;
pub use control::ControlEndpoint;
pub use policy_client::PolicyClient;
pub use registry::ClientRegistry;
pub use resolver::ConfigResolver;
