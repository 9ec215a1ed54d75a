// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain types for the mesh substrate: service identity, configuration
//! documents, trust material, call authorization context, and the error
//! taxonomy shared by every layer.

pub mod authorization;
pub mod config;
pub mod error;
pub mod identity;
pub mod trust;

pub use authorization::{parse_authority, CallContext};
pub use config::ConfigDocument;
pub use error::MeshError;
pub use identity::{ServiceIdentity, ServiceOptions, ServiceState};
pub use trust::{TrustMaterial, TrustStore};
