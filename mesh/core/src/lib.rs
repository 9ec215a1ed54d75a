// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! AEGIS Mesh Core
//!
//! Runtime substrate linked by every service instance on the mesh:
//! trust bootstrap between service domains, configuration resolution with
//! networked/local fallback, and the per-call authorization pipeline.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Implements the inter-service trust & authorization subsystem

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
