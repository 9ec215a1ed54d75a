// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Presentation layer: the authorization middleware composed into the
//! RPC listener at startup.

pub mod interceptor;

pub use interceptor::{AuthorizationLayer, AuthorizationPipeline};
