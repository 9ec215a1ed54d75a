// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Generated protobuf contracts for the AEGIS mesh.
//!
//! Three packages are compiled here: the configuration authority
//! (`mesh.config.v1`), the policy authority (`mesh.policy.v1`), and a
//! minimal echo service (`mesh.echo.v1`) used by integration tests.

pub mod config {
    pub mod v1 {
        tonic::include_proto!("mesh.config.v1");
    }
}

pub mod policy {
    pub mod v1 {
        tonic::include_proto!("mesh.policy.v1");
    }
}

pub mod echo {
    pub mod v1 {
        tonic::include_proto!("mesh.echo.v1");
    }
}
