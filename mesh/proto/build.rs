// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Point prost at the vendored protoc so the build does not depend on a
    // system-wide protobuf install.
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(
            &[
                "proto/config.proto",
                "proto/policy.proto",
                "proto/echo.proto",
            ],
            &["proto"],
        )?;

    println!("cargo:rerun-if-changed=proto/config.proto");
    println!("cargo:rerun-if-changed=proto/policy.proto");
    println!("cargo:rerun-if-changed=proto/echo.proto");

    Ok(())
}
