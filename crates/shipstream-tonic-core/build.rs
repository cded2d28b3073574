//! Builds the gRPC client and server bindings for the `shipstream` protocol
//! definitions using `tonic-prost-build`.
//!
//! Both proto packages (`shipstream.orders.v1` and `shipstream.catalog.v1`)
//! are compiled in one pass, and a combined file descriptor set is written to
//! `OUT_DIR` so the server can offer gRPC reflection.
//!
//! Generated code is accessed via `tonic::include_proto!` from this crate's
//! `proto` module.

use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("shipstream_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(
            config,
            &["proto/orders.proto", "proto/catalog.proto"],
            &["proto"],
        )
        .unwrap();
}
