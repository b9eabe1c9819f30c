//! # API Shared
//!
//! Shared utilities and definitions for the Vigil APIs.
//!
//! Contains:
//! - Protobuf-generated types (`pb` module), used as gRPC messages and REST JSON bodies
//! - Conversions between `pb` types and `vigil-core` domain types
//! - Shared services like `HealthService`
//! - Caller identity and API-key checks (usable by both gRPC and REST)
//! - Startup configuration read from the environment
//!
//! Used by `api-grpc` and `api-rest` for common functionality.

// The generated code is placed into OUT_DIR at build time by the build script.
pub mod pb {
    tonic::include_proto!("vigil.v1");
}

pub mod auth;
pub mod config;
pub mod convert;
pub mod health;

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("proto_descriptor");

pub use health::HealthService;
pub use pb::*;
