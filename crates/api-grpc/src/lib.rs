//! # API gRPC
//!
//! gRPC server implementation for Vigil.
//!
//! Handles:
//! - gRPC service setup and API-key authentication
//! - Service implementations using `vigil-core` for patients, risk and the follow-up protocol
//! - gRPC-specific concerns (interceptors, status codes, tonic integration)
//!
//! Uses `api-shared` for common types and utilities.

#![warn(rust_2018_idioms)]

pub use service::{auth_interceptor, pb, ApiKeyInterceptor, VigilService, API_KEY_HEADER};

pub mod service;
