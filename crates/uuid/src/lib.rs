//! Patient identifiers and sharded-path utilities.
//!
//! Vigil stores each patient record under a sharded directory derived from its identifier.
//!
//! Identifiers use a *canonical* UUID representation: **32 lowercase hexadecimal characters**
//! (no hyphens). This is the value produced by `Uuid::new_v4().simple().to_string()`.
//!
//! This crate provides:
//! - [`ShardableUuid`], a wrapper that guarantees the canonical format once constructed.
//! - The sharding rule that maps an identifier to its directory.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, records live under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `patient_data/patients/55/0e/550e8400e29b41d4a716446655440000/`

mod shardable;

pub use shardable::{ShardableUuid, Uuid};

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;
