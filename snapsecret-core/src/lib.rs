//! Burn-after-reading lifecycle engine for SnapSecret.
//!
//! [`SnapSecretEngine`] composes any [`SecretsStore`] into the read-then-destroy
//! protocol; [`MemoryStore`] is the in-process backend used for development
//! and tests.

pub mod engine;
pub mod memory;

pub use engine::{DEFAULT_OPERATION_TIMEOUT, EngineConfig, SnapSecretEngine};
pub use memory::{MemoryStore, SWEEP_EVERY_PUTS};
pub use snapsecret_spec::{
    DeleteOutcome, ErrorKind, ErrorResponse, Result, Secret, SecretId, SecretsStore,
    SnapSecretError,
};
