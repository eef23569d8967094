//! # sm-config
//!
//! Loading and validation of optimization configurations.
//!
//! Construction is two-phase: a permissive [`RawConfig`] is read from a
//! file or an in-memory value, then a single `validate` pass promotes it
//! into the immutable [`OptimizationConfig`]. A process-wide build-once
//! cache backs the [`init`] entry point; tests use their own
//! [`ConfigCache`] instances.

mod cache;
mod model;

pub use cache::{init, process_cache, reset, ConfigCache};
pub use model::{
    AccountType, Algorithm, ConfigBuilder, OptimizationConfig, RawConfig, RawConstraint,
    RawConstraintDefinition, RawMultiObjective, RawObjective, RawParameter, ServiceEnvironment,
    TransportKind, API_KEY_ENV, DEFAULT_CONFIG_PATH,
};
