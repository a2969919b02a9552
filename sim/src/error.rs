//! Error types for the simulation core.
//!
//! Only construction can fail outright. Everything that goes wrong while a
//! frame is running is absorbed at the entity or batch level and surfaces as
//! a log line (see [`BatchError`]).

use bevy_ecs::entity::Entity;
use thiserror::Error;

/// Errors raised while building a [`crate::Simulation`].
#[derive(Error, Debug)]
pub enum SimError {
    /// The configuration was rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A worker pool could not be started.
    #[error("failed to start {name} worker pool: {source}")]
    Pool {
        name: &'static str,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

/// Errors raised while loading or validating a [`crate::SimConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside the range the simulation can work with.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Failure of a single parallel batch.
///
/// A failed batch contributes no mutation for the frame it failed in; the
/// other batches of the same stage are applied normally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    /// The batch closure panicked.
    #[error("batch panicked: {0}")]
    Panicked(String),

    /// Integration produced a NaN or infinite value.
    #[error("non-finite {quantity} for entity {entity}")]
    NonFinite {
        entity: Entity,
        quantity: &'static str,
    },
}
