//! Core data structures for the Concord signal conflict engine

pub mod bounds;
pub mod signal;
pub mod types;

pub use bounds::{ema, ema_hit, ratio_or, unit_interval};
pub use signal::{distinct_directions, CaseOutcome, ConflictCase, ConflictingSignal};
pub use types::{AgentId, CaseId, Decision, Direction};

/// Core error types
#[derive(thiserror::Error, Debug)]
pub enum ConcordError {
    #[error("Invalid case id: {0}")]
    InvalidCaseId(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConcordError>;
