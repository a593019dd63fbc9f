// src/error.rs
use thiserror::Error;

use crate::formation::ParticleCategory;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("particle count for {category} must be positive, got {count}")]
    InvalidParticleCount {
        category: ParticleCategory,
        count: usize,
    },

    #[error("unknown particle category `{0}`")]
    UnknownCategory(String),

    #[error("particle category {0} is configured more than once")]
    DuplicateCategory(ParticleCategory),

    #[error("object id `{0}` is already registered")]
    DuplicateObject(String),

    #[error("landmark frame needs {expected} points, got {found}")]
    MalformedFrame { expected: usize, found: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("landmark source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to write telemetry: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
