use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A score column cannot be turned into a probability distribution.
    #[error("score column {column} sums to {sum}, expected a strictly positive sum")]
    DegenerateColumn { column: usize, sum: f64 },
    #[error("score file {} is missing or unreadable", path.display())]
    MissingStepData {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("malformed score matrix in {}: {reason}", path.display())]
    MalformedScoreMatrix { path: PathBuf, reason: String },
    #[error("score matrix has {found} columns but the key has {expected} bytes")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("key byte {value:#04x} at position {position} is not one of the {candidates} candidates")]
    InvalidKeyByte {
        position: usize,
        value: u8,
        candidates: usize,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid hexadecimal key")]
    InvalidKey(#[from] hex::FromHexError),
    #[error("key rank estimation failed at step {step} ({location})")]
    Step {
        step: usize,
        location: String,
        #[source]
        source: Box<Error>,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("Failed to save/load key rank results")]
    SaveLoadError(#[from] serde_json::Error),
    #[error(transparent)]
    IoError(#[from] io::Error),
}

impl Error {
    /// Attach the step number and the location of its score data to an error.
    pub fn at_step(self, step: usize, location: impl Into<String>) -> Self {
        match self {
            // Already located, keep the innermost context.
            Error::Step { .. } => self,
            source => Error::Step {
                step,
                location: location.into(),
                source: Box::new(source),
            },
        }
    }
}
