use std::io;

use thiserror::Error;

/// Errors raised while building, querying or persisting indexes.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("points and ranges need at least one coordinate")]
    EmptyPoint,

    #[error("point {id} has a non-finite coordinate in dimension {dim}")]
    NonFiniteCoordinate { id: u64, dim: usize },

    #[error("invalid fanout {0}, must be at least 2")]
    InvalidFanout(usize),

    #[error("invalid selectivity {0}, must be in (0, 1]")]
    InvalidSelectivity(f64),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decoding error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, IndexError>;
