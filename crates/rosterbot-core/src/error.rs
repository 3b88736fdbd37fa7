//! Error types for the promotion and scoring engine

use thiserror::Error;

use crate::chat::ChatError;
use crate::store::StoreError;

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The ladder region held no usable rank row
    #[error("Rank ladder is empty")]
    EmptyLadder,

    /// A ladder points cell that is neither N/A, empty, nor a whole number
    #[error("Invalid point requirement {value:?} for rank {rank}")]
    InvalidRequirement { rank: String, value: String },

    /// One audit record could not be parsed; the rest of the batch continues
    #[error("Record {index} ({record:?}) is malformed: {reason}")]
    MalformedRecord {
        index: usize,
        record: String,
        reason: String,
    },

    /// Rate-limit retries ran out while saving one member's row
    #[error("Gave up saving row for {member} after {attempts} rate-limited attempts")]
    PersistenceExhausted { member: String, attempts: u32 },

    #[error("Rank {0:?} is not on the ladder")]
    UnrecognizedRank(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Chat platform error: {0}")]
    Chat(#[from] ChatError),

    #[error("Configuration error: {0}")]
    Config(String),
}
