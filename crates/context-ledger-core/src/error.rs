//! Error taxonomy for the ingestion, ledger and retrieval pipeline.
//!
//! | Error | Severity | Effect |
//! |-------|----------|--------|
//! | [`DigestError`] | fatal per document | document marked `error` |
//! | [`BridgeError`] | recoverable | keyword fallback / placeholder description |
//! | [`ChainIntegrityViolation`] | reported | `blockchain_status = TAMPERED` |
//! | [`MiningBudgetExceeded`] | soft | block still appended, logged as a warning |

use thiserror::Error;

/// Content could not be read for hashing.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("content unreadable: {0}")]
    Unreadable(#[from] std::io::Error),
}

/// The embedding/description/generation backend could not serve a call.
///
/// Every variant means "unavailable" for fallback purposes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("bridge unavailable: {0}")]
    Unavailable(String),

    #[error("bridge call timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl BridgeError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        BridgeError::Unavailable(msg.into())
    }
}

/// A chain audit found a block that does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("block {index} invalid: {kind}")]
pub struct ChainIntegrityViolation {
    /// Index of the first offending block, as stored on the block.
    pub index: u64,
    pub kind: ViolationKind,
}

/// What broke in a [`ChainIntegrityViolation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationKind {
    #[error("hash mismatch (stored {stored}, computed {computed})")]
    HashMismatch { stored: String, computed: String },

    #[error("previousHash link broken (expected {expected}, found {found})")]
    LinkBroken { expected: String, found: String },

    #[error("chain does not start with the genesis block")]
    MissingGenesis,

    #[error("out of sequence at position {position}")]
    OutOfSequence { position: u64 },
}

impl ViolationKind {
    /// Short name for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::HashMismatch { .. } => "hash_mismatch",
            ViolationKind::LinkBroken { .. } => "link_broken",
            ViolationKind::MissingGenesis => "missing_genesis",
            ViolationKind::OutOfSequence { .. } => "out_of_sequence",
        }
    }
}

/// Proof-of-work hit its attempt cap. The block is still appended with
/// the last computed hash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mining budget exceeded for block {index} after {attempts} attempts")]
pub struct MiningBudgetExceeded {
    pub index: u64,
    pub attempts: u64,
}
