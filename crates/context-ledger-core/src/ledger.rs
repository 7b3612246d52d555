//! Append-only, proof-of-work-linked integrity ledger.
//!
//! Every ingestion and verification event is recorded as a [`Block`] whose
//! hash covers its own fields and its predecessor's hash. Changing any
//! stored field of any non-genesis block breaks [`IntegrityLedger::audit`].
//!
//! # Hashing
//!
//! ```text
//! current_hash = SHA256( index ‖ previous_hash ‖ timestamp ‖ subject_hash ‖ subject_id ‖ action ‖ nonce )
//! ```
//!
//! Numbers are rendered in decimal and concatenated as text.
//!
//! # Mining
//!
//! Nonces are tried from `0` until the hex hash starts with `difficulty`
//! `'0'` characters, or until `max_attempts` hashes have been computed.
//! On exhaustion the block is appended anyway with the last hash and a
//! warning is logged ([`MiningBudgetExceeded`]).
//!
//! # Concurrency
//!
//! The chain lock is held across read-tail → mine → append, so concurrent
//! callers of [`IntegrityLedger::add_block`] can never link two blocks to
//! the same predecessor.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::digest::digest;
use crate::error::{ChainIntegrityViolation, MiningBudgetExceeded, ViolationKind};
use crate::models::{Block, BlockAction};

/// Sentinel hash of the genesis block.
pub const GENESIS_HASH: &str = "0000GENESIS_HASH_START_OF_CHAIN";
/// Subject id recorded on the genesis block.
pub const GENESIS_SUBJECT_ID: &str = "GENESIS_BLOCK";

pub const DEFAULT_DIFFICULTY: usize = 2;
pub const DEFAULT_MAX_ATTEMPTS: u64 = 1_000_000;

/// Proof-of-work tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerParams {
    /// Number of leading `'0'` hex characters required.
    pub difficulty: usize,
    /// Maximum number of hashes computed per block.
    pub max_attempts: u64,
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// How mining ended for an appended block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningOutcome {
    Solved { attempts: u64 },
    BudgetExceeded(MiningBudgetExceeded),
}

/// The single-writer hash chain.
pub struct IntegrityLedger {
    params: LedgerParams,
    chain: Mutex<Vec<Block>>,
}

impl IntegrityLedger {
    /// Create a ledger holding only the genesis block.
    pub fn new(params: LedgerParams) -> Self {
        Self {
            params,
            chain: Mutex::new(vec![genesis_block(chrono::Utc::now().timestamp_millis())]),
        }
    }

    /// Restore a previously persisted chain.
    ///
    /// The blocks are taken as-is; whether they still hold is decided by
    /// [`audit`](Self::audit). An empty vector yields a fresh genesis.
    pub fn from_blocks(params: LedgerParams, blocks: Vec<Block>) -> Self {
        if blocks.is_empty() {
            return Self::new(params);
        }
        Self {
            params,
            chain: Mutex::new(blocks),
        }
    }

    /// Mine and append a block for `subject_hash`/`subject_id`.
    pub fn add_block(&self, subject_hash: &str, subject_id: &str, action: BlockAction) -> Block {
        self.append(subject_hash, subject_id, action).0
    }

    /// Like [`add_block`](Self::add_block), also reporting how mining ended.
    pub fn append(
        &self,
        subject_hash: &str,
        subject_id: &str,
        action: BlockAction,
    ) -> (Block, MiningOutcome) {
        let mut chain = self.lock();
        let (next_index, previous_hash) = match chain.last() {
            Some(tail) => (tail.index + 1, tail.current_hash.clone()),
            None => (0, "0".to_string()),
        };
        let timestamp = chrono::Utc::now().timestamp_millis();
        let data = block_data(subject_hash, subject_id, action);

        let (nonce, current_hash, outcome) =
            self.mine(next_index, &previous_hash, timestamp, &data);

        match &outcome {
            MiningOutcome::Solved { attempts } => tracing::debug!(
                index = next_index,
                nonce,
                attempts,
                "block mined"
            ),
            MiningOutcome::BudgetExceeded(exceeded) => tracing::warn!(
                index = next_index,
                attempts = exceeded.attempts,
                difficulty = self.params.difficulty,
                "{}; appending best-effort hash",
                exceeded
            ),
        }

        let block = Block {
            index: next_index,
            previous_hash,
            timestamp,
            subject_hash: subject_hash.to_string(),
            subject_id: subject_id.to_string(),
            action,
            nonce,
            current_hash,
            verified: true,
        };
        chain.push(block.clone());
        (block, outcome)
    }

    /// Search nonces `0..max_attempts` for a hash meeting the difficulty.
    fn mine(
        &self,
        index: u64,
        previous_hash: &str,
        timestamp: i64,
        data: &str,
    ) -> (u64, String, MiningOutcome) {
        let max_attempts = self.params.max_attempts.max(1);
        let mut nonce = 0u64;
        let mut hash = calculate_block_hash(index, previous_hash, timestamp, data, nonce);
        loop {
            if meets_difficulty(&hash, self.params.difficulty) {
                return (nonce, hash, MiningOutcome::Solved { attempts: nonce + 1 });
            }
            if nonce + 1 >= max_attempts {
                let exceeded = MiningBudgetExceeded {
                    index,
                    attempts: max_attempts,
                };
                return (nonce, hash, MiningOutcome::BudgetExceeded(exceeded));
            }
            nonce += 1;
            hash = calculate_block_hash(index, previous_hash, timestamp, data, nonce);
        }
    }

    /// `true` when every block's hash and link hold. The first violation
    /// is logged.
    pub fn is_chain_valid(&self) -> bool {
        match self.audit() {
            Ok(()) => true,
            Err(violation) => {
                tracing::error!(
                    index = violation.index,
                    kind = violation.kind.as_str(),
                    "{}",
                    violation
                );
                false
            }
        }
    }

    /// Recompute every non-genesis block against a snapshot of the chain.
    ///
    /// Appends that land while the audit runs are not part of it.
    pub fn audit(&self) -> Result<(), ChainIntegrityViolation> {
        let snapshot = self.all_blocks();
        audit_chain(&snapshot)
    }

    pub fn latest_block(&self) -> Block {
        let chain = self.lock();
        match chain.last() {
            Some(block) => block.clone(),
            None => genesis_block(0),
        }
    }

    /// Read-only snapshot of the whole chain.
    pub fn all_blocks(&self) -> Vec<Block> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Block>> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for IntegrityLedger {
    fn default() -> Self {
        Self::new(LedgerParams::default())
    }
}

/// Validate an ordered chain.
///
/// Block 0 must be the genesis sentinel; it is checked by its fixed
/// fields, not recomputed. Every later block must sit at the position its
/// index names, hash to its stored `current_hash` and link to its
/// predecessor.
pub fn audit_chain(blocks: &[Block]) -> Result<(), ChainIntegrityViolation> {
    let Some(first) = blocks.first() else {
        return Ok(());
    };
    if !is_genesis(first) {
        return Err(ChainIntegrityViolation {
            index: first.index,
            kind: ViolationKind::MissingGenesis,
        });
    }

    for (position, pair) in blocks.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let position = position as u64 + 1;

        if current.index != position {
            return Err(ChainIntegrityViolation {
                index: current.index,
                kind: ViolationKind::OutOfSequence { position },
            });
        }

        let computed = calculate_block_hash(
            current.index,
            &current.previous_hash,
            current.timestamp,
            &block_data(&current.subject_hash, &current.subject_id, current.action),
            current.nonce,
        );
        if computed != current.current_hash {
            return Err(ChainIntegrityViolation {
                index: current.index,
                kind: ViolationKind::HashMismatch {
                    stored: current.current_hash.clone(),
                    computed,
                },
            });
        }

        if current.previous_hash != previous.current_hash {
            return Err(ChainIntegrityViolation {
                index: current.index,
                kind: ViolationKind::LinkBroken {
                    expected: previous.current_hash.clone(),
                    found: current.previous_hash.clone(),
                },
            });
        }
    }
    Ok(())
}

fn is_genesis(block: &Block) -> bool {
    block.index == 0 && block.previous_hash == "0" && block.current_hash == GENESIS_HASH
}

/// The payload part of the hash input.
pub fn block_data(subject_hash: &str, subject_id: &str, action: BlockAction) -> String {
    format!("{}{}{}", subject_hash, subject_id, action.as_str())
}

/// Hex SHA-256 over the concatenated block fields.
pub fn calculate_block_hash(
    index: u64,
    previous_hash: &str,
    timestamp: i64,
    data: &str,
    nonce: u64,
) -> String {
    let input = format!("{}{}{}{}{}", index, previous_hash, timestamp, data, nonce);
    digest(input.as_bytes())
}

fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

fn genesis_block(timestamp: i64) -> Block {
    Block {
        index: 0,
        previous_hash: "0".to_string(),
        timestamp,
        subject_hash: "0".to_string(),
        subject_id: GENESIS_SUBJECT_ID.to_string(),
        action: BlockAction::Registration,
        nonce: 0,
        current_hash: GENESIS_HASH.to_string(),
        verified: true,
    }
}
