//! Ledger chain persistence as pretty-printed JSON.
//!
//! Blocks serialize with their fields in hash-input order, so a chain read
//! back from disk re-validates to the same digests. A loaded chain is never
//! trusted; callers audit it.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use context_ledger_core::ledger::IntegrityLedger;
use context_ledger_core::models::Block;

use crate::config::Config;

/// Write `blocks` to `path`, creating parent directories.
pub fn save_chain(path: &Path, blocks: &[Block]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create ledger directory: {}", parent.display())
            })?;
        }
    }

    let json = serde_json::to_string_pretty(blocks)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write ledger file: {}", path.display()))?;

    tracing::debug!(path = %path.display(), blocks = blocks.len(), "ledger saved");
    Ok(())
}

/// Read a chain written by [`save_chain`]. A missing file is an empty chain.
pub fn load_chain(path: &Path) -> Result<Vec<Block>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ledger file: {}", path.display()))?;
    let blocks: Vec<Block> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse ledger file: {}", path.display()))?;

    Ok(blocks)
}

/// Restore the ledger from `ledger.path`, or start a fresh chain when
/// unset or missing.
pub fn open_ledger(config: &Config) -> Result<Arc<IntegrityLedger>> {
    let blocks = match &config.ledger.path {
        Some(path) => load_chain(path)?,
        None => Vec::new(),
    };
    if !blocks.is_empty() {
        tracing::debug!(blocks = blocks.len(), "ledger restored");
    }
    Ok(Arc::new(IntegrityLedger::from_blocks(
        config.ledger_params(),
        blocks,
    )))
}

/// Save the chain to `ledger.path`. A no-op when unset.
pub fn persist_ledger(config: &Config, ledger: &IntegrityLedger) -> Result<()> {
    match &config.ledger.path {
        Some(path) => save_chain(path, &ledger.all_blocks()),
        None => Ok(()),
    }
}
