//! `ctxl ledger show` and `ctxl ledger verify`.

use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};

use context_ledger_core::models::Block;

use crate::config::Config;
use crate::persist::open_ledger;

pub fn run_ledger_show(config: &Config) -> Result<()> {
    if config.ledger.path.is_none() {
        bail!("ledger.path is not configured; nothing to show");
    }
    let ledger = open_ledger(config)?;
    for block in ledger.all_blocks() {
        println!("{}", format_block(&block));
    }
    Ok(())
}

/// Audit the persisted chain. Returns `false` when it is tampered.
pub fn run_ledger_verify(config: &Config) -> Result<bool> {
    if config.ledger.path.is_none() {
        bail!("ledger.path is not configured; nothing to verify");
    }
    let ledger = open_ledger(config)?;
    match ledger.audit() {
        Ok(()) => {
            println!("SECURE  {} blocks verified", ledger.len());
            Ok(true)
        }
        Err(violation) => {
            println!("TAMPERED  {}", violation);
            Ok(false)
        }
    }
}

fn format_block(block: &Block) -> String {
    let when = Utc
        .timestamp_millis_opt(block.timestamp)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| block.timestamp.to_string());
    format!(
        "#{:<4} {}  {:<18} {}  subject={}  hash={}  nonce={}",
        block.index,
        when,
        block.action.as_str(),
        block.subject_id,
        short(&block.subject_hash),
        short(&block.current_hash),
        block.nonce
    )
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
