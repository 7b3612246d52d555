//! SHA-256 content hashing.
//!
//! The digest of a file's exact bytes is what the ledger registers and
//! what later verification compares against.

use sha2::{Digest, Sha256};
use std::io::Read;

use crate::error::DigestError;

/// Lowercase hex SHA-256 of `bytes`. The empty slice is valid input.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hash everything readable from `reader`.
///
/// Returns the digest together with the bytes read, so callers can index
/// the same content they registered.
pub fn digest_reader<R: Read>(mut reader: R) -> Result<(String, Vec<u8>), DigestError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok((digest(&bytes), bytes))
}
