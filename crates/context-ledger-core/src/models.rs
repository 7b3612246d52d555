//! Core data models used throughout Context Ledger.
//!
//! These types represent the ledger blocks, documents and retrievable
//! vector nodes that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The event a ledger [`Block`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockAction {
    Registration,
    Verification,
    ModificationCheck,
}

impl BlockAction {
    /// Canonical name, used both in the block hash input and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockAction::Registration => "REGISTRATION",
            BlockAction::Verification => "VERIFICATION",
            BlockAction::ModificationCheck => "MODIFICATION_CHECK",
        }
    }
}

impl fmt::Display for BlockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the integrity ledger.
///
/// Field order matches the block hash input order
/// (`index, previous_hash, timestamp, subject_hash+subject_id+action, nonce`)
/// so a serialized chain re-validates to the same digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
    /// Hex content digest of the referenced file, `"0"` for genesis.
    pub subject_hash: String,
    /// Logical identifier of the referenced document.
    pub subject_id: String,
    pub action: BlockAction,
    pub nonce: u64,
    pub current_hash: String,
    /// Set once mined and appended. Never trusted on its own; validity is
    /// always re-derived by a chain audit.
    pub verified: bool,
}

/// Content modality of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Audio,
    Pdf,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Audio => "audio",
            Modality::Pdf => "pdf",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance metadata attached to a [`VectorNode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Parent document id.
    pub source_id: String,
    /// Approximate start offset (`chunk_index * max_chars`).
    pub start: i64,
    /// Approximate end offset (`(chunk_index + 1) * max_chars`).
    pub end: i64,
    pub modality: Modality,
}

/// One retrievable unit of document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorNode {
    /// `{document_id}-chunk-{i}` or `{document_id}-desc` for image captions.
    pub id: String,
    pub text: String,
    /// Present only when the embedding bridge produced a vector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub metadata: NodeMetadata,
}

/// Ingestion state of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Indexing,
    Ready,
    Error,
}

/// An ingested file and its retrievable content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub mime: String,
    pub size: u64,
    pub modality: Modality,
    /// Raw text for text/pdf, base64 payload for image/audio.
    pub content: String,
    /// Hex SHA-256 of the original bytes. `None` until hashed.
    pub digest: Option<String>,
    pub vector_nodes: Vec<VectorNode>,
    pub status: DocumentStatus,
    /// Index of the REGISTRATION block linking this document to the ledger.
    pub block_index: Option<u64>,
    /// Generated caption for image documents.
    pub description: Option<String>,
    /// Failure reason when `status == Error`.
    pub error: Option<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl Document {
    /// Create the placeholder inserted when ingestion starts: no digest,
    /// no content, no vector nodes.
    pub fn placeholder(name: &str, mime: &str, size: u64, modality: Modality) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            mime: mime.to_string(),
            size,
            modality,
            content: String::new(),
            digest: None,
            vector_nodes: Vec::new(),
            status: DocumentStatus::Indexing,
            block_index: None,
            description: None,
            error: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == DocumentStatus::Ready
    }
}
