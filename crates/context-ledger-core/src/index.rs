//! Document indexing: chunking plus embedding into [`VectorNode`]s.
//!
//! | Modality | Nodes |
//! |----------|-------|
//! | text, pdf | one per sentence-aware chunk, `{id}-chunk-{i}` |
//! | image | exactly one caption node, `{id}-desc` |
//! | audio | none (no transcription path) |
//!
//! Bridge failures never abort indexing: chunks keep `embedding = None`
//! and images get a placeholder caption.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::bridge::EmbeddingBridge;
use crate::chunk::{chunk_sentences, DEFAULT_MAX_CHARS};
use crate::models::{Document, Modality, NodeMetadata, VectorNode};

/// Caption used when the bridge cannot describe an image.
pub const IMAGE_PLACEHOLDER: &str = "Image content (analysis failed)";
/// Caption used when the image payload cannot be decoded.
pub const IMAGE_INVALID_SOURCE: &str = "Image content (invalid source)";
/// Prefix of the text stored on an image caption node.
pub const IMAGE_DESCRIPTION_PREFIX: &str = "[Image Description] ";

/// Indexing tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy)]
pub struct IndexParams {
    /// Maximum chunk length in characters; also the offset stride.
    pub max_chars: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

/// Populate `doc.vector_nodes` from its content.
///
/// Chunks are embedded sequentially, so node order always matches chunk
/// order. Status and digest are left to the caller.
pub async fn index_document(
    bridge: &dyn EmbeddingBridge,
    mut doc: Document,
    params: &IndexParams,
) -> Document {
    doc.vector_nodes = match doc.modality {
        Modality::Text | Modality::Pdf => index_text(bridge, &doc, params).await,
        Modality::Image => {
            let (description, node) = index_image(bridge, &doc).await;
            doc.description = Some(description);
            vec![node]
        }
        Modality::Audio => {
            tracing::debug!(doc = %doc.id, "audio has no embedding path; no vector nodes");
            Vec::new()
        }
    };
    doc
}

async fn index_text(
    bridge: &dyn EmbeddingBridge,
    doc: &Document,
    params: &IndexParams,
) -> Vec<VectorNode> {
    let chunks = chunk_sentences(&doc.content, params.max_chars);
    let stride = params.max_chars as i64;
    let mut nodes = Vec::with_capacity(chunks.len());
    let mut failures = 0usize;

    for (i, text) in chunks.into_iter().enumerate() {
        let embedding = embed_or_none(bridge, &text, &mut failures).await;
        nodes.push(VectorNode {
            id: format!("{}-chunk-{}", doc.id, i),
            text,
            embedding,
            metadata: NodeMetadata {
                source_id: doc.id.clone(),
                start: i as i64 * stride,
                end: (i as i64 + 1) * stride,
                modality: doc.modality,
            },
        });
    }

    if failures > 0 {
        tracing::warn!(
            doc = %doc.id,
            failures,
            chunks = nodes.len(),
            "embedding unavailable for some chunks; they remain keyword-searchable"
        );
    }
    nodes
}

async fn index_image(bridge: &dyn EmbeddingBridge, doc: &Document) -> (String, VectorNode) {
    let description = match BASE64.decode(doc.content.as_bytes()) {
        Ok(bytes) if !bytes.is_empty() => match bridge.describe_image(&bytes, &doc.mime).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => IMAGE_PLACEHOLDER.to_string(),
            Err(e) => {
                tracing::warn!(
                    doc = %doc.id,
                    error = %e,
                    "image description failed; using placeholder"
                );
                IMAGE_PLACEHOLDER.to_string()
            }
        },
        _ => IMAGE_INVALID_SOURCE.to_string(),
    };

    let mut failures = 0usize;
    let embedding = embed_or_none(bridge, &description, &mut failures).await;
    let node = VectorNode {
        id: format!("{}-desc", doc.id),
        text: format!("{}{}", IMAGE_DESCRIPTION_PREFIX, description),
        embedding,
        metadata: NodeMetadata {
            source_id: doc.id.clone(),
            start: 0,
            end: 0,
            modality: Modality::Image,
        },
    };
    (description, node)
}

async fn embed_or_none(
    bridge: &dyn EmbeddingBridge,
    text: &str,
    failures: &mut usize,
) -> Option<Vec<f32>> {
    if !bridge.is_available() {
        return None;
    }
    match bridge.embed(text).await {
        Ok(v) if !v.is_empty() => Some(v),
        Ok(_) => {
            *failures += 1;
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "embed failed");
            *failures += 1;
            None
        }
    }
}
