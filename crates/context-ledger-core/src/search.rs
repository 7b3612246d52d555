//! Hybrid retrieval over [`VectorNode`]s.
//!
//! The scoring strategy is picked per call:
//!
//! - **Semantic** — the bridge reports itself available *and* the query
//!   embeds successfully. Nodes are scored by cosine similarity; nodes
//!   without an embedding fall back to keyword overlap. Scores at or below
//!   `semantic_threshold` are dropped as noise.
//! - **Keyword** — otherwise. Nodes are scored by Jaccard similarity of
//!   their term sets; zero-overlap nodes are dropped.
//!
//! Remaining candidates are stable-sorted by score (descending), so ties
//! keep insertion order, and truncated to `top_k`.
//!
//! Apart from the single query-embedding call, retrieval is a pure
//! function of its inputs.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::bridge::EmbeddingBridge;
use crate::embedding::cosine_similarity;
use crate::models::{Document, Modality, VectorNode};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_SEMANTIC_THRESHOLD: f64 = 0.05;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalParams {
    /// Maximum results to return.
    pub top_k: usize,
    /// Semantic-mode noise floor; candidates must score strictly above it.
    pub semantic_threshold: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
        }
    }
}

/// Which similarity the ranking used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    Semantic,
    Keyword,
}

impl std::fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringMode::Semantic => f.write_str("semantic"),
            ScoringMode::Keyword => f.write_str("keyword"),
        }
    }
}

/// A ranked node.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredNode<'a> {
    pub node: &'a VectorNode,
    pub score: f64,
}

/// Output of [`retrieve`].
#[derive(Debug, Clone)]
pub struct Retrieval<'a> {
    pub mode: ScoringMode,
    pub results: Vec<ScoredNode<'a>>,
}

/// Rank `nodes` against `query`, embedding the query when the bridge is
/// available.
pub async fn retrieve<'a>(
    bridge: &dyn EmbeddingBridge,
    query: &str,
    nodes: &'a [VectorNode],
    params: &RetrievalParams,
) -> Retrieval<'a> {
    let query_vec = if bridge.is_available() && !nodes.is_empty() {
        match bridge.embed(query).await {
            Ok(v) if !v.is_empty() => Some(v),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "query embedding failed; falling back to keyword scoring"
                );
                None
            }
        }
    } else {
        None
    };

    let mode = if query_vec.is_some() {
        ScoringMode::Semantic
    } else {
        ScoringMode::Keyword
    };
    let results = rank(query, query_vec.as_deref(), nodes, params);
    tracing::debug!(?mode, candidates = nodes.len(), hits = results.len(), "retrieval");

    Retrieval { mode, results }
}

/// Score, filter, sort and truncate. Semantic when `query_vec` is given.
pub fn rank<'a>(
    query: &str,
    query_vec: Option<&[f32]>,
    nodes: &'a [VectorNode],
    params: &RetrievalParams,
) -> Vec<ScoredNode<'a>> {
    let query_terms = tokenize(query);

    let mut scored: Vec<ScoredNode<'a>> = nodes
        .iter()
        .filter_map(|node| {
            let score = match (query_vec, node.embedding.as_deref()) {
                (Some(qv), Some(nv)) => cosine_similarity(qv, nv) as f64,
                _ => jaccard(&query_terms, &tokenize(&node.text)),
            };
            let keep = match query_vec {
                Some(_) => score > params.semantic_threshold,
                None => score > 0.0,
            };
            keep.then_some(ScoredNode { node, score })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(params.top_k);
    scored
}

/// Lower-cased terms longer than two characters, split on whitespace and
/// punctuation.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Render ranked nodes as a cited context block for the generation gateway.
pub fn build_context(results: &[ScoredNode<'_>]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "--- SOURCE ({}): {} ---\n{}",
                r.node.metadata.modality, r.node.metadata.source_id, r.node.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Rank other image documents by visual-semantic similarity to `source`.
///
/// Uses the first node embedding of each image and returns
/// `(document_id, score_percent)` pairs, best first. Empty when `source`
/// has no embedding.
pub fn similar_images(source: &Document, docs: &[Document]) -> Vec<(String, i64)> {
    let Some(source_vec) = first_embedding(source) else {
        return Vec::new();
    };

    let mut matches: Vec<(String, i64)> = docs
        .iter()
        .filter(|d| d.modality == Modality::Image && d.id != source.id)
        .filter_map(|d| {
            first_embedding(d).map(|v| {
                let score = cosine_similarity(source_vec, v);
                (d.id.clone(), (score * 100.0).round() as i64)
            })
        })
        .collect();
    matches.sort_by(|a, b| b.1.cmp(&a.1));
    matches
}

fn first_embedding(doc: &Document) -> Option<&[f32]> {
    doc.vector_nodes.first()?.embedding.as_deref()
}
