//! Ingestion and question answering over an in-memory document index.
//!
//! The [`Orchestrator`] owns the document index and shares the
//! [`IntegrityLedger`] with whoever persists it. Per document, ingestion is
//! strictly sequential (hash, extract, index, register); across documents
//! it runs concurrently, with the ledger serializing its own appends.
//!
//! Failures never escape as errors from [`Orchestrator::ingest`]: the
//! returned document carries `status = Error` and a reason instead.
//! Likewise [`Orchestrator::answer`] always produces user-facing text,
//! falling back to a local extractive answer when the gateway is down.

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinSet;

use context_ledger_core::digest::{digest, digest_reader};
use context_ledger_core::error::DigestError;
use context_ledger_core::index::{index_document, IndexParams};
use context_ledger_core::ledger::{IntegrityLedger, MiningOutcome};
use context_ledger_core::models::{Block, BlockAction, Document, DocumentStatus, Modality, VectorNode};
use context_ledger_core::search::{
    build_context, retrieve, similar_images, RetrievalParams, ScoredNode, ScoringMode,
};

use crate::bridge::{Bridges, EmbeddingBridge, GenerationGateway, GenerationRequest};
use crate::config::Config;
use crate::extract::{detect_modality, extract, guess_mime};
use crate::progress::{CancelFlag, NoProgress, QueryProgressReporter, QueryStage};

/// Answer text when retrieval finds nothing.
pub const NO_RELEVANT_DOCUMENTS: &str =
    "No relevant documents found. Please ingest files related to your query.";
/// Header of answers synthesized locally.
pub const LOCAL_ANALYSIS_HEADER: &str = "[LOCAL ANALYSIS RESULT]";

/// Ledger state reported with every answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockchainStatus {
    Secure,
    Tampered,
}

impl fmt::Display for BlockchainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainStatus::Secure => f.write_str("SECURE"),
            BlockchainStatus::Tampered => f.write_str("TAMPERED"),
        }
    }
}

/// A retrieved node cited by an answer.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub source_id: String,
    pub name: String,
    pub modality: Modality,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Ready documents whose nodes were searched.
    pub files_checked: usize,
    pub blockchain_status: BlockchainStatus,
    pub sources: Vec<Citation>,
    pub mode: ScoringMode,
    /// `true` when the text was produced locally instead of by the gateway.
    pub offline: bool,
}

/// Outcome of re-hashing a document against its registered digest.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub document_id: String,
    pub matches: bool,
    pub registered_digest: String,
    pub current_digest: String,
    /// The VERIFICATION or MODIFICATION_CHECK block just appended.
    pub block: Block,
}

pub struct Orchestrator {
    ledger: Arc<IntegrityLedger>,
    embedding: Arc<dyn EmbeddingBridge>,
    generation: Arc<dyn GenerationGateway>,
    index_params: IndexParams,
    retrieval_params: RetrievalParams,
    /// Documents in ingestion start order.
    documents: RwLock<Vec<Document>>,
}

impl Orchestrator {
    /// Create an orchestrator with default chunking and retrieval params.
    pub fn new(ledger: Arc<IntegrityLedger>, bridges: Bridges) -> Self {
        Self {
            ledger,
            embedding: bridges.embedding,
            generation: bridges.generation,
            index_params: IndexParams::default(),
            retrieval_params: RetrievalParams::default(),
            documents: RwLock::new(Vec::new()),
        }
    }

    pub fn from_config(config: &Config, ledger: Arc<IntegrityLedger>, bridges: Bridges) -> Self {
        Self::new(ledger, bridges)
            .with_index_params(config.index_params())
            .with_retrieval_params(config.retrieval_params())
    }

    pub fn with_index_params(mut self, params: IndexParams) -> Self {
        self.index_params = params;
        self
    }

    pub fn with_retrieval_params(mut self, params: RetrievalParams) -> Self {
        self.retrieval_params = params;
        self
    }

    pub fn ledger(&self) -> &Arc<IntegrityLedger> {
        &self.ledger
    }

    // ============ Ingestion ============

    /// Hash, extract, index and register one file.
    ///
    /// A placeholder is visible in [`documents`](Self::documents) from the
    /// start. The returned document is `Ready` or `Error`.
    pub async fn ingest(&self, bytes: &[u8], name: &str, modality: Modality) -> Document {
        self.ingest_hashed(bytes, digest(bytes), name, modality).await
    }

    /// Read and hash `path` in one pass, then [`ingest`](Self::ingest) it.
    /// The modality comes from the file extension.
    pub async fn ingest_path(&self, path: &Path) -> Document {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let modality = detect_modality(&name);

        let owned = path.to_path_buf();
        let read = tokio::task::spawn_blocking(move || {
            File::open(&owned)
                .map_err(DigestError::from)
                .and_then(digest_reader)
        })
        .await;

        match read {
            Ok(Ok((subject_hash, bytes))) => {
                self.ingest_hashed(&bytes, subject_hash, &name, modality).await
            }
            Ok(Err(e)) => self.reject(&name, modality, &e),
            Err(e) => self.reject(&name, modality, &e),
        }
    }

    /// Ingest many files concurrently. Results keep the order of `paths`.
    pub async fn ingest_paths(self: &Arc<Self>, paths: Vec<PathBuf>) -> Vec<Document> {
        let mut tasks = JoinSet::new();
        for (i, path) in paths.into_iter().enumerate() {
            let this = Arc::clone(self);
            tasks.spawn(async move { (i, this.ingest_path(&path).await) });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!(error = %e, "ingestion task failed"),
            }
        }
        results.sort_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, doc)| doc).collect()
    }

    async fn ingest_hashed(
        &self,
        bytes: &[u8],
        subject_hash: String,
        name: &str,
        modality: Modality,
    ) -> Document {
        let placeholder =
            Document::placeholder(name, guess_mime(name), bytes.len() as u64, modality);
        self.insert(placeholder.clone());

        let doc = self.process(bytes, subject_hash, placeholder).await;
        self.replace(&doc);
        doc
    }

    /// Record a file that could not be read at all.
    fn reject(
        &self,
        name: &str,
        modality: Modality,
        err: &(dyn std::error::Error + 'static),
    ) -> Document {
        let mut doc = Document::placeholder(name, guess_mime(name), 0, modality);
        self.insert(doc.clone());
        fail(&mut doc, err);
        self.replace(&doc);
        doc
    }

    async fn process(&self, bytes: &[u8], subject_hash: String, mut doc: Document) -> Document {
        let content = match extract(bytes, doc.modality) {
            Ok(content) => content,
            Err(e) => {
                fail(&mut doc, &e);
                return doc;
            }
        };
        doc.content = content;
        doc.digest = Some(subject_hash.clone());

        let mut doc = index_document(self.embedding.as_ref(), doc, &self.index_params).await;

        match self
            .append(subject_hash, doc.id.clone(), BlockAction::Registration)
            .await
        {
            Ok(block) => {
                doc.block_index = Some(block.index);
                doc.status = DocumentStatus::Ready;
                tracing::info!(
                    doc = %doc.id,
                    name = %doc.name,
                    modality = %doc.modality,
                    nodes = doc.vector_nodes.len(),
                    block = block.index,
                    nonce = block.nonce,
                    "document registered"
                );
            }
            Err(e) => fail(&mut doc, e.as_ref()),
        }
        doc
    }

    /// Append a block off the async runtime; mining is CPU-bound.
    async fn append(
        &self,
        subject_hash: String,
        subject_id: String,
        action: BlockAction,
    ) -> Result<Block> {
        let ledger = Arc::clone(&self.ledger);
        let (block, outcome) = tokio::task::spawn_blocking(move || {
            ledger.append(&subject_hash, &subject_id, action)
        })
        .await
        .context("ledger append task failed")?;

        if let MiningOutcome::BudgetExceeded(exceeded) = outcome {
            tracing::warn!(block = block.index, "{}", exceeded);
        }
        Ok(block)
    }

    // ============ Index access ============

    pub fn documents(&self) -> Vec<Document> {
        self.read().clone()
    }

    pub fn ready_documents(&self) -> Vec<Document> {
        self.read().iter().filter(|d| d.is_ready()).cloned().collect()
    }

    pub fn get(&self, document_id: &str) -> Option<Document> {
        self.read().iter().find(|d| d.id == document_id).cloned()
    }

    /// Drop a document and its vector nodes from the index. Its ledger
    /// blocks stay.
    pub fn remove(&self, document_id: &str) -> Option<Document> {
        let mut docs = self.write();
        let pos = docs.iter().position(|d| d.id == document_id)?;
        Some(docs.remove(pos))
    }

    /// Rank other ready images by similarity to `document_id`.
    pub fn similar_images(&self, document_id: &str) -> Option<Vec<(String, i64)>> {
        let docs = self.ready_documents();
        let source = docs.iter().find(|d| d.id == document_id)?;
        Some(similar_images(source, &docs))
    }

    fn insert(&self, doc: Document) {
        self.write().push(doc);
    }

    /// Overwrite a document in place; a no-op if it was removed meanwhile.
    fn replace(&self, doc: &Document) {
        let mut docs = self.write();
        if let Some(slot) = docs.iter_mut().find(|d| d.id == doc.id) {
            *slot = doc.clone();
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Document>> {
        self.documents.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Document>> {
        self.documents.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ============ Verification ============

    /// Re-hash `bytes` against the digest registered for `document_id` and
    /// record the check on the ledger.
    pub async fn verify(&self, document_id: &str, bytes: &[u8]) -> Result<VerificationReport> {
        let doc = self
            .get(document_id)
            .ok_or_else(|| anyhow!("Unknown document: {}", document_id))?;
        let Some(registered) = doc.digest else {
            bail!("Document {} has no registered digest", document_id);
        };

        let current = digest(bytes);
        let matches = current == registered;
        let action = if matches {
            BlockAction::Verification
        } else {
            BlockAction::ModificationCheck
        };

        let block = self
            .append(current.clone(), document_id.to_string(), action)
            .await?;

        if matches {
            tracing::info!(doc = %document_id, block = block.index, "content verified");
        } else {
            tracing::warn!(
                doc = %document_id,
                block = block.index,
                registered = %registered,
                current = %current,
                "content modified since registration"
            );
        }

        Ok(VerificationReport {
            document_id: document_id.to_string(),
            matches,
            registered_digest: registered,
            current_digest: current,
            block,
        })
    }

    // ============ Question answering ============

    /// Answer `query` from ready documents.
    pub async fn answer(&self, query: &str) -> Answer {
        match self
            .answer_with_progress(query, &NoProgress, &CancelFlag::new())
            .await
        {
            Some(answer) => answer,
            // Unreachable without a cancel handle; keep a sane answer anyway.
            None => self.empty_answer(0, ScoringMode::Keyword),
        }
    }

    /// Answer `query`, reporting each stage and honoring `cancel` until the
    /// gateway call is dispatched. Returns `None` when cancelled.
    pub async fn answer_with_progress(
        &self,
        query: &str,
        progress: &dyn QueryProgressReporter,
        cancel: &CancelFlag,
    ) -> Option<Answer> {
        let ready = self.ready_documents();
        let files_checked = ready.len();

        if query.trim().is_empty() {
            return Some(self.empty_answer(files_checked, ScoringMode::Keyword));
        }

        if cancel.is_cancelled() {
            return None;
        }
        progress.report(QueryStage::SemanticSearch);
        let nodes: Vec<VectorNode> = ready
            .iter()
            .flat_map(|d| d.vector_nodes.iter().cloned())
            .collect();
        let retrieval = retrieve(
            self.embedding.as_ref(),
            query,
            &nodes,
            &self.retrieval_params,
        )
        .await;

        if cancel.is_cancelled() {
            return None;
        }
        progress.report(QueryStage::LedgerVerify);
        let blockchain_status = self.chain_status();

        if cancel.is_cancelled() {
            return None;
        }
        progress.report(QueryStage::Synthesizing);
        let sources = citations(&retrieval.results, &ready);

        if retrieval.results.is_empty() {
            return Some(Answer {
                text: NO_RELEVANT_DOCUMENTS.to_string(),
                files_checked,
                blockchain_status,
                sources,
                mode: retrieval.mode,
                offline: true,
            });
        }

        let request = GenerationRequest {
            system_context: build_context(&retrieval.results),
            query: query.to_string(),
        };
        if cancel.is_cancelled() {
            return None;
        }
        let (text, offline) = match self.generation.generate(&request).await {
            Ok(text) if !text.trim().is_empty() => (text, false),
            Ok(_) => {
                tracing::warn!("generation gateway returned empty text; answering locally");
                (local_answer(&retrieval.results, &sources), true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation gateway unavailable; answering locally");
                (local_answer(&retrieval.results, &sources), true)
            }
        };

        Some(Answer {
            text,
            files_checked,
            blockchain_status,
            sources,
            mode: retrieval.mode,
            offline,
        })
    }

    /// `Secure` when every block re-validates.
    pub fn chain_status(&self) -> BlockchainStatus {
        if self.ledger.is_chain_valid() {
            BlockchainStatus::Secure
        } else {
            BlockchainStatus::Tampered
        }
    }

    fn empty_answer(&self, files_checked: usize, mode: ScoringMode) -> Answer {
        Answer {
            text: NO_RELEVANT_DOCUMENTS.to_string(),
            files_checked,
            blockchain_status: self.chain_status(),
            sources: Vec::new(),
            mode,
            offline: true,
        }
    }
}

fn fail(doc: &mut Document, err: &(dyn std::error::Error + 'static)) {
    tracing::error!(doc = %doc.id, name = %doc.name, error = %err, "ingestion failed");
    doc.status = DocumentStatus::Error;
    doc.error = Some(err.to_string());
    doc.vector_nodes.clear();
}

fn citations(results: &[ScoredNode<'_>], docs: &[Document]) -> Vec<Citation> {
    results
        .iter()
        .map(|r| {
            let source_id = &r.node.metadata.source_id;
            let name = docs
                .iter()
                .find(|d| &d.id == source_id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| source_id.clone());
            Citation {
                source_id: source_id.clone(),
                name,
                modality: r.node.metadata.modality,
                score: r.score,
            }
        })
        .collect()
}

/// Extractive answer quoting the best-ranked node.
fn local_answer(results: &[ScoredNode<'_>], sources: &[Citation]) -> String {
    let (Some(best), Some(source)) = (results.first(), sources.first()) else {
        return NO_RELEVANT_DOCUMENTS.to_string();
    };
    format!(
        "{}\n\nAfter scanning the index, the most relevant section is in \"{}\" ({}):\n\n> \"{}\"\n\n(Score: {:.2}, retrieved locally)",
        LOCAL_ANALYSIS_HEADER,
        source.name,
        source.source_id,
        best.node.text.trim(),
        best.score
    )
}
