//! `ctxl ingest`: scan paths, ingest concurrently, persist the ledger.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use context_ledger_core::models::{Document, DocumentStatus};

use crate::bridge::create_bridge;
use crate::config::Config;
use crate::connector_fs::scan_paths;
use crate::orchestrator::Orchestrator;
use crate::persist::{open_ledger, persist_ledger};

/// Build an orchestrator from config, restoring the persisted ledger.
pub fn build_orchestrator(config: &Config) -> Result<Arc<Orchestrator>> {
    let ledger = open_ledger(config)?;
    let bridges = create_bridge(&config.bridge)?;
    Ok(Arc::new(Orchestrator::from_config(config, ledger, bridges)))
}

/// Expand `paths` and ingest every file. Returns the resulting documents.
pub async fn ingest_all(
    orchestrator: &Arc<Orchestrator>,
    config: &Config,
    paths: &[PathBuf],
) -> Result<Vec<Document>> {
    let files = scan_paths(paths, &config.ingest)?;
    tracing::debug!(files = files.len(), "scan complete");
    Ok(orchestrator.ingest_paths(files).await)
}

pub async fn run_ingest(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let docs = ingest_all(&orchestrator, config, paths).await?;

    for doc in &docs {
        println!("{}", status_line(doc));
    }

    let ready = docs.iter().filter(|d| d.is_ready()).count();
    println!(
        "ingest ok\n  files: {}\n  ready: {}\n  failed: {}\n  ledger blocks: {}",
        docs.len(),
        ready,
        docs.len() - ready,
        orchestrator.ledger().len()
    );

    persist_ledger(config, orchestrator.ledger())?;
    Ok(())
}

/// One line per document: status, name, node count or failure reason.
pub fn status_line(doc: &Document) -> String {
    match doc.status {
        DocumentStatus::Ready => format!(
            "  ready    {}  [{}]  {} nodes  block #{}",
            doc.name,
            doc.modality,
            doc.vector_nodes.len(),
            doc.block_index.unwrap_or_default()
        ),
        DocumentStatus::Error => format!(
            "  error    {}  {}",
            doc.name,
            doc.error.as_deref().unwrap_or("unknown error")
        ),
        DocumentStatus::Indexing => format!("  indexing {}", doc.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_ledger_core::models::Modality;

    #[test]
    fn test_status_lines() {
        let mut doc = Document::placeholder("a.txt", "text/plain", 3, Modality::Text);
        assert_eq!(status_line(&doc), "  indexing a.txt");

        doc.status = DocumentStatus::Ready;
        doc.block_index = Some(4);
        assert_eq!(status_line(&doc), "  ready    a.txt  [text]  0 nodes  block #4");

        doc.status = DocumentStatus::Error;
        doc.error = Some("content is not valid UTF-8".to_string());
        assert_eq!(status_line(&doc), "  error    a.txt  content is not valid UTF-8");
    }
}
