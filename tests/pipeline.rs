//! End-to-end tests of the orchestrator against mock bridges.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use context_ledger::bridge::{
    BridgeError, Bridges, DisabledBridge, EmbeddingBridge, GenerationGateway, GenerationRequest,
};
use context_ledger::orchestrator::{
    BlockchainStatus, Orchestrator, LOCAL_ANALYSIS_HEADER, NO_RELEVANT_DOCUMENTS,
};
use context_ledger::progress::{CancelFlag, QueryProgressReporter, QueryStage};
use context_ledger_core::digest::digest;
use context_ledger_core::index::{IMAGE_DESCRIPTION_PREFIX, IMAGE_PLACEHOLDER};
use context_ledger_core::ledger::{IntegrityLedger, LedgerParams};
use context_ledger_core::models::{BlockAction, DocumentStatus, Modality};
use context_ledger_core::search::ScoringMode;

const PARIS: &str = "Paris is the capital of France. It is known for the Eiffel Tower.";

fn disabled_orchestrator() -> Orchestrator {
    Orchestrator::new(Arc::new(IntegrityLedger::default()), Bridges::disabled())
}

/// Embeds by counting a few marker words; describes every image as a cat.
struct BagOfWordsBridge {
    generate_calls: AtomicUsize,
}

impl BagOfWordsBridge {
    fn new() -> Self {
        Self {
            generate_calls: AtomicUsize::new(0),
        }
    }
}

const VOCAB: [&str; 4] = ["france", "tower", "cat", "rust"];

#[async_trait]
impl EmbeddingBridge for BagOfWordsBridge {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }
    fn is_available(&self) -> bool {
        true
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BridgeError> {
        let lower = text.to_lowercase();
        Ok(VOCAB
            .iter()
            .map(|w| lower.matches(w).count() as f32)
            .collect())
    }
    async fn describe_image(&self, _image: &[u8], _mime: &str) -> Result<String, BridgeError> {
        Ok("A cat sleeping on a sofa.".to_string())
    }
}

#[async_trait]
impl GenerationGateway for BagOfWordsBridge {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BridgeError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("ANSWER to '{}' from:\n{}", request.query, request.system_context))
    }
}

fn mock_orchestrator() -> (Orchestrator, Arc<BagOfWordsBridge>) {
    let bridge = Arc::new(BagOfWordsBridge::new());
    let bridges = Bridges {
        embedding: bridge.clone(),
        generation: bridge.clone(),
    };
    let orch = Orchestrator::new(Arc::new(IntegrityLedger::default()), bridges);
    (orch, bridge)
}

/// Records every stage; optionally cancels when a stage begins.
struct Recorder {
    stages: std::sync::Mutex<Vec<QueryStage>>,
    cancel_at: Option<(QueryStage, CancelFlag)>,
}

impl QueryProgressReporter for Recorder {
    fn report(&self, stage: QueryStage) {
        self.stages.lock().unwrap().push(stage);
        if let Some((at, flag)) = &self.cancel_at {
            if *at == stage {
                flag.cancel();
            }
        }
    }
}

#[tokio::test]
async fn test_paris_end_to_end_keyword() {
    let orch = disabled_orchestrator();
    let doc = orch.ingest(PARIS.as_bytes(), "paris.txt", Modality::Text).await;

    assert_eq!(doc.status, DocumentStatus::Ready);
    assert_eq!(doc.vector_nodes.len(), 1);
    assert_eq!(doc.vector_nodes[0].text, PARIS);
    assert_eq!(doc.digest.as_deref(), Some(digest(PARIS.as_bytes()).as_str()));

    let blocks = orch.ledger().all_blocks();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1].action, BlockAction::Registration);
    assert_eq!(blocks[1].subject_id, doc.id);
    assert_eq!(doc.block_index, Some(1));
    assert!(blocks[1].current_hash.starts_with("00"));
    assert!(orch.ledger().is_chain_valid());

    let answer = orch.answer("capital of France").await;
    assert_eq!(answer.mode, ScoringMode::Keyword);
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].source_id, doc.id);
    assert_eq!(answer.files_checked, 1);
    assert_eq!(answer.blockchain_status, BlockchainStatus::Secure);
    assert!(answer.offline);
    assert!(answer.text.starts_with(LOCAL_ANALYSIS_HEADER));
    assert!(answer.text.contains("paris.txt"));
    assert!(answer.text.contains(PARIS));
}

#[tokio::test]
async fn test_concurrent_ingest_serializes_ledger() {
    let orch = Arc::new(disabled_orchestrator());
    let mut handles = Vec::new();
    for i in 0..8 {
        let orch = Arc::clone(&orch);
        handles.push(tokio::spawn(async move {
            let body = format!("Document number {} talks about topic {}.", i, i * 7);
            orch.ingest(body.as_bytes(), &format!("doc{}.txt", i), Modality::Text)
                .await
        }));
    }
    let mut ok = 0;
    for h in handles {
        if h.await.unwrap().is_ready() {
            ok += 1;
        }
    }

    let blocks = orch.ledger().all_blocks();
    assert_eq!(blocks.len(), 1 + ok);
    let prev: HashSet<&str> = blocks.iter().map(|b| b.previous_hash.as_str()).collect();
    assert_eq!(prev.len(), blocks.len());
    for (i, b) in blocks.iter().enumerate() {
        assert_eq!(b.index, i as u64);
    }
    assert!(orch.ledger().is_chain_valid());
}

#[tokio::test]
async fn test_ingest_paths_keeps_order_and_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.txt");
    let bad = dir.path().join("bad.txt");
    let missing = dir.path().join("missing.txt");
    std::fs::write(&good, "Rust has fearless concurrency.").unwrap();
    std::fs::write(&bad, [0x66u8, 0xff, 0xfe, 0x00]).unwrap();

    let orch = Arc::new(disabled_orchestrator());
    let docs = orch
        .ingest_paths(vec![good.clone(), bad.clone(), missing.clone()])
        .await;

    let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["good.txt", "bad.txt", "missing.txt"]);
    assert_eq!(docs[0].status, DocumentStatus::Ready);
    assert_eq!(docs[1].status, DocumentStatus::Error);
    assert!(docs[1].error.as_deref().unwrap().contains("UTF-8"));
    assert!(docs[1].vector_nodes.is_empty());
    assert_eq!(docs[2].status, DocumentStatus::Error);
    assert!(docs[2].error.as_deref().unwrap().contains("unreadable"));

    // Only the good file was registered.
    assert_eq!(orch.ledger().len(), 2);
    assert_eq!(orch.documents().len(), 3);
    assert_eq!(orch.ready_documents().len(), 1);
}

#[tokio::test]
async fn test_ingest_path_registers_file_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paris.txt");
    std::fs::write(&path, PARIS).unwrap();

    let orch = disabled_orchestrator();
    let doc = orch.ingest_path(&path).await;
    assert_eq!(doc.status, DocumentStatus::Ready);
    assert_eq!(doc.size, PARIS.len() as u64);

    let expected = digest(PARIS.as_bytes());
    assert_eq!(doc.digest.as_deref(), Some(expected.as_str()));
    let block = orch.ledger().latest_block();
    assert_eq!(block.subject_hash, expected);
    assert_eq!(block.subject_id, doc.id);
}

#[tokio::test]
async fn test_tampered_chain_reported() {
    let orch = disabled_orchestrator();
    orch.ingest(PARIS.as_bytes(), "paris.txt", Modality::Text)
        .await;

    let mut blocks = orch.ledger().all_blocks();
    blocks[1].subject_hash = digest(b"forged");
    let tampered = Orchestrator::new(
        Arc::new(IntegrityLedger::from_blocks(LedgerParams::default(), blocks)),
        Bridges::disabled(),
    );
    tampered
        .ingest(PARIS.as_bytes(), "paris.txt", Modality::Text)
        .await;

    let answer = tampered.answer("capital of France").await;
    assert_eq!(answer.blockchain_status, BlockchainStatus::Tampered);
    assert!(answer.text.starts_with(LOCAL_ANALYSIS_HEADER));
}

#[tokio::test]
async fn test_verify_match_and_mismatch() {
    let orch = disabled_orchestrator();
    let doc = orch
        .ingest(b"Original contents.", "notes.txt", Modality::Text)
        .await;

    let same = orch.verify(&doc.id, b"Original contents.").await.unwrap();
    assert!(same.matches);
    assert_eq!(same.block.action, BlockAction::Verification);
    assert_eq!(same.block.index, 2);

    let changed = orch.verify(&doc.id, b"Edited contents.").await.unwrap();
    assert!(!changed.matches);
    assert_eq!(changed.block.action, BlockAction::ModificationCheck);
    assert_eq!(changed.current_digest, digest(b"Edited contents."));
    assert_eq!(changed.registered_digest, digest(b"Original contents."));

    assert!(orch.verify("no-such-id", b"x").await.is_err());
    assert_eq!(orch.ledger().len(), 4);
    assert!(orch.ledger().is_chain_valid());
}

#[tokio::test]
async fn test_semantic_answer_uses_gateway() {
    let (orch, bridge) = mock_orchestrator();
    orch.ingest(PARIS.as_bytes(), "paris.txt", Modality::Text)
        .await;
    orch.ingest(b"Rust and more rust.", "rust.txt", Modality::Text)
        .await;

    let answer = orch.answer("Tell me about France").await;
    assert_eq!(answer.mode, ScoringMode::Semantic);
    assert!(!answer.offline);
    assert_eq!(bridge.generate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].name, "paris.txt");
    assert!(answer.text.starts_with("ANSWER to 'Tell me about France'"));
    assert!(answer.text.contains("--- SOURCE (text): "));
}

#[tokio::test]
async fn test_image_ingest_and_similarity() {
    let (orch, _bridge) = mock_orchestrator();
    let cat = orch.ingest(&[1, 2, 3], "cat.png", Modality::Image).await;
    let other = orch.ingest(&[4, 5, 6], "cat2.jpg", Modality::Image).await;

    assert_eq!(cat.vector_nodes.len(), 1);
    assert_eq!(cat.vector_nodes[0].id, format!("{}-desc", cat.id));
    assert_eq!(
        cat.vector_nodes[0].text,
        format!("{}A cat sleeping on a sofa.", IMAGE_DESCRIPTION_PREFIX)
    );
    assert_eq!(cat.mime, "image/png");

    let similar = orch.similar_images(&cat.id).unwrap();
    assert_eq!(similar, vec![(other.id.clone(), 100)]);
    assert!(orch.similar_images("unknown").is_none());
}

#[tokio::test]
async fn test_image_without_bridge_gets_placeholder() {
    let orch = disabled_orchestrator();
    let doc = orch.ingest(&[9, 9, 9], "photo.png", Modality::Image).await;
    assert!(doc.is_ready());
    assert_eq!(doc.description.as_deref(), Some(IMAGE_PLACEHOLDER));
    assert_eq!(doc.vector_nodes.len(), 1);
}

#[tokio::test]
async fn test_audio_registers_without_nodes() {
    let orch = disabled_orchestrator();
    let doc = orch.ingest(&[0, 1, 2, 3], "talk.mp3", Modality::Audio).await;
    assert!(doc.is_ready());
    assert!(doc.vector_nodes.is_empty());
    assert_eq!(orch.ledger().len(), 2);
}

#[tokio::test]
async fn test_progress_stages_in_order() {
    let orch = disabled_orchestrator();
    orch.ingest(PARIS.as_bytes(), "paris.txt", Modality::Text)
        .await;

    let recorder = Recorder {
        stages: std::sync::Mutex::new(Vec::new()),
        cancel_at: None,
    };
    let answer = orch
        .answer_with_progress("Eiffel Tower", &recorder, &CancelFlag::new())
        .await;
    assert!(answer.is_some());
    assert_eq!(*recorder.stages.lock().unwrap(), QueryStage::ALL.to_vec());
}

#[tokio::test]
async fn test_cancel_before_synthesis_returns_none() {
    let (orch, bridge) = mock_orchestrator();
    orch.ingest(PARIS.as_bytes(), "paris.txt", Modality::Text)
        .await;

    for stage in QueryStage::ALL {
        let cancel = CancelFlag::new();
        let recorder = Recorder {
            stages: std::sync::Mutex::new(Vec::new()),
            cancel_at: Some((stage, cancel.clone())),
        };
        let answer = orch
            .answer_with_progress("France", &recorder, &cancel)
            .await;
        assert!(answer.is_none(), "cancel at {:?} should discard", stage);
    }
    assert_eq!(bridge.generate_calls.load(Ordering::SeqCst), 0);

    let cancel = CancelFlag::new();
    cancel.cancel();
    let recorder = Recorder {
        stages: std::sync::Mutex::new(Vec::new()),
        cancel_at: None,
    };
    assert!(orch
        .answer_with_progress("France", &recorder, &cancel)
        .await
        .is_none());
    assert!(recorder.stages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_query_and_no_results() {
    let (orch, bridge) = mock_orchestrator();
    orch.ingest(PARIS.as_bytes(), "paris.txt", Modality::Text)
        .await;

    let empty = orch.answer("   ").await;
    assert_eq!(empty.text, NO_RELEVANT_DOCUMENTS);
    assert!(empty.sources.is_empty());

    let disabled = disabled_orchestrator();
    let none = disabled.answer("capital of France").await;
    assert_eq!(none.text, NO_RELEVANT_DOCUMENTS);
    assert_eq!(none.files_checked, 0);
    assert_eq!(none.blockchain_status, BlockchainStatus::Secure);

    assert_eq!(bridge.generate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_remove_drops_document_but_not_blocks() {
    let orch = disabled_orchestrator();
    let doc = orch
        .ingest(PARIS.as_bytes(), "paris.txt", Modality::Text)
        .await;
    let removed = orch.remove(&doc.id).unwrap();
    assert_eq!(removed.id, doc.id);
    assert!(orch.remove(&doc.id).is_none());
    assert!(orch.documents().is_empty());
    assert_eq!(orch.ledger().len(), 2);

    let answer = orch.answer("capital of France").await;
    assert_eq!(answer.text, NO_RELEVANT_DOCUMENTS);
}

#[tokio::test]
async fn test_mining_budget_exceeded_still_registers() {
    let params = LedgerParams {
        difficulty: 64,
        max_attempts: 3,
    };
    let orch = Orchestrator::new(Arc::new(IntegrityLedger::new(params)), Bridges::disabled());
    let doc = orch
        .ingest(PARIS.as_bytes(), "paris.txt", Modality::Text)
        .await;
    assert!(doc.is_ready());
    let tail = orch.ledger().latest_block();
    assert_eq!(tail.nonce, 2);
    assert!(orch.ledger().is_chain_valid());
}

#[tokio::test]
async fn test_disabled_bridge_is_keyword_only() {
    let bridge = DisabledBridge;
    assert!(!bridge.is_available());
    let request = GenerationRequest {
        system_context: String::new(),
        query: "q".to_string(),
    };
    assert!(bridge.generate(&request).await.is_err());
}
