//! Contracts for the external model capabilities the core depends on.
//!
//! - [`EmbeddingBridge`] turns text into vectors and images into captions.
//! - [`GenerationGateway`] turns a retrieved context plus a query into an
//!   answer.
//!
//! Both are capability-typed: callers probe [`EmbeddingBridge::is_available`]
//! per call and treat every [`BridgeError`] as "unavailable", degrading to
//! keyword retrieval, placeholder captions or an offline answer. Neither
//! touches ledger state.
//!
//! Concrete HTTP implementations live in the `context-ledger` app crate.

use async_trait::async_trait;

pub use crate::error::BridgeError;

/// Embedding and image-description backend.
#[async_trait]
pub trait EmbeddingBridge: Send + Sync {
    /// Returns the embedding model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Capability probe. Checked on every retrieval, since availability
    /// can change between calls.
    fn is_available(&self) -> bool;

    /// Embed `text` into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BridgeError>;

    /// Describe an image for the search index.
    async fn describe_image(&self, image: &[u8], mime: &str) -> Result<String, BridgeError>;
}

/// Input to [`GenerationGateway::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Instructions plus the cited context block.
    pub system_context: String,
    pub query: String,
}

/// Answer-synthesis backend.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BridgeError>;
}

/// A bridge with no backend. Used when `bridge.provider = "disabled"`.
///
/// Every call fails with [`BridgeError::Unavailable`], so retrieval runs
/// in keyword mode and answers are produced offline.
pub struct DisabledBridge;

#[async_trait]
impl EmbeddingBridge for DisabledBridge {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, BridgeError> {
        Err(BridgeError::unavailable("bridge disabled"))
    }

    async fn describe_image(&self, _image: &[u8], _mime: &str) -> Result<String, BridgeError> {
        Err(BridgeError::unavailable("bridge disabled"))
    }
}

#[async_trait]
impl GenerationGateway for DisabledBridge {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, BridgeError> {
        Err(BridgeError::unavailable("bridge disabled"))
    }
}
