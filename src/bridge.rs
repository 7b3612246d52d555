//! Bridge implementations for embedding, image description and generation.
//!
//! The contracts ([`EmbeddingBridge`], [`GenerationGateway`]) live in the
//! core crate; this module provides the concrete backends:
//!
//! - **[`DisabledBridge`]** — re-exported from core; every call fails, so
//!   retrieval runs in keyword mode and answers are synthesized locally.
//! - **[`OllamaBridge`]** — a local Ollama instance over HTTP.
//! - **[`BoundedBridge`]** — wraps either of the above and bounds every call
//!   with a wall-clock timeout.
//!
//! Use [`create_bridge`] to build the pair selected by `[bridge]` config.

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub use context_ledger_core::bridge::{
    BridgeError, DisabledBridge, EmbeddingBridge, GenerationGateway, GenerationRequest,
};

use crate::config::BridgeConfig;

/// Prompt sent with every image to the vision model.
pub const DESCRIBE_IMAGE_PROMPT: &str = "Describe this image in detail for a search index.";

/// Instructions prepended to the retrieved context for synthesis.
pub const SYSTEM_PROMPT: &str = "You are a local retrieval assistant operating offline. \
Answer the user query using ONLY the provided sources. \
Cite sources by their identifier. \
If a source is an image description, say so when citing it.";

/// How long a transport failure marks the backend unavailable.
const UNAVAILABLE_COOLDOWN: Duration = Duration::from_secs(30);

/// Embedding and generation handles sharing one backend.
#[derive(Clone)]
pub struct Bridges {
    pub embedding: Arc<dyn EmbeddingBridge>,
    pub generation: Arc<dyn GenerationGateway>,
}

impl Bridges {
    pub fn disabled() -> Self {
        let bridge = Arc::new(DisabledBridge);
        Self {
            embedding: bridge.clone(),
            generation: bridge,
        }
    }
}

/// Build the bridge pair for the configured provider.
///
/// Every non-disabled backend is wrapped in a [`BoundedBridge`] using
/// `bridge.timeout_secs`.
pub fn create_bridge(config: &BridgeConfig) -> Result<Bridges> {
    if !config.is_enabled() {
        return Ok(Bridges::disabled());
    }
    match config.provider.as_str() {
        "ollama" => {
            let bridge = Arc::new(BoundedBridge::new(
                OllamaBridge::new(config)?,
                Duration::from_secs(config.timeout_secs),
            ));
            Ok(Bridges {
                embedding: bridge.clone(),
                generation: bridge,
            })
        }
        other => bail!("Unknown bridge provider: {}", other),
    }
}

// ============ Ollama Bridge ============

/// Bridge backed by a local Ollama instance.
///
/// Endpoints used:
/// - `POST /api/embeddings` for text embeddings
/// - `POST /api/generate` with `images` for image descriptions
/// - `POST /api/chat` for answer synthesis
///
/// A transport failure marks the bridge unavailable for a short cooldown,
/// so retrieval switches to keyword mode instead of waiting on every query.
pub struct OllamaBridge {
    client: reqwest::Client,
    url: String,
    embed_model: String,
    vision_model: String,
    chat_model: String,
    temperature: f64,
    last_failure: Mutex<Option<Instant>>,
}

impl OllamaBridge {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            embed_model: config.embed_model.clone(),
            vision_model: config.vision_model.clone(),
            chat_model: config.chat_model.clone(),
            temperature: config.temperature,
            last_failure: Mutex::new(None),
        })
    }

    async fn post(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, BridgeError> {
        let resp = self
            .client
            .post(format!("{}{}", self.url, endpoint))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await;

        let response = match resp {
            Ok(response) => response,
            Err(e) => {
                self.mark_failure();
                return Err(BridgeError::unavailable(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(BridgeError::unavailable(format!(
                "Ollama API error {}: {}",
                status, body_text
            )));
        }

        self.clear_failure();
        response
            .json()
            .await
            .map_err(|e| BridgeError::unavailable(format!("Invalid Ollama response: {}", e)))
    }

    fn mark_failure(&self) {
        *self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn clear_failure(&self) {
        *self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[async_trait]
impl EmbeddingBridge for OllamaBridge {
    fn model_name(&self) -> &str {
        &self.embed_model
    }

    fn is_available(&self) -> bool {
        let last = *self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match last {
            Some(at) => at.elapsed() >= UNAVAILABLE_COOLDOWN,
            None => true,
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, BridgeError> {
        let body = serde_json::json!({
            "model": self.embed_model,
            "prompt": text,
        });
        let json = self.post("/api/embeddings", &body).await?;
        parse_embedding_response(&json)
    }

    async fn describe_image(&self, image: &[u8], _mime: &str) -> Result<String, BridgeError> {
        let body = serde_json::json!({
            "model": self.vision_model,
            "prompt": DESCRIBE_IMAGE_PROMPT,
            "images": [BASE64.encode(image)],
            "stream": false,
        });
        let json = self.post("/api/generate", &body).await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| BridgeError::unavailable("Invalid Ollama response: missing response"))
    }
}

#[async_trait]
impl GenerationGateway for OllamaBridge {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BridgeError> {
        let system = format!(
            "{}\n\nLOCAL DATA REPOSITORY:\n{}",
            SYSTEM_PROMPT, request.system_context
        );
        let body = serde_json::json!({
            "model": self.chat_model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": request.query },
            ],
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        let json = self.post("/api/chat", &body).await?;
        parse_chat_response(&json)
    }
}

fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>, BridgeError> {
    let values = json
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| BridgeError::unavailable("Invalid Ollama response: missing embedding"))?;

    if values.is_empty() {
        return Err(BridgeError::unavailable(
            "Invalid Ollama response: empty embedding",
        ));
    }

    Ok(values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String, BridgeError> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| BridgeError::unavailable("Invalid Ollama response: missing message.content"))
}

// ============ Timeout Wrapper ============

/// Bounds every call of the wrapped bridge with a wall-clock timeout.
///
/// An elapsed call resolves to [`BridgeError::Timeout`], which callers
/// treat like any other unavailability.
pub struct BoundedBridge<B> {
    inner: B,
    timeout: Duration,
}

impl<B> BoundedBridge<B> {
    pub fn new(inner: B, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, BridgeError>
    where
        F: std::future::Future<Output = Result<T, BridgeError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl<B: EmbeddingBridge> EmbeddingBridge for BoundedBridge<B> {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, BridgeError> {
        self.bounded(self.inner.embed(text)).await
    }

    async fn describe_image(&self, image: &[u8], mime: &str) -> Result<String, BridgeError> {
        self.bounded(self.inner.describe_image(image, mime)).await
    }
}

#[async_trait]
impl<B: GenerationGateway> GenerationGateway for BoundedBridge<B> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BridgeError> {
        self.bounded(self.inner.generate(request)).await
    }
}
