//! # Context Ledger Core
//!
//! Runtime-agnostic logic for Context Ledger: data models, content
//! hashing, the proof-of-work integrity ledger, sentence-aware chunking,
//! the embedding/generation bridge contracts, document indexing and
//! hybrid retrieval.
//!
//! This crate contains no tokio, network or filesystem dependencies.
//! Bridge implementations, configuration and orchestration live in the
//! `context-ledger` app crate.

pub mod bridge;
pub mod chunk;
pub mod digest;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ledger;
pub mod models;
pub mod search;
