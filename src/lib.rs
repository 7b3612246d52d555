//! # Context Ledger
//!
//! A local-first, provenance-verified context ingestion and retrieval engine.
//!
//! Every ingested file is hashed, chunked and embedded, and its digest is
//! registered on an append-only proof-of-work hash chain. Questions are
//! answered from the retrieved chunks, and every answer reports whether the
//! chain still re-validates.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │   Files     │──▶│   Orchestrator   │──▶│ Integrity    │
//! │ text/pdf/   │   │ hash→index→      │   │ Ledger (PoW) │
//! │ image/audio │   │ register         │   └──────┬───────┘
//! └─────────────┘   └────────┬─────────┘          │
//!                            ▼                    ▼
//!                   ┌──────────────────┐   ┌──────────────┐
//!                   │ Hybrid retrieval │──▶│ Answer +     │
//!                   │ semantic/keyword │   │ SECURE/      │
//!                   └──────────────────┘   │ TAMPERED     │
//!                                          └──────────────┘
//! ```
//!
//! The pure pipeline (hashing, ledger, chunking, indexing, retrieval) lives
//! in the `context-ledger-core` crate. This crate adds configuration, the
//! HTTP bridge, extraction, persistence and the `ctxl` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! ctxl ingest ./docs                              # register files on the ledger
//! ctxl ask "capital of France" --path ./docs      # ingest and answer
//! ctxl ledger verify                              # audit the persisted chain
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`bridge`] | Ollama bridge and timeout wrapper |
//! | [`extract`] | Modality detection and content extraction |
//! | [`orchestrator`] | Ingestion, verification and answering |
//! | [`progress`] | Query stage reporting and cancellation |
//! | [`persist`] | Ledger JSON persistence |
//! | [`connector_fs`] | Filesystem scanning |
//! | [`ingest`] | `ctxl ingest` |
//! | [`ask`] | `ctxl ask` |
//! | [`ledger_cmd`] | `ctxl ledger` |

pub mod ask;
pub mod bridge;
pub mod config;
pub mod connector_fs;
pub mod extract;
pub mod ingest;
pub mod ledger_cmd;
pub mod orchestrator;
pub mod persist;
pub mod progress;
