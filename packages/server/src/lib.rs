//! Multi-tenant semantic search, recommendation and structured-extraction
//! service over user-supplied item collections.
//!
//! Clients ingest items into named collections, then query them through
//! three composable surfaces: hybrid search (text + vector + filters),
//! aggregation (natural-language prompt → structured function-call
//! arguments with recursive item expansion) and suggestions/autocomplete.

pub mod aggregate;
pub mod cache;
pub mod common;
pub mod config;
pub mod deps;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod search;
pub mod server;
pub mod stemmer;
pub mod suggest;

pub use config::Settings;
pub use deps::Deps;
pub use error::{Error, Result};
