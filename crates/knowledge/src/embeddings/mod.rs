//! Embedding providers for knowledge bases.
//!
//! Turns text into fixed-dimension vectors, for both indexing and querying.
//! Providers are stateless per call and shared behind `Arc`.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
