//! Web search clients.
//!
//! A [`WebSearchClient`] turns a query string into a ranked list of
//! `(url, title, snippet)` results. Two backends are provided: the
//! DuckDuckGo instant-answer API (no key) and a self-hosted SearxNG
//! instance.

pub mod client;
pub mod config;
pub mod duckduckgo;
pub mod factory;
pub mod searxng;

pub use client::{WebResult, WebSearchClient};
pub use config::{SearchBackend, SearchConfig};
pub use duckduckgo::DuckDuckGoClient;
pub use factory::create_search_client;
pub use searxng::SearxngClient;
