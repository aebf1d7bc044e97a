// src/rag/mod.rs

pub mod chunker;
pub mod indexer;
pub mod retriever;

pub use indexer::RuleIndexer;
pub use retriever::{RuleChunk, RuleRetriever};
