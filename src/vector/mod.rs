// src/vector/mod.rs

//! Vector-search capability consumed by retrieval and ingestion.
//! All similarity search goes through this trait — no direct Qdrant
//! calls in business logic.

pub mod qdrant;

pub use qdrant::QdrantStore;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// One point to upsert: id, embedding, arbitrary JSON payload.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// One search hit with its cosine score and payload.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub score: f32,
    pub payload: Value,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if missing; safe to call repeatedly.
    async fn ensure_collection(&self, collection: &str, vector_size: usize) -> Result<()>;

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()>;

    /// Top-`limit` by cosine score, optionally restricted to points whose
    /// payload field `tag_key` equals `tag_value`.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        tag_filter: Option<(&str, &str)>,
    ) -> Result<Vec<SearchHit>>;

    /// Delete every point whose payload field `tag_key` equals
    /// `tag_value`; returns how many were scheduled for deletion.
    async fn delete_by_tag(&self, collection: &str, tag_key: &str, tag_value: &str)
        -> Result<u64>;
}
