// src/rag/indexer.rs

//! Chunk-and-embed ingestion of rule documents into the vector index.
//! Re-indexing a document replaces its points: delete everything tagged
//! with the document id, then insert the fresh chunks.

use crate::config::BotConfig;
use crate::error::Result;
use crate::llm::EmbeddingClient;
use crate::rag::chunker::split_into_chunks;
use crate::vector::{VectorIndex, VectorPoint};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct IndexOutcome {
    pub doc_id: String,
    pub chunks_created: usize,
    pub chunks_deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct BatchIndexOutcome {
    pub documents_indexed: usize,
    pub documents_failed: usize,
    pub chunks_created: usize,
}

pub struct RuleIndexer {
    embeddings: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    vector_size: usize,
    chunk_size: usize,
    chunk_overlap: usize,
}

pub struct RuleDocument {
    pub doc_id: String,
    pub title: String,
    pub url: String,
    pub text: String,
}

impl RuleIndexer {
    pub fn new(
        embeddings: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        config: &BotConfig,
    ) -> Self {
        Self {
            embeddings,
            index,
            collection: config.rules_collection.clone(),
            vector_size: config.embedding_dim,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }

    /// Replace one document's chunks in the rules collection.
    pub async fn index_document(&self, doc: &RuleDocument) -> Result<IndexOutcome> {
        self.index.ensure_collection(&self.collection, self.vector_size).await?;

        let deleted = self.index.delete_by_tag(&self.collection, "doc_id", &doc.doc_id).await?;
        if deleted > 0 {
            info!(doc_id = %doc.doc_id, deleted, "removed stale vectors before re-index");
        }

        let chunks = split_into_chunks(&doc.text, self.chunk_size, self.chunk_overlap)?;
        let total_chunks = chunks.len();

        for (i, chunk) in chunks.iter().enumerate() {
            let embedding = self.embeddings.embed(chunk).await?;
            self.index
                .upsert(
                    &self.collection,
                    vec![VectorPoint {
                        id: Uuid::new_v4().to_string(),
                        vector: embedding,
                        payload: json!({
                            "text": chunk,
                            "doc_id": doc.doc_id,
                            "title": doc.title,
                            "url": doc.url,
                            "chunk_index": i,
                            "total_chunks": total_chunks,
                        }),
                    }],
                )
                .await?;
        }

        info!(doc_id = %doc.doc_id, chunks = total_chunks, "indexed rule document");
        Ok(IndexOutcome {
            doc_id: doc.doc_id.clone(),
            chunks_created: total_chunks,
            chunks_deleted: deleted,
        })
    }

    /// Index a batch; one document's failure does not stop the rest.
    pub async fn index_documents(&self, docs: &[RuleDocument]) -> BatchIndexOutcome {
        let mut indexed = 0;
        let mut failed = 0;
        let mut chunks = 0;

        for doc in docs {
            match self.index_document(doc).await {
                Ok(outcome) => {
                    indexed += 1;
                    chunks += outcome.chunks_created;
                }
                Err(e) => {
                    error!(doc_id = %doc.doc_id, "failed to index document: {e}");
                    failed += 1;
                }
            }
        }

        BatchIndexOutcome {
            documents_indexed: indexed,
            documents_failed: failed,
            chunks_created: chunks,
        }
    }
}
