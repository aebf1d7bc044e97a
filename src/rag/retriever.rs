// src/rag/retriever.rs

//! Embeds a query and runs similarity search with adaptive threshold
//! relaxation. An empty result means "insufficient evidence", never an
//! error — callers decide what to do without rules.

use crate::config::BotConfig;
use crate::error::Result;
use crate::llm::EmbeddingClient;
use crate::vector::{SearchHit, VectorIndex};
use std::sync::Arc;
use tracing::{debug, info};

/// A retrieved rule/document fragment with its similarity score.
#[derive(Debug, Clone)]
pub struct RuleChunk {
    pub text: String,
    pub title: String,
    pub source_url: String,
    pub similarity_score: f32,
}

impl RuleChunk {
    fn from_hit(hit: &SearchHit) -> Self {
        let payload = &hit.payload;
        Self {
            text: payload.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            title: payload
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown")
                .to_string(),
            source_url: payload.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            similarity_score: hit.score,
        }
    }
}

pub struct RuleRetriever {
    embeddings: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    top_k: usize,
    relaxation_floor: f32,
    relaxation_margin: f32,
}

impl RuleRetriever {
    pub fn new(
        embeddings: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        config: &BotConfig,
    ) -> Self {
        Self {
            embeddings,
            index,
            collection: config.rules_collection.clone(),
            top_k: config.search_top_k,
            relaxation_floor: config.relaxation_floor,
            relaxation_margin: config.relaxation_margin,
        }
    }

    /// Retrieve chunks scoring at least `min_score`, relaxing the bar
    /// once when nothing clears it but the best hit is close enough.
    ///
    /// Relaxation: if the primary filter is empty and the best unfiltered
    /// score is at least the floor, refilter at
    /// `max(floor, best - margin)`. This keeps a reasonably relevant
    /// match from falling off a hard cliff just under the primary bar.
    pub async fn retrieve(
        &self,
        query: &str,
        tag_filter: Option<(&str, &str)>,
        min_score: f32,
    ) -> Result<Vec<RuleChunk>> {
        let embedding = self.embeddings.embed(query).await?;

        let mut hits = self
            .index
            .search(&self.collection, &embedding, self.top_k, tag_filter)
            .await?;

        // Ranked by descending similarity; the underlying index's stable
        // order breaks ties.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let passing: Vec<&SearchHit> = hits.iter().filter(|h| h.score >= min_score).collect();
        if !passing.is_empty() {
            return Ok(passing.into_iter().map(RuleChunk::from_hit).collect());
        }

        let best = match hits.first() {
            Some(hit) => hit.score,
            None => return Ok(Vec::new()),
        };
        if best < self.relaxation_floor {
            debug!(best, min_score, "no hits cleared the bar; best too weak to relax");
            return Ok(Vec::new());
        }

        let relaxed = f32::max(self.relaxation_floor, best - self.relaxation_margin);
        info!(min_score, relaxed, best, "relaxing similarity threshold once");

        Ok(hits
            .iter()
            .filter(|h| h.score >= relaxed)
            .map(RuleChunk::from_hit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::llm::EmbeddingClient;
    use crate::vector::{VectorIndex, VectorPoint};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingClient for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.1; 4])
        }
    }

    struct ScoredIndex {
        scores: Vec<f32>,
    }

    #[async_trait]
    impl VectorIndex for ScoredIndex {
        async fn ensure_collection(&self, _c: &str, _s: usize) -> Result<()> {
            Ok(())
        }
        async fn upsert(&self, _c: &str, _p: Vec<VectorPoint>) -> Result<()> {
            Ok(())
        }
        async fn search(
            &self,
            _c: &str,
            _v: &[f32],
            _limit: usize,
            _f: Option<(&str, &str)>,
        ) -> Result<Vec<SearchHit>> {
            Ok(self
                .scores
                .iter()
                .map(|&score| SearchHit {
                    score,
                    payload: json!({"text": "rule", "title": "t", "url": ""}),
                })
                .collect())
        }
        async fn delete_by_tag(&self, _c: &str, _k: &str, _v: &str) -> Result<u64> {
            Ok(0)
        }
    }

    fn retriever(scores: Vec<f32>) -> RuleRetriever {
        let config = crate::config::BotConfig::for_tests();
        RuleRetriever::new(
            std::sync::Arc::new(FixedEmbedder),
            std::sync::Arc::new(ScoredIndex { scores }),
            &config,
        )
    }

    #[tokio::test]
    async fn test_primary_filter_passes() {
        let chunks = retriever(vec![0.8, 0.6, 0.4]).retrieve("q", None, 0.5).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].similarity_score >= chunks[1].similarity_score);
    }

    #[tokio::test]
    async fn test_relaxation_triggers_above_floor() {
        // Best 0.3 >= floor 0.25, so threshold relaxes to
        // max(0.25, 0.3 - 0.05) = 0.25 and both hits pass.
        let chunks = retriever(vec![0.3, 0.27]).retrieve("q", None, 0.5).await.unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn test_relaxation_threshold_floor_bound() {
        // Best 0.22: relaxed threshold would be max(0.25, 0.17) = 0.25,
        // but best < floor means no relaxation at all.
        let chunks = retriever(vec![0.22, 0.2]).retrieve("q", None, 0.35).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_no_relaxation_below_floor() {
        let chunks = retriever(vec![0.2, 0.1]).retrieve("q", None, 0.35).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_is_empty_not_error() {
        let chunks = retriever(vec![]).retrieve("q", None, 0.5).await.unwrap();
        assert!(chunks.is_empty());
    }
}
