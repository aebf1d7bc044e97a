// src/vector/qdrant.rs

//! Implements VectorIndex for Qdrant over its HTTP API.

use crate::config::BotConfig;
use crate::error::{ReviewError, Result};
use crate::vector::{SearchHit, VectorIndex, VectorPoint};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

pub struct QdrantStore {
    client: Client,
    base_url: String,
}

impl QdrantStore {
    pub fn new(config: &BotConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.qdrant_timeout))
            .build()?;
        Ok(Self { client, base_url: config.qdrant_url.clone() })
    }

    fn tag_filter(tag_key: &str, tag_value: &str) -> serde_json::Value {
        json!({
            "must": [{
                "key": tag_key,
                "match": { "value": tag_value }
            }]
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn ensure_collection(&self, collection: &str, vector_size: usize) -> Result<()> {
        let url = format!("{}/collections/{}", self.base_url, collection);
        let resp = self.client.get(&url).send().await?;
        if resp.status().is_success() {
            return Ok(());
        }

        let req_body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });
        let resp = self.client.put(&url).json(&req_body).send().await?;

        let status = resp.status();
        let err_body = resp.text().await.unwrap_or_default();
        // A racing creator is fine; only a real failure is an error.
        if status.is_success() || status.as_u16() == 409 || err_body.contains("already exists") {
            Ok(())
        } else {
            Err(ReviewError::Retrieval(format!(
                "failed to create collection {collection}: {err_body}"
            )))
        }
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()> {
        let url = format!("{}/collections/{}/points", self.base_url, collection);
        let points: Vec<_> = points
            .into_iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "vector": p.vector,
                    "payload": p.payload,
                })
            })
            .collect();
        let req_body = json!({ "points": points });

        let resp = self.client.put(&url).json(&req_body).send().await?;
        if !resp.status().is_success() {
            return Err(ReviewError::Retrieval(format!(
                "upsert failed: {}",
                resp.text().await.unwrap_or_default()
            )));
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        tag_filter: Option<(&str, &str)>,
    ) -> Result<Vec<SearchHit>> {
        let url = format!("{}/collections/{}/points/search", self.base_url, collection);

        let mut req_body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some((key, value)) = tag_filter {
            req_body["filter"] = Self::tag_filter(key, value);
        }

        let resp = self
            .client
            .post(&url)
            .json(&req_body)
            .send()
            .await
            .map_err(|e| ReviewError::Retrieval(format!("qdrant search error: {e}")))?;

        if !resp.status().is_success() {
            return Err(ReviewError::Retrieval(format!(
                "qdrant search failed: {}",
                resp.text().await.unwrap_or_default()
            )));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        let mut hits = Vec::new();
        if let Some(points) = resp_json.get("result").and_then(|r| r.as_array()) {
            for point in points {
                let score = point.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;
                let payload = point.get("payload").cloned().unwrap_or(json!({}));
                hits.push(SearchHit { score, payload });
            }
        }
        Ok(hits)
    }

    async fn delete_by_tag(
        &self,
        collection: &str,
        tag_key: &str,
        tag_value: &str,
    ) -> Result<u64> {
        // Count first so callers can report how much was replaced.
        let count_url = format!("{}/collections/{}/points/count", self.base_url, collection);
        let count_body = json!({
            "filter": Self::tag_filter(tag_key, tag_value),
            "exact": true,
        });
        let resp = self.client.post(&count_url).json(&count_body).send().await?;
        let count = if resp.status().is_success() {
            let body: serde_json::Value = resp.json().await?;
            body["result"]["count"].as_u64().unwrap_or(0)
        } else {
            0
        };

        let url = format!("{}/collections/{}/points/delete", self.base_url, collection);
        let req_body = json!({ "filter": Self::tag_filter(tag_key, tag_value) });
        let resp = self.client.post(&url).json(&req_body).send().await?;
        if !resp.status().is_success() {
            return Err(ReviewError::Retrieval(format!(
                "delete by tag failed: {}",
                resp.text().await.unwrap_or_default()
            )));
        }
        Ok(count)
    }
}
