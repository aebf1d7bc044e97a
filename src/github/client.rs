// src/github/client.rs

//! GitHub REST v3 client for the handful of endpoints the pipeline
//! needs. Token auth; GitHub requires a User-Agent on every request.

use crate::config::BotConfig;
use crate::error::{ReviewError, Result};
use crate::github::{CodeHost, ReviewEvent};
use crate::review::types::{ExistingComment, FileChange, InlineComment};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const USER_AGENT: &str = concat!("prbot/", env!("CARGO_PKG_VERSION"));

const PER_PAGE: usize = 100;

// GitHub serves full pages until the last one; a short page ends the
// listing without another round trip.
fn has_more_pages(batch_len: usize) -> bool {
    batch_len == PER_PAGE
}

pub struct GitHubClient {
    client: Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(config: &BotConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.github_timeout))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            api_url: config.github_api_url.clone(),
            token: config.github_token.clone(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.api_url, path))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(ReviewError::ExternalApi(format!("{what} failed ({status}): {body}")))
        }
    }
}

#[async_trait]
impl CodeHost for GitHubClient {
    async fn list_changed_files(&self, repo: &str, pr_number: u64) -> Result<Vec<FileChange>> {
        let mut files = Vec::new();
        let mut page = 1u32;
        loop {
            let resp = self
                .get(&format!("/repos/{repo}/pulls/{pr_number}/files"))
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await?;
            let resp = Self::check(resp, "list changed files").await?;
            let batch: Vec<FileChange> = resp.json().await?;
            let more = has_more_pages(batch.len());
            files.extend(batch);
            if !more {
                return Ok(files);
            }
            page += 1;
        }
    }

    async fn list_existing_review_comments(
        &self,
        repo: &str,
        pr_number: u64,
    ) -> Result<Vec<ExistingComment>> {
        let mut comments = Vec::new();
        let mut page = 1u32;
        loop {
            let resp = self
                .get(&format!("/repos/{repo}/pulls/{pr_number}/comments"))
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await?;
            let resp = Self::check(resp, "list review comments").await?;

            // GitHub reports the anchored line as `line` (or
            // `original_line` for outdated comments); tolerate either.
            let raw: Vec<serde_json::Value> = resp.json().await?;
            let more = has_more_pages(raw.len());
            comments.extend(raw.into_iter().filter_map(|c| {
                let path = c.get("path")?.as_str()?.to_string();
                let line = c
                    .get("line")
                    .and_then(|v| v.as_u64())
                    .or_else(|| c.get("original_line").and_then(|v| v.as_u64()))?
                    as u32;
                let body = c.get("body")?.as_str()?.to_string();
                Some(ExistingComment { path, line, body })
            }));
            if !more {
                return Ok(comments);
            }
            page += 1;
        }
    }

    async fn submit_review(
        &self,
        repo: &str,
        pr_number: u64,
        event: ReviewEvent,
        body: &str,
        comments: &[InlineComment],
    ) -> Result<String> {
        let mut req_body = json!({
            "event": event.as_str(),
            "body": body,
        });
        if !comments.is_empty() {
            req_body["comments"] = json!(comments);
        }

        let resp = self
            .post(&format!("/repos/{repo}/pulls/{pr_number}/reviews"))
            .json(&req_body)
            .send()
            .await?;
        let resp = Self::check(resp, "submit review").await?;

        let review: serde_json::Value = resp.json().await?;
        let id = review
            .get("id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ReviewError::ExternalApi("review response missing id".to_string()))?;
        Ok(id.to_string())
    }

    async fn request_reviewers(
        &self,
        repo: &str,
        pr_number: u64,
        usernames: &[String],
    ) -> Result<()> {
        if usernames.is_empty() {
            return Ok(());
        }
        let resp = self
            .post(&format!("/repos/{repo}/pulls/{pr_number}/requested_reviewers"))
            .json(&json!({ "reviewers": usernames }))
            .send()
            .await?;
        Self::check(resp, "request reviewers").await?;
        Ok(())
    }

    async fn authenticated_user(&self) -> Result<String> {
        let resp = self.get("/user").send().await?;
        let resp = Self::check(resp, "get authenticated user").await?;
        let user: serde_json::Value = resp.json().await?;
        user.get("login")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ReviewError::ExternalApi("user response missing login".to_string()))
    }
}
