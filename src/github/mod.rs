// src/github/mod.rs

//! Code-host capability. The orchestrator only ever talks to this
//! trait; the GitHub REST implementation lives in `client`.

pub mod client;

pub use client::GitHubClient;

use crate::error::Result;
use crate::review::types::{ExistingComment, FileChange, InlineComment};
use async_trait::async_trait;

/// Review action submitted to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEvent {
    Approve,
    RequestChanges,
    /// Neutral action used when the acting identity cannot approve
    /// (e.g. it authored the pull request).
    Comment,
}

impl ReviewEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewEvent::Approve => "APPROVE",
            ReviewEvent::RequestChanges => "REQUEST_CHANGES",
            ReviewEvent::Comment => "COMMENT",
        }
    }
}

#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Changed files of a pull request, including unified-diff patches.
    async fn list_changed_files(&self, repo: &str, pr_number: u64) -> Result<Vec<FileChange>>;

    /// Previously posted inline review comments, for dedup.
    async fn list_existing_review_comments(
        &self,
        repo: &str,
        pr_number: u64,
    ) -> Result<Vec<ExistingComment>>;

    /// Submit the review; returns the host's review id.
    async fn submit_review(
        &self,
        repo: &str,
        pr_number: u64,
        event: ReviewEvent,
        body: &str,
        comments: &[InlineComment],
    ) -> Result<String>;

    /// Best-effort reviewer assignment.
    async fn request_reviewers(&self, repo: &str, pr_number: u64, usernames: &[String])
        -> Result<()>;

    /// Login of the identity this client acts as.
    async fn authenticated_user(&self) -> Result<String>;
}
