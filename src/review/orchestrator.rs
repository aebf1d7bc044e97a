// src/review/orchestrator.rs

//! Sequences one review run end to end and enforces the per-step
//! failure policy:
//!
//! | step                  | on failure                                  |
//! |-----------------------|---------------------------------------------|
//! | PersistingPr          | fatal                                       |
//! | FetchingDiff          | fatal                                       |
//! | Analyzing (per file)  | non-fatal: skip the file, continue          |
//! | PersistingViolations  | non-fatal: log, continue in memory          |
//! | Deciding              | fatal                                       |
//! | Submitting            | fatal, but the computed decision is handed  |
//! |                       | back so the caller can inspect or retry     |
//!
//! No step retries automatically; transient failures surface once.

use crate::config::BotConfig;
use crate::diff;
use crate::error::ReviewError;
use crate::github::{CodeHost, ReviewEvent};
use crate::review::aggregate;
use crate::review::comments;
use crate::review::detector::ViolationDetector;
use crate::review::types::{
    FileChange, FileStatus, PullRequestInfo, ReviewDecision, Violation,
};
use crate::store::ReviewStore;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Received,
    PersistingPr,
    FetchingDiff,
    Analyzing,
    PersistingViolations,
    Deciding,
    Submitting,
    Done,
    Failed,
}

/// Successful run: the decision that was submitted and the host's id
/// for the created review.
#[derive(Debug)]
pub struct RunOutcome {
    pub decision: ReviewDecision,
    pub event: ReviewEvent,
    pub review_id: String,
    pub inline_comments: usize,
    pub suppressed_duplicates: usize,
}

/// Fatal run failure, tagged with the step that failed. When the run
/// died at submission the computed decision rides along so the caller
/// can retry delivery without re-analyzing.
#[derive(Debug)]
pub struct RunFailure {
    pub state: ReviewState,
    pub error: ReviewError,
    pub decision: Option<ReviewDecision>,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "review failed at {:?}: {}", self.state, self.error)
    }
}

struct FileAnalysis {
    path: String,
    violations: Vec<Violation>,
    position_map: BTreeMap<u32, u32>,
}

pub struct ReviewOrchestrator {
    detector: Arc<ViolationDetector>,
    host: Arc<dyn CodeHost>,
    store: ReviewStore,
    max_files: usize,
    max_concurrent: usize,
    default_reviewers: Vec<String>,
}

impl ReviewOrchestrator {
    pub fn new(
        detector: Arc<ViolationDetector>,
        host: Arc<dyn CodeHost>,
        store: ReviewStore,
        config: &BotConfig,
    ) -> Self {
        Self {
            detector,
            host,
            store,
            max_files: config.max_files_per_review,
            max_concurrent: config.max_concurrent_files,
            default_reviewers: config.default_reviewers.clone(),
        }
    }

    /// Run one review for a pull request, start to finish.
    pub async fn run(&self, pr: &PullRequestInfo) -> Result<RunOutcome, RunFailure> {
        info!(repo = %pr.repository, pr = pr.number, state = ?ReviewState::Received, "review run started");

        // PersistingPr — fatal on failure.
        info!(state = ?ReviewState::PersistingPr, "persisting pull request");
        let pr_id = self.store.upsert_pull_request(pr).await.map_err(|e| {
            self.fail(ReviewState::PersistingPr, e, None)
        })?;

        // FetchingDiff — fatal on failure.
        info!(state = ?ReviewState::FetchingDiff, "fetching changed files");
        let files = self
            .host
            .list_changed_files(&pr.repository, pr.number)
            .await
            .map_err(|e| self.fail(ReviewState::FetchingDiff, e, None))?;
        let total_files = files.len() as u32;
        info!(total = total_files, "changed files fetched");

        // Analyzing — per-file isolation, bounded fan-out.
        info!(state = ?ReviewState::Analyzing, "analyzing files");
        let analyses = self.analyze_files(files).await;
        let files_analyzed = analyses.len() as u32;

        let mut violations = Vec::new();
        let mut position_maps: HashMap<String, BTreeMap<u32, u32>> = HashMap::new();
        for analysis in analyses {
            violations.extend(analysis.violations);
            position_maps.insert(analysis.path, analysis.position_map);
        }

        // PersistingViolations — non-fatal: the in-memory set drives the
        // rest of the run either way.
        info!(state = ?ReviewState::PersistingViolations, count = violations.len(), "persisting violations");
        if let Err(e) = self.store.replace_violations(pr_id, &violations).await {
            warn!("failed to persist violations, continuing in memory: {e}");
        }

        // Deciding — fatal (nothing downstream works without a decision).
        info!(state = ?ReviewState::Deciding, "computing decision");
        let decision = aggregate::decide(violations, files_analyzed, total_files);

        // Position + dedup, then submit — fatal, decision handed back.
        info!(state = ?ReviewState::Submitting, approve = decision.approve, "submitting review");
        let (candidates, unresolved) =
            comments::position_comments(&decision.violations, &position_maps);
        if !unresolved.violations.is_empty() {
            warn!(
                count = unresolved.violations.len(),
                "violations without inline anchors still count toward the decision"
            );
        }

        // Existing-comment query is best-effort: a failure means this run
        // may repeat comments, never that it aborts.
        let existing = match self
            .host
            .list_existing_review_comments(&pr.repository, pr.number)
            .await
        {
            Ok(existing) => existing,
            Err(e) => {
                warn!("could not fetch existing comments, dedup disabled for this run: {e}");
                Vec::new()
            }
        };
        let candidate_count = candidates.len();
        let inline = comments::dedup_against_existing(candidates, &existing);
        let suppressed = candidate_count - inline.len();
        if suppressed > 0 {
            info!(suppressed, "duplicate comments suppressed");
        }

        let (event, decision) = self.resolve_event(pr, decision).await;

        // Persisted after the event is resolved so the stored summary is
        // the one actually sent to the host (downgrade note included).
        let decision_label = if decision.approve { "approved" } else { "changes_requested" };
        if let Err(e) = self.store.record_decision(pr_id, decision_label, &decision.summary).await {
            warn!("failed to persist decision: {e}");
        }

        let review_id = self
            .host
            .submit_review(&pr.repository, pr.number, event, &decision.summary, &inline)
            .await
            .map_err(|e| self.fail(ReviewState::Submitting, e, Some(decision.clone())))?;

        if let Err(e) = self.store.record_host_review_id(pr_id, &review_id).await {
            warn!("failed to persist host review id: {e}");
        }

        // Reviewer assignment never gates the run.
        self.request_reviewers_best_effort(pr).await;

        info!(state = ?ReviewState::Done, review_id = %review_id, "review run finished");
        Ok(RunOutcome {
            decision,
            event,
            review_id,
            inline_comments: inline.len(),
            suppressed_duplicates: suppressed,
        })
    }

    /// Fan out per-file analysis over a bounded worker pool. A file that
    /// fails analysis is skipped; it contributes no violations and does
    /// not count as analyzed.
    async fn analyze_files(&self, files: Vec<FileChange>) -> Vec<FileAnalysis> {
        let eligible: Vec<FileChange> = files
            .into_iter()
            .filter(|f| f.status != FileStatus::Removed && f.patch.is_some())
            .collect();
        if eligible.len() > self.max_files {
            warn!(
                limit = self.max_files,
                skipped = eligible.len() - self.max_files,
                "file cap reached; analyzing the first files only"
            );
        }
        let eligible: Vec<FileChange> = eligible.into_iter().take(self.max_files).collect();

        stream::iter(eligible)
            .map(|file| async move {
                let patch = file.patch.as_deref().unwrap_or_default();
                let position_map = match diff::build_line_position_map(patch) {
                    Ok(map) => map,
                    Err(e) => {
                        error!(path = %file.path, "unusable diff, skipping file: {e}");
                        return None;
                    }
                };
                match self.detector.analyze_file(&file).await {
                    Ok(violations) => Some(FileAnalysis {
                        path: file.path.clone(),
                        violations,
                        position_map,
                    }),
                    Err(e) => {
                        error!(path = %file.path, "failed to analyze file, skipping: {e}");
                        None
                    }
                }
            })
            .buffer_unordered(self.max_concurrent.max(1))
            .filter_map(|result| async move { result })
            .collect()
            .await
    }

    /// An identity cannot approve its own pull request; when the acting
    /// user authored the PR, the approval downgrades to a neutral
    /// comment and the summary says so. The identity lookup itself is
    /// best-effort.
    async fn resolve_event(
        &self,
        pr: &PullRequestInfo,
        mut decision: ReviewDecision,
    ) -> (ReviewEvent, ReviewDecision) {
        if !decision.approve {
            return (ReviewEvent::RequestChanges, decision);
        }
        match self.host.authenticated_user().await {
            Ok(me) if me == pr.author => {
                info!(author = %pr.author, "acting identity authored this PR; downgrading to comment");
                decision
                    .summary
                    .push_str("\n\n_Note: the reviewing identity authored this pull request, so the approval was submitted as a neutral comment._");
                (ReviewEvent::Comment, decision)
            }
            Ok(_) => (ReviewEvent::Approve, decision),
            Err(e) => {
                warn!("could not resolve acting identity, submitting approval as-is: {e}");
                (ReviewEvent::Approve, decision)
            }
        }
    }

    async fn request_reviewers_best_effort(&self, pr: &PullRequestInfo) {
        let reviewers: Vec<String> = self
            .default_reviewers
            .iter()
            .filter(|r| **r != pr.author)
            .cloned()
            .collect();
        if reviewers.is_empty() {
            return;
        }
        if let Err(e) = self.host.request_reviewers(&pr.repository, pr.number, &reviewers).await {
            warn!("failed to request reviewers: {e}");
        }
    }

    fn fail(
        &self,
        state: ReviewState,
        error: ReviewError,
        decision: Option<ReviewDecision>,
    ) -> RunFailure {
        error!(state = ?state, "review run failed: {error}");
        RunFailure { state, error, decision }
    }
}
