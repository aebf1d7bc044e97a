// End-to-end review runs against mock collaborators: no network, no
// model, no live Qdrant. The mocks speak the same traits production
// components do.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};

use prbot::config::BotConfig;
use prbot::error::{Result, ReviewError};
use prbot::github::{CodeHost, ReviewEvent};
use prbot::llm::{ChatClient, ChatMessage, EmbeddingClient};
use prbot::rag::RuleRetriever;
use prbot::review::orchestrator::ReviewState;
use prbot::review::types::{
    ExistingComment, FileChange, FileStatus, InlineComment, PullRequestInfo, Severity,
    ViolationType,
};
use prbot::review::{ReviewOrchestrator, ViolationDetector};
use prbot::store::ReviewStore;
use prbot::vector::{SearchHit, VectorIndex, VectorPoint};

// ── Mock collaborators ────────────────────────────────────────────────

struct FixedEmbedder;

#[async_trait]
impl EmbeddingClient for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.1; 8])
    }
}

/// Vector index returning preconfigured rule hits.
struct StaticIndex {
    hits: Vec<SearchHit>,
}

impl StaticIndex {
    fn empty() -> Self {
        Self { hits: Vec::new() }
    }

    fn with_rule(score: f32, title: &str, text: &str) -> Self {
        Self {
            hits: vec![SearchHit {
                score,
                payload: json!({ "text": text, "title": title, "url": "" }),
            }],
        }
    }
}

#[async_trait]
impl VectorIndex for StaticIndex {
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
        _l: usize,
        _f: Option<(&str, &str)>,
    ) -> Result<Vec<SearchHit>> {
        Ok(self.hits.clone())
    }
    async fn delete_by_tag(&self, _c: &str, _k: &str, _v: &str) -> Result<u64> {
        Ok(0)
    }
}

/// Chat model returning a canned response.
struct ScriptedChat {
    response: String,
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        Ok(self.response.clone())
    }
}

#[derive(Debug)]
struct SubmittedReview {
    event: ReviewEvent,
    body: String,
    comments: Vec<InlineComment>,
}

/// Code host serving configured files/comments and recording submits.
struct MockHost {
    files: Vec<FileChange>,
    existing_comments: Vec<ExistingComment>,
    me: String,
    fail_listing: bool,
    submitted: Mutex<Vec<SubmittedReview>>,
    requested_reviewers: Mutex<Vec<String>>,
}

impl MockHost {
    fn new(files: Vec<FileChange>) -> Self {
        Self {
            files,
            existing_comments: Vec::new(),
            me: "prbot-svc".to_string(),
            fail_listing: false,
            submitted: Mutex::new(Vec::new()),
            requested_reviewers: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CodeHost for MockHost {
    async fn list_changed_files(&self, _repo: &str, _pr: u64) -> Result<Vec<FileChange>> {
        if self.fail_listing {
            return Err(ReviewError::ExternalApi("listing unavailable".to_string()));
        }
        Ok(self.files.clone())
    }

    async fn list_existing_review_comments(
        &self,
        _repo: &str,
        _pr: u64,
    ) -> Result<Vec<ExistingComment>> {
        Ok(self.existing_comments.clone())
    }

    async fn submit_review(
        &self,
        _repo: &str,
        _pr: u64,
        event: ReviewEvent,
        body: &str,
        comments: &[InlineComment],
    ) -> Result<String> {
        self.submitted.lock().unwrap().push(SubmittedReview {
            event,
            body: body.to_string(),
            comments: comments.to_vec(),
        });
        Ok("42".to_string())
    }

    async fn request_reviewers(&self, _repo: &str, _pr: u64, usernames: &[String]) -> Result<()> {
        self.requested_reviewers.lock().unwrap().extend_from_slice(usernames);
        Ok(())
    }

    async fn authenticated_user(&self) -> Result<String> {
        Ok(self.me.clone())
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────

const SECRET_PATCH: &str = "\
@@ -1,2 +1,3 @@
 const db = connect();
+password = \"x\"
 export default db;";

const CLEAN_PATCH: &str = "\
@@ -1,1 +1,2 @@
 fn add(a: i32, b: i32) -> i32 { a + b }
+fn sub(a: i32, b: i32) -> i32 { a - b }";

fn file(path: &str, patch: &str) -> FileChange {
    FileChange {
        path: path.to_string(),
        status: FileStatus::Modified,
        patch: Some(patch.to_string()),
        additions: 1,
        deletions: 0,
    }
}

fn pull_request() -> PullRequestInfo {
    PullRequestInfo {
        repository: "org/repo".to_string(),
        number: 7,
        title: "Add database config".to_string(),
        body: String::new(),
        author: "alice".to_string(),
        source_branch: "feature".to_string(),
        target_branch: "main".to_string(),
        state: "open".to_string(),
        changed_files: 2,
        additions: 2,
        deletions: 0,
    }
}

fn build_orchestrator(
    host: Arc<MockHost>,
    index: StaticIndex,
    chat_response: &str,
    config: &BotConfig,
    store: ReviewStore,
) -> ReviewOrchestrator {
    let retriever = Arc::new(RuleRetriever::new(
        Arc::new(FixedEmbedder),
        Arc::new(index),
        config,
    ));
    let detector = Arc::new(ViolationDetector::new(
        retriever,
        Arc::new(ScriptedChat { response: chat_response.to_string() }),
        config,
    ));
    ReviewOrchestrator::new(detector, host, store, config)
}

async fn orchestrator_with(
    host: Arc<MockHost>,
    index: StaticIndex,
    chat_response: &str,
    config: &BotConfig,
) -> ReviewOrchestrator {
    let store = ReviewStore::new("sqlite::memory:").await.unwrap();
    build_orchestrator(host, index, chat_response, config, store)
}

/// File-backed store whose schema a second connection can break, to
/// exercise persistence failures mid-run.
async fn file_backed_store(name: &str) -> (ReviewStore, String) {
    let path = std::env::temp_dir().join(name);
    let _ = std::fs::remove_file(&path);
    let url = format!("sqlite:{}?mode=rwc", path.display());
    let store = ReviewStore::new(&url).await.unwrap();
    (store, url)
}

// ── Tests ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn secret_in_one_of_two_files_requests_changes() {
    let host = Arc::new(MockHost::new(vec![
        file("src/db.ts", SECRET_PATCH),
        file("src/math.rs", CLEAN_PATCH),
    ]));
    let config = BotConfig::for_tests();
    let orchestrator = orchestrator_with(host.clone(), StaticIndex::empty(), "[]", &config).await;

    let outcome = orchestrator.run(&pull_request()).await.unwrap();

    assert!(!outcome.decision.approve);
    assert_eq!(outcome.decision.files_analyzed, 2);
    assert_eq!(outcome.decision.total_files, 2);
    assert_eq!(outcome.decision.violations.len(), 1);

    let violation = &outcome.decision.violations[0];
    assert_eq!(violation.violation_type, ViolationType::Security);
    assert_eq!(violation.severity, Severity::Error);
    // `password = "x"` is the second line of the new file.
    assert_eq!(violation.line_number, 2);

    let submitted = host.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].event, ReviewEvent::RequestChanges);
    assert!(submitted[0].body.contains("Changes Requested"));
    assert_eq!(submitted[0].comments.len(), 1);
    // Header is position 1, context 2; the added secret sits at 3.
    assert_eq!(submitted[0].comments[0].position, 3);
    assert!(submitted[0].comments[0].body.starts_with("**[security]**"));
}

#[tokio::test]
async fn repeated_run_suppresses_duplicate_comment() {
    let mut host = MockHost::new(vec![file("src/db.ts", SECRET_PATCH)]);
    host.existing_comments = vec![ExistingComment {
        path: "src/db.ts".to_string(),
        line: 2,
        body: "**[security]** Hardcoded credential detected.".to_string(),
    }];
    let host = Arc::new(host);
    let config = BotConfig::for_tests();
    let orchestrator = orchestrator_with(host.clone(), StaticIndex::empty(), "[]", &config).await;

    let outcome = orchestrator.run(&pull_request()).await.unwrap();

    // The violation still blocks approval; only the comment is suppressed.
    assert!(!outcome.decision.approve);
    assert_eq!(outcome.suppressed_duplicates, 1);
    assert_eq!(outcome.inline_comments, 0);

    let submitted = host.submitted.lock().unwrap();
    assert!(submitted[0].comments.is_empty());
}

#[tokio::test]
async fn clean_pr_is_approved() {
    let host = Arc::new(MockHost::new(vec![file("src/math.rs", CLEAN_PATCH)]));
    let config = BotConfig::for_tests();
    let orchestrator = orchestrator_with(host.clone(), StaticIndex::empty(), "[]", &config).await;

    let outcome = orchestrator.run(&pull_request()).await.unwrap();

    assert!(outcome.decision.approve);
    assert_eq!(outcome.event, ReviewEvent::Approve);
    assert_eq!(host.submitted.lock().unwrap()[0].event, ReviewEvent::Approve);
}

#[tokio::test]
async fn self_authored_approval_downgrades_to_comment() {
    let mut host = MockHost::new(vec![file("src/math.rs", CLEAN_PATCH)]);
    host.me = "alice".to_string(); // same as PR author
    let host = Arc::new(host);
    let config = BotConfig::for_tests();
    let orchestrator = orchestrator_with(host.clone(), StaticIndex::empty(), "[]", &config).await;

    let outcome = orchestrator.run(&pull_request()).await.unwrap();

    assert_eq!(outcome.event, ReviewEvent::Comment);
    assert!(outcome.decision.summary.contains("neutral comment"));
    assert_eq!(host.submitted.lock().unwrap()[0].event, ReviewEvent::Comment);
}

#[tokio::test]
async fn diff_fetch_failure_is_fatal() {
    let mut host = MockHost::new(Vec::new());
    host.fail_listing = true;
    let host = Arc::new(host);
    let config = BotConfig::for_tests();
    let orchestrator = orchestrator_with(host.clone(), StaticIndex::empty(), "[]", &config).await;

    let failure = orchestrator.run(&pull_request()).await.unwrap_err();
    assert_eq!(failure.state, ReviewState::FetchingDiff);
    assert!(failure.decision.is_none());
    assert!(host.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pr_persistence_failure_is_fatal() {
    let (store, url) = file_backed_store("prbot_pr_table_gone.db").await;
    let pool = sqlx::sqlite::SqlitePool::connect(&url).await.unwrap();
    sqlx::query("DROP TABLE pull_requests").execute(&pool).await.unwrap();

    let host = Arc::new(MockHost::new(vec![file("src/math.rs", CLEAN_PATCH)]));
    let config = BotConfig::for_tests();
    let orchestrator =
        build_orchestrator(host.clone(), StaticIndex::empty(), "[]", &config, store);

    let failure = orchestrator.run(&pull_request()).await.unwrap_err();
    assert_eq!(failure.state, ReviewState::PersistingPr);
    assert!(host.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn violation_persistence_failure_still_submits() {
    let (store, url) = file_backed_store("prbot_violations_table_gone.db").await;
    let pool = sqlx::sqlite::SqlitePool::connect(&url).await.unwrap();
    sqlx::query("DROP TABLE violations").execute(&pool).await.unwrap();

    let host = Arc::new(MockHost::new(vec![file("src/db.ts", SECRET_PATCH)]));
    let config = BotConfig::for_tests();
    let orchestrator =
        build_orchestrator(host.clone(), StaticIndex::empty(), "[]", &config, store);

    // The in-memory violations still drive the decision and submission.
    let outcome = orchestrator.run(&pull_request()).await.unwrap();
    assert!(!outcome.decision.approve);
    assert_eq!(outcome.decision.violations.len(), 1);

    let submitted = host.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].event, ReviewEvent::RequestChanges);
}

#[tokio::test]
async fn stored_summary_matches_submitted_summary() {
    let (store, url) = file_backed_store("prbot_summary_sync.db").await;

    let mut host = MockHost::new(vec![file("src/math.rs", CLEAN_PATCH)]);
    host.me = "alice".to_string(); // forces the downgrade note
    let host = Arc::new(host);
    let config = BotConfig::for_tests();
    let orchestrator =
        build_orchestrator(host.clone(), StaticIndex::empty(), "[]", &config, store);

    orchestrator.run(&pull_request()).await.unwrap();

    let pool = sqlx::sqlite::SqlitePool::connect(&url).await.unwrap();
    let row = sqlx::query(
        "SELECT review_summary FROM pull_requests WHERE repository = ? AND pr_number = ?",
    )
    .bind("org/repo")
    .bind(7i64)
    .fetch_one(&pool)
    .await
    .unwrap();
    let stored: String = sqlx::Row::get(&row, "review_summary");

    let submitted = host.submitted.lock().unwrap();
    assert_eq!(stored, submitted[0].body);
    assert!(stored.contains("neutral comment"));
}

#[tokio::test]
async fn malformed_patch_skips_only_that_file() {
    let host = Arc::new(MockHost::new(vec![
        file("broken.ts", "+content before any hunk header"),
        file("src/db.ts", SECRET_PATCH),
    ]));
    let config = BotConfig::for_tests();
    let orchestrator = orchestrator_with(host.clone(), StaticIndex::empty(), "[]", &config).await;

    let outcome = orchestrator.run(&pull_request()).await.unwrap();

    // The unusable diff reduces files_analyzed but never aborts the run.
    assert_eq!(outcome.decision.files_analyzed, 1);
    assert_eq!(outcome.decision.violations.len(), 1);
}

#[tokio::test]
async fn removed_and_patchless_files_are_skipped() {
    let host = Arc::new(MockHost::new(vec![
        FileChange {
            path: "gone.ts".to_string(),
            status: FileStatus::Removed,
            patch: Some(CLEAN_PATCH.to_string()),
            additions: 0,
            deletions: 5,
        },
        FileChange {
            path: "image.png".to_string(),
            status: FileStatus::Added,
            patch: None,
            additions: 0,
            deletions: 0,
        },
    ]));
    let config = BotConfig::for_tests();
    let orchestrator = orchestrator_with(host.clone(), StaticIndex::empty(), "[]", &config).await;

    let outcome = orchestrator.run(&pull_request()).await.unwrap();
    assert_eq!(outcome.decision.files_analyzed, 0);
    assert_eq!(outcome.decision.total_files, 2);
    assert!(outcome.decision.approve);
}

#[tokio::test]
async fn model_violations_flow_through_when_rules_clear_the_bar() {
    // A rule scores above the 0.5 bar, so the chat capability runs and
    // reports a documentation violation on the added line.
    let index = StaticIndex::with_rule(0.8, "Docs required", "Every public fn needs a doc comment");
    let chat_response = r#"```json
[{"violated": true, "lineNumber": 2, "type": "documentation", "severity": "warning",
  "message": "Missing doc comment", "suggestion": "Document sub()",
  "ruleReference": "Docs required", "confidence": 0.6}]
```"#;
    let host = Arc::new(MockHost::new(vec![file("src/math.rs", CLEAN_PATCH)]));
    let config = BotConfig::for_tests();
    let orchestrator = orchestrator_with(host.clone(), index, chat_response, &config).await;

    let outcome = orchestrator.run(&pull_request()).await.unwrap();

    // A warning alone does not block approval.
    assert!(outcome.decision.approve);
    assert_eq!(outcome.decision.violations.len(), 1);
    assert_eq!(outcome.decision.violations[0].violation_type, ViolationType::Documentation);

    let submitted = host.submitted.lock().unwrap();
    assert_eq!(submitted[0].comments.len(), 1);
    assert!(submitted[0].comments[0].body.contains("Missing doc comment"));
}

#[tokio::test]
async fn unparsable_model_output_degrades_to_pattern_results() {
    let index = StaticIndex::with_rule(0.8, "Rules", "Some rule text");
    let host = Arc::new(MockHost::new(vec![file("src/db.ts", SECRET_PATCH)]));
    let config = BotConfig::for_tests();
    let orchestrator =
        orchestrator_with(host.clone(), index, "The code mostly looks fine to me!", &config).await;

    let outcome = orchestrator.run(&pull_request()).await.unwrap();

    // Pattern check still found the secret; the model response was noise.
    assert_eq!(outcome.decision.violations.len(), 1);
    assert_eq!(outcome.decision.violations[0].violation_type, ViolationType::Security);
    assert_eq!(outcome.decision.files_analyzed, 1);
}

#[tokio::test]
async fn reviewers_requested_without_author() {
    let mut config = BotConfig::for_tests();
    config.default_reviewers = vec!["alice".to_string(), "bob".to_string()];
    let host = Arc::new(MockHost::new(vec![file("src/math.rs", CLEAN_PATCH)]));
    let orchestrator = orchestrator_with(host.clone(), StaticIndex::empty(), "[]", &config).await;

    orchestrator.run(&pull_request()).await.unwrap();

    // alice authored the PR, so only bob is requested.
    assert_eq!(host.requested_reviewers.lock().unwrap().as_slice(), &["bob".to_string()]);
}
