// src/main.rs

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use prbot::config::BotConfig;
use prbot::github::GitHubClient;
use prbot::llm::OpenAIClient;
use prbot::rag::indexer::{RuleDocument, RuleIndexer};
use prbot::rag::RuleRetriever;
use prbot::review::types::PullRequestInfo;
use prbot::review::{ReviewOrchestrator, ViolationDetector};
use prbot::store::ReviewStore;
use prbot::vector::QdrantStore;

struct AppState {
    orchestrator: ReviewOrchestrator,
    indexer: RuleIndexer,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    config.validate()?;
    info!("Starting prbot review service");

    let store = ReviewStore::new(&config.database_url).await?;
    let openai = Arc::new(OpenAIClient::new(&config)?);
    let qdrant = Arc::new(QdrantStore::new(&config)?);
    let github = Arc::new(GitHubClient::new(&config)?);

    let retriever = Arc::new(RuleRetriever::new(openai.clone(), qdrant.clone(), &config));
    let detector = Arc::new(ViolationDetector::new(retriever, openai.clone(), &config));
    let orchestrator = ReviewOrchestrator::new(detector, github, store, &config);
    let indexer = RuleIndexer::new(openai, qdrant, &config);

    let state = Arc::new(AppState { orchestrator, indexer });

    let app = Router::new()
        .route("/health", get(health))
        .route("/webhook/github", post(github_webhook))
        .route("/rules/index", post(index_rules))
        .with_state(state);

    let bind_address = config.bind_address();
    info!("Listening on {bind_address}");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ── GitHub webhook payload (the fields the workflow needs)

#[derive(Deserialize)]
struct WebhookPayload {
    action: String,
    pull_request: WebhookPullRequest,
    repository: WebhookRepository,
}

#[derive(Deserialize)]
struct WebhookPullRequest {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    user: WebhookUser,
    head: WebhookRef,
    base: WebhookRef,
    state: String,
    #[serde(default)]
    changed_files: u32,
    #[serde(default)]
    additions: u32,
    #[serde(default)]
    deletions: u32,
}

#[derive(Deserialize)]
struct WebhookUser {
    login: String,
}

#[derive(Deserialize)]
struct WebhookRef {
    #[serde(rename = "ref")]
    branch: String,
}

#[derive(Deserialize)]
struct WebhookRepository {
    full_name: String,
}

/// Accepts the PR webhook and runs the review in the background; the
/// delivery is acknowledged immediately. Signature verification is the
/// deployment's reverse proxy's job, not ours.
async fn github_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WebhookPayload>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !matches!(payload.action.as_str(), "opened" | "synchronize" | "reopened") {
        return (
            StatusCode::OK,
            Json(json!({ "status": "ignored", "action": payload.action })),
        );
    }

    let pr = PullRequestInfo {
        repository: payload.repository.full_name,
        number: payload.pull_request.number,
        title: payload.pull_request.title,
        body: payload.pull_request.body.unwrap_or_default(),
        author: payload.pull_request.user.login,
        source_branch: payload.pull_request.head.branch,
        target_branch: payload.pull_request.base.branch,
        state: payload.pull_request.state,
        changed_files: payload.pull_request.changed_files,
        additions: payload.pull_request.additions,
        deletions: payload.pull_request.deletions,
    };

    info!(repo = %pr.repository, pr = pr.number, "webhook accepted");
    let repo = pr.repository.clone();
    let number = pr.number;

    tokio::spawn(async move {
        match state.orchestrator.run(&pr).await {
            Ok(outcome) => info!(
                repo = %pr.repository,
                pr = pr.number,
                event = outcome.event.as_str(),
                comments = outcome.inline_comments,
                "review submitted"
            ),
            Err(failure) => error!(repo = %pr.repository, pr = pr.number, "{failure}"),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "repository": repo, "pr": number })),
    )
}

// ── Rule-document ingestion

#[derive(Deserialize)]
struct IndexRequest {
    documents: Vec<IndexDocument>,
}

#[derive(Deserialize)]
struct IndexDocument {
    #[serde(default)]
    doc_id: Option<String>,
    title: String,
    #[serde(default)]
    url: String,
    text: String,
}

async fn index_rules(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IndexRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let docs: Vec<RuleDocument> = request
        .documents
        .into_iter()
        .map(|d| RuleDocument {
            doc_id: d.doc_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            title: d.title,
            url: d.url,
            text: d.text,
        })
        .collect();

    let outcome = state.indexer.index_documents(&docs).await;
    if outcome.documents_failed > 0 {
        warn!(failed = outcome.documents_failed, "some rule documents failed to index");
    }

    (StatusCode::OK, Json(json!(outcome)))
}
