// src/store/mod.rs

//! SQLite persistence for pull requests and their violations. Rows are
//! keyed by `(repository, pr_number)`; each run fully replaces the
//! violations for its PR (delete-then-insert inside one transaction, so
//! overlapping runs of the same PR cannot interleave the replace).

use crate::error::Result;
use crate::review::types::{PullRequestInfo, Violation};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

#[derive(Clone)]
pub struct ReviewStore {
    pool: SqlitePool,
}

impl ReviewStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pull_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                repository TEXT NOT NULL,
                pr_number INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL,
                source_branch TEXT NOT NULL,
                target_branch TEXT NOT NULL,
                state TEXT NOT NULL,
                review_decision TEXT NOT NULL DEFAULT 'pending',
                review_summary TEXT,
                host_review_id TEXT,
                files_changed INTEGER NOT NULL DEFAULT 0,
                additions INTEGER NOT NULL DEFAULT 0,
                deletions INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(repository, pr_number)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS violations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pull_request_id INTEGER NOT NULL REFERENCES pull_requests(id),
                file_path TEXT NOT NULL,
                line_number INTEGER NOT NULL,
                violation_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                message TEXT NOT NULL,
                suggestion TEXT,
                rule_reference TEXT,
                confidence_score REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create-or-update the PR row by its `(repository, pr_number)` key;
    /// returns the row id.
    pub async fn upsert_pull_request(&self, pr: &PullRequestInfo) -> Result<i64> {
        sqlx::query(
            r#"
            INSERT INTO pull_requests
                (repository, pr_number, title, description, author,
                 source_branch, target_branch, state,
                 files_changed, additions, deletions, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
            ON CONFLICT(repository, pr_number) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                state = excluded.state,
                files_changed = excluded.files_changed,
                additions = excluded.additions,
                deletions = excluded.deletions,
                updated_at = datetime('now')
            "#,
        )
        .bind(&pr.repository)
        .bind(pr.number as i64)
        .bind(&pr.title)
        .bind(&pr.body)
        .bind(&pr.author)
        .bind(&pr.source_branch)
        .bind(&pr.target_branch)
        .bind(&pr.state)
        .bind(pr.changed_files as i64)
        .bind(pr.additions as i64)
        .bind(pr.deletions as i64)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT id FROM pull_requests WHERE repository = ? AND pr_number = ?")
            .bind(&pr.repository)
            .bind(pr.number as i64)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("id"))
    }

    /// Replace all violations for a PR: delete-all-then-insert in one
    /// transaction.
    pub async fn replace_violations(&self, pr_id: i64, violations: &[Violation]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM violations WHERE pull_request_id = ?")
            .bind(pr_id)
            .execute(&mut *tx)
            .await?;

        for v in violations {
            sqlx::query(
                r#"
                INSERT INTO violations
                    (pull_request_id, file_path, line_number, violation_type,
                     severity, message, suggestion, rule_reference, confidence_score)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(pr_id)
            .bind(&v.file_path)
            .bind(v.line_number as i64)
            .bind(v.violation_type.as_str())
            .bind(v.severity.as_str())
            .bind(&v.message)
            .bind(&v.suggestion)
            .bind(&v.rule_reference)
            .bind(v.confidence_score as f64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Record the decision the run computed; supersedes the prior one.
    pub async fn record_decision(&self, pr_id: i64, decision: &str, summary: &str) -> Result<()> {
        sqlx::query(
            "UPDATE pull_requests SET review_decision = ?, review_summary = ?, \
             updated_at = datetime('now') WHERE id = ?",
        )
        .bind(decision)
        .bind(summary)
        .bind(pr_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record the review id returned by the code host.
    pub async fn record_host_review_id(&self, pr_id: i64, review_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE pull_requests SET host_review_id = ?, updated_at = datetime('now') \
             WHERE id = ?",
        )
        .bind(review_id)
        .bind(pr_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn violation_count(&self, pr_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM violations WHERE pull_request_id = ?")
            .bind(pr_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}
