// src/review/detector.rs

//! Per-file violation detection: fast pattern checks plus a
//! retrieval-augmented model pass. A failure analyzing one file is the
//! caller's problem to isolate; this module only guarantees that an
//! unparsable model response degrades to zero AI violations instead of
//! failing the file.

use crate::config::BotConfig;
use crate::diff;
use crate::error::{ReviewError, Result};
use crate::llm::{ChatClient, ChatMessage};
use crate::rag::{RuleChunk, RuleRetriever};
use crate::review::patterns;
use crate::review::types::{FileChange, Severity, Violation, ViolationType};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ViolationDetector {
    retriever: Arc<RuleRetriever>,
    chat: Arc<dyn ChatClient>,
    rule_min_score: f32,
    query_snippet_chars: usize,
    prompt_snippet_chars: usize,
}

/// One entry of the strict-JSON array the model is asked to return.
#[derive(Debug, Deserialize)]
struct ModelViolation {
    violated: bool,
    #[serde(rename = "lineNumber", default)]
    line_number: u32,
    #[serde(rename = "type", default)]
    violation_type: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(rename = "ruleReference", default)]
    rule_reference: Option<String>,
    #[serde(rename = "ruleUrl", default)]
    rule_url: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

impl ViolationDetector {
    pub fn new(
        retriever: Arc<RuleRetriever>,
        chat: Arc<dyn ChatClient>,
        config: &BotConfig,
    ) -> Self {
        Self {
            retriever,
            chat,
            rule_min_score: config.rule_min_score,
            query_snippet_chars: config.query_snippet_chars,
            prompt_snippet_chars: config.prompt_snippet_chars,
        }
    }

    /// Analyze one file's patch. Errors here abort only this file.
    pub async fn analyze_file(&self, file: &FileChange) -> Result<Vec<Violation>> {
        let patch = match &file.patch {
            Some(p) => p,
            None => return Ok(Vec::new()),
        };

        let added = diff::added_lines(patch)?;
        let mut violations = patterns::check_added_lines(&file.path, &added);

        // The model pass degrades to nothing on failure; pattern results
        // stand on their own.
        match self.model_analysis(file, &added).await {
            Ok(ai_violations) => violations.extend(ai_violations),
            Err(e) => warn!(path = %file.path, "AI analysis failed: {e}"),
        }

        Ok(violations)
    }

    async fn model_analysis(
        &self,
        file: &FileChange,
        added: &[diff::AddedLine],
    ) -> Result<Vec<Violation>> {
        let added_text: String =
            added.iter().map(|l| l.content.as_str()).collect::<Vec<_>>().join("\n");
        if added_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let extension = file.path.rsplit('.').next().unwrap_or("").to_lowercase();
        let language = language_context(&extension);

        let query = format!(
            "File: {}\nLanguage: {}\nChanged code:\n{}",
            file.path,
            language,
            truncate_chars(&added_text, self.query_snippet_chars),
        );

        let rules = self.retriever.retrieve(&query, None, self.rule_min_score).await?;
        if rules.is_empty() {
            // No rule cleared the similarity bar: insufficient evidence,
            // so nothing to ask the model about.
            return Ok(Vec::new());
        }

        info!(
            path = %file.path,
            rules = rules.len(),
            avg_score = rules.iter().map(|r| r.similarity_score).sum::<f32>() / rules.len() as f32,
            "retrieved relevant rules"
        );

        let prompt = build_review_prompt(
            file,
            &language,
            &fence_language(&extension),
            &truncate_chars(&added_text, self.prompt_snippet_chars),
            &rules,
        );

        let messages = [
            ChatMessage::system(
                "You are an expert code reviewer. Review code against the provided rule \
                 documents and identify violations precisely and concretely.",
            ),
            ChatMessage::user(prompt),
        ];
        let response = self.chat.complete(&messages).await?;

        match parse_model_violations(&response, &file.path) {
            Ok(violations) => {
                if !violations.is_empty() {
                    info!(path = %file.path, count = violations.len(), "model reported violations");
                }
                Ok(violations)
            }
            Err(e) => {
                // Degrade rather than fail the file over model formatting.
                warn!(path = %file.path, "could not parse model response: {e}");
                Ok(Vec::new())
            }
        }
    }
}

fn build_review_prompt(
    file: &FileChange,
    language: &str,
    fence: &str,
    snippet: &str,
    rules: &[RuleChunk],
) -> String {
    let rule_sections: String = rules
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            let url = if r.source_url.is_empty() {
                String::new()
            } else {
                format!(" ({})", r.source_url)
            };
            format!(
                "### {}. {}{}\nSimilarity: {:.1}%\n{}",
                idx + 1,
                r.title,
                url,
                r.similarity_score * 100.0,
                r.text,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Review the code change below against the rule documents.

## Rule documents
{rule_sections}

## Change under review
- **File**: {path}
- **Language**: {language}
- **Added code**:
```{fence}
{snippet}
```

## Instructions
1. Check the change against the rule documents above.
2. Flag a violation only when it is clear-cut.
3. Explain each violation concretely and suggest a fix.
4. Name the violated rule's title and URL.

## Response format
Respond with a JSON array:
[
  {{
    "violated": true,
    "lineNumber": 123,
    "type": "naming_convention|security|code_quality|documentation|other",
    "severity": "error|warning|info",
    "message": "what is wrong",
    "suggestion": "how to fix it",
    "ruleReference": "violated rule title",
    "ruleUrl": "rule document URL if any",
    "confidence": 0.0
  }}
]

Return the empty array [] when nothing is violated.
**Important**: return only JSON, no other text."#,
        path = file.path,
    )
}

/// Strips a surrounding markdown code fence, if any, leaving the JSON
/// body. Models wrap their output despite instructions often enough
/// that this is the norm, not the exception.
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let inner = trimmed.trim_start_matches("```");
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

fn parse_model_violations(response: &str, file_path: &str) -> Result<Vec<Violation>> {
    let body = strip_code_fences(response);
    let entries: Vec<ModelViolation> = serde_json::from_str(body)
        .map_err(|e| ReviewError::ModelResponse(format!("{e}: {body}")))?;

    let violations = entries
        .into_iter()
        .filter(|v| v.violated)
        .map(|v| {
            let rule_reference = match (v.rule_reference, v.rule_url) {
                (Some(r), Some(u)) if !u.is_empty() => Some(format!("{r} ({u})")),
                (r, _) => r,
            };
            Violation {
                file_path: file_path.to_string(),
                // Diff-relative and approximate; positioning happens
                // against the line-position map later.
                line_number: v.line_number,
                violation_type: ViolationType::from_loose(&v.violation_type),
                severity: Severity::from_loose(&v.severity),
                message: v.message,
                suggestion: v.suggestion,
                rule_reference,
                confidence_score: v.confidence.unwrap_or(0.8),
            }
        })
        .collect();

    Ok(violations)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn language_context(extension: &str) -> String {
    match extension {
        "ts" => "TypeScript",
        "js" => "JavaScript",
        "tsx" => "TypeScript React",
        "jsx" => "JavaScript React",
        "py" => "Python",
        "java" => "Java",
        "go" => "Go",
        "rs" => "Rust",
        "cpp" => "C++",
        "c" => "C",
        "cs" => "C#",
        "php" => "PHP",
        "rb" => "Ruby",
        "swift" => "Swift",
        "kt" => "Kotlin",
        "sql" => "SQL",
        "sh" => "Shell Script",
        "yml" | "yaml" => "YAML",
        "json" => "JSON",
        "md" => "Markdown",
        other => return other.to_uppercase(),
    }
    .to_string()
}

fn fence_language(extension: &str) -> String {
    match extension {
        "ts" => "typescript",
        "js" => "javascript",
        "py" => "python",
        "rs" => "rust",
        "cpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "kt" => "kotlin",
        "sh" => "bash",
        "yml" => "yaml",
        "tsx" | "jsx" | "java" | "go" | "c" | "php" | "swift" | "sql" | "yaml" | "json"
        | "md" => extension,
        _ => "",
    }
    .to_string()
}
