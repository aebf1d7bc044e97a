// src/review/types.rs

//! Data model for one review run. Everything here is created and
//! discarded within a single run; only the persisted PR/violation rows
//! outlive it (owned by the store).

use serde::{Deserialize, Serialize};

/// One modified file in a pull request, as reported by the code host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    #[serde(alias = "filename")]
    pub path: String,
    pub status: FileStatus,
    /// Unified-diff text; absent for binary or removed files.
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    NamingConvention,
    Security,
    CodeQuality,
    Documentation,
    CommitMessage,
    Other,
}

impl ViolationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::NamingConvention => "naming_convention",
            ViolationType::Security => "security",
            ViolationType::CodeQuality => "code_quality",
            ViolationType::Documentation => "documentation",
            ViolationType::CommitMessage => "commit_message",
            ViolationType::Other => "other",
        }
    }

    /// Strict mapping: `None` for anything that is not one of our tags.
    pub fn from_tag(s: &str) -> Option<Self> {
        match s {
            "naming_convention" => Some(ViolationType::NamingConvention),
            "security" => Some(ViolationType::Security),
            "code_quality" => Some(ViolationType::CodeQuality),
            "documentation" => Some(ViolationType::Documentation),
            "commit_message" => Some(ViolationType::CommitMessage),
            "other" => Some(ViolationType::Other),
            _ => None,
        }
    }

    /// Lenient mapping for model output; unknown strings become `Other`.
    pub fn from_loose(s: &str) -> Self {
        Self::from_tag(s).unwrap_or(ViolationType::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    /// Lenient mapping for model output; unknown strings become `Warning`.
    pub fn from_loose(s: &str) -> Self {
        match s {
            "error" => Severity::Error,
            "info" => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

/// One detected issue. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub file_path: String,
    /// Post-change line number; 0 means unanchored.
    pub line_number: u32,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub message: String,
    pub suggestion: Option<String>,
    pub rule_reference: Option<String>,
    pub confidence_score: f32,
}

/// Aggregate result of one run; supersedes (never merges with) the prior
/// decision for the same pull request.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewDecision {
    pub approve: bool,
    pub violations: Vec<Violation>,
    pub summary: String,
    pub files_analyzed: u32,
    pub total_files: u32,
}

/// A previously posted review comment, read once per run for dedup.
#[derive(Debug, Clone, Deserialize)]
pub struct ExistingComment {
    pub path: String,
    pub line: u32,
    pub body: String,
}

/// An inline comment candidate ready for the code host: `position` is
/// the 1-based diff position, not the file line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineComment {
    pub path: String,
    pub position: u32,
    pub body: String,
    /// Kept for dedup against existing comments; not sent to the host.
    #[serde(skip)]
    pub line_number: u32,
    #[serde(skip)]
    pub violation_type: ViolationType,
}

/// Pull-request metadata carried through the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub repository: String,
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub author: String,
    pub source_branch: String,
    pub target_branch: String,
    pub state: String,
    #[serde(default)]
    pub changed_files: u32,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
}
