// src/review/aggregate.rs

//! Pure aggregation of per-file violations into an approve /
//! request-changes decision plus a human-readable summary.

use crate::review::types::{ReviewDecision, Severity, Violation};

/// Zero tolerance: any error-severity violation blocks approval. This is
/// a deliberate product decision, not a tunable.
pub fn decide(violations: Vec<Violation>, files_analyzed: u32, total_files: u32) -> ReviewDecision {
    let errors = violations.iter().filter(|v| v.severity == Severity::Error).count();
    let warnings = violations.iter().filter(|v| v.severity == Severity::Warning).count();
    let approve = errors == 0;

    let summary = build_summary(approve, errors, warnings, files_analyzed);

    ReviewDecision { approve, violations, summary, files_analyzed, total_files }
}

fn build_summary(approve: bool, errors: usize, warnings: usize, files_analyzed: u32) -> String {
    let emoji = if approve { "✅" } else { "❌" };
    let decision = if approve { "Approved" } else { "Changes Requested" };

    let mut summary = format!("## {emoji} Automated Code Review\n\n");
    summary.push_str(&format!("**Decision**: {decision}\n\n"));
    summary.push_str(&format!("**Files analyzed**: {files_analyzed}\n"));
    summary.push_str(&format!("**Errors**: {errors}\n"));
    summary.push_str(&format!("**Warnings**: {warnings}\n\n"));

    if approve {
        summary.push_str("✨ All changes comply with the coding rules. Nice work!\n");
    } else {
        summary.push_str(
            "⚠️ Some changes violate the coding rules. Please check the inline comments.\n",
        );
    }

    summary.push_str("\n---\n");
    summary.push_str("_This review was generated automatically by prbot_");
    summary
}
