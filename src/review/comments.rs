// src/review/comments.rs

//! Converts violations into inline review comments anchored at diff
//! positions, and suppresses comments that duplicate ones already
//! posted on the pull request.

use crate::review::types::{ExistingComment, InlineComment, Violation, ViolationType};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

/// Violations that could not be anchored to a diff position. They still
/// count toward the decision and summary; they are just never emitted
/// inline.
#[derive(Debug, Default)]
pub struct Unresolved {
    pub violations: Vec<Violation>,
}

/// Builds inline comment candidates for every violation that resolves to
/// a position through its file's line-position map.
pub fn position_comments(
    violations: &[Violation],
    position_maps: &HashMap<String, BTreeMap<u32, u32>>,
) -> (Vec<InlineComment>, Unresolved) {
    let mut comments = Vec::new();
    let mut unresolved = Unresolved::default();

    for violation in violations {
        let position = position_maps
            .get(&violation.file_path)
            .and_then(|map| map.get(&violation.line_number))
            .copied();

        match position {
            Some(position) if violation.line_number > 0 => comments.push(InlineComment {
                path: violation.file_path.clone(),
                position,
                body: comment_body(violation),
                line_number: violation.line_number,
                violation_type: violation.violation_type,
            }),
            _ => {
                // Surface the loss; a silently dropped violation would be
                // invisible in the final review.
                warn!(
                    path = %violation.file_path,
                    line = violation.line_number,
                    "violation has no resolvable diff position; kept out of inline comments"
                );
                unresolved.violations.push(violation.clone());
            }
        }
    }

    (comments, unresolved)
}

fn comment_body(violation: &Violation) -> String {
    let mut body = format!(
        "**[{}]** {}",
        violation.violation_type.as_str(),
        violation.message
    );
    if let Some(suggestion) = &violation.suggestion {
        body.push_str(&format!("\n\n💡 Suggestion: {suggestion}"));
    }
    if let Some(reference) = &violation.rule_reference {
        body.push_str(&format!("\n\n📚 Reference: {reference}"));
    }
    body
}

/// Extracts the `[type]` tag from the start of a comment body, tolerant
/// of bold markers. Only our own tags count; a human's `[note]` or
/// similar must never suppress a candidate.
fn extract_type_tag(body: &str) -> Option<ViolationType> {
    let trimmed = body.trim_start().trim_start_matches("**");
    let rest = trimmed.strip_prefix('[')?;
    let end = rest.find(']')?;
    ViolationType::from_tag(&rest[..end])
}

/// Drops candidates whose `(path, line, type)` triple matches an
/// existing comment. Intentionally coarse: it suppresses re-flagging the
/// same issue class at the same line across runs, not exact text
/// matches.
pub fn dedup_against_existing(
    candidates: Vec<InlineComment>,
    existing: &[ExistingComment],
) -> Vec<InlineComment> {
    let seen: HashSet<(String, u32, ViolationType)> = existing
        .iter()
        .filter_map(|c| extract_type_tag(&c.body).map(|t| (c.path.clone(), c.line, t)))
        .collect();

    candidates
        .into_iter()
        .filter(|c| !seen.contains(&(c.path.clone(), c.line_number, c.violation_type)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::types::Severity;

    fn violation(path: &str, line: u32, vt: ViolationType) -> Violation {
        Violation {
            file_path: path.to_string(),
            line_number: line,
            violation_type: vt,
            severity: Severity::Error,
            message: "bad".to_string(),
            suggestion: Some("fix".to_string()),
            rule_reference: None,
            confidence_score: 0.9,
        }
    }

    fn maps(path: &str, entries: &[(u32, u32)]) -> HashMap<String, BTreeMap<u32, u32>> {
        let mut map = BTreeMap::new();
        for &(line, pos) in entries {
            map.insert(line, pos);
        }
        HashMap::from([(path.to_string(), map)])
    }

    #[test]
    fn test_positioning_resolves_line_to_position() {
        let violations = vec![violation("a.ts", 10, ViolationType::Security)];
        let (comments, unresolved) = position_comments(&violations, &maps("a.ts", &[(10, 4)]));
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].position, 4);
        assert!(comments[0].body.starts_with("**[security]** bad"));
        assert!(comments[0].body.contains("💡 Suggestion: fix"));
        assert!(unresolved.violations.is_empty());
    }

    #[test]
    fn test_unanchored_and_unmapped_go_to_unresolved() {
        let violations = vec![
            violation("a.ts", 0, ViolationType::Security), // unanchored
            violation("a.ts", 99, ViolationType::Security), // not in map
            violation("b.ts", 10, ViolationType::Security), // no map for file
        ];
        let (comments, unresolved) = position_comments(&violations, &maps("a.ts", &[(10, 4)]));
        assert!(comments.is_empty());
        assert_eq!(unresolved.violations.len(), 3);
    }

    #[test]
    fn test_dedup_drops_matching_triple() {
        let candidates = vec![InlineComment {
            path: "a.ts".to_string(),
            position: 4,
            body: "**[security]** bad".to_string(),
            line_number: 10,
            violation_type: ViolationType::Security,
        }];
        let existing = vec![ExistingComment {
            path: "a.ts".to_string(),
            line: 10,
            body: "**[security]** previously flagged".to_string(),
        }];
        assert!(dedup_against_existing(candidates, &existing).is_empty());
    }

    #[test]
    fn test_dedup_keeps_different_type() {
        let candidates = vec![InlineComment {
            path: "a.ts".to_string(),
            position: 4,
            body: "**[security]** bad".to_string(),
            line_number: 10,
            violation_type: ViolationType::Security,
        }];
        let existing = vec![ExistingComment {
            path: "a.ts".to_string(),
            line: 10,
            body: "**[code_quality]** something else".to_string(),
        }];
        assert_eq!(dedup_against_existing(candidates, &existing).len(), 1);
    }

    #[test]
    fn test_dedup_ignores_untagged_comments() {
        let candidates = vec![InlineComment {
            path: "a.ts".to_string(),
            position: 4,
            body: "**[security]** bad".to_string(),
            line_number: 10,
            violation_type: ViolationType::Security,
        }];
        let existing = vec![ExistingComment {
            path: "a.ts".to_string(),
            line: 10,
            body: "human comment without a tag".to_string(),
        }];
        assert_eq!(dedup_against_existing(candidates, &existing).len(), 1);
    }

    #[test]
    fn test_dedup_ignores_foreign_bracket_tags() {
        // A human writing `[note] ...` must not collide with an
        // `other`-type candidate at the same path and line.
        let candidates = vec![InlineComment {
            path: "a.ts".to_string(),
            position: 4,
            body: "**[other]** bad".to_string(),
            line_number: 10,
            violation_type: ViolationType::Other,
        }];
        let existing = vec![ExistingComment {
            path: "a.ts".to_string(),
            line: 10,
            body: "[note] remember to bump the changelog".to_string(),
        }];
        assert_eq!(dedup_against_existing(candidates, &existing).len(), 1);
    }
}
