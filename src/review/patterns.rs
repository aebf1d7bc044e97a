// src/review/patterns.rs

//! Fast pattern checks against added diff lines. These run before any
//! model call and produce fixed-severity violations with high
//! confidence; the retrieval-augmented stage handles everything
//! subtler.

use crate::diff::AddedLine;
use crate::review::types::{Severity, Violation, ViolationType};
use once_cell::sync::Lazy;
use regex::Regex;

static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Template placeholders (<% %>, {{ }}) are not secrets.
        Regex::new(r#"(?i)password\s*=\s*["'](?:<%|\{\{)?[^"']+["']"#).unwrap(),
        Regex::new(r#"(?i)api[_-]?key\s*=\s*["'][^"']+["']"#).unwrap(),
        Regex::new(r#"(?i)secret\s*=\s*["'][^"']+["']"#).unwrap(),
        Regex::new(r#"(?i)token\s*=\s*["'][^"']+["']"#).unwrap(),
        Regex::new(r#"(?i)aws[_-]?secret\s*=\s*["'][^"']+["']"#).unwrap(),
    ]
});

static SECRET_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'](?:<%|\{\{\s*)"#).unwrap());

static DEBUG_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"console\.log\(").unwrap(),
        Regex::new(r"console\.debug\(").unwrap(),
        Regex::new(r"console\.warn\(").unwrap(),
        Regex::new(r"^\s*print\s*\(").unwrap(),
        Regex::new(r"debugger;").unwrap(),
    ]
});

static SQL_INJECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"(?i)f["']SELECT.*FROM.*\{.*\}["']"#).unwrap(),
        Regex::new(r"(?i)\$\{.*\}.*SELECT.*FROM").unwrap(),
        Regex::new(r"(?i)\+.*SELECT.*FROM").unwrap(),
        Regex::new(r"(?i)`SELECT.*FROM.*\$\{").unwrap(),
    ]
});

fn contains_hardcoded_secret(code: &str) -> bool {
    SECRET_PATTERNS.iter().any(|p| p.is_match(code)) && !SECRET_PLACEHOLDER.is_match(code)
}

fn is_test_file(path: &str) -> bool {
    path.contains(".test.") || path.contains(".spec.") || path.contains("__tests__")
}

fn contains_debug_code(code: &str, path: &str) -> bool {
    !is_test_file(path) && DEBUG_PATTERNS.iter().any(|p| p.is_match(code))
}

fn contains_sql_injection_risk(code: &str) -> bool {
    SQL_INJECTION_PATTERNS.iter().any(|p| p.is_match(code))
}

/// Runs every pattern check over the added lines of one file.
pub fn check_added_lines(path: &str, lines: &[AddedLine]) -> Vec<Violation> {
    let mut violations = Vec::new();

    for line in lines {
        if contains_hardcoded_secret(&line.content) {
            violations.push(Violation {
                file_path: path.to_string(),
                line_number: line.line_number,
                violation_type: ViolationType::Security,
                severity: Severity::Error,
                message: "Hardcoded credential detected.".to_string(),
                suggestion: Some(
                    "Load secrets from environment variables or a secret manager.".to_string(),
                ),
                rule_reference: Some("Security rules - secret management".to_string()),
                confidence_score: 0.9,
            });
        }

        if contains_debug_code(&line.content, path) {
            violations.push(Violation {
                file_path: path.to_string(),
                line_number: line.line_number,
                violation_type: ViolationType::CodeQuality,
                severity: Severity::Warning,
                message: "Leftover debug statement.".to_string(),
                suggestion: Some("Use a logger or remove the debug code.".to_string()),
                rule_reference: Some("Code quality - remove debug code".to_string()),
                confidence_score: 0.95,
            });
        }

        if contains_sql_injection_risk(&line.content) {
            violations.push(Violation {
                file_path: path.to_string(),
                line_number: line.line_number,
                violation_type: ViolationType::Security,
                severity: Severity::Error,
                message: "Possible SQL injection via string interpolation.".to_string(),
                suggestion: Some("Use parameterized queries.".to_string()),
                rule_reference: Some("Security rules - SQL injection prevention".to_string()),
                confidence_score: 0.85,
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: u32, content: &str) -> AddedLine {
        AddedLine { line_number: n, content: content.to_string() }
    }

    #[test]
    fn test_hardcoded_password_is_error() {
        let violations = check_added_lines("src/db.ts", &[line(10, r#"password = "hunter2""#)]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].violation_type, ViolationType::Security);
        assert_eq!(violations[0].severity, Severity::Error);
        assert_eq!(violations[0].line_number, 10);
    }

    #[test]
    fn test_template_placeholder_is_not_a_secret() {
        let violations =
            check_added_lines("config.erb", &[line(3, r#"password = "<%= secret %>""#)]);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_api_key_variants() {
        for code in [r#"api_key = "abc""#, r#"API-KEY = "abc""#, r#"aws_secret = "abc""#] {
            assert!(!check_added_lines("a.py", &[line(1, code)]).is_empty(), "{code}");
        }
    }

    #[test]
    fn test_debug_code_is_warning_and_skipped_in_tests() {
        let violations = check_added_lines("src/app.ts", &[line(7, "console.log(user)")]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Warning);

        assert!(check_added_lines("src/app.test.ts", &[line(7, "console.log(user)")]).is_empty());
        assert!(check_added_lines("__tests__/app.ts", &[line(7, "debugger;")]).is_empty());
    }

    #[test]
    fn test_sql_injection_interpolation() {
        let violations = check_added_lines(
            "api.js",
            &[line(4, "const q = `SELECT * FROM users WHERE id = ${id}`")],
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].violation_type, ViolationType::Security);
    }

    #[test]
    fn test_clean_line_produces_nothing() {
        assert!(check_added_lines("a.rs", &[line(1, "let total = a + b;")]).is_empty());
    }
}
