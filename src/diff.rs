// src/diff.rs

//! Unified-diff scanning: line/position bookkeeping for one file's patch.
//!
//! GitHub's inline-comment API anchors comments by *position* — the
//! 1-based ordinal of a line within the patch body — not by the file's
//! line number. Every line of the patch (hunk header, added, removed,
//! context) advances the position counter, but only hunk headers, added
//! lines and context lines advance the post-change line counter. Getting
//! this wrong silently misattributes every subsequent comment in the
//! file, so both scans below share one set of counting rules.

use crate::error::{ReviewError, Result};
use std::collections::BTreeMap;

/// One added line of a patch, paired with its post-change line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedLine {
    pub line_number: u32,
    pub content: String,
}

/// Parses the `+c` (new-file start line) out of a hunk header like
/// `@@ -12,4 +13,6 @@ fn main()`.
fn parse_hunk_start(header: &str) -> Option<u32> {
    let plus = header.split('+').nth(1)?;
    let digits: String = plus.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn is_file_header(line: &str) -> bool {
    line.starts_with("+++")
        || line.starts_with("---")
        || line.starts_with("diff --git")
        || line.starts_with("index ")
        || line.starts_with("new file mode")
        || line.starts_with("deleted file mode")
        || line.starts_with("similarity index")
        || line.starts_with("rename from")
        || line.starts_with("rename to")
}

/// Maps each post-change line number reachable in the patch (added and
/// context lines) to its 1-based diff position.
///
/// Context lines are mapped too so violations anchored on unchanged
/// lines can still be positioned. Returns `ReviewError::Parse` when
/// content appears before the first hunk header.
pub fn build_line_position_map(patch: &str) -> Result<BTreeMap<u32, u32>> {
    let mut map = BTreeMap::new();
    let mut new_line: u32 = 0;
    let mut position: u32 = 0;
    let mut seen_hunk = false;

    for line in patch.lines() {
        if line.starts_with("@@") {
            new_line = parse_hunk_start(line)
                .ok_or_else(|| ReviewError::Parse(format!("bad hunk header: {line}")))?;
            position += 1;
            seen_hunk = true;
            continue;
        }

        // File headers only exist before the first hunk. Inside a hunk,
        // `--- gone` is a removed line and `+++counter` an added one, so
        // classification goes by the first character alone from here on.
        if !seen_hunk {
            if is_file_header(line) {
                continue;
            }
            return Err(ReviewError::Parse(
                "patch content before first hunk header".to_string(),
            ));
        }

        position += 1;

        if line.starts_with('+') {
            map.insert(new_line, position);
            new_line += 1;
        } else if line.starts_with('-') {
            // Removed lines occupy a diff position but no new-file line.
        } else {
            map.insert(new_line, position);
            new_line += 1;
        }
    }

    Ok(map)
}

/// Collects every added line together with its resolved post-change line
/// number, for pattern checks that must report exact locations.
pub fn added_lines(patch: &str) -> Result<Vec<AddedLine>> {
    let mut lines = Vec::new();
    let mut new_line: u32 = 0;
    let mut seen_hunk = false;

    for line in patch.lines() {
        if line.starts_with("@@") {
            new_line = parse_hunk_start(line)
                .ok_or_else(|| ReviewError::Parse(format!("bad hunk header: {line}")))?;
            seen_hunk = true;
            continue;
        }

        if !seen_hunk {
            if is_file_header(line) {
                continue;
            }
            return Err(ReviewError::Parse(
                "patch content before first hunk header".to_string(),
            ));
        }

        if line.starts_with('+') {
            lines.push(AddedLine {
                line_number: new_line,
                content: line[1..].to_string(),
            });
            new_line += 1;
        } else if !line.starts_with('-') {
            new_line += 1;
        }
    }

    Ok(lines)
}
