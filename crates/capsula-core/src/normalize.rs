//! Source text normalization.
//!
//! Source captured from inside another block still carries that block's
//! indentation and, usually, the marker line that requested the capture.
//! Both are removed before the source is persisted.

use crate::error::CaptureError;

/// Strip the capture marker line (if it is the first line) and remove the
/// common leading indentation.
///
/// Only space characters count as indentation. Blank lines do not take part
/// in the minimum and leading/trailing blank lines are dropped.
pub fn normalize(raw_source: &str, marker_prefix: &str) -> Result<String, CaptureError> {
    let mut lines: Vec<&str> = raw_source.lines().collect();

    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return Err(CaptureError::SourceUnavailable(
            "source text is empty".to_string(),
        ));
    }

    let indentation = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading_spaces(l))
        .min()
        .unwrap_or(0);

    if !marker_prefix.is_empty() && dedent(lines[0], indentation).starts_with(marker_prefix) {
        lines.remove(0);
    }

    let body: Vec<&str> = lines.iter().map(|l| dedent(l, indentation)).collect();
    Ok(body.join("\n"))
}

fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Remove up to `indentation` leading spaces.
fn dedent(line: &str, indentation: usize) -> &str {
    let strip = leading_spaces(line).min(indentation);
    &line[strip..]
}
