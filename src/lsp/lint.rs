//! Advisory line checks that run whether or not the document decodes.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::settings::LintSettings;

static ARRAY_HEADER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_]+)\[(\d+)\](\{([^}]*)\})?:?\s*$").unwrap());
static ARRAY_HEADER_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\](\{[^}]*\})?$").unwrap());
static PLAIN_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintIssue {
    /// Byte span in the whole document.
    pub span: Range<usize>,
    pub level: LintLevel,
    pub code: &'static str,
    pub message: String,
}

/// Run the enabled checks over every non-blank, non-comment line.
pub fn lint(source: &str, indent: usize, settings: &LintSettings) -> Vec<LintIssue> {
    let unit = indent.max(1);
    let mut issues = Vec::new();
    let mut line_start = 0;

    for raw in source.split('\n') {
        let start = line_start;
        line_start += raw.len() + 1;

        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let leading = line.len() - trimmed.len();
        let line_end = start + line.len();

        if settings.indentation && leading % unit != 0 {
            issues.push(LintIssue {
                span: start..start + leading,
                level: LintLevel::Warning,
                code: "indentation",
                message: format!("Indentation should be a multiple of {unit} spaces"),
            });
        }

        if settings.array_header
            && ARRAY_HEADER_LINE.is_match(trimmed)
            && !trimmed.trim_end().ends_with(':')
        {
            issues.push(LintIssue {
                span: start + leading..line_end,
                level: LintLevel::Error,
                code: "array-header-colon",
                message: "Array header must end with colon (:)".to_string(),
            });
        }

        if settings.unquoted_key {
            if let Some(colon) = unquoted_key_end(trimmed) {
                issues.push(LintIssue {
                    span: start + leading..start + leading + colon,
                    level: LintLevel::Warning,
                    code: "unquoted-key",
                    message: "Key should be alphanumeric (use quotes for special characters)"
                        .to_string(),
                });
            }
        }
    }
    issues
}

/// Offset of the colon ending a key that needs quotes but has none.
fn unquoted_key_end(trimmed: &str) -> Option<usize> {
    if trimmed.ends_with(':') || trimmed.starts_with('-') {
        return None;
    }
    let colon = trimmed.find(':')?;
    let key = trimmed[..colon].trim();
    let key = ARRAY_HEADER_SUFFIX.replace(key, "");
    let quoted = key.len() >= 2 && key.starts_with('"') && key.ends_with('"');
    if key.is_empty() || quoted || PLAIN_KEY.is_match(&key) {
        return None;
    }
    Some(colon)
}
