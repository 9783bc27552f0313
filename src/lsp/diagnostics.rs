//! Conversion of decode errors and lint findings into LSP diagnostics.

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};

use crate::document::{Document, LineIndex};
use crate::error::FormatError;
use crate::settings::LintSettings;

use super::lint::{lint, LintIssue, LintLevel};

pub const DIAGNOSTIC_SOURCE: &str = "toon";

/// Convert document errors to diagnostics spanning from the error column to
/// the end of its line.
fn format_errors_to_diagnostics(errors: &[FormatError], line_index: &LineIndex) -> Vec<Diagnostic> {
    errors
        .iter()
        .map(|error| Diagnostic {
            range: line_index.rest_of_line(error.line, error.column),
            severity: Some(DiagnosticSeverity::ERROR),
            code: Some(NumberOrString::String("syntax".to_string())),
            code_description: None,
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message: error.message.clone(),
            related_information: None,
            tags: None,
            data: None,
        })
        .collect()
}

fn lint_issues_to_diagnostics(issues: &[LintIssue], line_index: &LineIndex) -> Vec<Diagnostic> {
    issues
        .iter()
        .map(|issue| {
            let severity = match issue.level {
                LintLevel::Warning => DiagnosticSeverity::WARNING,
                LintLevel::Error => DiagnosticSeverity::ERROR,
            };
            Diagnostic {
                range: line_index.span_to_range(&issue.span),
                severity: Some(severity),
                code: Some(NumberOrString::String(issue.code.to_string())),
                code_description: None,
                source: Some(DIAGNOSTIC_SOURCE.to_string()),
                message: issue.message.clone(),
                related_information: None,
                tags: None,
                data: None,
            }
        })
        .collect()
}

/// All diagnostics for a document: its decode errors, then lint findings.
pub fn to_diagnostics(document: &Document, lint_settings: &LintSettings) -> Vec<Diagnostic> {
    let line_index = LineIndex::new(document.raw_text());
    let mut diagnostics = format_errors_to_diagnostics(document.errors(), &line_index);
    let issues = lint(document.raw_text(), document.options().indent, lint_settings);
    diagnostics.extend(lint_issues_to_diagnostics(&issues, &line_index));
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Position;

    #[test]
    fn creates_diagnostic_from_decode_error() {
        let mut document = Document::default();
        document.set_content("a: 1\nname: \"open", true);

        let diagnostics = to_diagnostics(&document, &LintSettings::default());

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(diagnostics[0].source, Some("toon".to_string()));
        assert_eq!(diagnostics[0].range.start, Position::new(1, 6));
        assert_eq!(diagnostics[0].range.end, Position::new(1, 11));
        assert_eq!(diagnostics[0].message, "unterminated string");
    }

    #[test]
    fn lint_runs_on_valid_documents() {
        let mut document = Document::default();
        document.set_content("\"my key\": 1\nother key: 2", true);

        let diagnostics = to_diagnostics(&document, &LintSettings::default());

        assert!(document.is_valid());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(
            diagnostics[0].code,
            Some(NumberOrString::String("unquoted-key".to_string()))
        );
    }
}
