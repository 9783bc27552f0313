//! Text utilities for position conversion.
//!
//! Engine errors and lint findings speak 1-based line/column in characters; LSP
//! wants 0-based positions in UTF-16 code units. `LineIndex` bridges the two.

use std::ops::Range;

use tower_lsp::lsp_types::{Position, Range as LspRange};

/// Pre-computed line index for position lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset where each line starts.
    line_starts: Vec<usize>,
    source: String,
}

impl LineIndex {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut line_starts = vec![0];
        for (i, c) in source.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            source,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range of a 0-based line, excluding its terminator.
    fn line_bounds(&self, line: usize) -> Option<Range<usize>> {
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map(|&next| next - 1)
            .unwrap_or(self.source.len());
        let text = &self.source[start..end];
        let end = if text.ends_with('\r') { end - 1 } else { end };
        Some(start..end)
    }

    /// Text of a 0-based line without its terminator.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        self.line_bounds(line).map(|r| &self.source[r])
    }

    /// Convert a byte offset to an LSP position.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };

        let line_start = self.line_starts[line];
        let col: u32 = self.source[line_start..]
            .char_indices()
            .take_while(|(i, _)| line_start + i < offset)
            .map(|(_, c)| c.len_utf16() as u32)
            .sum();

        Position::new(line as u32, col)
    }

    pub fn span_to_range(&self, span: &Range<usize>) -> LspRange {
        LspRange::new(
            self.offset_to_position(span.start),
            self.offset_to_position(span.end),
        )
    }

    /// Range from a 1-based line/column (in characters) to the end of that line.
    ///
    /// Out-of-range lines clamp to the last line; columns past the end clamp to
    /// the line end, which yields an empty range.
    pub fn rest_of_line(&self, line: usize, column: usize) -> LspRange {
        let line = line.max(1).min(self.line_count()) - 1;
        let bounds = self.line_bounds(line).unwrap_or(0..0);
        let text = &self.source[bounds.clone()];
        let start = text
            .char_indices()
            .nth(column.max(1) - 1)
            .map(|(i, _)| bounds.start + i)
            .unwrap_or(bounds.end);
        self.span_to_range(&(start..bounds.end))
    }

    /// Range covering the whole document, for full-text replacement edits.
    pub fn full_range(&self) -> LspRange {
        LspRange::new(
            Position::new(0, 0),
            self.offset_to_position(self.source.len()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line() {
        let idx = LineIndex::new("hello world");
        assert_eq!(idx.offset_to_position(0), Position::new(0, 0));
        assert_eq!(idx.offset_to_position(5), Position::new(0, 5));
        assert_eq!(idx.offset_to_position(11), Position::new(0, 11));
    }

    #[test]
    fn multi_line() {
        let idx = LineIndex::new("hello\nworld\ntest");
        assert_eq!(idx.offset_to_position(5), Position::new(0, 5));
        assert_eq!(idx.offset_to_position(6), Position::new(1, 0));
        assert_eq!(idx.offset_to_position(12), Position::new(2, 0));
        assert_eq!(idx.line_count(), 3);
        assert_eq!(idx.line_text(1), Some("world"));
        assert_eq!(idx.line_text(3), None);
    }

    #[test]
    fn utf16_handling() {
        // 4 bytes in UTF-8, 2 code units in UTF-16
        let idx = LineIndex::new("a\u{1F600}b");
        assert_eq!(idx.offset_to_position(1), Position::new(0, 1));
        assert_eq!(idx.offset_to_position(5), Position::new(0, 3));
    }

    #[test]
    fn rest_of_line_from_column() {
        let idx = LineIndex::new("a: 1\nname: \"x\n");
        let range = idx.rest_of_line(2, 7);
        assert_eq!(range.start, Position::new(1, 6));
        assert_eq!(range.end, Position::new(1, 8));
    }

    #[test]
    fn rest_of_line_clamps() {
        let idx = LineIndex::new("abc");
        let range = idx.rest_of_line(9, 1);
        assert_eq!(range.start, Position::new(0, 0));
        assert_eq!(range.end, Position::new(0, 3));

        let past_end = idx.rest_of_line(1, 10);
        assert_eq!(past_end.start, past_end.end);
    }

    #[test]
    fn crlf_lines_exclude_carriage_return() {
        let idx = LineIndex::new("a: 1\r\nb: 2");
        assert_eq!(idx.line_text(0), Some("a: 1"));
        assert_eq!(idx.rest_of_line(1, 1).end, Position::new(0, 4));
    }

    #[test]
    fn full_range_ends_at_last_character() {
        let idx = LineIndex::new("a\nbc");
        let range = idx.full_range();
        assert_eq!(range.start, Position::new(0, 0));
        assert_eq!(range.end, Position::new(1, 2));
    }
}
