//! TOON decoder.
//!
//! Works line by line over non-blank lines. Nesting is relative: a block's
//! children are the following lines indented deeper than the line that opened it.
//! Object fields of a list item sit one indentation unit deeper than the hyphen.

use crate::error::FormatError;
use crate::types::{ObjectMap, StructuredValue};

use super::DecodeOptions;

pub(super) fn decode_document(
    text: &str,
    opts: &DecodeOptions,
) -> Result<StructuredValue, FormatError> {
    let lines = scan_lines(text, opts)?;
    let mut parser = Parser {
        lines,
        pos: 0,
        strict: opts.strict,
        unit: opts.indent.max(1),
    };
    parser.parse_root()
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    /// 1-based line number in the source text.
    number: usize,
    indent: usize,
    content: &'a str,
}

impl Line<'_> {
    /// 1-based column of a byte offset within `content`.
    fn column(&self, offset: usize) -> usize {
        self.indent + offset + 1
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> FormatError {
        FormatError::new(self.number, self.column(offset), message)
    }
}

fn scan_lines<'a>(text: &'a str, opts: &DecodeOptions) -> Result<Vec<Line<'a>>, FormatError> {
    let unit = opts.indent.max(1);
    let mut out = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if raw.trim().is_empty() {
            continue;
        }
        let content = raw.trim_start();
        let leading = &raw[..raw.len() - content.len()];
        if let Some(tab) = leading.find('\t') {
            if opts.strict {
                return Err(FormatError::new(
                    i + 1,
                    tab + 1,
                    "tabs are not allowed in indentation",
                ));
            }
        }
        let indent = leading.chars().count();
        if opts.strict && indent % unit != 0 {
            return Err(FormatError::new(
                i + 1,
                indent + 1,
                format!("indentation must be a multiple of {} spaces", unit),
            ));
        }
        out.push(Line {
            number: i + 1,
            indent,
            content: content.trim_end(),
        });
    }
    Ok(out)
}

#[derive(Debug)]
struct Header {
    len: usize,
    fields: Option<Vec<String>>,
}

/// A `key: rest` or `key[N]{..}: rest` line, or a key-less `[N]: rest` header.
#[derive(Debug)]
struct Field<'a> {
    key: Option<String>,
    header: Option<Header>,
    rest: &'a str,
    rest_offset: usize,
}

struct Parser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
    strict: bool,
    unit: usize,
}

impl<'a> Parser<'a> {
    fn parse_root(&mut self) -> Result<StructuredValue, FormatError> {
        let Some(first) = self.lines.first().copied() else {
            return Ok(StructuredValue::Object(ObjectMap::new()));
        };

        if let Some(field) = split_field(first.content) {
            if field.key.is_none() {
                if let Some(header) = &field.header {
                    self.pos = 1;
                    let value = self.parse_array(&first, header, &field, first.indent)?;
                    self.expect_end()?;
                    return Ok(value);
                }
            }
        } else if self.lines.len() == 1 {
            self.pos = 1;
            return parse_primitive(&first, first.content, 0);
        }

        let map = self.parse_object_block(first.indent)?;
        self.expect_end()?;
        Ok(StructuredValue::Object(map))
    }

    fn expect_end(&self) -> Result<(), FormatError> {
        match self.lines.get(self.pos) {
            None => Ok(()),
            Some(line) => Err(line.error(0, "unexpected content after root value")),
        }
    }

    fn peek(&self) -> Option<Line<'a>> {
        self.lines.get(self.pos).copied()
    }

    /// Indentation of the next line if it is nested under a line at `indent`.
    fn child_indent(&self, indent: usize) -> Option<usize> {
        self.peek()
            .map(|line| line.indent)
            .filter(|&child| child > indent)
    }

    fn parse_object_block(&mut self, indent: usize) -> Result<ObjectMap, FormatError> {
        let mut map = ObjectMap::new();
        while let Some(line) = self.peek() {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(line.error(0, "unexpected indentation"));
            }
            let field = split_field(line.content)
                .filter(|f| f.key.is_some())
                .ok_or_else(|| line.error(0, "expected `key: value`"))?;
            self.pos += 1;
            let key = field.key.clone().unwrap_or_default();
            let value = self.parse_field_value(&line, &field, line.indent)?;
            if self.strict && map.contains_key(&key) {
                return Err(line.error(0, format!("duplicate key `{}`", key)));
            }
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Parse the value of a field already consumed from `line`. Nested content
    /// must be indented deeper than `owner_indent`.
    fn parse_field_value(
        &mut self,
        line: &Line<'a>,
        field: &Field<'a>,
        owner_indent: usize,
    ) -> Result<StructuredValue, FormatError> {
        if let Some(header) = &field.header {
            return self.parse_array(line, header, field, owner_indent);
        }
        if field.rest.is_empty() {
            return match self.child_indent(owner_indent) {
                Some(child) => Ok(StructuredValue::Object(self.parse_object_block(child)?)),
                None => Ok(StructuredValue::Object(ObjectMap::new())),
            };
        }
        parse_primitive(line, field.rest, field.rest_offset)
    }

    fn parse_array(
        &mut self,
        line: &Line<'a>,
        header: &Header,
        field: &Field<'a>,
        owner_indent: usize,
    ) -> Result<StructuredValue, FormatError> {
        let items = if let Some(fields) = &header.fields {
            if !field.rest.is_empty() {
                return Err(line.error(field.rest_offset, "tabular header must end the line"));
            }
            self.parse_tabular_rows(fields, owner_indent)?
        } else if !field.rest.is_empty() {
            split_cells(field.rest)
                .into_iter()
                .map(|(cell, offset)| parse_primitive(line, cell, field.rest_offset + offset))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            match self.child_indent(owner_indent) {
                Some(child) => self.parse_list_items(child)?,
                None => Vec::new(),
            }
        };

        if self.strict && items.len() != header.len {
            return Err(line.error(
                0,
                format!(
                    "array declares {} items but has {}",
                    header.len,
                    items.len()
                ),
            ));
        }
        Ok(StructuredValue::Array(items))
    }

    fn parse_tabular_rows(
        &mut self,
        fields: &[String],
        owner_indent: usize,
    ) -> Result<Vec<StructuredValue>, FormatError> {
        let mut rows = Vec::new();
        let Some(row_indent) = self.child_indent(owner_indent) else {
            return Ok(rows);
        };
        while let Some(line) = self.peek() {
            if line.indent < row_indent {
                break;
            }
            if line.indent > row_indent {
                return Err(line.error(0, "unexpected indentation"));
            }
            self.pos += 1;
            let cells = split_cells(line.content);
            if cells.len() != fields.len() {
                return Err(line.error(
                    0,
                    format!(
                        "row has {} values but header declares {} fields",
                        cells.len(),
                        fields.len()
                    ),
                ));
            }
            let mut row = ObjectMap::new();
            for (name, (cell, offset)) in fields.iter().zip(cells) {
                row.insert(name.clone(), parse_primitive(&line, cell, offset)?);
            }
            rows.push(StructuredValue::Object(row));
        }
        Ok(rows)
    }

    fn parse_list_items(&mut self, item_indent: usize) -> Result<Vec<StructuredValue>, FormatError> {
        let mut items = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent < item_indent {
                break;
            }
            if line.indent > item_indent {
                return Err(line.error(0, "unexpected indentation"));
            }
            let body = if line.content == "-" {
                ""
            } else if let Some(body) = line.content.strip_prefix("- ") {
                body.trim_start()
            } else {
                return Err(line.error(0, "expected list item `- `"));
            };
            self.pos += 1;
            let body_offset = line.content.len() - body.len();
            items.push(self.parse_list_item(&line, body, body_offset)?);
        }
        Ok(items)
    }

    fn parse_list_item(
        &mut self,
        line: &Line<'a>,
        body: &'a str,
        body_offset: usize,
    ) -> Result<StructuredValue, FormatError> {
        if body.is_empty() {
            return Ok(StructuredValue::Object(ObjectMap::new()));
        }
        let Some(mut field) = split_field(body) else {
            return parse_primitive(line, body, body_offset);
        };
        field.rest_offset += body_offset;

        let Some(first_key) = field.key.clone() else {
            let Some(header) = &field.header else {
                return Err(line.error(body_offset, "expected array header"));
            };
            return self.parse_array(line, header, &field, line.indent);
        };

        let field_indent = line.indent + self.unit;
        let mut map = ObjectMap::new();
        let first = self.parse_field_value(line, &field, field_indent)?;
        map.insert(first_key, first);

        if let Some(child) = self.child_indent(line.indent) {
            for (key, value) in self.parse_object_block(child)? {
                if self.strict && map.contains_key(&key) {
                    return Err(line.error(0, format!("duplicate key `{}`", key)));
                }
                map.insert(key, value);
            }
        }
        Ok(StructuredValue::Object(map))
    }
}

/// Split a line into key, optional array header and the text after the colon.
/// Returns `None` when the line is not a field.
fn split_field(content: &str) -> Option<Field<'_>> {
    let (key, mut cursor) = if content.starts_with('"') {
        let (key, end) = scan_quoted(content, 0).ok()?;
        (Some(key), end)
    } else {
        let stop = content.find([':', '['])?;
        let key = content[..stop].trim_end();
        if key.contains('"') {
            return None;
        }
        let key = (!key.is_empty()).then(|| key.to_string());
        (key, stop)
    };

    let mut header = None;
    if content[cursor..].starts_with('[') {
        let (parsed, end) = parse_header(content, cursor)?;
        header = Some(parsed);
        cursor = end;
    }

    let after = &content[cursor..];
    let trimmed = after.trim_start();
    if !trimmed.starts_with(':') {
        return None;
    }
    if key.is_none() && header.is_none() {
        return None;
    }
    let colon = cursor + (after.len() - trimmed.len());
    let rest_raw = &content[colon + 1..];
    let rest = rest_raw.trim();
    let rest_offset = colon + 1 + (rest_raw.len() - rest_raw.trim_start().len());
    Some(Field {
        key,
        header,
        rest,
        rest_offset,
    })
}

/// Parse `[N]` with an optional `{f1,f2}` field list starting at `start`.
fn parse_header(content: &str, start: usize) -> Option<(Header, usize)> {
    let close = start + content[start..].find(']')?;
    let len = content[start + 1..close].trim().parse::<usize>().ok()?;
    let mut end = close + 1;
    let mut fields = None;
    if content[end..].starts_with('{') {
        let close_brace = end + content[end..].find('}')?;
        let names = split_cells(&content[end + 1..close_brace])
            .into_iter()
            .map(|(cell, _)| {
                if cell.starts_with('"') {
                    scan_quoted(cell, 0).ok().map(|(name, _)| name)
                } else {
                    Some(cell.to_string())
                }
            })
            .collect::<Option<Vec<_>>>()?;
        fields = Some(names);
        end = close_brace + 1;
    }
    Some((Header { len, fields }, end))
}

/// Split on commas outside quotes. Returns trimmed cells with their byte offsets.
fn split_cells(text: &str) -> Vec<(&str, usize)> {
    let mut cells = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(trim_cell(text, start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    cells.push(trim_cell(text, start, text.len()));
    cells
}

fn trim_cell(text: &str, start: usize, end: usize) -> (&str, usize) {
    let raw = &text[start..end];
    let lead = raw.len() - raw.trim_start().len();
    (raw.trim(), start + lead)
}

/// Scan a quoted string starting at `start`. Returns the unescaped text and
/// the byte offset just past the closing quote.
fn scan_quoted(text: &str, start: usize) -> Result<(String, usize), (usize, &'static str)> {
    let mut out = String::new();
    let mut chars = text[start + 1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, start + 1 + i + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 't')) => out.push('\t'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((j, _)) => return Err((start + 1 + j, "invalid escape sequence")),
                None => break,
            },
            c => out.push(c),
        }
    }
    Err((start, "unterminated string"))
}

fn parse_primitive(line: &Line<'_>, token: &str, offset: usize) -> Result<StructuredValue, FormatError> {
    if token.starts_with('"') {
        let (text, end) = scan_quoted(token, 0)
            .map_err(|(at, message)| line.error(offset + at, message))?;
        if end != token.len() {
            return Err(line.error(offset + end, "unexpected characters after string"));
        }
        return Ok(StructuredValue::String(text));
    }
    match token {
        "null" => return Ok(StructuredValue::Null),
        "true" => return Ok(StructuredValue::Bool(true)),
        "false" => return Ok(StructuredValue::Bool(false)),
        _ => {}
    }
    if let Some(number) = parse_number(token) {
        return Ok(number);
    }
    Ok(StructuredValue::String(token.to_string()))
}

/// Numbers follow `-?digits(.digits)?([eE][+-]?digits)?`. A leading zero on a
/// multi-digit integer part makes the token a string.
fn parse_number(token: &str) -> Option<StructuredValue> {
    let bytes = token.as_bytes();
    let mut i = 0;
    if bytes.first() == Some(&b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_len = i - int_start;
    if int_len == 0 || (int_len > 1 && bytes[int_start] == b'0') {
        return None;
    }
    let mut is_float = false;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == frac_start {
            return None;
        }
        is_float = true;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return None;
        }
        is_float = true;
    }
    if i != bytes.len() {
        return None;
    }

    if !is_float {
        if token.starts_with('-') {
            if let Ok(n) = token.parse::<i64>() {
                return Some(StructuredValue::Number(n.into()));
            }
        } else if let Ok(n) = token.parse::<u64>() {
            return Some(StructuredValue::Number(n.into()));
        }
    }
    token.parse::<f64>().ok().and_then(StructuredValue::from_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(text: &str) -> Result<StructuredValue, FormatError> {
        decode_document(text, &DecodeOptions::default())
    }

    fn decode_lenient(text: &str) -> Result<StructuredValue, FormatError> {
        decode_document(
            text,
            &DecodeOptions {
                strict: false,
                indent: 2,
            },
        )
    }

    #[test]
    fn nested_objects_and_inline_arrays() {
        let value = decode("user:\n  name: Ada\n  tags[2]: a,b\ncount: 3").unwrap();
        assert_eq!(
            value,
            StructuredValue::from(json!({"user": {"name": "Ada", "tags": ["a", "b"]}, "count": 3}))
        );
    }

    #[test]
    fn tabular_rows_become_objects() {
        let value = decode("items[2]{id,name}:\n  1,pen\n  2,\"ink, blue\"").unwrap();
        assert_eq!(
            value,
            StructuredValue::from(json!({"items": [
                {"id": 1, "name": "pen"},
                {"id": 2, "name": "ink, blue"}
            ]}))
        );
    }

    #[test]
    fn list_item_objects_keep_following_fields() {
        let value = decode("xs[2]:\n  - a: 1\n    b: 2\n  - c").unwrap();
        assert_eq!(
            value,
            StructuredValue::from(json!({"xs": [{"a": 1, "b": 2}, "c"]}))
        );
    }

    #[test]
    fn numbers_and_literals() {
        let value = decode("a: -4\nb: 2.50\nc: 1e3\nd: 007\ne: null\nf: false").unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["a"], StructuredValue::from(-4));
        assert_eq!(obj["b"], StructuredValue::from_f64(2.5).unwrap());
        assert_eq!(obj["c"], StructuredValue::from_f64(1000.0).unwrap());
        assert_eq!(obj["d"], StructuredValue::from("007"));
        assert_eq!(obj["e"], StructuredValue::Null);
        assert_eq!(obj["f"], StructuredValue::Bool(false));
    }

    #[test]
    fn single_line_without_colon_is_a_primitive() {
        assert_eq!(decode("hello world").unwrap(), StructuredValue::from("hello world"));
        assert_eq!(decode("\"a:b\"").unwrap(), StructuredValue::from("a:b"));
    }

    #[test]
    fn length_mismatch_is_strict_only() {
        let err = decode("xs[3]: a,b").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.message, "array declares 3 items but has 2");
        assert_eq!(
            decode_lenient("xs[3]: a,b").unwrap(),
            StructuredValue::from(json!({"xs": ["a", "b"]}))
        );
    }

    #[test]
    fn odd_indentation_is_rejected_in_strict_mode() {
        let err = decode("a:\n   b: 1").unwrap_err();
        assert_eq!((err.line, err.column), (2, 4));
        assert_eq!(
            decode_lenient("a:\n   b: 1").unwrap(),
            StructuredValue::from(json!({"a": {"b": 1}}))
        );
    }

    #[test]
    fn unterminated_string_reports_column() {
        let err = decode("a: 1\nname: \"open").unwrap_err();
        assert_eq!((err.line, err.column), (2, 7));
        assert_eq!(err.message, "unterminated string");
    }

    #[test]
    fn missing_colon_is_an_error() {
        let err = decode("a: 1\nbroken line").unwrap_err();
        assert_eq!((err.line, err.column), (2, 1));
    }

    #[test]
    fn blank_lines_are_ignored() {
        let value = decode("\n\na: 1\n\n  \nb: 2\n").unwrap();
        assert_eq!(value, StructuredValue::from(json!({"a": 1, "b": 2})));
    }
}
