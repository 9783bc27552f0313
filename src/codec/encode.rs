//! TOON encoder.

use crate::error::EncodeError;
use crate::types::{ObjectMap, StructuredValue};

use super::EncodeOptions;

pub(super) fn encode_document(
    value: &StructuredValue,
    opts: &EncodeOptions,
) -> Result<String, EncodeError> {
    let mut writer = Writer {
        lines: Vec::new(),
        indent: opts.indent.max(1),
    };
    match value {
        StructuredValue::Object(map) => writer.write_fields(map, 0)?,
        StructuredValue::Array(items) => writer.write_array(String::new(), items, 1)?,
        primitive => {
            let line = encode_primitive(primitive)?;
            writer.lines.push(line);
        }
    }
    Ok(writer.lines.join("\n"))
}

struct Writer {
    lines: Vec<String>,
    indent: usize,
}

impl Writer {
    fn pad(&self, depth: usize) -> String {
        " ".repeat(depth * self.indent)
    }

    fn write_fields(&mut self, map: &ObjectMap, depth: usize) -> Result<(), EncodeError> {
        for (key, value) in map {
            let prefix = self.pad(depth);
            self.write_field(prefix, key, value, depth + 1)?;
        }
        Ok(())
    }

    /// Write one `key: value` entry. `prefix` is everything before the key on the
    /// first line; nested content goes at `child_depth`.
    fn write_field(
        &mut self,
        prefix: String,
        key: &str,
        value: &StructuredValue,
        child_depth: usize,
    ) -> Result<(), EncodeError> {
        let head = format!("{}{}", prefix, encode_key(key)?);
        match value {
            StructuredValue::Object(map) => {
                self.lines.push(format!("{}:", head));
                self.write_fields(map, child_depth)
            }
            StructuredValue::Array(items) => self.write_array(head, items, child_depth),
            primitive => {
                let encoded = encode_primitive(primitive)?;
                self.lines.push(format!("{}: {}", head, encoded));
                Ok(())
            }
        }
    }

    fn write_array(
        &mut self,
        head: String,
        items: &[StructuredValue],
        child_depth: usize,
    ) -> Result<(), EncodeError> {
        let header = format!("{}[{}]", head, items.len());
        if items.is_empty() {
            self.lines.push(format!("{}:", header));
            return Ok(());
        }

        if items.iter().all(|v| !v.is_container()) {
            let cells = items
                .iter()
                .map(encode_primitive)
                .collect::<Result<Vec<_>, _>>()?;
            self.lines.push(format!("{}: {}", header, cells.join(",")));
            return Ok(());
        }

        if let Some(fields) = tabular_fields(items) {
            let encoded_fields = fields
                .iter()
                .map(|f| encode_key(f))
                .collect::<Result<Vec<_>, _>>()?;
            self.lines
                .push(format!("{}{{{}}}:", header, encoded_fields.join(",")));
            let pad = self.pad(child_depth);
            for item in items {
                let Some(row) = item.as_object() else {
                    continue;
                };
                let cells = row
                    .values()
                    .map(encode_primitive)
                    .collect::<Result<Vec<_>, _>>()?;
                self.lines.push(format!("{}{}", pad, cells.join(",")));
            }
            return Ok(());
        }

        self.lines.push(format!("{}:", header));
        for item in items {
            self.write_list_item(item, child_depth)?;
        }
        Ok(())
    }

    fn write_list_item(&mut self, item: &StructuredValue, depth: usize) -> Result<(), EncodeError> {
        let marker = format!("{}- ", self.pad(depth));
        match item {
            StructuredValue::Array(inner) => self.write_array(marker, inner, depth + 1),
            StructuredValue::Object(map) => {
                let mut entries = map.iter();
                let Some((first_key, first_value)) = entries.next() else {
                    self.lines.push(format!("{}-", self.pad(depth)));
                    return Ok(());
                };
                self.write_field(marker, first_key, first_value, depth + 2)?;
                for (key, value) in entries {
                    let prefix = self.pad(depth + 1);
                    self.write_field(prefix, key, value, depth + 2)?;
                }
                Ok(())
            }
            primitive => {
                let encoded = encode_primitive(primitive)?;
                self.lines.push(format!("{}{}", marker, encoded));
                Ok(())
            }
        }
    }
}

/// Field names for the tabular form, if every item is a non-empty object with
/// the same keys in the same order and only primitive values.
fn tabular_fields(items: &[StructuredValue]) -> Option<Vec<&String>> {
    let first = items.first()?.as_object()?;
    if first.is_empty() {
        return None;
    }
    let fields: Vec<&String> = first.keys().collect();
    for item in items {
        let map = item.as_object()?;
        if map.len() != fields.len() {
            return None;
        }
        for ((key, value), expected) in map.iter().zip(&fields) {
            if key != *expected || value.is_container() {
                return None;
            }
        }
    }
    Some(fields)
}

fn encode_primitive(value: &StructuredValue) -> Result<String, EncodeError> {
    match value {
        StructuredValue::Null => Ok("null".to_string()),
        StructuredValue::Bool(b) => Ok(b.to_string()),
        StructuredValue::Number(n) => Ok(n.to_string()),
        StructuredValue::String(s) => encode_string(s),
        StructuredValue::Array(_) | StructuredValue::Object(_) => Err(EncodeError::Other(
            "container value in primitive position".to_string(),
        )),
    }
}

fn encode_string(s: &str) -> Result<String, EncodeError> {
    if needs_quotes(s) {
        quote(s, "string")
    } else {
        Ok(s.to_string())
    }
}

fn encode_key(key: &str) -> Result<String, EncodeError> {
    if is_identifier(key) {
        Ok(key.to_string())
    } else {
        quote(key, "key")
    }
}

pub(super) fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn needs_quotes(s: &str) -> bool {
    if s.is_empty() || s.trim() != s {
        return true;
    }
    if matches!(s, "true" | "false" | "null") || s.starts_with('-') {
        return true;
    }
    if s.parse::<f64>().is_ok() || s.starts_with(|c: char| c.is_ascii_digit()) {
        return true;
    }
    s.chars()
        .any(|c| matches!(c, ':' | ',' | '"' | '\\' | '[' | ']' | '{' | '}') || c.is_control())
}

fn quote(s: &str, context: &'static str) -> Result<String, EncodeError> {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                return Err(EncodeError::UnrepresentableCharacter {
                    code: c as u32,
                    context,
                })
            }
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(value: serde_json::Value) -> String {
        encode_document(&StructuredValue::from(value), &EncodeOptions::default()).unwrap()
    }

    #[test]
    fn object_with_primitive_array() {
        let text = encode(json!({"name": "Ada", "tags": ["x", "y"]}));
        assert_eq!(text, "name: Ada\ntags[2]: x,y");
    }

    #[test]
    fn tabular_array_of_uniform_objects() {
        let text = encode(json!({"rows": [{"id": 1, "ok": true}, {"id": 2, "ok": false}]}));
        assert_eq!(text, "rows[2]{id,ok}:\n  1,true\n  2,false");
    }

    #[test]
    fn list_items_for_mixed_arrays() {
        let text = encode(json!({"items": [1, {"a": 1, "b": 2}, {}]}));
        assert_eq!(text, "items[3]:\n  - 1\n  - a: 1\n    b: 2\n  -");
    }

    #[test]
    fn root_array_uses_keyless_header() {
        assert_eq!(encode(json!([1, 2])), "[2]: 1,2");
        assert_eq!(encode(json!([])), "[0]:");
    }

    #[test]
    fn empty_object_encodes_to_empty_text() {
        assert_eq!(encode(json!({})), "");
    }

    #[test]
    fn quotes_ambiguous_strings_and_keys() {
        let text = encode(json!({"a b": "true", "n": "007", "s": "x:y"}));
        assert_eq!(text, "\"a b\": \"true\"\nn: \"007\"\ns: \"x:y\"");
    }

    #[test]
    fn custom_indent_width() {
        let value = StructuredValue::from(json!({"a": {"b": 1}}));
        let text = encode_document(&value, &EncodeOptions { indent: 4 }).unwrap();
        assert_eq!(text, "a:\n    b: 1");
    }

    #[test]
    fn rejects_unescapable_control_characters() {
        let value = StructuredValue::from(json!({"bell": "ding\u{7}"}));
        let err = encode_document(&value, &EncodeOptions::default()).unwrap_err();
        assert_eq!(
            err,
            EncodeError::UnrepresentableCharacter {
                code: 7,
                context: "string"
            }
        );
    }
}
