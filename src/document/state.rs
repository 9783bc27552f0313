//! Document state engine and the store of open documents.
//!
//! A `Document` owns the raw text and the value decoded from it. Raw edits go
//! text -> value through the codec's decoder; structural edits go value -> text
//! through the encoder and are re-decoded before they commit, so `value` is
//! always exactly what `raw_text` decodes to.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use regex::{NoExpand, Regex, RegexBuilder};
use serde::Deserialize;
use tower_lsp::lsp_types::Url;
use tracing::{debug, warn};

use crate::codec::{Codec, DecodeOptions, EncodeOptions, ToonCodec, DEFAULT_INDENT};
use crate::error::{EngineError, EngineResult, FormatError};
use crate::types::{ObjectMap, StructuredValue};

use super::history::{History, DEFAULT_HISTORY_LIMIT};
use super::path::{self, is_prefix, join_path, split_last, Path};
use super::search;
use super::tree::{self, TreeNode};

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)line (\d+)").unwrap());
static COLUMN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)column (\d+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentOptions {
    pub indent: usize,
    pub strict: bool,
    pub history_limit: usize,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
            strict: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Where `move_node` puts the moved value relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePosition {
    Before,
    After,
    Inside,
}

/// One editing session over a single document.
#[derive(Debug, Clone)]
pub struct Document {
    codec: Arc<dyn Codec>,
    options: DocumentOptions,
    raw_text: String,
    /// `None` while the text is blank or invalid.
    value: Option<StructuredValue>,
    is_valid: bool,
    errors: Vec<FormatError>,
    is_dirty: bool,
    history: History,
    file_name: Option<String>,
    expanded: HashSet<String>,
    selected: Path,
    search_query: String,
    search_results: Vec<Path>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Arc::new(ToonCodec), DocumentOptions::default())
    }
}

impl Document {
    /// Create an empty document.
    pub fn new(codec: Arc<dyn Codec>, options: DocumentOptions) -> Self {
        Self {
            codec,
            options,
            raw_text: String::new(),
            value: None,
            is_valid: true,
            errors: Vec::new(),
            is_dirty: false,
            history: History::new(options.history_limit),
            file_name: None,
            expanded: HashSet::new(),
            selected: Vec::new(),
            search_query: String::new(),
            search_results: Vec::new(),
        }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn value(&self) -> Option<&StructuredValue> {
        self.value.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[FormatError] {
        &self.errors
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.file_name = Some(name.into());
    }

    /// Clear the dirty flag, e.g. after the text was saved elsewhere.
    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            strict: self.options.strict,
            indent: self.options.indent,
        }
    }

    fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            indent: self.options.indent,
        }
    }

    /// Replace the raw text and re-validate it.
    ///
    /// With `record_history`, the text is appended to history unless it equals
    /// the snapshot under the cursor.
    pub fn set_content(&mut self, text: impl Into<String>, record_history: bool) {
        self.raw_text = text.into();
        self.is_dirty = true;
        self.validate_and_parse();
        if record_history {
            self.record_history();
        }
    }

    fn record_history(&mut self) {
        let unchanged = self
            .history
            .current()
            .is_some_and(|snapshot| snapshot.content == self.raw_text);
        if !unchanged {
            self.history.record(self.raw_text.clone());
        }
    }

    /// Decode `raw_text` into `value`, or record why it cannot be decoded.
    pub fn validate_and_parse(&mut self) {
        self.errors.clear();
        if self.raw_text.trim().is_empty() {
            self.value = None;
            self.is_valid = true;
            return;
        }

        match self.codec.decode(&self.raw_text, &self.decode_options()) {
            Ok(value) => {
                self.value = Some(value);
                self.is_valid = true;
            }
            Err(err) => {
                let (line, column) = locate(&err);
                debug!(line, column, message = %err.message, "document does not decode");
                self.value = None;
                self.is_valid = false;
                self.errors.push(FormatError::new(line, column, err.message));
            }
        }
    }

    /// Re-encode the current value. Does nothing when there is no valid value.
    pub fn format(&mut self) -> EngineResult<()> {
        let Some(value) = self.value.as_ref().filter(|_| self.is_valid) else {
            return Ok(());
        };
        let text = self.codec.encode(value, &self.encode_options())?;
        self.set_content(text, true);
        Ok(())
    }

    /// Encoder output for the current value, or the raw text if there is none.
    pub fn formatted_content(&self) -> String {
        self.value
            .as_ref()
            .and_then(|value| self.codec.encode(value, &self.encode_options()).ok())
            .unwrap_or_else(|| self.raw_text.clone())
    }

    /// Re-encode the current value into the text and record it.
    pub fn sync_content_from_data(&mut self) -> EngineResult<()> {
        let value = self.parsed()?.clone();
        self.commit_value(value)
    }

    /// Encode `value`, decode the result back, and only then adopt both.
    fn commit_value(&mut self, value: StructuredValue) -> EngineResult<()> {
        let text = self
            .codec
            .encode(&value, &self.encode_options())
            .inspect_err(|err| warn!(error = %err, "structural edit rejected by encoder"))?;
        let decoded = if text.trim().is_empty() {
            None
        } else {
            let decoded = self
                .codec
                .decode(&text, &self.decode_options())
                .map_err(EngineError::Roundtrip)
                .inspect_err(|err| warn!(error = %err, "encoded text failed to decode"))?;
            Some(decoded)
        };

        self.raw_text = text;
        self.value = decoded;
        self.is_valid = true;
        self.errors.clear();
        self.is_dirty = true;
        self.record_history();
        debug!(len = self.raw_text.len(), "structural edit committed");
        Ok(())
    }

    fn parsed(&self) -> EngineResult<&StructuredValue> {
        match &self.value {
            Some(value) if self.is_valid => Ok(value),
            _ => Err(EngineError::NoDocument),
        }
    }

    /// Reset to the empty document. History is kept.
    pub fn clear(&mut self) {
        self.raw_text.clear();
        self.value = None;
        self.is_valid = true;
        self.errors.clear();
        self.is_dirty = false;
        self.file_name = None;
        self.selected.clear();
        self.search_query.clear();
        self.search_results.clear();
    }

    /// Step back one snapshot. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(content) = self.history.undo().map(|s| s.content.clone()) else {
            return false;
        };
        self.load(content);
        true
    }

    /// Step forward one snapshot. Returns `false` at the newest snapshot.
    pub fn redo(&mut self) -> bool {
        let Some(content) = self.history.redo().map(|s| s.content.clone()) else {
            return false;
        };
        self.load(content);
        true
    }

    /// Replay a snapshot. The dirty flag is left as it was.
    fn load(&mut self, content: String) {
        self.raw_text = content;
        self.validate_and_parse();
    }

    /// Add `value` under the container at `path`.
    ///
    /// Objects need a `key` that is not taken yet; arrays append. On a blank
    /// document the value becomes the root, wrapped as `{key: value}` when a
    /// key is given.
    pub fn add_node(
        &mut self,
        path: &[String],
        value: StructuredValue,
        key: Option<String>,
    ) -> EngineResult<()> {
        if self.value.is_none() {
            if !self.is_valid {
                return Err(EngineError::NoDocument);
            }
            let root = match key {
                Some(key) => StructuredValue::Object(ObjectMap::from([(key, value)])),
                None => value,
            };
            return self.commit_value(root);
        }

        let mut next = self.parsed()?.clone();
        let target =
            path::get_mut(&mut next, path).ok_or_else(|| EngineError::PathNotFound(describe(path)))?;
        match target {
            StructuredValue::Object(map) => {
                let key = key.ok_or_else(|| EngineError::KeyRequired(describe(path)))?;
                if map.contains_key(&key) {
                    return Err(EngineError::KeyExists(key));
                }
                map.insert(key, value);
            }
            StructuredValue::Array(items) => items.push(value),
            _ => return Err(EngineError::NotAContainer(describe(path))),
        }
        self.commit_value(next)
    }

    /// Replace the value at `path`, renaming its key when `new_key` differs.
    ///
    /// A rename keeps the entry at its position. `new_key` is ignored when the
    /// parent is an array. The empty path replaces the whole root.
    pub fn edit_node(
        &mut self,
        path: &[String],
        new_value: StructuredValue,
        new_key: Option<String>,
    ) -> EngineResult<()> {
        let current = self.parsed()?;
        let Some((parent, last)) = split_last(path) else {
            return self.commit_value(new_value);
        };
        if path::get(current, path).is_none() {
            return Err(EngineError::PathNotFound(describe(path)));
        }

        let mut next = current.clone();
        let parent_is_object = matches!(path::get(&next, parent), Some(StructuredValue::Object(_)));
        match new_key.filter(|key| parent_is_object && key != last) {
            Some(new_key) => {
                let Some(StructuredValue::Object(map)) = path::get_mut(&mut next, parent) else {
                    return Err(EngineError::PathNotFound(describe(path)));
                };
                if map.contains_key(&new_key) {
                    return Err(EngineError::KeyExists(new_key));
                }
                let Some((index, _, _)) = map.shift_remove_full(last) else {
                    return Err(EngineError::PathNotFound(describe(path)));
                };
                map.shift_insert(index, new_key, new_value);
            }
            None => {
                path::set(&mut next, path, new_value);
            }
        }
        self.commit_value(next)
    }

    /// Remove the value at `path`.
    pub fn delete_node(&mut self, path: &[String]) -> EngineResult<()> {
        if path.is_empty() {
            return Err(EngineError::RootPath);
        }
        let mut next = self.parsed()?.clone();
        path::remove(&mut next, path).ok_or_else(|| EngineError::PathNotFound(describe(path)))?;
        self.commit_value(next)
    }

    /// Insert a copy of the value at `path` right after it.
    ///
    /// Object entries get the first free key among `<key>_copy`,
    /// `<key>_copy_1`, `<key>_copy_2`, ...
    pub fn duplicate_node(&mut self, path: &[String]) -> EngineResult<()> {
        let Some((parent, last)) = split_last(path) else {
            return Err(EngineError::RootPath);
        };
        let current = self.parsed()?;
        let copy = path::get(current, path)
            .ok_or_else(|| EngineError::PathNotFound(describe(path)))?
            .clone();
        let array_index = path::array_index(current, path);

        let mut next = current.clone();
        match (path::get_mut(&mut next, parent), array_index) {
            (Some(StructuredValue::Array(items)), Some(index)) => items.insert(index + 1, copy),
            (Some(StructuredValue::Object(map)), _) => {
                let key = unique_copy_key(map, last);
                let index = map.get_index_of(last).map_or(map.len(), |i| i + 1);
                map.shift_insert(index, key, copy);
            }
            _ => return Err(EngineError::PathNotFound(describe(path))),
        }
        self.commit_value(next)
    }

    /// Move the value at `from` relative to `to`.
    ///
    /// The source is removed first and `to` is resolved against what is left.
    /// Moving a node into itself or one of its descendants is refused.
    pub fn move_node(
        &mut self,
        from: &[String],
        to: &[String],
        position: MovePosition,
    ) -> EngineResult<()> {
        let Some((_, source_key)) = split_last(from) else {
            return Err(EngineError::RootPath);
        };
        if is_prefix(from, to) {
            return Err(EngineError::InvalidMove(format!(
                "cannot move {} into itself or its descendant {}",
                describe(from),
                describe(to)
            )));
        }

        let mut next = self.parsed()?.clone();
        let moved =
            path::remove(&mut next, from).ok_or_else(|| EngineError::PathNotFound(describe(from)))?;
        let source_key = source_key.to_string();

        match position {
            MovePosition::Inside => {
                let target = path::get_mut(&mut next, to)
                    .ok_or_else(|| EngineError::PathNotFound(describe(to)))?;
                match target {
                    StructuredValue::Array(items) => items.push(moved),
                    StructuredValue::Object(map) => {
                        if map.contains_key(&source_key) {
                            return Err(EngineError::KeyExists(source_key));
                        }
                        map.insert(source_key, moved);
                    }
                    _ => return Err(EngineError::NotAContainer(describe(to))),
                }
            }
            MovePosition::Before | MovePosition::After => {
                let Some((parent, target_key)) = split_last(to) else {
                    return Err(EngineError::RootPath);
                };
                let offset = usize::from(position == MovePosition::After);
                let array_index = path::array_index(&next, to);
                match (path::get_mut(&mut next, parent), array_index) {
                    (Some(StructuredValue::Array(items)), Some(index)) => {
                        items.insert(index + offset, moved)
                    }
                    (Some(StructuredValue::Object(map)), _) => {
                        let index = map
                            .get_index_of(target_key)
                            .ok_or_else(|| EngineError::PathNotFound(describe(to)))?;
                        if map.contains_key(&source_key) {
                            return Err(EngineError::KeyExists(source_key));
                        }
                        map.shift_insert(index + offset, source_key, moved);
                    }
                    _ => return Err(EngineError::PathNotFound(describe(to))),
                }
            }
        }
        self.commit_value(next)
    }

    /// Number of matches `batch_replace` would replace.
    pub fn count_matches(&self, find: &str, use_regex: bool, match_case: bool) -> usize {
        match build_pattern(find, use_regex, match_case) {
            Some(pattern) => pattern.find_iter(&self.raw_text).count(),
            None => 0,
        }
    }

    /// Replace every match of `find` in the raw text and return the match count.
    ///
    /// An invalid pattern matches nothing. Regex replacements may refer to
    /// capture groups with `$1`; literal replacements are inserted as is.
    pub fn batch_replace(
        &mut self,
        find: &str,
        replace: &str,
        use_regex: bool,
        match_case: bool,
    ) -> usize {
        let Some(pattern) = build_pattern(find, use_regex, match_case) else {
            return 0;
        };
        let count = pattern.find_iter(&self.raw_text).count();
        if count > 0 {
            let replaced = if use_regex {
                pattern.replace_all(&self.raw_text, replace)
            } else {
                pattern.replace_all(&self.raw_text, NoExpand(replace))
            };
            let replaced = replaced.into_owned();
            self.set_content(replaced, true);
        }
        count
    }

    /// The value as pretty-printed JSON.
    pub fn to_json(&self) -> EngineResult<String> {
        let value = self.parsed()?;
        serde_json::to_string_pretty(value).map_err(|e| EngineError::Json(e.to_string()))
    }

    /// Replace the value with one read from JSON text.
    pub fn import_json(&mut self, json: &str) -> EngineResult<()> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| EngineError::Json(e.to_string()))?;
        self.commit_value(StructuredValue::from(value))
    }

    /// Projection of the current value. Empty when there is none.
    pub fn tree(&self) -> Vec<TreeNode> {
        match &self.value {
            Some(value) => tree::project(value, &[], &self.expanded),
            None => Vec::new(),
        }
    }

    pub fn expanded_paths(&self) -> &HashSet<String> {
        &self.expanded
    }

    /// Flip the expansion state of the node at `path`.
    pub fn toggle_node(&mut self, path: &[String]) -> bool {
        let id = join_path(path);
        if self.expanded.remove(&id) {
            false
        } else {
            self.expanded.insert(id);
            true
        }
    }

    pub fn expand_all(&mut self) {
        if let Some(value) = &self.value {
            self.expanded.extend(tree::collect_all_paths(value));
        }
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    pub fn select_node(&mut self, path: Path) {
        self.selected = path;
    }

    pub fn selected_path(&self) -> &[String] {
        &self.selected
    }

    /// Run a search and keep the query and results.
    pub fn search(&mut self, query: &str) -> &[Path] {
        self.search_query = query.to_string();
        self.search_results = match &self.value {
            Some(value) => search::find(value, query),
            None => Vec::new(),
        };
        &self.search_results
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn search_results(&self) -> &[Path] {
        &self.search_results
    }
}

/// Line and column of a decode failure. Falls back to scanning the message,
/// then to 1:1.
fn locate(err: &FormatError) -> (usize, usize) {
    if err.line > 0 && err.column > 0 {
        return (err.line, err.column);
    }
    let capture = |pattern: &Regex| {
        pattern
            .captures(&err.message)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .filter(|n| *n > 0)
    };
    (
        capture(&LINE_PATTERN).unwrap_or(1),
        capture(&COLUMN_PATTERN).unwrap_or(1),
    )
}

fn build_pattern(find: &str, use_regex: bool, match_case: bool) -> Option<Regex> {
    if find.is_empty() {
        return None;
    }
    let source = if use_regex {
        find.to_string()
    } else {
        regex::escape(find)
    };
    RegexBuilder::new(&source)
        .case_insensitive(!match_case)
        .build()
        .inspect_err(|err| debug!(error = %err, "invalid replace pattern"))
        .ok()
}

fn unique_copy_key(map: &ObjectMap, key: &str) -> String {
    let base = format!("{key}_copy");
    if !map.contains_key(&base) {
        return base;
    }
    (1usize..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !map.contains_key(candidate))
        .unwrap_or(base)
}

fn describe(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        join_path(path)
    }
}

/// Thread-safe storage for open documents.
#[derive(Debug)]
pub struct DocumentStore {
    codec: Arc<dyn Codec>,
    documents: DashMap<Url, Document>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(Arc::new(ToonCodec))
    }
}

impl DocumentStore {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            documents: DashMap::new(),
        }
    }

    /// Open (or reopen) a document with the given text. The new session starts
    /// clean, with the text as its first history snapshot.
    pub fn open(&self, uri: Url, text: String, options: DocumentOptions) {
        let mut document = Document::new(Arc::clone(&self.codec), options);
        if let Some(name) = uri.path_segments().and_then(|mut s| s.next_back()) {
            document.set_file_name(name);
        }
        document.set_content(text, true);
        document.mark_clean();
        self.documents.insert(uri, document);
    }

    pub fn close(&self, uri: &Url) {
        self.documents.remove(uri);
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }

    /// Run `f` against a document. `None` when it is not open.
    pub fn read<R>(&self, uri: &Url, f: impl FnOnce(&Document) -> R) -> Option<R> {
        self.documents.get(uri).map(|doc| f(&doc))
    }

    /// Run `f` with exclusive access to a document. `None` when it is not open.
    pub fn update<R>(&self, uri: &Url, f: impl FnOnce(&mut Document) -> R) -> Option<R> {
        self.documents.get_mut(uri).map(|mut doc| f(&mut doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EncodeError;
    use serde_json::json;

    fn p(segments: &[&str]) -> Path {
        segments.iter().map(|s| s.to_string()).collect()
    }

    fn doc(text: &str) -> Document {
        let mut doc = Document::default();
        doc.set_content(text, true);
        doc
    }

    fn json_of(doc: &Document) -> serde_json::Value {
        doc.value().map(serde_json::Value::from).unwrap_or_default()
    }

    #[derive(Debug)]
    struct RejectingEncoder;

    impl Codec for RejectingEncoder {
        fn decode(&self, text: &str, opts: &DecodeOptions) -> Result<StructuredValue, FormatError> {
            ToonCodec.decode(text, opts)
        }

        fn encode(&self, _: &StructuredValue, _: &EncodeOptions) -> Result<String, EncodeError> {
            Err(EncodeError::Other("refused".to_string()))
        }
    }

    #[derive(Debug)]
    struct FreeTextErrors;

    impl Codec for FreeTextErrors {
        fn decode(&self, _: &str, _: &DecodeOptions) -> Result<StructuredValue, FormatError> {
            Err(FormatError::new(0, 0, "bad token at line 4, column 9"))
        }

        fn encode(&self, _: &StructuredValue, _: &EncodeOptions) -> Result<String, EncodeError> {
            Ok(String::new())
        }
    }

    #[test]
    fn blank_content_is_valid_without_value() {
        let doc = doc("  \n");
        assert!(doc.is_valid());
        assert!(doc.errors().is_empty());
        assert!(doc.value().is_none());
        assert!(doc.is_dirty());
    }

    #[test]
    fn invalid_content_clears_value() {
        let mut doc = doc("a: 1");
        assert!(doc.value().is_some());
        doc.set_content("a: 1\nb: \"open", true);
        assert!(!doc.is_valid());
        assert!(doc.value().is_none());
        assert_eq!(doc.errors().len(), 1);
        assert_eq!(doc.errors()[0].line, 2);
    }

    #[test]
    fn error_position_falls_back_to_message() {
        let mut doc = Document::new(Arc::new(FreeTextErrors), DocumentOptions::default());
        doc.set_content("x", true);
        assert_eq!((doc.errors()[0].line, doc.errors()[0].column), (4, 9));

        let err = FormatError::new(0, 0, "no position here");
        assert_eq!(locate(&err), (1, 1));
    }

    #[test]
    fn set_content_skips_duplicate_snapshot() {
        let mut doc = doc("a: 1");
        doc.set_content("a: 1", true);
        assert_eq!(doc.history().len(), 1);
        doc.set_content("a: 2", false);
        assert_eq!(doc.history().len(), 1);
    }

    #[test]
    fn format_normalizes_text() {
        let mut doc = doc("a:\n    b: 1");
        doc.format().unwrap();
        assert_eq!(doc.raw_text(), "a:\n  b: 1");
        assert_eq!(doc.history().len(), 2);
    }

    #[test]
    fn format_without_value_is_noop() {
        let mut doc = doc("a: \"x");
        doc.format().unwrap();
        assert_eq!(doc.raw_text(), "a: \"x");
    }

    #[test]
    fn add_node_seeds_blank_document() {
        let mut keyed = Document::default();
        keyed
            .add_node(&[], StructuredValue::from(1), Some("a".to_string()))
            .unwrap();
        assert_eq!(keyed.raw_text(), "a: 1");

        let mut list = Document::default();
        list.add_node(&[], StructuredValue::from(json!([1, 2])), None)
            .unwrap();
        assert_eq!(list.raw_text(), "[2]: 1,2");
    }

    #[test]
    fn add_node_into_containers() {
        let mut doc = doc("a:\n  b: 1\nlist[1]: x");
        doc.add_node(&p(&["a"]), StructuredValue::from(2), Some("c".to_string()))
            .unwrap();
        doc.add_node(&p(&["list"]), StructuredValue::from("y"), None)
            .unwrap();
        assert_eq!(json_of(&doc), json!({"a": {"b": 1, "c": 2}, "list": ["x", "y"]}));

        let before = doc.raw_text().to_string();
        assert_eq!(
            doc.add_node(&p(&["a"]), StructuredValue::Null, None),
            Err(EngineError::KeyRequired("a".to_string()))
        );
        assert_eq!(
            doc.add_node(&p(&["a"]), StructuredValue::Null, Some("b".to_string())),
            Err(EngineError::KeyExists("b".to_string()))
        );
        assert_eq!(
            doc.add_node(&p(&["a", "b"]), StructuredValue::Null, None),
            Err(EngineError::NotAContainer("a.b".to_string()))
        );
        assert_eq!(doc.raw_text(), before);
    }

    #[test]
    fn edit_node_renames_in_place() {
        let mut doc = doc("x: 1\ny: 2\nz: 3");
        doc.edit_node(&p(&["y"]), StructuredValue::from(20), Some("w".to_string()))
            .unwrap();
        assert_eq!(doc.raw_text(), "x: 1\nw: 20\nz: 3");

        doc.edit_node(&p(&["w"]), StructuredValue::from(21), Some("w".to_string()))
            .unwrap();
        assert_eq!(doc.raw_text(), "x: 1\nw: 21\nz: 3");

        assert_eq!(
            doc.edit_node(&p(&["w"]), StructuredValue::Null, Some("x".to_string())),
            Err(EngineError::KeyExists("x".to_string()))
        );
        assert_eq!(
            doc.edit_node(&p(&["q"]), StructuredValue::Null, None),
            Err(EngineError::PathNotFound("q".to_string()))
        );
    }

    #[test]
    fn edit_node_on_root_replaces_everything() {
        let mut doc = doc("a: 1");
        doc.edit_node(&[], StructuredValue::from(json!({"b": true})), None)
            .unwrap();
        assert_eq!(doc.raw_text(), "b: true");
    }

    #[test]
    fn delete_node_rejects_root_and_missing_paths() {
        let mut doc = doc("a[3]: 1,2,3");
        assert_eq!(doc.delete_node(&[]), Err(EngineError::RootPath));
        assert_eq!(
            doc.delete_node(&p(&["a", "5"])),
            Err(EngineError::PathNotFound("a.5".to_string()))
        );
        doc.delete_node(&p(&["a", "0"])).unwrap();
        assert_eq!(doc.raw_text(), "a[2]: 2,3");
    }

    #[test]
    fn duplicate_probes_for_a_free_key() {
        let mut doc = doc("x: 1\nx_copy: 2\nx_copy_1: 3\ny: 4");
        doc.duplicate_node(&p(&["x"])).unwrap();
        assert_eq!(
            doc.raw_text(),
            "x: 1\nx_copy_2: 1\nx_copy: 2\nx_copy_1: 3\ny: 4"
        );
    }

    #[test]
    fn duplicate_array_element_inserts_after_source() {
        let mut doc = doc("a[3]: 1,2,3");
        doc.duplicate_node(&p(&["a", "1"])).unwrap();
        assert_eq!(doc.raw_text(), "a[4]: 1,2,2,3");
    }

    #[test]
    fn move_within_and_between_containers() {
        let mut doc = doc("a[3]: 1,2,3\nb:\n  k: v");
        doc.move_node(&p(&["a", "0"]), &p(&["a", "1"]), MovePosition::After)
            .unwrap();
        assert_eq!(json_of(&doc), json!({"a": [2, 3, 1], "b": {"k": "v"}}));

        doc.move_node(&p(&["b", "k"]), &p(&["a"]), MovePosition::Before)
            .unwrap();
        assert_eq!(json_of(&doc), json!({"k": "v", "a": [2, 3, 1], "b": {}}));

        doc.move_node(&p(&["a", "2"]), &p(&["b"]), MovePosition::Inside)
            .unwrap();
        assert_eq!(json_of(&doc), json!({"k": "v", "a": [2, 3], "b": {"2": 1}}));
    }

    #[test]
    fn move_into_own_subtree_fails_without_change() {
        let mut doc = doc("a:\n  b:\n    c: 1");
        let before = doc.raw_text().to_string();
        let history_len = doc.history().len();

        let err = doc
            .move_node(&p(&["a"]), &p(&["a", "b"]), MovePosition::Inside)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidMove(_)));
        assert!(doc
            .move_node(&p(&["a"]), &p(&["a"]), MovePosition::After)
            .is_err());
        assert_eq!(
            doc.move_node(&p(&["a", "b"]), &p(&["zz"]), MovePosition::Inside),
            Err(EngineError::PathNotFound("zz".to_string()))
        );

        assert_eq!(doc.raw_text(), before);
        assert_eq!(doc.history().len(), history_len);
    }

    #[test]
    fn encode_failure_leaves_state_untouched() {
        let mut doc = Document::new(Arc::new(RejectingEncoder), DocumentOptions::default());
        doc.set_content("a: 1", true);
        doc.mark_clean();

        let err = doc.delete_node(&p(&["a"])).unwrap_err();
        assert_eq!(err, EngineError::Encode(EncodeError::Other("refused".to_string())));
        assert_eq!(doc.raw_text(), "a: 1");
        assert!(!doc.is_dirty());
        assert_eq!(doc.history().len(), 1);
        assert!(doc.sync_content_from_data().is_err());
    }

    #[test]
    fn structural_edits_require_a_value() {
        let mut doc = doc("a: \"x");
        assert_eq!(
            doc.add_node(&[], StructuredValue::Null, Some("k".to_string())),
            Err(EngineError::NoDocument)
        );
        assert_eq!(doc.delete_node(&p(&["a"])), Err(EngineError::NoDocument));
    }

    #[test]
    fn batch_replace_counts_case_insensitive_matches() {
        let mut doc = doc("aAa");
        assert_eq!(doc.count_matches("a", false, false), 3);
        assert_eq!(doc.count_matches("a", false, true), 2);
        assert_eq!(doc.batch_replace("a", "b", false, false), 3);
        assert_eq!(doc.raw_text(), "bbb");
    }

    #[test]
    fn batch_replace_escapes_literals_and_rejects_bad_patterns() {
        let mut doc = doc("n: 1.5");
        assert_eq!(doc.batch_replace(".", "$0", false, true), 1);
        assert_eq!(doc.raw_text(), "n: 1$05");
        assert_eq!(doc.batch_replace("(", "x", true, true), 0);
        assert_eq!(doc.batch_replace("", "x", false, true), 0);
        assert_eq!(doc.raw_text(), "n: 1$05");
    }

    #[test]
    fn batch_replace_with_capture_groups() {
        let mut doc = doc("a: 1\nb: 2");
        assert_eq!(doc.batch_replace(r"(\w): (\d)", "$1: ${2}0", true, true), 2);
        assert_eq!(doc.raw_text(), "a: 10\nb: 20");
    }

    #[test]
    fn batch_replace_reports_count_when_text_still_decodes() {
        let mut doc = doc("a: 1");
        assert_eq!(doc.batch_replace(":", "", false, false), 1);
        assert_eq!(doc.raw_text(), "a 1");
        assert!(doc.is_valid());
        assert_eq!(doc.value(), Some(&StructuredValue::from("a 1")));
        assert_eq!(doc.history().len(), 2);
    }

    #[test]
    fn batch_replace_reports_count_when_text_breaks() {
        let mut doc = doc("a: \"x\"");
        assert_eq!(doc.batch_replace("x\"", "x", false, true), 1);
        assert_eq!(doc.raw_text(), "a: \"x");
        assert!(!doc.is_valid());
        assert!(doc.value().is_none());
        assert_eq!(doc.errors().len(), 1);
        assert_eq!(doc.history().len(), 2);
    }

    #[test]
    fn undo_and_redo_keep_dirty_flag() {
        let mut doc = doc("a: 1");
        doc.set_content("a: 2", true);
        doc.mark_clean();

        assert!(doc.undo());
        assert_eq!(doc.raw_text(), "a: 1");
        assert!(!doc.is_dirty());
        assert!(doc.redo());
        assert!(!doc.is_dirty());

        doc.set_content("a: 3", true);
        assert!(doc.undo());
        assert!(doc.is_dirty());
    }

    #[test]
    fn clear_keeps_history() {
        let mut doc = doc("a: 1");
        doc.set_file_name("data.toon");
        doc.clear();
        assert_eq!(doc.raw_text(), "");
        assert!(doc.value().is_none());
        assert!(!doc.is_dirty());
        assert_eq!(doc.file_name(), None);
        assert_eq!(doc.history().len(), 1);
    }

    #[test]
    fn undo_redo_replay_snapshots() {
        let mut doc = doc("a: 1");
        doc.set_content("a: 2", true);
        assert!(doc.undo());
        assert_eq!(doc.raw_text(), "a: 1");
        assert!(!doc.undo());
        assert!(doc.redo());
        assert_eq!(doc.raw_text(), "a: 2");
        assert!(!doc.redo());
        assert_eq!(doc.history().len(), 2);
    }

    #[test]
    fn json_export_and_import() {
        let mut doc = doc("a: 1\nb[2]: x,y");
        assert_eq!(
            doc.to_json().unwrap(),
            "{\n  \"a\": 1,\n  \"b\": [\n    \"x\",\n    \"y\"\n  ]\n}"
        );
        doc.import_json(r#"{"z": null}"#).unwrap();
        assert_eq!(doc.raw_text(), "z: null");
        assert!(matches!(doc.import_json("{"), Err(EngineError::Json(_))));
    }

    #[test]
    fn tree_state_follows_toggles() {
        let mut doc = doc("a:\n  b[1]: 1");
        assert!(doc.toggle_node(&p(&["a"])));
        assert!(doc.tree()[0].expanded);
        assert!(!doc.toggle_node(&p(&["a"])));
        assert!(!doc.tree()[0].expanded);

        doc.expand_all();
        assert_eq!(doc.expanded_paths().len(), 3);
        doc.collapse_all();
        assert!(doc.expanded_paths().is_empty());

        doc.select_node(p(&["a", "b"]));
        assert_eq!(doc.selected_path(), p(&["a", "b"]).as_slice());
    }

    #[test]
    fn search_stores_results() {
        let mut doc = doc("name: Ada\nrole: admin");
        assert_eq!(doc.search("ad").len(), 2);
        assert_eq!(doc.search_query(), "ad");
        assert_eq!(doc.search_results()[0], p(&["name"]));
    }

    #[test]
    fn store_opens_clean_documents() {
        let store = DocumentStore::default();
        let uri = Url::parse("file:///tmp/data.toon").unwrap();
        store.open(uri.clone(), "a: 1".to_string(), DocumentOptions::default());

        assert!(store.contains(&uri));
        assert_eq!(store.read(&uri, |d| d.is_dirty()), Some(false));
        assert_eq!(
            store.read(&uri, |d| d.file_name().map(str::to_string)),
            Some(Some("data.toon".to_string()))
        );

        store.update(&uri, |d| d.set_content("a: 2", true));
        assert_eq!(store.read(&uri, |d| d.raw_text().to_string()), Some("a: 2".to_string()));

        store.close(&uri);
        assert_eq!(store.read(&uri, |d| d.is_valid()), None);
    }
}
