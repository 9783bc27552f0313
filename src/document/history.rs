//! Bounded linear undo/redo history of document content.

use serde::Serialize;

/// Default maximum number of snapshots kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// One recorded content state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistorySnapshot {
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Append-only snapshot log with a cursor.
///
/// Empty until the first `record`; afterwards `cursor < len()` always holds and
/// the cursor points at the snapshot matching the document's current text.
#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<HistorySnapshot>,
    cursor: Option<usize>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: None,
            limit: limit.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn snapshots(&self) -> &[HistorySnapshot] {
        &self.snapshots
    }

    /// Snapshot the cursor points at.
    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.snapshots.get(self.cursor?)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.snapshots.len())
    }

    /// Record `content`, pruning any redo branch first.
    pub fn record(&mut self, content: impl Into<String>) {
        self.record_at(content, chrono::Utc::now().timestamp_millis());
    }

    pub fn record_at(&mut self, content: impl Into<String>, timestamp: i64) {
        if let Some(cursor) = self.cursor {
            self.snapshots.truncate(cursor + 1);
        }
        self.snapshots.push(HistorySnapshot {
            content: content.into(),
            timestamp,
        });

        if self.snapshots.len() > self.limit {
            // Oldest entry falls off; the cursor index stays where it is, which
            // now names the newest snapshot.
            self.snapshots.remove(0);
        } else {
            self.cursor = Some(self.cursor.map_or(0, |c| c + 1));
        }
        tracing::trace!(len = self.snapshots.len(), cursor = ?self.cursor, "history recorded");
    }

    /// Step back. Returns the snapshot to load, or `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_undo() {
            return None;
        }
        let cursor = self.cursor.map(|c| c - 1)?;
        self.cursor = Some(cursor);
        self.snapshots.get(cursor)
    }

    /// Step forward. Returns the snapshot to load, or `None` at the newest entry.
    pub fn redo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_redo() {
            return None;
        }
        let cursor = self.cursor.map(|c| c + 1)?;
        self.cursor = Some(cursor);
        self.snapshots.get(cursor)
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = None;
    }
}
