//! Document state management and text utilities.
//!
//! This module provides:
//! - `path` functions that read and write values by key/index path
//! - `History`, the bounded undo/redo log
//! - `Document` and `DocumentStore` for the editing session lifecycle
//! - `TreeNode` projection and key/value search
//! - `LineIndex` for 1-based line/column <-> LSP position conversion

mod history;
pub mod path;
mod search;
mod state;
mod text;
mod tree;

pub use history::{History, HistorySnapshot, DEFAULT_HISTORY_LIMIT};
pub use path::{join_path, split_path, Path};
pub use search::find;
pub use state::{Document, DocumentOptions, DocumentStore, MovePosition};
pub use text::LineIndex;
pub use tree::{collect_all_paths, project, TreeNode, ROOT_ID};
