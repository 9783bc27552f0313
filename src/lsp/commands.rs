//! `workspace/executeCommand` surface over the document engine.
//!
//! Every command takes one JSON object argument holding at least the document
//! `uri`. Paths are arrays of segment strings; `[]` is the root.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::Url;

use crate::document::{Document, MovePosition, Path};
use crate::error::EngineError;
use crate::types::StructuredValue;

pub const FORMAT: &str = "toon.format";
pub const UNDO: &str = "toon.undo";
pub const REDO: &str = "toon.redo";
pub const CLEAR: &str = "toon.clear";
pub const ADD_NODE: &str = "toon.addNode";
pub const EDIT_NODE: &str = "toon.editNode";
pub const DELETE_NODE: &str = "toon.deleteNode";
pub const DUPLICATE_NODE: &str = "toon.duplicateNode";
pub const MOVE_NODE: &str = "toon.moveNode";
pub const BATCH_REPLACE: &str = "toon.batchReplace";
pub const SEARCH: &str = "toon.search";
pub const TREE: &str = "toon.tree";
pub const TOGGLE_NODE: &str = "toon.toggleNode";
pub const EXPAND_ALL: &str = "toon.expandAll";
pub const COLLAPSE_ALL: &str = "toon.collapseAll";
pub const EXPORT_JSON: &str = "toon.exportJson";
pub const IMPORT_JSON: &str = "toon.importJson";
pub const STATUS: &str = "toon.status";

/// Commands advertised in the server capabilities.
pub const ALL_COMMANDS: &[&str] = &[
    FORMAT,
    UNDO,
    REDO,
    CLEAR,
    ADD_NODE,
    EDIT_NODE,
    DELETE_NODE,
    DUPLICATE_NODE,
    MOVE_NODE,
    BATCH_REPLACE,
    SEARCH,
    TREE,
    TOGGLE_NODE,
    EXPAND_ALL,
    COLLAPSE_ALL,
    EXPORT_JSON,
    IMPORT_JSON,
    STATUS,
];

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0} expects one object argument")]
    MissingArgument(String),

    #[error("invalid arguments for {command}: {message}")]
    InvalidArguments { command: String, message: String },

    #[error("document not open: {0}")]
    NotOpen(Url),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<CommandError> for jsonrpc::Error {
    fn from(err: CommandError) -> Self {
        let message = err.to_string();
        match err {
            CommandError::UnknownCommand(_) => jsonrpc::Error {
                code: jsonrpc::ErrorCode::MethodNotFound,
                message: message.into(),
                data: None,
            },
            _ => jsonrpc::Error::invalid_params(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Format,
    Undo,
    Redo,
    Clear,
    AddNode {
        path: Path,
        value: StructuredValue,
        key: Option<String>,
    },
    EditNode {
        path: Path,
        value: StructuredValue,
        new_key: Option<String>,
    },
    DeleteNode {
        path: Path,
    },
    DuplicateNode {
        path: Path,
    },
    MoveNode {
        from: Path,
        to: Path,
        position: MovePosition,
    },
    BatchReplace {
        find: String,
        replace: String,
        use_regex: bool,
        match_case: bool,
        preview: bool,
    },
    Search {
        query: String,
    },
    Tree,
    ToggleNode {
        path: Path,
    },
    ExpandAll,
    CollapseAll,
    ExportJson,
    ImportJson {
        json: String,
    },
    Status,
}

/// A parsed command with its target document.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub uri: Url,
    pub command: Command,
}

#[derive(Deserialize)]
struct Target {
    uri: Url,
}

#[derive(Deserialize)]
struct PathArgs {
    #[serde(default)]
    path: Path,
}

#[derive(Deserialize)]
struct AddNodeArgs {
    #[serde(default)]
    path: Path,
    value: Value,
    key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditNodeArgs {
    #[serde(default)]
    path: Path,
    value: Value,
    new_key: Option<String>,
}

#[derive(Deserialize)]
struct MoveNodeArgs {
    from: Path,
    to: Path,
    position: MovePosition,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchReplaceArgs {
    find: String,
    #[serde(default)]
    replace: String,
    #[serde(default)]
    use_regex: bool,
    #[serde(default)]
    match_case: bool,
    #[serde(default)]
    preview: bool,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Deserialize)]
struct ImportJsonArgs {
    json: String,
}

fn decode_args<T: DeserializeOwned>(name: &str, argument: &Value) -> Result<T, CommandError> {
    T::deserialize(argument).map_err(|e| CommandError::InvalidArguments {
        command: name.to_string(),
        message: e.to_string(),
    })
}

/// Parse an `executeCommand` request.
pub fn parse(name: &str, arguments: &[Value]) -> Result<Invocation, CommandError> {
    if !ALL_COMMANDS.contains(&name) {
        return Err(CommandError::UnknownCommand(name.to_string()));
    }
    let argument = arguments
        .first()
        .filter(|arg| arg.is_object())
        .ok_or_else(|| CommandError::MissingArgument(name.to_string()))?;
    let Target { uri } = decode_args(name, argument)?;

    let command = match name {
        FORMAT => Command::Format,
        UNDO => Command::Undo,
        REDO => Command::Redo,
        CLEAR => Command::Clear,
        ADD_NODE => {
            let args: AddNodeArgs = decode_args(name, argument)?;
            Command::AddNode {
                path: args.path,
                value: args.value.into(),
                key: args.key,
            }
        }
        EDIT_NODE => {
            let args: EditNodeArgs = decode_args(name, argument)?;
            Command::EditNode {
                path: args.path,
                value: args.value.into(),
                new_key: args.new_key,
            }
        }
        DELETE_NODE => Command::DeleteNode {
            path: decode_args::<PathArgs>(name, argument)?.path,
        },
        DUPLICATE_NODE => Command::DuplicateNode {
            path: decode_args::<PathArgs>(name, argument)?.path,
        },
        MOVE_NODE => {
            let args: MoveNodeArgs = decode_args(name, argument)?;
            Command::MoveNode {
                from: args.from,
                to: args.to,
                position: args.position,
            }
        }
        BATCH_REPLACE => {
            let args: BatchReplaceArgs = decode_args(name, argument)?;
            Command::BatchReplace {
                find: args.find,
                replace: args.replace,
                use_regex: args.use_regex,
                match_case: args.match_case,
                preview: args.preview,
            }
        }
        SEARCH => Command::Search {
            query: decode_args::<SearchArgs>(name, argument)?.query,
        },
        TREE => Command::Tree,
        TOGGLE_NODE => Command::ToggleNode {
            path: decode_args::<PathArgs>(name, argument)?.path,
        },
        EXPAND_ALL => Command::ExpandAll,
        COLLAPSE_ALL => Command::CollapseAll,
        EXPORT_JSON => Command::ExportJson,
        IMPORT_JSON => Command::ImportJson {
            json: decode_args::<ImportJsonArgs>(name, argument)?.json,
        },
        _ => Command::Status,
    };
    Ok(Invocation { uri, command })
}

/// Result of running a command against a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// JSON returned to the client.
    pub result: Value,
    /// Text before the command ran, when the command changed it.
    pub replaced: Option<String>,
}

impl Outcome {
    pub fn text_changed(&self) -> bool {
        self.replaced.is_some()
    }
}

/// Run `command` against `document`.
pub fn execute(document: &mut Document, command: Command) -> Result<Outcome, EngineError> {
    let before = document.raw_text().to_string();

    let result = match command {
        Command::Format => {
            document.format()?;
            status(document)
        }
        Command::Undo => {
            let applied = document.undo();
            with_applied(status(document), applied)
        }
        Command::Redo => {
            let applied = document.redo();
            with_applied(status(document), applied)
        }
        Command::Clear => {
            document.clear();
            status(document)
        }
        Command::AddNode { path, value, key } => {
            document.add_node(&path, value, key)?;
            status(document)
        }
        Command::EditNode {
            path,
            value,
            new_key,
        } => {
            document.edit_node(&path, value, new_key)?;
            status(document)
        }
        Command::DeleteNode { path } => {
            document.delete_node(&path)?;
            status(document)
        }
        Command::DuplicateNode { path } => {
            document.duplicate_node(&path)?;
            status(document)
        }
        Command::MoveNode { from, to, position } => {
            document.move_node(&from, &to, position)?;
            status(document)
        }
        Command::BatchReplace {
            find,
            replace,
            use_regex,
            match_case,
            preview,
        } => {
            let count = if preview {
                document.count_matches(&find, use_regex, match_case)
            } else {
                document.batch_replace(&find, &replace, use_regex, match_case)
            };
            json!({ "count": count })
        }
        Command::Search { query } => {
            let results = document.search(&query).to_vec();
            json!({ "query": query, "results": results })
        }
        Command::Tree => {
            serde_json::to_value(document.tree()).map_err(|e| EngineError::Json(e.to_string()))?
        }
        Command::ToggleNode { path } => {
            let expanded = document.toggle_node(&path);
            json!({ "expanded": expanded })
        }
        Command::ExpandAll => {
            document.expand_all();
            json!({ "expanded": document.expanded_paths().len() })
        }
        Command::CollapseAll => {
            document.collapse_all();
            json!({ "expanded": 0 })
        }
        Command::ExportJson => json!({ "json": document.to_json()? }),
        Command::ImportJson { json } => {
            document.import_json(&json)?;
            status(document)
        }
        Command::Status => status(document),
    };

    let replaced = (document.raw_text() != before).then_some(before);
    Ok(Outcome { result, replaced })
}

fn with_applied(mut status: Value, applied: bool) -> Value {
    if let Some(map) = status.as_object_mut() {
        map.insert("applied".to_string(), Value::Bool(applied));
    }
    status
}

/// Summary of a document's state.
pub fn status(document: &Document) -> Value {
    let errors: Vec<Value> = document
        .errors()
        .iter()
        .map(|e| json!({ "line": e.line, "column": e.column, "message": e.message }))
        .collect();
    json!({
        "isValid": document.is_valid(),
        "isDirty": document.is_dirty(),
        "canUndo": document.can_undo(),
        "canRedo": document.can_redo(),
        "historyLength": document.history().len(),
        "fileName": document.file_name(),
        "errors": errors,
    })
}
