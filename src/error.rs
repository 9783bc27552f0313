//! Error taxonomy shared by the codec and the document engine.

use thiserror::Error;

/// Decode failure. Line and column are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}, column {column}: {message}")]
pub struct FormatError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl FormatError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// The encoder was handed a value it has no text form for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("character U+{code:04X} cannot be represented in {context}")]
    UnrepresentableCharacter { code: u32, context: &'static str },

    #[error("{0}")]
    Other(String),
}

/// Failure of a document engine operation. The document is unchanged when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("document has no parsed value")]
    NoDocument,

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("operation cannot target the document root")]
    RootPath,

    #[error("value at {0} is not an array or object")]
    NotAContainer(String),

    #[error("a key is required to add into the object at {0}")]
    KeyRequired(String),

    #[error("key already exists: {0}")]
    KeyExists(String),

    #[error("invalid move: {0}")]
    InvalidMove(String),

    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("encoded text does not decode: {0}")]
    Roundtrip(FormatError),

    #[error("invalid JSON: {0}")]
    Json(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
