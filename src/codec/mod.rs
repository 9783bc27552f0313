//! Codec boundary between document text and `StructuredValue`.
//!
//! The engine only talks to a `Codec`. `ToonCodec` is the bundled TOON
//! implementation; tests and embedders can swap in their own.

mod decode;
mod encode;

use std::fmt::Debug;

use crate::error::{EncodeError, FormatError};
use crate::types::StructuredValue;

/// Default indentation width in spaces.
pub const DEFAULT_INDENT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Reject tab indentation, indentation that is not a multiple of `indent`,
    /// duplicate keys, and array length mismatches.
    pub strict: bool,
    pub indent: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            strict: true,
            indent: DEFAULT_INDENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub indent: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
        }
    }
}

/// Text <-> value conversion. Implementations are pure and hold no shared state.
pub trait Codec: Send + Sync + Debug {
    fn decode(&self, text: &str, opts: &DecodeOptions) -> Result<StructuredValue, FormatError>;

    fn encode(&self, value: &StructuredValue, opts: &EncodeOptions) -> Result<String, EncodeError>;
}

/// The TOON text format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToonCodec;

impl Codec for ToonCodec {
    fn decode(&self, text: &str, opts: &DecodeOptions) -> Result<StructuredValue, FormatError> {
        decode::decode_document(text, opts)
    }

    fn encode(&self, value: &StructuredValue, opts: &EncodeOptions) -> Result<String, EncodeError> {
        encode::encode_document(value, opts)
    }
}
