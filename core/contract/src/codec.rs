// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Codec traits for payload serialization and deserialization.
//!
//! A [`BodyCodec`] turns interpreter values into wire bytes and back, and is
//! selected by content type at call time. The JSON codec is registered by
//! default; additional codecs may be registered per client or adapter.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("no codec registered for content type `{0}`")]
    UnknownContentType(String),

    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("deserialize error: {0}")]
    Deserialize(String),

    #[error("payload shape mismatch: {0}")]
    Shape(String),
}

/// Trait for encoding and decoding payload bodies.
pub trait BodyCodec: Send + Sync {
    /// The content type this codec serves, without parameters.
    fn content_type(&self) -> &str;

    /// Encode a value to bytes.
    fn serialize(&self, value: &Value) -> Result<Bytes, CodecError>;

    /// Decode bytes into a value.
    fn deserialize(&self, buf: &[u8]) -> Result<Value, CodecError>;
}

/// The default JSON codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl BodyCodec for JsonCodec {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn serialize(&self, value: &Value) -> Result<Bytes, CodecError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn deserialize(&self, buf: &[u8]) -> Result<Value, CodecError> {
        serde_json::from_slice(buf).map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}

/// Registry of codecs keyed by content type.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn BodyCodec>>,
}

impl CodecRegistry {
    /// Create a registry with the JSON codec pre-registered.
    pub fn new() -> Self {
        let mut registry = Self {
            codecs: HashMap::new(),
        };
        registry.register(Arc::new(JsonCodec));
        registry
    }

    /// Register a codec, replacing any codec already serving its content type.
    pub fn register(&mut self, codec: Arc<dyn BodyCodec>) {
        self.codecs
            .insert(essence(codec.content_type()).to_string(), codec);
    }

    /// Resolve a codec by content type. Parameters after `;` are ignored.
    pub fn resolve(&self, content_type: &str) -> Result<Arc<dyn BodyCodec>, CodecError> {
        self.codecs
            .get(&essence(content_type))
            .cloned()
            .ok_or_else(|| CodecError::UnknownContentType(content_type.to_string()))
    }

    /// Registered content types, for diagnostics.
    pub fn content_types(&self) -> Vec<&str> {
        self.codecs.keys().map(String::as_str).collect()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip content-type parameters and normalize case: `Application/JSON; charset=utf-8`
/// resolves the same codec as `application/json`.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

/// Decode an interpreter value into a typed model.
///
/// `Value::Null` decodes to the type's zero value, which is what gives an
/// empty response body its zero-value semantics at the typed edge.
pub fn decode_value<T>(value: Value) -> Result<T, CodecError>
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| CodecError::Shape(e.to_string()))
}
