// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Call arguments.
//!
//! Arguments are positional and line up with the method's declared
//! parameters. Plain values ride as `serde_json::Value`; content parts,
//! mutation callbacks and sink markers are their own variants so the engine
//! can hand each to the binding that claimed the position.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::errors::ClientError;
use wirebind_contract::{WireRequest, WireResponse};

/// A request-mutation callback: sees the fully built request before it is
/// sent.
pub trait RequestInspector: Send + Sync {
    fn inspect(&self, request: &mut WireRequest);
}

impl<F> RequestInspector for F
where
    F: Fn(&mut WireRequest) + Send + Sync,
{
    fn inspect(&self, request: &mut WireRequest) {
        self(request)
    }
}

/// A response-mutation callback: sees the raw response before decoding.
pub trait ResponseInspector: Send + Sync {
    fn inspect(&self, response: &WireResponse);
}

impl<F> ResponseInspector for F
where
    F: Fn(&WireResponse) + Send + Sync,
{
    fn inspect(&self, response: &WireResponse) {
        self(response)
    }
}

/// Raw bytes for a multipart part; the disposition metadata lives in the
/// parameter's binding.
#[derive(Debug, Clone)]
pub struct ContentPart {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl ContentPart {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// One positional call argument.
#[derive(Clone)]
pub enum CallArg {
    Value(Value),
    Content(ContentPart),
    RequestHook(Arc<dyn RequestInspector>),
    ResponseHook(Arc<dyn ResponseInspector>),
    /// Marks a sink position; the decoded or raw result comes back on the
    /// reply.
    Sink,
}

impl std::fmt::Debug for CallArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallArg::Value(v) => f.debug_tuple("Value").field(v).finish(),
            CallArg::Content(c) => f.debug_tuple("Content").field(&c.bytes.len()).finish(),
            CallArg::RequestHook(_) => f.write_str("RequestHook(..)"),
            CallArg::ResponseHook(_) => f.write_str("ResponseHook(..)"),
            CallArg::Sink => f.write_str("Sink"),
        }
    }
}

/// Ordered call arguments, one per declared parameter.
#[derive(Debug, Clone, Default)]
pub struct Args {
    args: Vec<CallArg>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plain value.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.args.push(CallArg::Value(value.into()));
        self
    }

    /// Append any serializable value.
    pub fn serialized<T: Serialize>(mut self, value: &T) -> Result<Self, ClientError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ClientError::Argument(format!("unserializable argument: {}", e)))?;
        self.args.push(CallArg::Value(value));
        Ok(self)
    }

    /// Append an absent optional value.
    pub fn none(mut self) -> Self {
        self.args.push(CallArg::Value(Value::Null));
        self
    }

    pub fn content(mut self, part: ContentPart) -> Self {
        self.args.push(CallArg::Content(part));
        self
    }

    pub fn request_hook(mut self, hook: Arc<dyn RequestInspector>) -> Self {
        self.args.push(CallArg::RequestHook(hook));
        self
    }

    pub fn response_hook(mut self, hook: Arc<dyn ResponseInspector>) -> Self {
        self.args.push(CallArg::ResponseHook(hook));
        self
    }

    /// Occupy a sink position.
    pub fn sink(mut self) -> Self {
        self.args.push(CallArg::Sink);
        self
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&CallArg> {
        self.args.get(index)
    }

    /// The value at a position, when the argument is a plain value.
    pub(crate) fn value_at(&self, index: usize) -> Option<&Value> {
        match self.args.get(index) {
            Some(CallArg::Value(v)) => Some(v),
            _ => None,
        }
    }
}
