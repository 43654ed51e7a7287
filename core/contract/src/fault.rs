// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Service fault model and fault-to-status handler specs.
//!
//! Fault kinds are hierarchical dot-separated paths (`storage.timeout` is a
//! specialization of `storage`). A handler declared for a kind matches that
//! kind and every specialization of it; the dispatch adapter picks the
//! most-specific matching handler, with declaration order as the tiebreak.

use http::StatusCode;
use serde_json::{Map, Value};

/// A service-side failure carried across the adapter boundary as data.
///
/// `data` holds named fields a fault handler may copy into a response model.
#[derive(Debug, Clone)]
pub struct Fault {
    kind: String,
    message: String,
    data: Map<String, Value>,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            data: Map::new(),
        }
    }

    /// Attach a named field, available to handler model shaping.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.data.insert(name.into(), value);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Whether this fault's kind is `handler_kind` or a specialization of it.
    pub fn matches(&self, handler_kind: &str) -> bool {
        self.kind == handler_kind
            || (self.kind.len() > handler_kind.len()
                && self.kind.starts_with(handler_kind)
                && self.kind.as_bytes()[handler_kind.len()] == b'.')
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fault `{}`: {}", self.kind, self.message)
    }
}

impl std::error::Error for Fault {}

/// The JSON type a shaped model field must carry; mismatched fields are
/// dropped rather than coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    String,
    Number,
    Bool,
    Object,
    Array,
}

impl JsonKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            JsonKind::String => value.is_string(),
            JsonKind::Number => value.is_number(),
            JsonKind::Bool => value.is_boolean(),
            JsonKind::Object => value.is_object(),
            JsonKind::Array => value.is_array(),
        }
    }
}

/// One field of a shaped fault model.
#[derive(Debug, Clone)]
pub struct FaultField {
    pub name: String,
    pub kind: JsonKind,
}

/// The shape of the model a handler builds from a fault: same-named,
/// same-typed fields are copied; everything else is left out.
#[derive(Debug, Clone, Default)]
pub struct FaultShape {
    pub fields: Vec<FaultField>,
}

impl FaultShape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, kind: JsonKind) -> Self {
        self.fields.push(FaultField {
            name: name.into(),
            kind,
        });
        self
    }

    /// Build the shaped model. The fault's `message` is available under the
    /// name `message` when declared as a string field.
    pub fn apply(&self, fault: &Fault) -> Value {
        let mut out = Map::new();
        for field in &self.fields {
            let candidate = match fault.data().get(&field.name) {
                Some(value) => Some(value.clone()),
                None if field.name == "message" && field.kind == JsonKind::String => {
                    Some(Value::String(fault.message().to_string()))
                }
                None => None,
            };
            if let Some(value) = candidate {
                if field.kind.accepts(&value) {
                    out.insert(field.name.clone(), value);
                }
            }
        }
        Value::Object(out)
    }
}

/// Declarative mapping from a fault kind to a response status.
#[derive(Debug, Clone)]
pub struct FaultHandlerSpec {
    pub kind: String,
    pub status: StatusCode,
    pub shape: Option<FaultShape>,
}

impl FaultHandlerSpec {
    pub fn new(kind: impl Into<String>, status: StatusCode) -> Self {
        Self {
            kind: kind.into(),
            status,
            shape: None,
        }
    }

    pub fn with_shape(mut self, shape: FaultShape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Specificity is path depth; deeper wins.
    pub fn specificity(&self) -> usize {
        self.kind.split('.').count()
    }
}

/// Pick the handler for a fault: most-specific kind first, declaration order
/// as tiebreak. `handlers` is expected in declaration order.
pub fn select_handler<'a>(
    handlers: &'a [FaultHandlerSpec],
    fault: &Fault,
) -> Option<&'a FaultHandlerSpec> {
    handlers
        .iter()
        .enumerate()
        .filter(|(_, h)| fault.matches(&h.kind))
        .min_by_key(|(index, h)| (std::cmp::Reverse(h.specificity()), *index))
        .map(|(_, h)| h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_prefix_matching() {
        let fault = Fault::new("storage.timeout.lock", "lock wait timed out");
        assert!(fault.matches("storage.timeout.lock"));
        assert!(fault.matches("storage.timeout"));
        assert!(fault.matches("storage"));
        assert!(!fault.matches("storage.time"));
        assert!(!fault.matches("net"));
    }

    #[test]
    fn test_most_specific_handler_wins() {
        let handlers = vec![
            FaultHandlerSpec::new("storage", StatusCode::INTERNAL_SERVER_ERROR),
            FaultHandlerSpec::new("storage.timeout", StatusCode::GATEWAY_TIMEOUT),
        ];
        let fault = Fault::new("storage.timeout.lock", "x");
        let selected = select_handler(&handlers, &fault).unwrap();
        assert_eq!(selected.status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let handlers = vec![
            FaultHandlerSpec::new("storage.timeout", StatusCode::GATEWAY_TIMEOUT),
            FaultHandlerSpec::new("storage.timeout", StatusCode::BAD_GATEWAY),
        ];
        let fault = Fault::new("storage.timeout", "x");
        let selected = select_handler(&handlers, &fault).unwrap();
        assert_eq!(selected.status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_no_match_yields_none() {
        let handlers = vec![FaultHandlerSpec::new("auth", StatusCode::UNAUTHORIZED)];
        let fault = Fault::new("storage.timeout", "x");
        assert!(select_handler(&handlers, &fault).is_none());
    }

    #[test]
    fn test_shape_copies_matching_fields_only() {
        let shape = FaultShape::new()
            .field("message", JsonKind::String)
            .field("attempts", JsonKind::Number)
            .field("retryable", JsonKind::Bool);
        let fault = Fault::new("storage.timeout", "lock wait timed out")
            .with_field("attempts", serde_json::json!(3))
            .with_field("retryable", serde_json::json!("yes"));

        let model = shape.apply(&fault);
        assert_eq!(model["message"], "lock wait timed out");
        assert_eq!(model["attempts"], 3);
        // wrong JSON type, dropped
        assert!(model.get("retryable").is_none());
    }
}
