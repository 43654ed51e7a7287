// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Argument extraction: the read half of plan interpretation.
//!
//! Walks a method's bindings against an inbound [`HostRequest`] and
//! produces the positional argument vector for the service call. Route and
//! query values arrive as the host matched them (strings); the body goes
//! through the content-type-selected codec; form bodies are parsed once and
//! shared across form bindings.

use serde_json::{Map, Value};
use url::form_urlencoded;

use wirebind_contract::{BindingKind, BindingPlan, CodecError, CodecRegistry, HostRequest};

/// Collect repeated wire values under one key: absent → Null, one → String,
/// many → Array in wire order.
fn collect_values(values: Vec<&str>) -> Value {
    match values.len() {
        0 => Value::Null,
        1 => Value::String(values[0].to_string()),
        _ => Value::Array(
            values
                .into_iter()
                .map(|v| Value::String(v.to_string()))
                .collect(),
        ),
    }
}

/// Extract positional service arguments from an inbound request.
///
/// Client-side roles (hooks, sinks, multipart content) yield `Value::Null`;
/// multipart parts are the host framework's own binding to deliver.
pub(crate) fn extract_args(
    plan: &BindingPlan,
    codecs: &CodecRegistry,
    request: &HostRequest,
) -> Result<Vec<Value>, CodecError> {
    let mut form_pairs: Option<Vec<(String, String)>> = None;
    let mut args = Vec::with_capacity(plan.bindings().len());

    for binding in plan.bindings() {
        let value = match binding.kind {
            BindingKind::RoutePlaceholder => request
                .route
                .get(&binding.name)
                .map(|v| Value::String(v.clone()))
                .unwrap_or(Value::Null),
            BindingKind::Query => collect_values(
                request
                    .query
                    .iter()
                    .filter(|(k, _)| k == &binding.name)
                    .map(|(_, v)| v.as_str())
                    .collect(),
            ),
            BindingKind::Header => request
                .headers
                .get(&binding.name)
                .and_then(|v| v.to_str().ok())
                .map(|v| Value::String(v.to_string()))
                .unwrap_or(Value::Null),
            BindingKind::Body => {
                if request.body.is_empty() {
                    Value::Null
                } else {
                    let content_type = request
                        .content_type()
                        .unwrap_or_else(|| plan.content_type());
                    codecs.resolve(content_type)?.deserialize(&request.body)?
                }
            }
            BindingKind::FormEntry => {
                let pairs = form_pairs.get_or_insert_with(|| {
                    form_urlencoded::parse(&request.body)
                        .map(|(k, v)| (k.into_owned(), v.into_owned()))
                        .collect()
                });
                collect_values(
                    pairs
                        .iter()
                        .filter(|(k, _)| k == &binding.name)
                        .map(|(_, v)| v.as_str())
                        .collect(),
                )
            }
            BindingKind::PropertyExtraction => {
                // rebuild the spread object from route values and query pairs
                let mut object = Map::new();
                for (k, v) in &request.route {
                    object.insert(k.clone(), Value::String(v.clone()));
                }
                for (k, v) in &request.query {
                    object.insert(k.clone(), Value::String(v.clone()));
                }
                Value::Object(object)
            }
            // client-side roles have no server-side value
            BindingKind::ContentDisposition
            | BindingKind::RequestHook
            | BindingKind::ResponseHook
            | BindingKind::ResponseSink
            | BindingKind::ModelSink => Value::Null,
        };
        args.push(value);
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use wirebind_contract::{
        plans_for, ContractDescriptor, MethodDescriptor, ParameterSpec, SourceAnnotation,
    };

    fn request() -> HostRequest {
        HostRequest::default()
    }

    fn plan_for(contract: &ContractDescriptor, method: &str) -> std::sync::Arc<BindingPlan> {
        plans_for(contract).unwrap().get(method).unwrap().clone()
    }

    #[test]
    fn test_route_and_query_extraction() {
        let contract = ContractDescriptor::new("ExtRoute", "/api").with_method(
            MethodDescriptor::new("find")
                .on("get", "widgets/{id}")
                .with_parameter(ParameterSpec::scalar("id"))
                .with_parameter(ParameterSpec::scalar("verbose").in_query()),
        );
        let plan = plan_for(&contract, "find");

        let mut req = request();
        req.route.insert("id".to_string(), "42".to_string());
        req.query.push(("verbose".to_string(), "true".to_string()));

        let args = extract_args(&plan, &CodecRegistry::new(), &req).unwrap();
        assert_eq!(args[0], json!("42"));
        assert_eq!(args[1], json!("true"));
    }

    #[test]
    fn test_repeated_query_collects_in_order() {
        let contract = ContractDescriptor::new("ExtRepeat", "/api").with_method(
            MethodDescriptor::new("list")
                .on("get", "widgets")
                .with_parameter(ParameterSpec::scalar("items").in_query()),
        );
        let plan = plan_for(&contract, "list");

        let mut req = request();
        for item in ["A", "B", "C", "D"] {
            req.query.push(("items".to_string(), item.to_string()));
        }

        let args = extract_args(&plan, &CodecRegistry::new(), &req).unwrap();
        assert_eq!(args[0], json!(["A", "B", "C", "D"]));
    }

    #[test]
    fn test_body_decodes_through_codec() {
        let contract = ContractDescriptor::new("ExtBody", "/api").with_method(
            MethodDescriptor::new("create")
                .on("post", "widgets")
                .with_parameter(ParameterSpec::model("widget")),
        );
        let plan = plan_for(&contract, "create");

        let mut req = request();
        req.body = Bytes::from(r#"{"id": 5, "label": "cog"}"#);

        let args = extract_args(&plan, &CodecRegistry::new(), &req).unwrap();
        assert_eq!(args[0]["label"], "cog");
    }

    #[test]
    fn test_empty_body_extracts_null() {
        let contract = ContractDescriptor::new("ExtEmpty", "/api").with_method(
            MethodDescriptor::new("create")
                .on("post", "widgets")
                .with_parameter(ParameterSpec::model("widget")),
        );
        let plan = plan_for(&contract, "create");
        let args = extract_args(&plan, &CodecRegistry::new(), &request()).unwrap();
        assert_eq!(args[0], Value::Null);
    }

    #[test]
    fn test_malformed_body_is_a_codec_error() {
        let contract = ContractDescriptor::new("ExtBad", "/api").with_method(
            MethodDescriptor::new("create")
                .on("post", "widgets")
                .with_parameter(ParameterSpec::model("widget")),
        );
        let plan = plan_for(&contract, "create");
        let mut req = request();
        req.body = Bytes::from("{not json");
        assert!(extract_args(&plan, &CodecRegistry::new(), &req).is_err());
    }

    #[test]
    fn test_form_entries_parse_once() {
        let contract = ContractDescriptor::new("ExtForm", "/api").with_method(
            MethodDescriptor::new("create")
                .on("post", "widgets")
                .with_parameter(ParameterSpec::scalar("label").in_form())
                .with_parameter(ParameterSpec::scalar("size").in_form()),
        );
        let plan = plan_for(&contract, "create");

        let mut req = request();
        req.body = Bytes::from("label=bolt+m3&size=3");

        let args = extract_args(&plan, &CodecRegistry::new(), &req).unwrap();
        assert_eq!(args[0], json!("bolt m3"));
        assert_eq!(args[1], json!("3"));
    }

    #[test]
    fn test_header_extraction() {
        let contract = ContractDescriptor::new("ExtHeader", "/api").with_method(
            MethodDescriptor::new("find")
                .on("get", "widgets")
                .with_parameter(ParameterSpec::scalar("tenant").in_header("x-tenant")),
        );
        let plan = plan_for(&contract, "find");

        let mut req = request();
        req.headers
            .insert("x-tenant", http::HeaderValue::from_static("blue"));

        let args = extract_args(&plan, &CodecRegistry::new(), &req).unwrap();
        assert_eq!(args[0], json!("blue"));
    }

    #[test]
    fn test_property_extraction_rebuilds_object() {
        let contract = ContractDescriptor::new("ExtProps", "/api").with_method(
            MethodDescriptor::new("find")
                .on("get", "widgets/{id}")
                .with_parameter(
                    ParameterSpec::model("selector").with_source(SourceAnnotation::Properties),
                ),
        );
        let plan = plan_for(&contract, "find");

        let mut req = request();
        req.route.insert("id".to_string(), "42".to_string());
        req.query.push(("verbose".to_string(), "true".to_string()));

        let args = extract_args(&plan, &CodecRegistry::new(), &req).unwrap();
        assert_eq!(args[0], json!({"id": "42", "verbose": "true"}));
    }
}
