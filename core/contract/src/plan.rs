// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! The binding-plan compiler.
//!
//! Compilation is a pure function of a [`ContractDescriptor`]: route
//! annotations resolve to a verb and path template, parameters classify into
//! bindings in declaration order, and every invariant the metadata must hold
//! is checked here so nothing fails at call time that could have failed at
//! build time. The resulting [`BindingPlan`] is immutable and read
//! concurrently by the client engine and the server adapter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use http::Method;

use crate::auth::AuthorizationSpec;
use crate::descriptor::{
    ContractDescriptor, Disposition, MethodDescriptor, ParameterShape, ResponsePolicy,
    SourceAnnotation, ValueEncoding,
};
use crate::errors::PlanBuildError;
use crate::fault::FaultHandlerSpec;
use crate::filter::CallFilter;
use crate::retry::RetryPolicy;
use crate::route::{join_paths, resolve_route, split_origin, PathTemplate};
use crate::wire::CompletionMode;

/// The compiled source of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Body,
    Header,
    Query,
    RoutePlaceholder,
    FormEntry,
    ContentDisposition,
    PropertyExtraction,
    RequestHook,
    ResponseHook,
    ResponseSink,
    ModelSink,
}

/// One compiled parameter binding. `param` is the declared parameter name;
/// `name` is the wire-side source name (header key, query key, placeholder).
#[derive(Debug, Clone)]
pub struct ParameterBinding {
    pub index: usize,
    pub param: String,
    pub kind: BindingKind,
    pub name: String,
    pub format: Option<String>,
    pub encoding: ValueEncoding,
    pub disposition: Option<Disposition>,
}

/// A compiled, immutable execution plan for one method.
pub struct BindingPlan {
    contract: String,
    method: String,
    verb: Method,
    origin: Option<String>,
    template: PathTemplate,
    full_path: String,
    content_type: String,
    completion: CompletionMode,
    timeout: Option<Duration>,
    headers: Vec<(String, String)>,
    bindings: Vec<ParameterBinding>,
    body_index: Option<usize>,
    request_hook: Option<usize>,
    response_hook: Option<usize>,
    response_sink: Option<usize>,
    model_sink: Option<usize>,
    has_property_extraction: bool,
    response: ResponsePolicy,
    retry: Option<RetryPolicy>,
    authorization: Option<AuthorizationSpec>,
    fault_handlers: Vec<FaultHandlerSpec>,
    filters: Vec<Arc<dyn CallFilter>>,
}

impl BindingPlan {
    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn verb(&self) -> &Method {
        &self.verb
    }

    /// `scheme://authority` when the contract base path is absolute.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// The combined base-plus-template path, placeholders included.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn completion(&self) -> CompletionMode {
        self.completion
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Static headers, contract-level first, templates unexpanded.
    pub fn static_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }

    pub fn body_index(&self) -> Option<usize> {
        self.body_index
    }

    pub fn request_hook(&self) -> Option<usize> {
        self.request_hook
    }

    pub fn response_hook(&self) -> Option<usize> {
        self.response_hook
    }

    pub fn response_sink(&self) -> Option<usize> {
        self.response_sink
    }

    pub fn model_sink(&self) -> Option<usize> {
        self.model_sink
    }

    pub fn has_property_extraction(&self) -> bool {
        self.has_property_extraction
    }

    pub fn response(&self) -> &ResponsePolicy {
        &self.response
    }

    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub fn authorization(&self) -> Option<&AuthorizationSpec> {
        self.authorization.as_ref()
    }

    /// Fault handlers in declaration order; selection applies specificity.
    pub fn fault_handlers(&self) -> &[FaultHandlerSpec] {
        &self.fault_handlers
    }

    /// Contract-level filters first, then method-level, in declaration order.
    pub fn filters(&self) -> &[Arc<dyn CallFilter>] {
        &self.filters
    }
}

impl std::fmt::Debug for BindingPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingPlan")
            .field("contract", &self.contract)
            .field("method", &self.method)
            .field("verb", &self.verb)
            .field("full_path", &self.full_path)
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// All compiled plans of one contract.
pub struct ContractPlans {
    contract: String,
    methods: HashMap<String, Arc<BindingPlan>>,
}

impl ContractPlans {
    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn get(&self, method: &str) -> Option<&Arc<BindingPlan>> {
        self.methods.get(method)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<BindingPlan>> {
        self.methods.values()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Compile a contract's metadata into plans for every method.
pub fn compile_contract(descriptor: &ContractDescriptor) -> Result<ContractPlans, PlanBuildError> {
    if descriptor.methods.is_empty() {
        return Err(PlanBuildError::EmptyContract(descriptor.name.clone()));
    }
    if let Some(retry) = &descriptor.retry {
        retry.validate(&format!("contract `{}`", descriptor.name))?;
    }
    validate_header_names(&descriptor.headers, &format!("contract `{}`", descriptor.name))?;

    let mut methods = HashMap::new();
    for method in &descriptor.methods {
        let plan = compile_method(descriptor, method)?;
        methods.insert(method.name.clone(), Arc::new(plan));
    }

    Ok(ContractPlans {
        contract: descriptor.name.clone(),
        methods,
    })
}

fn validate_header_names(
    headers: &[(String, String)],
    scope: &str,
) -> Result<(), PlanBuildError> {
    for (name, _) in headers {
        if http::header::HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(PlanBuildError::InvalidHeaderName {
                scope: scope.to_string(),
                name: name.clone(),
            });
        }
    }
    Ok(())
}

fn compile_method(
    contract: &ContractDescriptor,
    method: &MethodDescriptor,
) -> Result<BindingPlan, PlanBuildError> {
    let (verb, route_template) = resolve_route(&method.name, &method.routes)?;
    let full_path = join_paths(&contract.base_path, &route_template);
    let (origin, path_part) = split_origin(&full_path);
    let template = PathTemplate::parse(&method.name, path_part)?;

    validate_header_names(&method.headers, &format!("method `{}`", method.name))?;
    if let Some(retry) = &method.retry {
        retry.validate(&format!("method `{}`", method.name))?;
    }

    let compiled = classify_parameters(method, &template)?;
    check_placeholders(&method.name, &template, &compiled)?;
    check_fault_handlers(&contract.name, method)?;

    let mut headers = contract.headers.clone();
    headers.extend(method.headers.iter().cloned());

    let mut filters: Vec<Arc<dyn CallFilter>> = contract.filters.clone();
    filters.extend(method.filters.iter().cloned());

    Ok(BindingPlan {
        contract: contract.name.clone(),
        method: method.name.clone(),
        verb,
        origin: origin.map(str::to_string),
        template,
        full_path,
        content_type: method
            .content_type
            .clone()
            .unwrap_or_else(|| contract.content_type.clone()),
        completion: method.completion,
        timeout: contract.timeout,
        headers,
        body_index: compiled.body_index,
        request_hook: compiled.request_hook,
        response_hook: compiled.response_hook,
        response_sink: compiled.response_sink,
        model_sink: compiled.model_sink,
        has_property_extraction: compiled.has_property_extraction,
        bindings: compiled.bindings,
        response: method.response.clone(),
        retry: method.retry.clone().or_else(|| contract.retry.clone()),
        authorization: contract.authorization.clone(),
        fault_handlers: method.fault_handlers.clone(),
        filters,
    })
}

struct CompiledParameters {
    bindings: Vec<ParameterBinding>,
    body_index: Option<usize>,
    request_hook: Option<usize>,
    response_hook: Option<usize>,
    response_sink: Option<usize>,
    model_sink: Option<usize>,
    has_property_extraction: bool,
}

/// Classify parameters in declaration order. Only the first body-claiming
/// candidate wins; singleton roles (hooks, sinks) reject duplicates.
fn classify_parameters(
    method: &MethodDescriptor,
    template: &PathTemplate,
) -> Result<CompiledParameters, PlanBuildError> {
    let mut out = CompiledParameters {
        bindings: Vec::with_capacity(method.parameters.len()),
        body_index: None,
        request_hook: None,
        response_hook: None,
        response_sink: None,
        model_sink: None,
        has_property_extraction: false,
    };

    let claim_singleton =
        |slot: &mut Option<usize>, index: usize, kind: &str| -> Result<(), PlanBuildError> {
            if slot.is_some() {
                return Err(PlanBuildError::DuplicateSingleton {
                    method: method.name.clone(),
                    kind: kind.to_string(),
                });
            }
            *slot = Some(index);
            Ok(())
        };

    for (index, spec) in method.parameters.iter().enumerate() {
        let kind = match spec.shape {
            ParameterShape::ResponseSink => {
                claim_singleton(&mut out.response_sink, index, "response-sink")?;
                BindingKind::ResponseSink
            }
            ParameterShape::ModelSink => {
                claim_singleton(&mut out.model_sink, index, "decoded-model-sink")?;
                BindingKind::ModelSink
            }
            ParameterShape::RequestHook => {
                claim_singleton(&mut out.request_hook, index, "request-mutation")?;
                BindingKind::RequestHook
            }
            ParameterShape::ResponseHook => {
                claim_singleton(&mut out.response_hook, index, "response-mutation")?;
                BindingKind::ResponseHook
            }
            ParameterShape::Content => {
                if spec.disposition.is_none() {
                    return Err(PlanBuildError::MissingDisposition {
                        method: method.name.clone(),
                        name: spec.name.clone(),
                    });
                }
                BindingKind::ContentDisposition
            }
            ParameterShape::Scalar | ParameterShape::Model => match &spec.source {
                Some(SourceAnnotation::Body) => {
                    if out.body_index.is_some() {
                        return Err(PlanBuildError::DuplicateBody(method.name.clone()));
                    }
                    out.body_index = Some(index);
                    BindingKind::Body
                }
                Some(SourceAnnotation::Header { name }) => {
                    if http::header::HeaderName::from_bytes(name.as_bytes()).is_err() {
                        return Err(PlanBuildError::InvalidHeaderName {
                            scope: format!("method `{}`", method.name),
                            name: name.clone(),
                        });
                    }
                    BindingKind::Header
                }
                Some(SourceAnnotation::Query { .. }) => BindingKind::Query,
                Some(SourceAnnotation::Form { .. }) => BindingKind::FormEntry,
                Some(SourceAnnotation::Route { .. }) => BindingKind::RoutePlaceholder,
                Some(SourceAnnotation::Properties) => {
                    out.has_property_extraction = true;
                    BindingKind::PropertyExtraction
                }
                None => {
                    if spec.shape == ParameterShape::Model && out.body_index.is_none() {
                        out.body_index = Some(index);
                        BindingKind::Body
                    } else if template.placeholders().any(|(name, _)| name == spec.name) {
                        BindingKind::RoutePlaceholder
                    } else {
                        BindingKind::Query
                    }
                }
            },
        };

        let name = match (&kind, &spec.source) {
            (BindingKind::Header, Some(SourceAnnotation::Header { name })) => name.clone(),
            (BindingKind::Query, Some(SourceAnnotation::Query { name })) => {
                name.clone().unwrap_or_else(|| spec.name.clone())
            }
            (BindingKind::FormEntry, Some(SourceAnnotation::Form { name })) => {
                name.clone().unwrap_or_else(|| spec.name.clone())
            }
            (BindingKind::RoutePlaceholder, Some(SourceAnnotation::Route { name })) => {
                name.clone().unwrap_or_else(|| spec.name.clone())
            }
            (BindingKind::ContentDisposition, _) => spec
                .disposition
                .as_ref()
                .map(|d| d.name.clone())
                .unwrap_or_else(|| spec.name.clone()),
            _ => spec.name.clone(),
        };

        out.bindings.push(ParameterBinding {
            index,
            param: spec.name.clone(),
            kind,
            name,
            format: spec.format.clone(),
            encoding: spec.encoding,
            disposition: spec.disposition.clone(),
        });
    }

    // The sink result is a single tagged value; one sink kind per method.
    if out.response_sink.is_some() && out.model_sink.is_some() {
        return Err(PlanBuildError::DuplicateSingleton {
            method: method.name.clone(),
            kind: "sink".to_string(),
        });
    }

    // The body cannot coexist with form or multipart content.
    if out.body_index.is_some() {
        if out
            .bindings
            .iter()
            .any(|b| b.kind == BindingKind::ContentDisposition)
        {
            return Err(PlanBuildError::BodyConflict {
                method: method.name.clone(),
                content: "multipart".to_string(),
            });
        }
        if out.bindings.iter().any(|b| b.kind == BindingKind::FormEntry) {
            return Err(PlanBuildError::BodyConflict {
                method: method.name.clone(),
                content: "form".to_string(),
            });
        }
    }

    Ok(out)
}

/// Every template placeholder must resolve to exactly one bound parameter.
/// A property-extraction binding may satisfy placeholders at call time, so
/// its presence relaxes the unmatched check (but never the duplicate check).
fn check_placeholders(
    method: &str,
    template: &PathTemplate,
    compiled: &CompiledParameters,
) -> Result<(), PlanBuildError> {
    for (name, _) in template.placeholders() {
        let claims = compiled
            .bindings
            .iter()
            .filter(|b| b.kind == BindingKind::RoutePlaceholder && b.name == name)
            .count();
        if claims > 1 {
            return Err(PlanBuildError::DuplicatePlaceholder {
                method: method.to_string(),
                name: name.to_string(),
            });
        }
        if claims == 0 && !compiled.has_property_extraction {
            return Err(PlanBuildError::UnboundPlaceholder {
                method: method.to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Ambiguous overlapping fault handlers are a build-time warning, not an
/// error; the first declaration wins at dispatch time.
fn check_fault_handlers(
    contract: &str,
    method: &MethodDescriptor,
) -> Result<(), PlanBuildError> {
    let mut seen = std::collections::HashSet::new();
    for handler in &method.fault_handlers {
        if handler.kind.is_empty() || handler.kind.split('.').any(str::is_empty) {
            return Err(PlanBuildError::EmptyFaultKind {
                method: method.name.clone(),
                kind: handler.kind.clone(),
            });
        }
        if !seen.insert(handler.kind.as_str()) {
            tracing::warn!(
                contract,
                method = %method.name,
                kind = %handler.kind,
                "ambiguous overlapping fault handlers; first declaration wins"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Extraction, ParameterSpec, ReturnKind};
    use crate::fault::FaultHandlerSpec;
    use http::StatusCode;

    fn widget_contract(name: &str) -> ContractDescriptor {
        ContractDescriptor::new(name, "http://host/api").with_method(
            MethodDescriptor::new("find")
                .on("get", "widgets/{id}")
                .with_parameter(ParameterSpec::scalar("id")),
        )
    }

    #[test]
    fn test_scalar_matching_placeholder_binds_to_route() {
        let plans = compile_contract(&widget_contract("W1")).unwrap();
        let plan = plans.get("find").unwrap();
        assert_eq!(plan.verb(), &Method::GET);
        assert_eq!(plan.full_path(), "http://host/api/widgets/{id}");
        assert_eq!(plan.origin(), Some("http://host"));
        assert_eq!(plan.bindings()[0].kind, BindingKind::RoutePlaceholder);
    }

    #[test]
    fn test_scalar_without_placeholder_falls_back_to_query() {
        let contract = ContractDescriptor::new("W2", "/api").with_method(
            MethodDescriptor::new("list")
                .on("get", "widgets")
                .with_parameter(ParameterSpec::scalar("page")),
        );
        let plans = compile_contract(&contract).unwrap();
        let binding = &plans.get("list").unwrap().bindings()[0];
        assert_eq!(binding.kind, BindingKind::Query);
        assert_eq!(binding.name, "page");
    }

    #[test]
    fn test_first_model_claims_body_once() {
        let contract = ContractDescriptor::new("W3", "/api").with_method(
            MethodDescriptor::new("create")
                .on("post", "widgets")
                .with_parameter(ParameterSpec::model("widget"))
                .with_parameter(ParameterSpec::model("extra")),
        );
        let plans = compile_contract(&contract).unwrap();
        let plan = plans.get("create").unwrap();
        assert_eq!(plan.body_index(), Some(0));
        assert_eq!(plan.bindings()[0].kind, BindingKind::Body);
        // second model fell through to rule 6, no matching placeholder
        assert_eq!(plan.bindings()[1].kind, BindingKind::Query);
    }

    #[test]
    fn test_explicit_double_body_is_an_error() {
        let contract = ContractDescriptor::new("W4", "/api").with_method(
            MethodDescriptor::new("create")
                .on("post", "widgets")
                .with_parameter(ParameterSpec::model("a").with_source(SourceAnnotation::Body))
                .with_parameter(ParameterSpec::model("b").with_source(SourceAnnotation::Body)),
        );
        assert!(matches!(
            compile_contract(&contract),
            Err(PlanBuildError::DuplicateBody(_))
        ));
    }

    #[test]
    fn test_annotated_model_leaves_body_free() {
        let contract = ContractDescriptor::new("W5", "/api").with_method(
            MethodDescriptor::new("create")
                .on("post", "widgets")
                .with_parameter(ParameterSpec::model("filters").in_query())
                .with_parameter(ParameterSpec::model("widget")),
        );
        let plans = compile_contract(&contract).unwrap();
        let plan = plans.get("create").unwrap();
        assert_eq!(plan.bindings()[0].kind, BindingKind::Query);
        assert_eq!(plan.body_index(), Some(1));
    }

    #[test]
    fn test_unbound_placeholder_fails_at_build_time() {
        let contract = ContractDescriptor::new("W6", "/api").with_method(
            MethodDescriptor::new("find").on("get", "widgets/{id}"),
        );
        assert!(matches!(
            compile_contract(&contract),
            Err(PlanBuildError::UnboundPlaceholder { .. })
        ));
    }

    #[test]
    fn test_duplicate_placeholder_claim_fails() {
        let contract = ContractDescriptor::new("W7", "/api").with_method(
            MethodDescriptor::new("find")
                .on("get", "widgets/{id}")
                .with_parameter(ParameterSpec::scalar("id"))
                .with_parameter(
                    ParameterSpec::scalar("other")
                        .with_source(SourceAnnotation::Route {
                            name: Some("id".to_string()),
                        }),
                ),
        );
        assert!(matches!(
            compile_contract(&contract),
            Err(PlanBuildError::DuplicatePlaceholder { .. })
        ));
    }

    #[test]
    fn test_property_extraction_relaxes_placeholder_check() {
        let contract = ContractDescriptor::new("W8", "/api").with_method(
            MethodDescriptor::new("find")
                .on("get", "widgets/{id}")
                .with_parameter(
                    ParameterSpec::model("selector").with_source(SourceAnnotation::Properties),
                ),
        );
        let plans = compile_contract(&contract).unwrap();
        assert!(plans.get("find").unwrap().has_property_extraction());
    }

    #[test]
    fn test_body_conflicts_with_form() {
        let contract = ContractDescriptor::new("W9", "/api").with_method(
            MethodDescriptor::new("create")
                .on("post", "widgets")
                .with_parameter(ParameterSpec::scalar("tag").in_form())
                .with_parameter(ParameterSpec::model("widget").with_source(SourceAnnotation::Body)),
        );
        assert!(matches!(
            compile_contract(&contract),
            Err(PlanBuildError::BodyConflict { .. })
        ));
    }

    #[test]
    fn test_sinks_and_hooks_are_singletons() {
        let contract = ContractDescriptor::new("W10", "/api").with_method(
            MethodDescriptor::new("find")
                .on("get", "widgets")
                .with_parameter(ParameterSpec::new("s1", ParameterShape::ResponseSink))
                .with_parameter(ParameterSpec::new("s2", ParameterShape::ResponseSink)),
        );
        assert!(matches!(
            compile_contract(&contract),
            Err(PlanBuildError::DuplicateSingleton { .. })
        ));
    }

    #[test]
    fn test_method_retry_overrides_contract_retry() {
        let contract = ContractDescriptor::new("W11", "/api")
            .with_retry(RetryPolicy::new(2).retry_on_status(502))
            .with_method(
                MethodDescriptor::new("find")
                    .on("get", "widgets")
                    .with_retry(RetryPolicy::new(5).retry_on_status(429)),
            );
        let plans = compile_contract(&contract).unwrap();
        let retry = plans.get("find").unwrap().retry().unwrap();
        assert_eq!(retry.max_attempts(), 5);
        assert!(retry.retries_status(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let first = compile_contract(&widget_contract("W12")).unwrap();
        let second = compile_contract(&widget_contract("W12")).unwrap();
        let a = format!("{:?}", first.get("find").unwrap());
        let b = format!("{:?}", second.get("find").unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_overlapping_fault_handlers_build_with_warning() {
        let contract = ContractDescriptor::new("W13", "/api").with_method(
            MethodDescriptor::new("find")
                .on("get", "widgets")
                .with_fault_handler(FaultHandlerSpec::new("storage", StatusCode::BAD_GATEWAY))
                .with_fault_handler(FaultHandlerSpec::new(
                    "storage",
                    StatusCode::SERVICE_UNAVAILABLE,
                )),
        );
        assert!(compile_contract(&contract).is_ok());
    }

    #[test]
    fn test_response_policy_carried_into_plan() {
        let contract = ContractDescriptor::new("W14", "/api").with_method(
            MethodDescriptor::new("find")
                .on("get", "widgets")
                .with_response(
                    ResponsePolicy::new(ReturnKind::Model)
                        .with_success_status(StatusCode::CREATED)
                        .with_extraction(Extraction::SubPath("data.items".to_string())),
                ),
        );
        let plans = compile_contract(&contract).unwrap();
        let policy = plans.get("find").unwrap().response();
        assert_eq!(policy.success_status, StatusCode::CREATED);
        assert!(matches!(policy.extraction, Some(Extraction::SubPath(_))));
    }
}
