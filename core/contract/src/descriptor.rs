// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Declarative contract metadata.
//!
//! Descriptors are built once at registration with the `with_*` builder
//! methods and then handed to the plan compiler. They are the explicit
//! stand-in for attribute discovery: everything the compiler needs to know
//! about a method is declared here, in declaration order.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;

use crate::auth::AuthorizationSpec;
use crate::fault::FaultHandlerSpec;
use crate::filter::CallFilter;
use crate::retry::RetryPolicy;
use crate::route::RouteAnnotation;
use crate::wire::CompletionMode;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// How a query or form value is written onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueEncoding {
    /// Percent-encoded (form encoding).
    #[default]
    Form,
    /// Written as-is; the caller owns the escaping.
    Raw,
}

/// Content-disposition metadata for a multipart part.
#[derive(Debug, Clone)]
pub struct Disposition {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl Disposition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// The declared shape of a parameter, the primary classification input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterShape {
    /// A string, number or boolean; substitutes into the path template by
    /// default.
    Scalar,
    /// A structured model; claims the body by default.
    Model,
    /// Raw content with disposition metadata; triggers multipart encoding.
    Content,
    /// A request-mutation callback, invoked with the fully built request.
    RequestHook,
    /// A response-mutation callback, invoked with the raw response.
    ResponseHook,
    /// Caller-supplied destination for the raw response.
    ResponseSink,
    /// Caller-supplied destination for a decoded model.
    ModelSink,
}

/// An explicit source annotation, overriding shape-based classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceAnnotation {
    Body,
    Header { name: String },
    Query { name: Option<String> },
    Form { name: Option<String> },
    Route { name: Option<String> },
    /// Spread the model's properties into placeholders and query entries.
    Properties,
}

/// One declared method parameter, in declaration order.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub shape: ParameterShape,
    pub source: Option<SourceAnnotation>,
    pub format: Option<String>,
    pub encoding: ValueEncoding,
    pub disposition: Option<Disposition>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, shape: ParameterShape) -> Self {
        Self {
            name: name.into(),
            shape,
            source: None,
            format: None,
            encoding: ValueEncoding::default(),
            disposition: None,
        }
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, ParameterShape::Scalar)
    }

    pub fn model(name: impl Into<String>) -> Self {
        Self::new(name, ParameterShape::Model)
    }

    pub fn content(name: impl Into<String>, disposition: Disposition) -> Self {
        Self::new(name, ParameterShape::Content).with_disposition(disposition)
    }

    pub fn with_source(mut self, source: SourceAnnotation) -> Self {
        self.source = Some(source);
        self
    }

    /// Shorthand for an explicit header source.
    pub fn in_header(self, name: impl Into<String>) -> Self {
        self.with_source(SourceAnnotation::Header { name: name.into() })
    }

    /// Shorthand for an explicit query source under the parameter's name.
    pub fn in_query(self) -> Self {
        self.with_source(SourceAnnotation::Query { name: None })
    }

    /// Shorthand for an explicit form-url source under the parameter's name.
    pub fn in_form(self) -> Self {
        self.with_source(SourceAnnotation::Form { name: None })
    }

    /// A format pattern applied to the rendered value; `{}` marks the value.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_encoding(mut self, encoding: ValueEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = Some(disposition);
        self
    }
}

/// What the method returns, from the decoder's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnKind {
    /// No payload expected; body is ignored.
    Void,
    /// Decode the body into a model.
    #[default]
    Model,
    /// Hand back the raw response; success enforcement is skipped.
    Raw,
}

/// Pull part of the payload before decoding into the return model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A dotted sub-path into the payload (`data.items`).
    SubPath(String),
    /// A single named property pull.
    Property(String),
}

/// Success/failure statuses and decode policy for a method.
#[derive(Debug, Clone)]
pub struct ResponsePolicy {
    pub success_status: StatusCode,
    pub failure_status: StatusCode,
    pub return_kind: ReturnKind,
    pub extraction: Option<Extraction>,
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self {
            success_status: StatusCode::OK,
            failure_status: StatusCode::INTERNAL_SERVER_ERROR,
            return_kind: ReturnKind::default(),
            extraction: None,
        }
    }
}

impl ResponsePolicy {
    pub fn new(return_kind: ReturnKind) -> Self {
        Self {
            return_kind,
            ..Self::default()
        }
    }

    pub fn with_success_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }

    pub fn with_failure_status(mut self, status: StatusCode) -> Self {
        self.failure_status = status;
        self
    }

    pub fn with_extraction(mut self, extraction: Extraction) -> Self {
        self.extraction = Some(extraction);
        self
    }
}

/// One declared method of a contract.
#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub routes: Vec<RouteAnnotation>,
    pub content_type: Option<String>,
    pub parameters: Vec<ParameterSpec>,
    pub response: ResponsePolicy,
    pub fault_handlers: Vec<FaultHandlerSpec>,
    pub filters: Vec<Arc<dyn CallFilter>>,
    pub headers: Vec<(String, String)>,
    pub retry: Option<RetryPolicy>,
    pub completion: CompletionMode,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
            content_type: None,
            parameters: Vec::new(),
            response: ResponsePolicy::default(),
            fault_handlers: Vec::new(),
            filters: Vec::new(),
            headers: Vec::new(),
            retry: None,
            completion: CompletionMode::default(),
        }
    }

    pub fn with_route(mut self, route: RouteAnnotation) -> Self {
        self.routes.push(route);
        self
    }

    /// Shorthand for the explicit verb+template annotation.
    pub fn on(self, verb: &str, template: &str) -> Self {
        self.with_route(RouteAnnotation::VerbTemplate {
            verb: verb.to_string(),
            template: template.to_string(),
        })
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_response(mut self, response: ResponsePolicy) -> Self {
        self.response = response;
        self
    }

    pub fn with_fault_handler(mut self, handler: FaultHandlerSpec) -> Self {
        self.fault_handlers.push(handler);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn CallFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// A static header; `{name}` placeholders expand from call arguments.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_completion(mut self, completion: CompletionMode) -> Self {
        self.completion = completion;
        self
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("routes", &self.routes)
            .field("parameters", &self.parameters.len())
            .field("fault_handlers", &self.fault_handlers.len())
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// A declared contract: identity, defaults and its methods.
#[derive(Clone)]
pub struct ContractDescriptor {
    pub name: String,
    pub base_path: String,
    pub content_type: String,
    pub timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
    pub authorization: Option<AuthorizationSpec>,
    pub headers: Vec<(String, String)>,
    pub filters: Vec<Arc<dyn CallFilter>>,
    pub methods: Vec<MethodDescriptor>,
}

impl ContractDescriptor {
    pub fn new(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            timeout: None,
            retry: None,
            authorization: None,
            headers: Vec::new(),
            filters: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_authorization(mut self, authorization: AuthorizationSpec) -> Self {
        self.authorization = Some(authorization);
        self
    }

    /// A contract-wide static header; `{name}` placeholders expand from call
    /// arguments.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn CallFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ContractDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractDescriptor")
            .field("name", &self.name)
            .field("base_path", &self.base_path)
            .field("content_type", &self.content_type)
            .field("methods", &self.methods.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let contract = ContractDescriptor::new("Widgets", "http://host/api")
            .with_header("x-tenant", "{tenant}")
            .with_method(
                MethodDescriptor::new("find")
                    .on("get", "widgets/{id}")
                    .with_parameter(ParameterSpec::scalar("id")),
            );
        assert_eq!(contract.name(), "Widgets");
        assert_eq!(contract.methods.len(), 1);
        assert_eq!(contract.methods[0].parameters[0].name, "id");
    }

    #[test]
    fn test_default_response_policy() {
        let policy = ResponsePolicy::default();
        assert_eq!(policy.success_status, StatusCode::OK);
        assert_eq!(policy.failure_status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(policy.return_kind, ReturnKind::Model);
    }
}
