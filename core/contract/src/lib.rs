// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Shared contract metadata model and binding-plan compiler.
//!
//! A contract is an explicit, declaratively built description of a set of
//! remote operations: verbs, path templates, parameter bindings, response
//! policies, fault handlers and retry policies. The compiler turns that
//! metadata into immutable [`plan::BindingPlan`]s, cached per contract for
//! the process lifetime. The client invocation engine and the server
//! dispatch adapter both interpret the same plans, so the wire shape the
//! client produces is exactly what the server expects.

pub mod auth;
pub mod cache;
pub mod codec;
pub mod descriptor;
pub mod errors;
pub mod fault;
pub mod filter;
pub mod plan;
pub mod retry;
pub mod route;
pub mod wire;

pub use auth::{AuthError, AuthorizationSpec, SharedToken, TokenProvider, TokenSource};
pub use cache::plans_for;
pub use codec::{decode_value, BodyCodec, CodecError, CodecRegistry, JsonCodec};
pub use descriptor::{
    ContractDescriptor, Disposition, Extraction, MethodDescriptor, ParameterShape, ParameterSpec,
    ResponsePolicy, ReturnKind, SourceAnnotation, ValueEncoding,
};
pub use errors::{PlanBuildError, TransportError, TransportErrorKind};
pub use fault::{select_handler, Fault, FaultField, FaultHandlerSpec, FaultShape, JsonKind};
pub use filter::{CallFilter, FilterContext, FilterFlow};
pub use plan::{BindingKind, BindingPlan, ContractPlans, ParameterBinding};
pub use retry::{RetryPolicy, Strategy};
pub use route::{join_paths, split_origin, Endpoint, PathTemplate, RouteAnnotation};
pub use wire::{CompletionMode, HostRequest, HostResponse, WireRequest, WireResponse};
