// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! The dispatch adapter: one generic interpreter over binding plans.
//!
//! Per request: run before hooks (adapter-global, contract-level, then
//! method-level), extract arguments, invoke the service, map the result or
//! fault to a status, and run after hooks on every path — success,
//! short-circuit and fault alike. The adapter is built once per contract
//! and service instance and holds no per-request state.

use std::sync::Arc;

use http::{Extensions, StatusCode};
use serde_json::Value;

use wirebind_contract::{
    plans_for, select_handler, BindingPlan, CallFilter, CodecRegistry, ContractDescriptor,
    ContractPlans, Fault, FilterContext, FilterFlow, HostRequest, HostResponse, ReturnKind,
};

use crate::errors::ServerError;
use crate::extract::extract_args;
use crate::service::ContractService;

/// Builder for [`DispatchAdapter`].
pub struct DispatchAdapterBuilder {
    descriptor: ContractDescriptor,
    service: Arc<dyn ContractService>,
    codecs: CodecRegistry,
    global_filters: Vec<Arc<dyn CallFilter>>,
}

impl DispatchAdapterBuilder {
    pub fn new(descriptor: ContractDescriptor, service: Arc<dyn ContractService>) -> Self {
        Self {
            descriptor,
            service,
            codecs: CodecRegistry::new(),
            global_filters: Vec::new(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn wirebind_contract::BodyCodec>) -> Self {
        self.codecs.register(codec);
        self
    }

    /// An adapter-global filter, running before any contract-level filter.
    pub fn with_filter(mut self, filter: Arc<dyn CallFilter>) -> Self {
        self.global_filters.push(filter);
        self
    }

    pub fn build(self) -> Result<DispatchAdapter, ServerError> {
        let plans = plans_for(&self.descriptor)?;
        tracing::info!(
            contract = self.descriptor.name(),
            methods = plans.len(),
            "dispatch adapter built"
        );
        Ok(DispatchAdapter {
            plans,
            service: self.service,
            codecs: self.codecs,
            global_filters: self.global_filters,
        })
    }
}

/// Server dispatch adapter for one contract and one service instance.
pub struct DispatchAdapter {
    plans: Arc<ContractPlans>,
    service: Arc<dyn ContractService>,
    codecs: CodecRegistry,
    global_filters: Vec<Arc<dyn CallFilter>>,
}

impl DispatchAdapter {
    pub fn new(
        descriptor: ContractDescriptor,
        service: Arc<dyn ContractService>,
    ) -> Result<Self, ServerError> {
        DispatchAdapterBuilder::new(descriptor, service).build()
    }

    pub fn builder(
        descriptor: ContractDescriptor,
        service: Arc<dyn ContractService>,
    ) -> DispatchAdapterBuilder {
        DispatchAdapterBuilder::new(descriptor, service)
    }

    pub fn contract(&self) -> &str {
        self.plans.contract()
    }

    pub fn plans(&self) -> &Arc<ContractPlans> {
        &self.plans
    }

    /// Dispatch one request for a matched method. `ambient` carries the
    /// per-request services the host resolved for filter hooks.
    pub async fn dispatch(
        &self,
        method: &str,
        request: HostRequest,
        ambient: Extensions,
    ) -> HostResponse {
        let Some(plan) = self.plans.get(method) else {
            tracing::warn!(contract = self.contract(), method, "dispatch to unknown method");
            return HostResponse::new(StatusCode::NOT_FOUND);
        };

        let mut cx = FilterContext::new(self.contract(), method).with_extensions(ambient);
        let filters: Vec<&Arc<dyn CallFilter>> = self
            .global_filters
            .iter()
            .chain(plan.filters().iter())
            .collect();

        let mut response = self.forward(plan.as_ref(), &filters, &mut cx, &request).await;

        // after hooks run on every path and may replace the response
        for filter in &filters {
            filter.after(&mut cx, &mut response).await;
        }

        response
    }

    async fn forward(
        &self,
        plan: &BindingPlan,
        filters: &[&Arc<dyn CallFilter>],
        cx: &mut FilterContext,
        request: &HostRequest,
    ) -> HostResponse {
        for filter in filters {
            match filter.before(cx, request).await {
                Ok(FilterFlow::Continue) => {}
                Ok(FilterFlow::ShortCircuit(response)) => {
                    tracing::debug!(
                        contract = plan.contract(),
                        method = plan.method(),
                        "before hook short-circuited dispatch"
                    );
                    return response;
                }
                Err(fault) => return self.map_fault(plan, &fault),
            }
        }

        let args = match extract_args(plan, &self.codecs, request) {
            Ok(args) => args,
            Err(error) => {
                tracing::debug!(
                    contract = plan.contract(),
                    method = plan.method(),
                    %error,
                    "argument extraction failed"
                );
                return HostResponse::new(StatusCode::BAD_REQUEST);
            }
        };

        match self.service.call(plan.method(), args).await {
            Ok(result) => self.map_result(plan, result),
            Err(fault) => self.map_fault(plan, &fault),
        }
    }

    /// Non-null/non-void results map to the success status with the result
    /// as payload; a null model result maps to the failure status, empty.
    fn map_result(&self, plan: &BindingPlan, result: Value) -> HostResponse {
        let policy = plan.response();
        if policy.return_kind == ReturnKind::Void {
            return HostResponse::new(policy.success_status);
        }
        if result.is_null() {
            return HostResponse::new(policy.failure_status);
        }
        self.payload_response(plan, policy.success_status, &result)
    }

    /// First matching handler wins, most-specific kind first; an unhandled
    /// fault becomes the generic failure status and stops here.
    fn map_fault(&self, plan: &BindingPlan, fault: &Fault) -> HostResponse {
        match select_handler(plan.fault_handlers(), fault) {
            Some(handler) => {
                tracing::debug!(
                    contract = plan.contract(),
                    method = plan.method(),
                    kind = fault.kind(),
                    status = %handler.status,
                    "fault mapped by handler"
                );
                match &handler.shape {
                    Some(shape) => {
                        let model = shape.apply(fault);
                        self.payload_response(plan, handler.status, &model)
                    }
                    None => HostResponse::new(handler.status),
                }
            }
            None => {
                tracing::warn!(
                    contract = plan.contract(),
                    method = plan.method(),
                    kind = fault.kind(),
                    "unhandled service fault"
                );
                HostResponse::new(plan.response().failure_status)
            }
        }
    }

    fn payload_response(
        &self,
        plan: &BindingPlan,
        status: StatusCode,
        payload: &Value,
    ) -> HostResponse {
        match self
            .codecs
            .resolve(plan.content_type())
            .and_then(|codec| codec.serialize(payload))
        {
            Ok(bytes) => HostResponse::new(status).with_payload(bytes, plan.content_type()),
            Err(error) => {
                tracing::error!(
                    contract = plan.contract(),
                    method = plan.method(),
                    %error,
                    "payload serialization failed"
                );
                HostResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
