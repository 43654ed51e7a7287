// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Service call filters: ordered before/after hooks around server dispatch.
//!
//! Filters are plain middleware values attached at adapter, contract or
//! method scope. A before hook may short-circuit the remaining pipeline
//! (including the service call) by producing a response; after hooks always
//! run, whatever path produced the response, and may replace it.

use async_trait::async_trait;
use http::Extensions;

use crate::fault::Fault;
use crate::wire::{HostRequest, HostResponse};

/// Per-request state shared along the filter pipeline.
///
/// `extensions` carries the ambient per-request services the host resolved
/// for this call.
pub struct FilterContext {
    pub contract: String,
    pub method: String,
    pub extensions: Extensions,
}

impl FilterContext {
    pub fn new(contract: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            method: method.into(),
            extensions: Extensions::new(),
        }
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }
}

/// Outcome of a before hook.
pub enum FilterFlow {
    /// Keep going: remaining hooks, then the service call.
    Continue,
    /// Stop here; this response becomes the call's response (after hooks
    /// still run).
    ShortCircuit(HostResponse),
}

/// An ordered before/after hook around the adapter's forwarding call.
///
/// Both hooks default to no-ops so a filter implements only the side it
/// cares about. A before hook returning a [`Fault`] routes through the
/// method's fault handlers like a service fault.
#[async_trait]
pub trait CallFilter: Send + Sync {
    async fn before(
        &self,
        _cx: &mut FilterContext,
        _request: &HostRequest,
    ) -> Result<FilterFlow, Fault> {
        Ok(FilterFlow::Continue)
    }

    async fn after(&self, _cx: &mut FilterContext, _response: &mut HostResponse) {}
}
