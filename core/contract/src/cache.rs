// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Process-wide plan cache.
//!
//! Plans are derived once per contract identity (its name) and live for the
//! process lifetime. Lookup is check-then-build-then-insert-or-discard: the
//! build runs outside any lock, and when two builders race the first insert
//! wins — plans are a pure function of metadata, so the discarded build is
//! equivalent.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::descriptor::ContractDescriptor;
use crate::errors::PlanBuildError;
use crate::plan::{compile_contract, ContractPlans};

static PLAN_CACHE: Lazy<RwLock<HashMap<String, Arc<ContractPlans>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Resolve (building on first use) the compiled plans for a contract.
pub fn plans_for(descriptor: &ContractDescriptor) -> Result<Arc<ContractPlans>, PlanBuildError> {
    if let Some(plans) = PLAN_CACHE.read().get(descriptor.name()) {
        return Ok(Arc::clone(plans));
    }

    let built = Arc::new(compile_contract(descriptor)?);
    tracing::debug!(contract = descriptor.name(), methods = built.len(), "compiled contract plans");

    let mut cache = PLAN_CACHE.write();
    Ok(Arc::clone(
        cache
            .entry(descriptor.name().to_string())
            .or_insert(built),
    ))
}
