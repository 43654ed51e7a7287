// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! The plain service seam the adapter forwards to.

use async_trait::async_trait;
use serde_json::Value;

use wirebind_contract::Fault;

/// A plain service object behind a contract.
///
/// Arguments arrive positionally, one per declared parameter; positions
/// claimed by client-side roles (hooks, sinks) arrive as `Value::Null`. The
/// return value is the interpreter-level result: `Value::Null` for void
/// methods or an absent model.
#[async_trait]
pub trait ContractService: Send + Sync {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, Fault>;
}
