// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Server-side dispatch adapter.
//!
//! A [`DispatchAdapter`] interprets the same binding plans the client
//! engine writes against, in reverse: extract arguments from an inbound
//! request, invoke a plain service object, and map the result (or fault)
//! back to a host response. Before/after filters wrap the forwarding call
//! and may short-circuit it; a fault never propagates past the adapter
//! boundary.

pub mod adapter;
pub mod errors;
pub mod extract;
pub mod host;
pub mod service;

pub use adapter::{DispatchAdapter, DispatchAdapterBuilder};
pub use errors::ServerError;
pub use host::{register, HostBinder, InMemoryHost};
pub use service::ContractService;
