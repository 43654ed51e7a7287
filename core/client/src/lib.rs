// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Client-side invocation engine.
//!
//! A [`ContractClient`] executes compiled binding plans against call
//! arguments: it builds the request (route, headers, query, body), sends it
//! through a pluggable [`RequestSender`] under the declared retry policy,
//! and decodes the response per the method's response policy. One client
//! value is shared freely across tasks; per-call state never outlives the
//! call.

pub mod args;
pub mod engine;
pub mod errors;
pub mod request;
pub mod retry;
pub mod sender;

pub use args::{Args, CallArg, ContentPart, RequestInspector, ResponseInspector};
pub use engine::{ContractClient, ContractClientBuilder, Reply, Sink};
pub use errors::ClientError;
pub use sender::{HttpSender, RequestSender};
