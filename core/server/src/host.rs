// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! The host framework seam.
//!
//! A host exposes one capability to the adapter: register a handler for a
//! verb and path template. [`register`] walks a contract's plans and binds
//! each method. [`InMemoryHost`] is a small template-matching router over
//! that seam, used by tests and in-process embeddings; a real web framework
//! integration implements [`HostBinder`] the same way.

use std::sync::Arc;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method};
use url::form_urlencoded;

use wirebind_contract::route::Segment;
use wirebind_contract::{split_origin, HostRequest, HostResponse, PathTemplate};

use crate::adapter::DispatchAdapter;
use crate::errors::ServerError;

/// Host capability: bind a verb + path template to a contract method.
pub trait HostBinder {
    fn bind(
        &mut self,
        verb: Method,
        template: &str,
        method: &str,
        adapter: Arc<DispatchAdapter>,
    ) -> Result<(), ServerError>;
}

/// Register every method of an adapter's contract with a host.
pub fn register(
    adapter: &Arc<DispatchAdapter>,
    binder: &mut dyn HostBinder,
) -> Result<(), ServerError> {
    for plan in adapter.plans().iter() {
        binder.bind(
            plan.verb().clone(),
            plan.full_path(),
            plan.method(),
            Arc::clone(adapter),
        )?;
    }
    Ok(())
}

struct RouteEntry {
    verb: Method,
    raw: String,
    template: PathTemplate,
    method: String,
    adapter: Arc<DispatchAdapter>,
}

/// An in-memory host: template-matching routing straight into adapters.
#[derive(Default)]
pub struct InMemoryHost {
    routes: Vec<RouteEntry>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount every method of a contract adapter.
    pub fn mount(&mut self, adapter: Arc<DispatchAdapter>) -> Result<(), ServerError> {
        register(&adapter, self)
    }

    /// Route and dispatch one request. `None` when no route matches.
    pub async fn handle(
        &self,
        verb: &Method,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Option<HostResponse> {
        let (_, path_and_query) = split_origin(url);
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, query),
            None => (path_and_query, ""),
        };

        for entry in &self.routes {
            if &entry.verb != verb {
                continue;
            }
            let Some(route) = entry.template.match_path(path) else {
                continue;
            };

            let query: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();

            let request = HostRequest {
                route,
                query,
                headers,
                body,
            };
            // per-request services would be resolved by a real host here
            return Some(
                entry
                    .adapter
                    .dispatch(&entry.method, request, Extensions::new())
                    .await,
            );
        }
        None
    }
}

impl HostBinder for InMemoryHost {
    fn bind(
        &mut self,
        verb: Method,
        template: &str,
        method: &str,
        adapter: Arc<DispatchAdapter>,
    ) -> Result<(), ServerError> {
        let (_, path) = split_origin(template);
        if self
            .routes
            .iter()
            .any(|entry| entry.verb == verb && entry.raw == path)
        {
            return Err(ServerError::RouteConflict {
                verb: verb.to_string(),
                path: path.to_string(),
            });
        }

        let parsed = PathTemplate::parse(method, path)?;
        tracing::debug!(%verb, path, method, "route bound");
        self.routes.push(RouteEntry {
            verb,
            raw: path.to_string(),
            template: parsed,
            method: method.to_string(),
            adapter,
        });
        // literal routes match before placeholder routes
        self.routes.sort_by_key(|entry| {
            entry
                .template
                .segments()
                .iter()
                .filter(|s| matches!(s, Segment::Placeholder { .. }))
                .count()
        });
        Ok(())
    }
}
