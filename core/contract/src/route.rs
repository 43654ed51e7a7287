// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Route metadata resolution and path templates.
//!
//! A method may carry several route annotations; resolution is deterministic:
//! an explicit verb+template annotation beats a generic template annotation,
//! which beats a bare verb annotation, which beats an enum-based endpoint
//! annotation. Within a rank, declaration order decides.

use http::Method;

use crate::errors::PlanBuildError;

/// An enum-based endpoint annotation: the verb comes from the enum, the path
/// template is the method name. Lowest-precedence route source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Get,
    Put,
    Patch,
    Post,
    Delete,
}

impl Endpoint {
    fn verb(self) -> Method {
        match self {
            Endpoint::Get => Method::GET,
            Endpoint::Put => Method::PUT,
            Endpoint::Patch => Method::PATCH,
            Endpoint::Post => Method::POST,
            Endpoint::Delete => Method::DELETE,
        }
    }
}

/// One route annotation attached to a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAnnotation {
    /// Explicit verb and template.
    VerbTemplate { verb: String, template: String },
    /// Generic template; the verb defaults to GET.
    Template { template: String },
    /// Framework-native verb annotation with an optional inline template;
    /// without one the method name is the template.
    Verb {
        verb: String,
        template: Option<String>,
    },
    /// Enum-based endpoint; the method name is the template.
    Endpoint(Endpoint),
}

impl RouteAnnotation {
    fn rank(&self) -> u8 {
        match self {
            RouteAnnotation::VerbTemplate { .. } => 0,
            RouteAnnotation::Template { .. } => 1,
            RouteAnnotation::Verb { .. } => 2,
            RouteAnnotation::Endpoint(_) => 3,
        }
    }
}

fn parse_verb(method_name: &str, verb: &str) -> Result<Method, PlanBuildError> {
    Method::from_bytes(verb.to_ascii_uppercase().as_bytes()).map_err(|_| {
        PlanBuildError::InvalidVerb {
            method: method_name.to_string(),
            verb: verb.to_string(),
        }
    })
}

/// Resolve the winning (verb, template) pair for a method.
pub(crate) fn resolve_route(
    method_name: &str,
    annotations: &[RouteAnnotation],
) -> Result<(Method, String), PlanBuildError> {
    let winner = annotations
        .iter()
        .enumerate()
        .min_by_key(|(index, a)| (a.rank(), *index))
        .map(|(_, a)| a)
        .ok_or_else(|| PlanBuildError::MissingRoute(method_name.to_string()))?;

    match winner {
        RouteAnnotation::VerbTemplate { verb, template } => {
            Ok((parse_verb(method_name, verb)?, template.clone()))
        }
        RouteAnnotation::Template { template } => Ok((Method::GET, template.clone())),
        RouteAnnotation::Verb { verb, template } => Ok((
            parse_verb(method_name, verb)?,
            template.clone().unwrap_or_else(|| method_name.to_string()),
        )),
        RouteAnnotation::Endpoint(endpoint) => Ok((endpoint.verb(), method_name.to_string())),
    }
}

/// Combine a base path and a method template with exactly one separating
/// slash, whatever either side carries.
pub fn join_paths(base: &str, tail: &str) -> String {
    let base = base.trim_end_matches('/');
    let tail = tail.trim_start_matches('/');
    match (base.is_empty(), tail.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", tail),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, tail),
    }
}

/// Split a combined path into its optional origin (`scheme://authority`) and
/// the path-and-below remainder. Templates are not valid URLs (placeholders
/// carry braces), so this stays a plain string split.
pub fn split_origin(combined: &str) -> (Option<&str>, &str) {
    if let Some(scheme_end) = combined.find("://") {
        let after = &combined[scheme_end + 3..];
        match after.find('/') {
            Some(slash) => {
                let origin_len = scheme_end + 3 + slash;
                (Some(&combined[..origin_len]), &combined[origin_len..])
            }
            None => (Some(combined), ""),
        }
    } else {
        (None, combined)
    }
}

/// One segment of a parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder { name: String, optional: bool },
}

/// A parsed path template: literal segments interleaved with `{name}` and
/// `{name?}` placeholders. A placeholder owns its whole segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(method_name: &str, template: &str) -> Result<Self, PlanBuildError> {
        let mut segments = Vec::new();
        for raw in template.split('/').filter(|s| !s.is_empty()) {
            if raw.starts_with('{') && raw.ends_with('}') {
                let inner = &raw[1..raw.len() - 1];
                let (name, optional) = match inner.strip_suffix('?') {
                    Some(name) => (name, true),
                    None => (inner, false),
                };
                if name.is_empty() {
                    return Err(PlanBuildError::BadTemplate {
                        method: method_name.to_string(),
                        template: template.to_string(),
                        reason: "empty placeholder name".to_string(),
                    });
                }
                segments.push(Segment::Placeholder {
                    name: name.to_string(),
                    optional,
                });
            } else if raw.contains('{') || raw.contains('}') {
                return Err(PlanBuildError::BadTemplate {
                    method: method_name.to_string(),
                    template: template.to_string(),
                    reason: format!("placeholder must own its whole segment: `{}`", raw),
                });
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All placeholder names with their optionality, in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = (&str, bool)> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder { name, optional } => Some((name.as_str(), *optional)),
            Segment::Literal(_) => None,
        })
    }

    /// Render the template into a concrete path. `resolve` supplies the value
    /// for each placeholder; an unresolved optional placeholder drops its
    /// segment, an unresolved required placeholder is reported by name.
    pub fn render<F>(&self, mut resolve: F) -> Result<String, String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => {
                    out.push('/');
                    out.push_str(lit);
                }
                Segment::Placeholder { name, optional } => match resolve(name) {
                    Some(value) => {
                        out.push('/');
                        out.push_str(&value);
                    }
                    None if *optional => {}
                    None => return Err(name.clone()),
                },
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }

    /// Match a concrete path against the template, extracting placeholder
    /// values. Used by hosts that route on these templates directly.
    pub fn match_path(&self, path: &str) -> Option<std::collections::HashMap<String, String>> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.match_parts(&parts, 0, 0)
    }

    fn match_parts(
        &self,
        parts: &[&str],
        seg_idx: usize,
        part_idx: usize,
    ) -> Option<std::collections::HashMap<String, String>> {
        if seg_idx == self.segments.len() {
            return (part_idx == parts.len()).then(std::collections::HashMap::new);
        }
        match &self.segments[seg_idx] {
            Segment::Literal(lit) => {
                if parts.get(part_idx) == Some(&lit.as_str()) {
                    self.match_parts(parts, seg_idx + 1, part_idx + 1)
                } else {
                    None
                }
            }
            Segment::Placeholder { name, optional } => {
                if let Some(part) = parts.get(part_idx) {
                    if let Some(mut found) = self.match_parts(parts, seg_idx + 1, part_idx + 1) {
                        found.insert(name.clone(), (*part).to_string());
                        return Some(found);
                    }
                }
                if *optional {
                    return self.match_parts(parts, seg_idx + 1, part_idx);
                }
                None
            }
        }
    }
}
