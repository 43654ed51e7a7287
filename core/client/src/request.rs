// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Request assembly: the write half of plan interpretation.
//!
//! Walks a method's bindings against the positional arguments and produces a
//! [`WireRequest`]: route placeholders substituted, static and per-parameter
//! headers applied, query entries expanded in declaration order, and the
//! body encoded as JSON (or any registered codec), form-url content, or
//! multipart content.

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use url::form_urlencoded;

use wirebind_contract::{
    AuthorizationSpec, BindingKind, BindingPlan, CodecRegistry, TokenSource, ValueEncoding,
    WireRequest,
};

use crate::args::{Args, CallArg};
use crate::errors::ClientError;

/// Render a scalar-ish value for the wire. `None` means absent.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // structured values ride as compact JSON when forced into a string slot
        other => serde_json::to_string(other).ok(),
    }
}

/// Apply a `{}`-style format pattern to a rendered value.
fn apply_format(value: String, format: Option<&str>) -> String {
    match format {
        Some(pattern) if pattern.contains("{}") => pattern.replace("{}", &value),
        _ => value,
    }
}

/// Expand one bound value into query/form pairs: scalars one pair, arrays
/// one pair per element under the same key, objects one pair per field.
fn expand_pairs(name: &str, value: &Value, format: Option<&str>) -> Vec<(String, String)> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter_map(render_value)
            .map(|v| (name.to_string(), apply_format(v, format)))
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| render_value(v).map(|s| (k.clone(), apply_format(s, format))))
            .collect(),
        other => render_value(other)
            .map(|v| vec![(name.to_string(), apply_format(v, format))])
            .unwrap_or_default(),
    }
}

/// Expand `{name}` references in a static header or auth template from the
/// named call arguments; unknown names stay literal.
fn expand_template(template: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        match rest[start..].find('}') {
            Some(end_rel) => {
                let name = &rest[start + 1..start + end_rel];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[start..start + end_rel + 1]),
                }
                rest = &rest[start + end_rel + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

pub(crate) struct Assembler<'a> {
    plan: &'a BindingPlan,
    args: &'a Args,
    codecs: &'a CodecRegistry,
    base_override: Option<&'a str>,
}

impl<'a> Assembler<'a> {
    pub(crate) fn new(
        plan: &'a BindingPlan,
        args: &'a Args,
        codecs: &'a CodecRegistry,
        base_override: Option<&'a str>,
    ) -> Self {
        Self {
            plan,
            args,
            codecs,
            base_override,
        }
    }

    pub(crate) async fn assemble(&self) -> Result<WireRequest, ClientError> {
        if self.args.len() != self.plan.bindings().len() {
            return Err(ClientError::Argument(format!(
                "method `{}` declares {} parameters, got {} arguments",
                self.plan.method(),
                self.plan.bindings().len(),
                self.args.len()
            )));
        }

        let path = self.render_path()?;
        let query = self.render_query();
        let mut url = match (self.plan.origin(), self.base_override) {
            (_, Some(base)) => format!("{}{}", base.trim_end_matches('/'), path),
            (Some(origin), None) => format!("{}{}", origin, path),
            (None, None) => path,
        };
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        let mut request = WireRequest::new(self.plan.verb().clone(), url);
        request.timeout = self.plan.timeout();

        self.apply_headers(&mut request)?;
        self.apply_authorization(&mut request).await?;
        self.apply_body(&mut request)?;

        Ok(request)
    }

    /// The value for a named parameter, rendered with its binding's format.
    fn named_value(&self, name: &str) -> Option<String> {
        self.plan
            .bindings()
            .iter()
            .find(|b| b.param == name)
            .and_then(|b| {
                let value = self.args.value_at(b.index)?;
                render_value(value).map(|v| apply_format(v, b.format.as_deref()))
            })
    }

    /// The fields spread by property-extraction bindings, for placeholder
    /// and query fallback resolution.
    fn extracted_property(&self, name: &str) -> Option<String> {
        for binding in self.plan.bindings() {
            if binding.kind != BindingKind::PropertyExtraction {
                continue;
            }
            if let Some(Value::Object(map)) = self.args.value_at(binding.index) {
                if let Some(value) = map.get(name) {
                    return render_value(value);
                }
            }
        }
        None
    }

    fn render_path(&self) -> Result<String, ClientError> {
        let resolve = |name: &str| -> Option<String> {
            self.plan
                .bindings()
                .iter()
                .find(|b| b.kind == BindingKind::RoutePlaceholder && b.name == name)
                .and_then(|b| {
                    let value = self.args.value_at(b.index)?;
                    render_value(value).map(|v| apply_format(v, b.format.as_deref()))
                })
                .or_else(|| self.extracted_property(name))
        };

        self.plan.template().render(resolve).map_err(|name| {
            ClientError::Argument(format!(
                "placeholder `{}` unresolved in method `{}`",
                name,
                self.plan.method()
            ))
        })
    }

    fn render_query(&self) -> String {
        let mut entries: Vec<(String, String, ValueEncoding)> = Vec::new();

        let placeholder_names: Vec<&str> = self
            .plan
            .template()
            .placeholders()
            .map(|(name, _)| name)
            .collect();

        for binding in self.plan.bindings() {
            match binding.kind {
                BindingKind::Query => {
                    if let Some(value) = self.args.value_at(binding.index) {
                        for (k, v) in expand_pairs(&binding.name, value, binding.format.as_deref())
                        {
                            entries.push((k, v, binding.encoding));
                        }
                    }
                }
                BindingKind::PropertyExtraction => {
                    if let Some(Value::Object(map)) = self.args.value_at(binding.index) {
                        for (k, v) in map {
                            if placeholder_names.contains(&k.as_str()) {
                                continue;
                            }
                            if let Some(rendered) = render_value(v) {
                                entries.push((
                                    k.clone(),
                                    apply_format(rendered, binding.format.as_deref()),
                                    binding.encoding,
                                ));
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let mut query = String::new();
        for (key, value, encoding) in entries {
            if !query.is_empty() {
                query.push('&');
            }
            match encoding {
                ValueEncoding::Form => {
                    let mut pair = form_urlencoded::Serializer::new(String::new());
                    pair.append_pair(&key, &value);
                    query.push_str(&pair.finish());
                }
                ValueEncoding::Raw => {
                    query.push_str(&key);
                    query.push('=');
                    query.push_str(&value);
                }
            }
        }
        query
    }

    fn apply_headers(&self, request: &mut WireRequest) -> Result<(), ClientError> {
        let lookup = |name: &str| self.named_value(name);

        for (name, template) in self.plan.static_headers() {
            let value = expand_template(template, &lookup);
            self.insert_header(request, name, &value)?;
        }

        for binding in self.plan.bindings() {
            if binding.kind != BindingKind::Header {
                continue;
            }
            if let Some(value) = self.args.value_at(binding.index) {
                if let Some(rendered) = render_value(value) {
                    let rendered = apply_format(rendered, binding.format.as_deref());
                    self.insert_header(request, &binding.name, &rendered)?;
                }
            }
        }
        Ok(())
    }

    async fn apply_authorization(&self, request: &mut WireRequest) -> Result<(), ClientError> {
        let Some(AuthorizationSpec { scheme, source }) = self.plan.authorization() else {
            return Ok(());
        };
        let value = match source {
            TokenSource::Static(template) => {
                let lookup = |name: &str| self.named_value(name);
                expand_template(template, &lookup)
            }
            TokenSource::Provider(provider) => provider.token().await?,
        };
        let header = format!("{} {}", scheme, value);
        request.headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&header)
                .map_err(|e| ClientError::Request(format!("authorization header: {}", e)))?,
        );
        Ok(())
    }

    fn insert_header(
        &self,
        request: &mut WireRequest,
        name: &str,
        value: &str,
    ) -> Result<(), ClientError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::Request(format!("header name `{}`: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::Request(format!("header value for `{}`: {}", name, e)))?;
        request.headers.insert(name, value);
        Ok(())
    }

    fn apply_body(&self, request: &mut WireRequest) -> Result<(), ClientError> {
        let content_parts: Vec<_> = self
            .plan
            .bindings()
            .iter()
            .filter(|b| b.kind == BindingKind::ContentDisposition)
            .collect();

        if !content_parts.is_empty() {
            return self.apply_multipart(request, &content_parts);
        }

        let form_entries: Vec<_> = self
            .plan
            .bindings()
            .iter()
            .filter(|b| b.kind == BindingKind::FormEntry)
            .collect();

        if !form_entries.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for binding in form_entries {
                if let Some(value) = self.args.value_at(binding.index) {
                    for (k, v) in expand_pairs(&binding.name, value, binding.format.as_deref()) {
                        serializer.append_pair(&k, &v);
                    }
                }
            }
            let encoded = serializer.finish();
            request.body = Some(Bytes::from(encoded.into_bytes()));
            request.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
            return Ok(());
        }

        if let Some(body_index) = self.plan.body_index() {
            let value = self
                .args
                .value_at(body_index)
                .cloned()
                .unwrap_or(Value::Null);
            let codec = self.codecs.resolve(self.plan.content_type())?;
            request.body = Some(codec.serialize(&value)?);
            request.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_str(self.plan.content_type())
                    .map_err(|e| ClientError::Request(format!("content type: {}", e)))?,
            );
        }
        Ok(())
    }

    fn apply_multipart(
        &self,
        request: &mut WireRequest,
        content_parts: &[&wirebind_contract::ParameterBinding],
    ) -> Result<(), ClientError> {
        let boundary = format!("wirebind-{}", uuid::Uuid::new_v4().simple());
        let mut body = BytesMut::new();

        for binding in content_parts {
            let disposition = binding.disposition.as_ref().ok_or_else(|| {
                ClientError::Argument(format!(
                    "content parameter `{}` has no disposition",
                    binding.param
                ))
            })?;
            let part = match self.args.get(binding.index) {
                Some(CallArg::Content(part)) => part.clone(),
                Some(CallArg::Value(value)) => match render_value(value) {
                    Some(text) => crate::args::ContentPart::new(text.into_bytes()),
                    None => continue,
                },
                _ => {
                    return Err(ClientError::Argument(format!(
                        "content parameter `{}` expects content bytes",
                        binding.param
                    )))
                }
            };

            body.put_slice(b"--");
            body.put_slice(boundary.as_bytes());
            body.put_slice(b"\r\n");
            body.put_slice(b"Content-Disposition: form-data; name=\"");
            body.put_slice(disposition.name.as_bytes());
            body.put_slice(b"\"");
            if let Some(file_name) = &disposition.file_name {
                body.put_slice(b"; filename=\"");
                body.put_slice(file_name.as_bytes());
                body.put_slice(b"\"");
            }
            body.put_slice(b"\r\n");
            let part_type = part
                .content_type
                .as_deref()
                .or(disposition.content_type.as_deref());
            if let Some(content_type) = part_type {
                body.put_slice(b"Content-Type: ");
                body.put_slice(content_type.as_bytes());
                body.put_slice(b"\r\n");
            }
            body.put_slice(b"\r\n");
            body.put_slice(&part.bytes);
            body.put_slice(b"\r\n");
        }

        // form entries ride along as ordinary parts
        for binding in self
            .plan
            .bindings()
            .iter()
            .filter(|b| b.kind == BindingKind::FormEntry)
        {
            if let Some(value) = self.args.value_at(binding.index) {
                for (key, text) in expand_pairs(&binding.name, value, binding.format.as_deref()) {
                    body.put_slice(b"--");
                    body.put_slice(boundary.as_bytes());
                    body.put_slice(b"\r\n");
                    body.put_slice(b"Content-Disposition: form-data; name=\"");
                    body.put_slice(key.as_bytes());
                    body.put_slice(b"\"\r\n\r\n");
                    body.put_slice(text.as_bytes());
                    body.put_slice(b"\r\n");
                }
            }
        }

        body.put_slice(b"--");
        body.put_slice(boundary.as_bytes());
        body.put_slice(b"--\r\n");

        request.body = Some(body.freeze());
        request.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&format!("multipart/form-data; boundary={}", boundary))
                .map_err(|e| ClientError::Request(format!("content type: {}", e)))?,
        );
        Ok(())
    }
}
