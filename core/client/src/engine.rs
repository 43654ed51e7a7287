// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! The contract client: plan interpretation end to end.
//!
//! Per call: assemble the request from the plan and arguments, run the
//! request hook, send under the retry policy, run the response hook, then
//! decode per the method's response policy. The client itself is an `Arc`
//! around immutable state and clones cheaply.

use std::collections::HashMap;
use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use wirebind_contract::{
    decode_value, plans_for, BindingPlan, CodecRegistry, ContractDescriptor, ContractPlans,
    Extraction, ReturnKind, WireResponse,
};

use crate::args::{Args, CallArg};
use crate::errors::ClientError;
use crate::request::Assembler;
use crate::retry::send_with_policy;
use crate::sender::{HttpSender, RequestSender};

/// A secondary decoded value captured for the caller.
#[derive(Debug, Default)]
pub enum Sink {
    #[default]
    None,
    /// The raw response, captured by a response-sink binding.
    Raw(WireResponse),
    /// The body decoded by a decoded-model-sink binding.
    Decoded(Value),
}

impl Sink {
    pub fn raw(&self) -> Option<&WireResponse> {
        match self {
            Sink::Raw(response) => Some(response),
            _ => None,
        }
    }

    pub fn decoded<T: DeserializeOwned + Default>(&self) -> Result<Option<T>, ClientError> {
        match self {
            Sink::Decoded(value) => Ok(Some(decode_value(value.clone())?)),
            _ => Ok(None),
        }
    }
}

/// The outcome of one call.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    value: Value,
    raw: Option<WireResponse>,
    pub sink: Sink,
}

impl Reply {
    /// The decoded payload value (after any declared extraction).
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Decode the payload into a typed model; an empty payload yields the
    /// type's zero value.
    pub fn decode<T: DeserializeOwned + Default>(&self) -> Result<T, ClientError> {
        Ok(decode_value(self.value.clone())?)
    }

    /// The raw response, for raw-return methods.
    pub fn into_raw(self) -> Option<WireResponse> {
        self.raw
    }
}

struct ClientInner {
    contracts: HashMap<String, (Arc<ContractDescriptor>, Arc<ContractPlans>)>,
    codecs: CodecRegistry,
    sender: Arc<dyn RequestSender>,
    base_url: Option<String>,
}

/// Builder for [`ContractClient`].
pub struct ContractClientBuilder {
    contracts: Vec<ContractDescriptor>,
    codecs: CodecRegistry,
    sender: Option<Arc<dyn RequestSender>>,
    base_url: Option<String>,
}

impl ContractClientBuilder {
    pub fn new() -> Self {
        Self {
            contracts: Vec::new(),
            codecs: CodecRegistry::new(),
            sender: None,
            base_url: None,
        }
    }

    pub fn register(mut self, contract: ContractDescriptor) -> Self {
        self.contracts.push(contract);
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn wirebind_contract::BodyCodec>) -> Self {
        self.codecs.register(codec);
        self
    }

    pub fn with_sender(mut self, sender: Arc<dyn RequestSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Override the origin for contracts whose base path is relative.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Compile (or fetch from the process cache) every registered contract.
    pub fn build(self) -> Result<ContractClient, ClientError> {
        let sender = match self.sender {
            Some(sender) => sender,
            None => Arc::new(HttpSender::new()?),
        };

        let mut contracts = HashMap::new();
        for descriptor in self.contracts {
            let plans = plans_for(&descriptor)?;
            tracing::info!(contract = descriptor.name(), "registered contract");
            contracts.insert(descriptor.name().to_string(), (Arc::new(descriptor), plans));
        }

        Ok(ContractClient {
            inner: Arc::new(ClientInner {
                contracts,
                codecs: self.codecs,
                sender,
                base_url: self.base_url,
            }),
        })
    }
}

impl Default for ContractClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Client-side invocation engine over registered contracts.
#[derive(Clone)]
pub struct ContractClient {
    inner: Arc<ClientInner>,
}

impl ContractClient {
    pub fn builder() -> ContractClientBuilder {
        ContractClientBuilder::new()
    }

    fn plan(&self, contract: &str, method: &str) -> Result<Arc<BindingPlan>, ClientError> {
        self.inner
            .contracts
            .get(contract)
            .and_then(|(_, plans)| plans.get(method))
            .cloned()
            .ok_or_else(|| ClientError::UnknownMethod(format!("{}/{}", contract, method)))
    }

    /// Invoke a method and decode its reply.
    pub async fn invoke(
        &self,
        contract: &str,
        method: &str,
        args: Args,
    ) -> Result<Reply, ClientError> {
        self.invoke_cancellable(contract, method, args, &CancellationToken::new())
            .await
    }

    /// Invoke a method under a cancellation token: cancelling aborts the
    /// in-flight send and any pending retry delay, and the call never
    /// proceeds to decoding.
    pub async fn invoke_cancellable(
        &self,
        contract: &str,
        method: &str,
        args: Args,
        cancellation: &CancellationToken,
    ) -> Result<Reply, ClientError> {
        let plan = self.plan(contract, method)?;
        tracing::debug!(contract, method, "invoking");

        let mut request = Assembler::new(
            &plan,
            &args,
            &self.inner.codecs,
            self.inner.base_url.as_deref(),
        )
        .assemble()
        .await?;

        if let Some(index) = plan.request_hook() {
            if let Some(CallArg::RequestHook(hook)) = args.get(index) {
                hook.inspect(&mut request);
            }
        }

        let send = send_with_policy(
            &self.inner.sender,
            request,
            plan.completion(),
            plan.retry(),
        );
        let response = tokio::select! {
            _ = cancellation.cancelled() => {
                tracing::debug!(contract, method, "call cancelled");
                return Err(ClientError::Cancelled);
            }
            result = send => result?,
        };

        if let Some(index) = plan.response_hook() {
            if let Some(CallArg::ResponseHook(hook)) = args.get(index) {
                hook.inspect(&response);
            }
        }

        self.decode_reply(&plan, response)
    }

    /// Invoke and decode the payload into a typed model in one step.
    pub async fn call<T>(&self, contract: &str, method: &str, args: Args) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Default,
    {
        self.invoke(contract, method, args).await?.decode()
    }

    fn decode_reply(
        &self,
        plan: &BindingPlan,
        response: WireResponse,
    ) -> Result<Reply, ClientError> {
        let status = response.status;
        let headers = response.headers.clone();

        // raw return: hand the response back, success unenforced
        if plan.response().return_kind == ReturnKind::Raw {
            return Ok(Reply {
                status,
                headers,
                value: Value::Null,
                raw: Some(response),
                sink: Sink::None,
            });
        }

        if !status.is_success() {
            if plan.response_sink().is_some() {
                // the sink absorbs the failure; nothing decodes
                return Ok(Reply {
                    status,
                    headers,
                    value: Value::Null,
                    raw: None,
                    sink: Sink::Raw(response),
                });
            }
            return Err(ClientError::Unsuccessful {
                status,
                body: response.body,
            });
        }

        let body_value = self.decode_body(plan, &response)?;

        // a decoded-model sink takes the body; otherwise the return value
        // decodes normally, with a raw sink capturing the response alongside
        if plan.model_sink().is_some() {
            return Ok(Reply {
                status,
                headers,
                value: Value::Null,
                raw: None,
                sink: Sink::Decoded(body_value),
            });
        }

        let value = match plan.response().return_kind {
            ReturnKind::Void => Value::Null,
            _ => apply_extraction(plan.response().extraction.as_ref(), body_value),
        };
        let sink = match plan.response_sink() {
            Some(_) => Sink::Raw(response),
            None => Sink::None,
        };

        Ok(Reply {
            status,
            headers,
            value,
            raw: None,
            sink,
        })
    }

    fn decode_body(
        &self,
        plan: &BindingPlan,
        response: &WireResponse,
    ) -> Result<Value, ClientError> {
        if response.is_empty() {
            // empty body decodes to the zero value downstream
            return Ok(Value::Null);
        }
        let content_type = response
            .content_type()
            .unwrap_or_else(|| plan.content_type());
        let codec = self.inner.codecs.resolve(content_type)?;
        Ok(codec.deserialize(&response.body)?)
    }
}

/// Pull the declared sub-path or property out of the payload, falling back
/// to the whole payload when the extraction finds nothing.
fn apply_extraction(extraction: Option<&Extraction>, payload: Value) -> Value {
    match extraction {
        None => payload,
        Some(Extraction::Property(name)) => match payload.get(name) {
            Some(found) => found.clone(),
            None => payload,
        },
        Some(Extraction::SubPath(path)) => {
            let mut cursor = &payload;
            for part in path.split('.') {
                match cursor.get(part) {
                    Some(next) => cursor = next,
                    None => return payload,
                }
            }
            cursor.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;
    use wirebind_contract::{
        CompletionMode, MethodDescriptor, ParameterSpec, ParameterShape, ResponsePolicy,
        TransportError,
    };

    /// Sender returning one fixed response.
    struct FixedSender {
        status: StatusCode,
        body: &'static str,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl RequestSender for FixedSender {
        async fn send(
            &self,
            _request: wirebind_contract::WireRequest,
            _mode: CompletionMode,
        ) -> Result<WireResponse, TransportError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut response = WireResponse::new(self.status).with_body(self.body);
            if !self.body.is_empty() {
                response.headers.insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );
            }
            Ok(response)
        }
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Widget {
        id: u64,
        label: String,
    }

    fn client_for(
        name: &str,
        method: MethodDescriptor,
        sender: Arc<dyn RequestSender>,
    ) -> ContractClient {
        let contract = ContractDescriptor::new(name, "http://host/api").with_method(method);
        ContractClient::builder()
            .register(contract)
            .with_sender(sender)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_decode_into_model() {
        let sender = Arc::new(FixedSender {
            status: StatusCode::OK,
            body: r#"{"id": 7, "label": "bolt"}"#,
            delay: None,
        });
        let client = client_for(
            "EngDecode",
            MethodDescriptor::new("find")
                .on("get", "widgets/{id}")
                .with_parameter(ParameterSpec::scalar("id")),
            sender,
        );
        let widget: Widget = client
            .call("EngDecode", "find", Args::new().value(7))
            .await
            .unwrap();
        assert_eq!(
            widget,
            Widget {
                id: 7,
                label: "bolt".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_body_decodes_to_zero_value() {
        let sender = Arc::new(FixedSender {
            status: StatusCode::OK,
            body: "",
            delay: None,
        });
        let client = client_for(
            "EngEmpty",
            MethodDescriptor::new("find").on("get", "widgets"),
            sender,
        );
        let widget: Widget = client
            .call("EngEmpty", "find", Args::new())
            .await
            .unwrap();
        assert_eq!(widget, Widget::default());
    }

    #[tokio::test]
    async fn test_unsuccessful_status_raises_with_body() {
        let sender = Arc::new(FixedSender {
            status: StatusCode::NOT_FOUND,
            body: r#"{"reason": "missing"}"#,
            delay: None,
        });
        let client = client_for(
            "EngFail",
            MethodDescriptor::new("find").on("get", "widgets"),
            sender,
        );
        let err = client
            .invoke("EngFail", "find", Args::new())
            .await
            .unwrap_err();
        match err {
            ClientError::Unsuccessful { status, body } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert!(!body.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_response_sink_absorbs_failure() {
        let sender = Arc::new(FixedSender {
            status: StatusCode::BAD_GATEWAY,
            body: "",
            delay: None,
        });
        let client = client_for(
            "EngSink",
            MethodDescriptor::new("find")
                .on("get", "widgets")
                .with_parameter(ParameterSpec::new("capture", ParameterShape::ResponseSink)),
            sender,
        );
        let reply = client
            .invoke("EngSink", "find", Args::new().sink())
            .await
            .unwrap();
        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
        assert_eq!(reply.sink.raw().unwrap().status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_model_sink_receives_decoded_body() {
        let sender = Arc::new(FixedSender {
            status: StatusCode::OK,
            body: r#"{"id": 3, "label": "nut"}"#,
            delay: None,
        });
        let client = client_for(
            "EngModelSink",
            MethodDescriptor::new("find")
                .on("get", "widgets")
                .with_parameter(ParameterSpec::new("model", ParameterShape::ModelSink)),
            sender,
        );
        let reply = client
            .invoke("EngModelSink", "find", Args::new().sink())
            .await
            .unwrap();
        let widget: Option<Widget> = reply.sink.decoded().unwrap();
        assert_eq!(widget.unwrap().label, "nut");
    }

    #[tokio::test]
    async fn test_raw_return_skips_success_enforcement() {
        let sender = Arc::new(FixedSender {
            status: StatusCode::IM_A_TEAPOT,
            body: "tea",
            delay: None,
        });
        let client = client_for(
            "EngRaw",
            MethodDescriptor::new("probe")
                .on("get", "status")
                .with_response(ResponsePolicy::new(ReturnKind::Raw)),
            sender,
        );
        let reply = client.invoke("EngRaw", "probe", Args::new()).await.unwrap();
        let raw = reply.into_raw().unwrap();
        assert_eq!(raw.status, StatusCode::IM_A_TEAPOT);
        assert_eq!(raw.body, "tea");
    }

    #[tokio::test]
    async fn test_extraction_subpath_with_fallback() {
        let sender = Arc::new(FixedSender {
            status: StatusCode::OK,
            body: r#"{"data": {"widget": {"id": 5, "label": "cog"}}}"#,
            delay: None,
        });
        let client = client_for(
            "EngExtract",
            MethodDescriptor::new("find")
                .on("get", "widgets")
                .with_response(ResponsePolicy::default().with_extraction(
                    Extraction::SubPath("data.widget".to_string()),
                )),
            sender,
        );
        let widget: Widget = client
            .call("EngExtract", "find", Args::new())
            .await
            .unwrap();
        assert_eq!(widget.label, "cog");
    }

    #[tokio::test]
    async fn test_cancellation_aborts_before_decode() {
        let sender = Arc::new(FixedSender {
            status: StatusCode::OK,
            body: "{}",
            delay: Some(Duration::from_secs(5)),
        });
        let client = client_for(
            "EngCancel",
            MethodDescriptor::new("find").on("get", "widgets"),
            sender,
        );
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
        let err = client
            .invoke_cancellable("EngCancel", "find", Args::new(), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
    }

    #[tokio::test]
    async fn test_request_and_response_hooks_run() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let sender = Arc::new(FixedSender {
            status: StatusCode::OK,
            body: "{}",
            delay: None,
        });
        let client = client_for(
            "EngHooks",
            MethodDescriptor::new("find")
                .on("get", "widgets")
                .with_parameter(ParameterSpec::new("on_request", ParameterShape::RequestHook))
                .with_parameter(ParameterSpec::new(
                    "on_response",
                    ParameterShape::ResponseHook,
                )),
            sender,
        );

        static SAW_RESPONSE: AtomicBool = AtomicBool::new(false);
        let args = Args::new()
            .request_hook(Arc::new(|req: &mut wirebind_contract::WireRequest| {
                req.headers.insert(
                    "x-hooked",
                    http::HeaderValue::from_static("1"),
                );
            }))
            .response_hook(Arc::new(|res: &WireResponse| {
                SAW_RESPONSE.store(res.status == StatusCode::OK, Ordering::SeqCst);
            }));

        client.invoke("EngHooks", "find", args).await.unwrap();
        assert!(SAW_RESPONSE.load(Ordering::SeqCst));
    }

    #[test]
    fn test_apply_extraction_property_fallback() {
        let payload = json!({"id": 1});
        let out = apply_extraction(
            Some(&Extraction::Property("missing".to_string())),
            payload.clone(),
        );
        assert_eq!(out, payload);
    }
}
