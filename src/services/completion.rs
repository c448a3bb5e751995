use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::EngineConfig;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reply text shown when the gateway answered but carried no usable text
/// field in any known shape.
pub const NO_REPLY_PLACEHOLDER: &str =
    "The assistant returned an empty response. Please try again.";

/// Reply text shown when the gateway could not be reached at all. Kept as a
/// fixed phrase so hosts and tests can recognize failure replies.
pub const TRANSPORT_FAILURE_REPLY: &str =
    "Sorry, the assistant could not be reached. Please try again in a moment.";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway returned status {status}")]
    Status { status: u16 },
}

/// Outbound submit-prompt request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub prompt: String,
    pub conversation_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Canonical reply shape for the submit-prompt collaborator. Everything
/// beyond the text is optional metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionReply {
    pub response_text: String,
    pub rating: Option<i32>,
    pub trace_id: Option<String>,
    pub provider_name: Option<String>,
    pub model_name: Option<String>,
}

/// Remote completion collaborator.
pub trait CompletionService: Send + Sync + 'static {
    fn submit(&self, request: CompletionRequest) -> BoxFuture<'static, Result<CompletionReply>>;
}

/// Pull the reply text out of a gateway payload.
///
/// The canonical field is `responseText`; older gateway builds used a
/// handful of other names. This is the only place in the crate that knows
/// about them.
fn extract_reply_text(payload: &Value) -> Option<String> {
    const TEXT_FIELDS: [&str; 5] = ["responseText", "response", "text", "answer", "output"];
    TEXT_FIELDS
        .iter()
        .filter_map(|field| payload.get(field))
        .find_map(|v| v.as_str())
        .map(str::to_string)
}

fn string_field(payload: &Value, canonical: &str, legacy: &str) -> Option<String> {
    payload
        .get(canonical)
        .or_else(|| payload.get(legacy))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Turn a raw gateway payload into the canonical reply. A payload without a
/// usable text field degrades to the placeholder rather than failing the
/// turn.
pub fn parse_reply(payload: &Value) -> CompletionReply {
    let response_text = extract_reply_text(payload).unwrap_or_else(|| {
        warn!("Gateway payload carried no usable text field");
        NO_REPLY_PLACEHOLDER.to_string()
    });

    CompletionReply {
        response_text,
        rating: payload
            .get("rating")
            .and_then(|v| v.as_i64())
            .map(|r| r as i32),
        trace_id: string_field(payload, "traceId", "trace_id"),
        provider_name: string_field(payload, "providerName", "provider_name"),
        model_name: string_field(payload, "modelName", "model_name"),
    }
}

/// HTTP implementation of the submit-prompt collaborator.
pub struct HttpCompletionService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCompletionService {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/chat", config.gateway_url),
        }
    }
}

impl CompletionService for HttpCompletionService {
    fn submit(&self, request: CompletionRequest) -> BoxFuture<'static, Result<CompletionReply>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        Box::pin(async move {
            debug!(
                conv_id = %request.conversation_id,
                endpoint = %endpoint,
                "Submitting prompt"
            );
            let response = client
                .post(&endpoint)
                .json(&request)
                .send()
                .await
                .map_err(GatewayError::Transport)?;

            let status = response.status();
            if !status.is_success() {
                return Err(GatewayError::Status {
                    status: status.as_u16(),
                }
                .into());
            }

            let payload: Value = response.json().await.map_err(GatewayError::Transport)?;
            Ok(parse_reply(&payload))
        })
    }
}
