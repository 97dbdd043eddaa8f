//! LLM Assistant service.
//!
//! Talks to an assistants-style API: every WhatsApp user gets one remote thread, each inbound
//! message becomes a run on that thread, and the run is polled until it completes. Runs may
//! stop to ask for tool outputs; the only tool offered is `track_order`.

use crate::core::templates;
use crate::infrastructure::config::{AppConfig, AssistantConfig};
use crate::infrastructure::orders::OrderStatusApi;
use async_trait::async_trait;
use dashmap::DashMap;
use di::{Ref, inject, injectable};
use log::{debug, info, warn};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

pub const TRACK_ORDER_TOOL: &str = "track_order";

const ORDER_NOT_FOUND: &str =
    "No encontramos ningún pedido con ese número. Por favor, verifica el número e inténtalo de nuevo.";
const ORDER_LOOKUP_FAILED: &str =
    "No pudimos consultar el estado del pedido en este momento. Por favor, inténtalo más tarde.";
const ORDER_ID_MISSING: &str = "Necesito el número de pedido para poder consultarlo.";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("assistant API answered {status}: {body}")]
    Api { status: u16, body: String },

    #[error("run {run_id} ended with status `{status}`")]
    RunFailed { run_id: String, status: String },

    #[error("run {run_id} still unfinished after {attempts} polls")]
    Timeout { run_id: String, attempts: u32 },

    #[error("run finished without an assistant message")]
    EmptyReply,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    pub text: String,
    pub thread_id: String,
}

#[async_trait]
pub trait Assistant: Send + Sync {
    /// Sends `message` on the user's thread and waits for the assistant's answer.
    async fn reply(&self, user_id: &str, message: &str) -> Result<AssistantReply, AssistantError>;

    /// Remote thread currently associated with the user, if any.
    fn thread_for(&self, user_id: &str) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Run {
    id: String,
    status: String,
    #[serde(default)]
    required_action: Option<RequiredAction>,
}

#[derive(Debug, Deserialize)]
struct RequiredAction {
    #[serde(default)]
    submit_tool_outputs: Option<SubmitToolOutputs>,
}

#[derive(Debug, Deserialize)]
struct SubmitToolOutputs {
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ToolOutput {
    tool_call_id: String,
    output: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

#[derive(Debug, Deserialize)]
struct TrackOrderArguments {
    #[serde(default)]
    order_id: Option<serde_json::Value>,
}

/// Removes `【4:0†source】`-style citation markers the API leaves in answers.
pub fn strip_citations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('【') {
        out.push_str(&rest[..start]);
        match rest[start..].find('】') {
            Some(end) => rest = &rest[start + end + '】'.len_utf8()..],
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_owned()
}

/// Normalizes the order reference the model passes (`"#1042"`, `1042`, `" 1042 "`).
fn normalize_order_id(value: &serde_json::Value) -> Option<String> {
    let raw = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let id = raw.trim().trim_start_matches('#').trim();

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        None
    } else {
        Some(id.to_owned())
    }
}

pub struct OpenAiAssistant {
    client: reqwest::Client,
    config: AssistantConfig,
    orders: Ref<dyn OrderStatusApi>,
    threads: DashMap<String, String>,
}

#[injectable(Assistant)]
impl OpenAiAssistant {
    #[inject]
    pub fn create(config: Ref<AppConfig>, orders: Ref<dyn OrderStatusApi>) -> OpenAiAssistant {
        OpenAiAssistant::new(config.assistant.clone(), orders)
    }
}

impl OpenAiAssistant {
    pub fn new(config: AssistantConfig, orders: Ref<dyn OrderStatusApi>) -> OpenAiAssistant {
        OpenAiAssistant {
            client: reqwest::Client::new(),
            config,
            orders,
            threads: DashMap::new(),
        }
    }

    /// Output handed back to the model for a `track_order` call. Never fails: lookup problems
    /// become a sentence the model can relay to the customer.
    pub async fn track_order(&self, arguments: &str) -> String {
        let order_id = serde_json::from_str::<TrackOrderArguments>(arguments)
            .ok()
            .and_then(|args| args.order_id)
            .and_then(|value| normalize_order_id(&value));

        let Some(order_id) = order_id else {
            warn!("track_order called with unusable arguments: {arguments}");
            return ORDER_ID_MISSING.to_owned();
        };

        match self.orders.fetch_order(&order_id).await {
            Ok(Some(order)) => templates::order_status_summary(&order),
            Ok(None) => ORDER_NOT_FOUND.to_owned(),
            Err(e) => {
                warn!("order lookup for {order_id} failed: {e}");
                ORDER_LOOKUP_FAILED.to_owned()
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.config.api_base.trim_end_matches('/'), path);
        self.client
            .request(method, url)
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send<T: DeserializeOwned>(
        builder: reqwest::RequestBuilder,
    ) -> Result<T, AssistantError> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn thread_id(&self, user_id: &str) -> Result<String, AssistantError> {
        if let Some(existing) = self.thread_for(user_id) {
            return Ok(existing);
        }

        let created: Created = Self::send(self.request(Method::POST, "threads").json(&json!({}))).await?;
        info!("created assistant thread {} for {user_id}", created.id);
        self.threads.insert(user_id.to_owned(), created.id.clone());

        Ok(created.id)
    }

    async fn run_tools(&self, calls: Vec<ToolCall>) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());

        for call in calls {
            let output = if call.function.name == TRACK_ORDER_TOOL {
                self.track_order(&call.function.arguments).await
            } else {
                warn!("assistant requested unknown tool `{}`", call.function.name);
                json!({ "error": format!("unknown tool `{}`", call.function.name) }).to_string()
            };

            outputs.push(ToolOutput {
                tool_call_id: call.id,
                output,
            });
        }

        outputs
    }

    async fn wait_for_run(&self, thread_id: &str, run_id: &str) -> Result<(), AssistantError> {
        let max_attempts = self.config.max_poll_attempts;

        for attempt in 1..=max_attempts {
            let run: Run = Self::send(
                self.request(Method::GET, &format!("threads/{thread_id}/runs/{run_id}")),
            )
            .await?;
            debug!("run {} is `{}` (poll {attempt}/{max_attempts})", run.id, run.status);

            match run.status.as_str() {
                "completed" => return Ok(()),
                "queued" | "in_progress" | "cancelling" => {}
                "requires_action" => {
                    let calls = run
                        .required_action
                        .and_then(|action| action.submit_tool_outputs)
                        .map(|submit| submit.tool_calls)
                        .unwrap_or_default();
                    let outputs = self.run_tools(calls).await;

                    let _: Run = Self::send(
                        self.request(
                            Method::POST,
                            &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
                        )
                        .json(&json!({ "tool_outputs": outputs })),
                    )
                    .await?;
                }
                other => {
                    return Err(AssistantError::RunFailed {
                        run_id: run.id,
                        status: other.to_owned(),
                    });
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        Err(AssistantError::Timeout {
            run_id: run_id.to_owned(),
            attempts: max_attempts,
        })
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<String, AssistantError> {
        let messages: MessageList = Self::send(self.request(
            Method::GET,
            &format!("threads/{thread_id}/messages?order=desc&limit=10"),
        ))
        .await?;

        let message = messages
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .ok_or(AssistantError::EmptyReply)?;

        let text = message
            .content
            .into_iter()
            .filter_map(|content| match content {
                MessageContent::Text { text } => Some(text.value),
                MessageContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        let text = strip_citations(&text);
        if text.is_empty() {
            Err(AssistantError::EmptyReply)
        } else {
            Ok(text)
        }
    }
}

#[async_trait]
impl Assistant for OpenAiAssistant {
    async fn reply(&self, user_id: &str, message: &str) -> Result<AssistantReply, AssistantError> {
        let thread_id = self.thread_id(user_id).await?;

        let _: Created = Self::send(
            self.request(Method::POST, &format!("threads/{thread_id}/messages"))
                .json(&json!({ "role": "user", "content": message })),
        )
        .await?;

        let run: Run = Self::send(
            self.request(Method::POST, &format!("threads/{thread_id}/runs"))
                .json(&json!({ "assistant_id": self.config.assistant_id })),
        )
        .await?;

        self.wait_for_run(&thread_id, &run.id).await?;
        let text = self.latest_reply(&thread_id).await?;

        Ok(AssistantReply { text, thread_id })
    }

    fn thread_for(&self, user_id: &str) -> Option<String> {
        self.threads.get(user_id).map(|thread| thread.value().clone())
    }
}
