//! Assistant client tests
//!
//! Drives the thread / run / poll cycle against a mock assistants API.

use commerce_bot_api::core::assistant::{Assistant, AssistantError, OpenAiAssistant};
use commerce_bot_api::infrastructure::config::{AssistantConfig, OrdersConfig};
use commerce_bot_api::infrastructure::orders::{HttpOrderStatusApi, OrderStatusApi};
use di::Ref;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const THREAD: &str = "thread_abc";
const RUN: &str = "run_1";

fn assistant(server: &MockServer, orders: &MockServer, max_poll_attempts: u32) -> OpenAiAssistant {
    let order_api: Ref<dyn OrderStatusApi> = Ref::new(HttpOrderStatusApi::new(OrdersConfig {
        api_base: format!("{}/wp-json/wc/v3", orders.uri()),
        api_key: "ck".to_string(),
        api_secret: "cs".to_string(),
    }));

    OpenAiAssistant::new(
        AssistantConfig {
            api_base: server.uri(),
            api_key: "sk-test".to_string(),
            assistant_id: "asst_1".to_string(),
            poll_interval: Duration::from_millis(5),
            max_poll_attempts,
        },
        order_api,
    )
}

fn run(status: &str) -> serde_json::Value {
    json!({ "id": RUN, "status": status })
}

async fn mount_conversation_start(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/threads"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("OpenAI-Beta", "assistants=v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": THREAD })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/threads/{THREAD}/messages")))
        .and(body_partial_json(json!({ "role": "user" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "msg_user" })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/threads/{THREAD}/runs")))
        .and(body_partial_json(json!({ "assistant_id": "asst_1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(run("queued")))
        .mount(server)
        .await;
}

async fn mount_answer(server: &MockServer, text: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/threads/{THREAD}/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "role": "assistant",
                    "content": [{ "type": "text", "text": { "value": text, "annotations": [] } }]
                },
                {
                    "role": "user",
                    "content": [{ "type": "text", "text": { "value": "pregunta", "annotations": [] } }]
                }
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_reply_polls_until_completed() {
    let server = MockServer::start().await;
    let orders = MockServer::start().await;
    mount_conversation_start(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("/threads/{THREAD}/runs/{RUN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(run("in_progress")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/threads/{THREAD}/runs/{RUN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(run("completed")))
        .mount(&server)
        .await;
    mount_answer(&server, "Tu pedido llegará mañana【4:0†source】.").await;

    let assistant = assistant(&server, &orders, 10);
    let reply = assistant.reply("+34600111222", "¿Y mi pedido?").await.unwrap();

    assert_eq!(reply.text, "Tu pedido llegará mañana.");
    assert_eq!(reply.thread_id, THREAD);
    assert_eq!(assistant.thread_for("+34600111222").as_deref(), Some(THREAD));
}

#[tokio::test]
async fn test_thread_is_reused_per_user() {
    let server = MockServer::start().await;
    let orders = MockServer::start().await;
    // `/threads` expects a single call
    mount_conversation_start(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("/threads/{THREAD}/runs/{RUN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(run("completed")))
        .mount(&server)
        .await;
    mount_answer(&server, "Hola").await;

    let assistant = assistant(&server, &orders, 10);
    assistant.reply("+34600111222", "hola").await.unwrap();
    let second = assistant.reply("+34600111222", "otra vez").await.unwrap();

    assert_eq!(second.thread_id, THREAD);
    assert_eq!(assistant.thread_for("+34999999999"), None);
}

#[tokio::test]
async fn test_requires_action_runs_track_order() {
    let server = MockServer::start().await;
    let orders = MockServer::start().await;
    mount_conversation_start(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("/threads/{THREAD}/runs/{RUN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": RUN,
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "track_order", "arguments": "{\"order_id\":\"#1042\"}" }
                    }]
                }
            }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/threads/{THREAD}/runs/{RUN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(run("completed")))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!(
            "/threads/{THREAD}/runs/{RUN}/submit_tool_outputs"
        )))
        .and(body_string_contains("call_1"))
        .and(body_string_contains("enviado"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run("queued")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wc/v3/orders/1042"))
        .and(header("authorization", "Basic Y2s6Y3M="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1042,
            "number": "1042",
            "status": "shipped",
            "total": "59.90",
            "currency": "EUR"
        })))
        .expect(1)
        .mount(&orders)
        .await;

    mount_answer(&server, "Tu pedido #1042 ha sido enviado.").await;

    let assistant = assistant(&server, &orders, 10);
    let reply = assistant.reply("+34600111222", "pedido 1042").await.unwrap();

    assert_eq!(reply.text, "Tu pedido #1042 ha sido enviado.");
}

#[tokio::test]
async fn test_run_that_never_finishes_times_out() {
    let server = MockServer::start().await;
    let orders = MockServer::start().await;
    mount_conversation_start(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("/threads/{THREAD}/runs/{RUN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(run("in_progress")))
        .expect(3)
        .mount(&server)
        .await;

    let assistant = assistant(&server, &orders, 3);
    let result = assistant.reply("+34600111222", "hola").await;

    match result {
        Err(AssistantError::Timeout { run_id, attempts }) => {
            assert_eq!(run_id, RUN);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_run_is_reported() {
    let server = MockServer::start().await;
    let orders = MockServer::start().await;
    mount_conversation_start(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("/threads/{THREAD}/runs/{RUN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(run("failed")))
        .mount(&server)
        .await;

    let result = assistant(&server, &orders, 5).reply("+1", "hola").await;

    assert!(matches!(
        result,
        Err(AssistantError::RunFailed { ref status, .. }) if status == "failed"
    ));
}

#[tokio::test]
async fn test_api_error_is_surfaced() {
    let server = MockServer::start().await;
    let orders = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/threads"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let result = assistant(&server, &orders, 5).reply("+1", "hola").await;

    assert!(matches!(result, Err(AssistantError::Api { status: 401, .. })));
}

#[tokio::test]
async fn test_track_order_outputs() {
    let server = MockServer::start().await;
    let orders = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wc/v3/orders/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&orders)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wc/v3/orders/500"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&orders)
        .await;

    let assistant = assistant(&server, &orders, 5);

    assert!(
        assistant
            .track_order(r#"{"order_id": 404}"#)
            .await
            .starts_with("No encontramos")
    );
    assert!(
        assistant
            .track_order(r#"{"order_id": "500"}"#)
            .await
            .starts_with("No pudimos")
    );
    assert!(assistant.track_order("{}").await.starts_with("Necesito"));
    assert!(assistant.track_order("not json").await.starts_with("Necesito"));
}
