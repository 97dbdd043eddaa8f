//! Messaging provider and order-status clients against mock HTTP servers

use commerce_bot_api::infrastructure::config::{MessagingConfig, OrdersConfig};
use commerce_bot_api::infrastructure::messaging::{Messenger, MessagingError, TwilioMessenger};
use commerce_bot_api::infrastructure::orders::{
    HttpOrderStatusApi, OrderLookupError, OrderStatusApi,
};
use serde_json::json;
use std::collections::BTreeMap;
use tokio_test::assert_ok;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MESSAGES_PATH: &str = "/2010-04-01/Accounts/AC123/Messages.json";

fn messenger(server: &MockServer, template: Option<&str>) -> TwilioMessenger {
    TwilioMessenger::new(MessagingConfig {
        api_base: server.uri(),
        account_sid: "AC123".to_string(),
        auth_token: "secret".to_string(),
        whatsapp_from: "+14155238886".to_string(),
        confirmation_template_sid: template.map(str::to_string),
    })
}

#[tokio::test]
async fn test_send_text_posts_whatsapp_form() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        // AC123:secret
        .and(header("authorization", "Basic QUMxMjM6c2VjcmV0"))
        .and(body_string_contains("From=whatsapp%3A%2B14155238886"))
        .and(body_string_contains("To=whatsapp%3A%2B34600111222"))
        .and(body_string_contains("Body=Hola"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sid": "SM1" })))
        .expect(1)
        .mount(&server)
        .await;

    let sid = messenger(&server, None)
        .send_text("+34600111222", "Hola")
        .await
        .unwrap();

    assert_eq!(sid, "SM1");
}

#[tokio::test]
async fn test_send_template_posts_content_variables() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_string_contains("ContentSid=HX42"))
        .and(body_string_contains("ContentVariables="))
        .and(body_string_contains("Ana"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sid": "SM2" })))
        .expect(1)
        .mount(&server)
        .await;

    let variables = BTreeMap::from([("1".to_string(), "Ana".to_string())]);
    let sent = messenger(&server, Some("HX42"))
        .send_template("whatsapp:+34600111222", "HX42", &variables)
        .await;

    assert_ok!(sent);
}

#[tokio::test]
async fn test_rejected_message_reports_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid To number"))
        .mount(&server)
        .await;

    let result = messenger(&server, None).send_text("+1", "Hola").await;

    match result {
        Err(MessagingError::Rejected { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

fn orders(server: &MockServer) -> HttpOrderStatusApi {
    HttpOrderStatusApi::new(OrdersConfig {
        api_base: format!("{}/wp-json/wc/v3/", server.uri()),
        api_key: "ck".to_string(),
        api_secret: "cs".to_string(),
    })
}

#[tokio::test]
async fn test_fetch_order_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wc/v3/orders/77"))
        .and(header("authorization", "Basic Y2s6Y3M="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 77,
            "status": "processing",
            "date_created": "2025-06-01T10:00:00",
            "line_items": []
        })))
        .mount(&server)
        .await;

    let order = orders(&server).fetch_order("77").await.unwrap().unwrap();

    assert_eq!(order.id, json!(77));
    assert_eq!(order.status, "processing");
    assert_eq!(order.number, None);
}

#[tokio::test]
async fn test_fetch_order_not_found_and_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wc/v3/orders/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wc/v3/orders/2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let api = orders(&server);
    assert!(api.fetch_order("1").await.unwrap().is_none());
    assert!(matches!(
        api.fetch_order("2").await,
        Err(OrderLookupError::Status(503))
    ));
}
