//! Conversation routing tests
//!
//! Runs the router against the real chat history (in-memory SQLite) with a recording messenger
//! and a scripted assistant.

use async_trait::async_trait;
use commerce_bot_api::core::assistant::{Assistant, AssistantError, AssistantReply};
use commerce_bot_api::core::error::ServiceError;
use commerce_bot_api::core::router::{
    APOLOGY, HANDOFF_NOTICE, InboundMessage, PLEASE_WAIT, ProcessingRegistry, RouteOutcome,
    WhatsAppRouter,
};
use commerce_bot_api::core::services::ChatHistoryService;
use commerce_bot_api::core::traits::{ChatService, ConversationRouter};
use commerce_bot_api::infrastructure::database::DatabaseConnection;
use commerce_bot_api::infrastructure::entities::{ChatRole, ChatStatus};
use commerce_bot_api::infrastructure::messaging::{Messenger, MessagingError};
use commerce_bot_api::infrastructure::repositories::DbChatRepository;
use di::Ref;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

const USER: &str = "+34600111222";

#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingMessenger {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<String, MessagingError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MessagingError::Rejected {
                status: 400,
                body: "invalid number".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok("SM123".to_string())
    }

    async fn send_template(
        &self,
        to: &str,
        content_sid: &str,
        _variables: &BTreeMap<String, String>,
    ) -> Result<String, MessagingError> {
        self.send_text(to, content_sid).await
    }
}

#[derive(Default)]
struct ScriptedAssistant {
    calls: AtomicUsize,
    fail: AtomicBool,
    /// When set, `reply` signals `started` and waits for `release`.
    gate: Option<(Notify, Notify)>,
}

impl ScriptedAssistant {
    fn gated() -> Self {
        ScriptedAssistant {
            gate: Some((Notify::new(), Notify::new())),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Assistant for ScriptedAssistant {
    async fn reply(&self, _user_id: &str, message: &str) -> Result<AssistantReply, AssistantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((started, release)) = &self.gate {
            started.notify_one();
            release.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AssistantError::EmptyReply);
        }
        Ok(AssistantReply {
            text: format!("eco: {message}"),
            thread_id: "thread_1".to_string(),
        })
    }

    fn thread_for(&self, _user_id: &str) -> Option<String> {
        (self.calls() > 0).then(|| "thread_1".to_string())
    }
}

struct Harness {
    router: Ref<WhatsAppRouter>,
    chats: Ref<ChatHistoryService>,
    messenger: Ref<RecordingMessenger>,
    assistant: Ref<ScriptedAssistant>,
    processing: Ref<ProcessingRegistry>,
}

async fn harness(assistant: ScriptedAssistant) -> Harness {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    let repo = Ref::new(DbChatRepository::new(Ref::new(DatabaseConnection::from_pool(
        pool,
    ))));
    let chats = Ref::new(ChatHistoryService::new(repo));
    let messenger = Ref::new(RecordingMessenger::default());
    let assistant = Ref::new(assistant);
    let processing = Ref::new(ProcessingRegistry::default());

    let router = Ref::new(WhatsAppRouter::new(
        chats.clone(),
        messenger.clone(),
        assistant.clone(),
        processing.clone(),
    ));

    Harness {
        router,
        chats,
        messenger,
        assistant,
        processing,
    }
}

fn text(body: &str) -> InboundMessage {
    InboundMessage {
        from: format!("whatsapp:{USER}"),
        body: body.to_string(),
        profile_name: Some("Ana".to_string()),
        ..Default::default()
    }
}

fn image(content_type: Option<&str>) -> InboundMessage {
    InboundMessage {
        num_media: 1,
        media_url: Some("https://media.example/img1".to_string()),
        media_content_type: content_type.map(str::to_string),
        ..text("")
    }
}

#[tokio::test]
async fn test_new_user_is_answered_by_assistant() {
    let h = harness(ScriptedAssistant::default()).await;

    let outcome = h.router.handle_inbound(text("¿Dónde está mi pedido?")).await;
    assert_eq!(outcome.unwrap(), RouteOutcome::Replied);

    assert_eq!(
        h.messenger.sent(),
        vec![(USER.to_string(), "eco: ¿Dónde está mi pedido?".to_string())]
    );

    let history = h.chats.list_messages(USER).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, ChatRole::User);
    assert_eq!(history[0].status, ChatStatus::Automated);
    assert_eq!(history[0].profile_name.as_deref(), Some("Ana"));
    assert_eq!(history[1].role, ChatRole::Assistant);
    assert_eq!(history[1].conversation_id.as_deref(), Some("thread_1"));
    assert!(!h.processing.is_busy(USER));
}

#[tokio::test]
async fn test_keyword_hands_conversation_to_agent() {
    let h = harness(ScriptedAssistant::default()).await;

    let outcome = h
        .router
        .handle_inbound(text("Quiero asistencia personal por favor"))
        .await;
    assert_eq!(outcome.unwrap(), RouteOutcome::HandedOff);

    assert_eq!(h.assistant.calls(), 0);
    assert_eq!(
        h.messenger.sent(),
        vec![(USER.to_string(), HANDOFF_NOTICE.to_string())]
    );
    assert_eq!(
        h.chats.conversation_status(USER).await.unwrap(),
        ChatStatus::Agent
    );

    let history = h.chats.list_messages(USER).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|m| m.status == ChatStatus::Agent));
    assert_eq!(history[1].message, HANDOFF_NOTICE);
}

#[tokio::test]
async fn test_image_hands_conversation_to_agent() {
    let h = harness(ScriptedAssistant::default()).await;

    let outcome = h.router.handle_inbound(image(Some("image/jpeg"))).await;
    assert_eq!(outcome.unwrap(), RouteOutcome::HandedOff);

    let history = h.chats.list_messages(USER).await.unwrap();
    assert_eq!(history[0].message, "https://media.example/img1");
    assert_eq!(h.assistant.calls(), 0);
}

#[tokio::test]
async fn test_media_without_content_type_counts_as_image() {
    let h = harness(ScriptedAssistant::default()).await;

    let outcome = h.router.handle_inbound(image(None)).await;
    assert_eq!(outcome.unwrap(), RouteOutcome::HandedOff);
}

#[tokio::test]
async fn test_non_image_attachment_goes_to_assistant() {
    let h = harness(ScriptedAssistant::default()).await;

    let mut inbound = image(Some("application/pdf"));
    inbound.body = "Adjunto factura".to_string();
    let outcome = h.router.handle_inbound(inbound).await;

    assert_eq!(outcome.unwrap(), RouteOutcome::Replied);
    assert_eq!(h.assistant.calls(), 1);
}

#[tokio::test]
async fn test_agent_owned_conversation_is_only_stored() {
    let h = harness(ScriptedAssistant::default()).await;
    h.router
        .handle_inbound(text("ASISTENCIA PERSONAL"))
        .await
        .unwrap();
    let sent_before = h.messenger.sent().len();

    let outcome = h.router.handle_inbound(text("¿Hola?")).await;
    assert_eq!(outcome.unwrap(), RouteOutcome::StoredForAgent);

    assert_eq!(h.messenger.sent().len(), sent_before);
    assert_eq!(h.assistant.calls(), 0);
    let latest = h.chats.list_messages(USER).await.unwrap();
    let last = latest.last().unwrap();
    assert_eq!(last.message, "¿Hola?");
    assert_eq!(last.status, ChatStatus::Agent);
}

#[tokio::test]
async fn test_admin_returns_conversation_to_assistant() {
    let h = harness(ScriptedAssistant::default()).await;
    h.router
        .handle_inbound(text("ASISTENCIA PERSONAL"))
        .await
        .unwrap();

    assert_ok!(
        h.chats
            .set_conversation_status(USER, ChatStatus::Automated)
            .await
    );

    let outcome = h.router.handle_inbound(text("Gracias")).await;
    assert_eq!(outcome.unwrap(), RouteOutcome::Replied);
    assert_eq!(h.assistant.calls(), 1);
}

#[tokio::test]
async fn test_assistant_failure_sends_apology() {
    let assistant = ScriptedAssistant::default();
    assistant.fail.store(true, Ordering::SeqCst);
    let h = harness(assistant).await;

    let outcome = h.router.handle_inbound(text("hola")).await;
    assert_eq!(outcome.unwrap(), RouteOutcome::Failed);

    assert_eq!(
        h.messenger.sent(),
        vec![(USER.to_string(), APOLOGY.to_string())]
    );
    let history = h.chats.list_messages(USER).await.unwrap();
    assert_eq!(history.last().unwrap().message, APOLOGY);
    assert!(!h.processing.is_busy(USER));
}

#[tokio::test]
async fn test_second_message_while_busy_is_asked_to_wait() {
    let h = harness(ScriptedAssistant::gated()).await;

    let router = h.router.clone();
    let first = tokio::spawn(async move { router.handle_inbound(text("primero")).await });

    let (started, release) = h.assistant.gate.as_ref().unwrap();
    started.notified().await;
    assert!(h.processing.is_busy(USER));

    let second = h.router.handle_inbound(text("segundo")).await;
    assert_eq!(second.unwrap(), RouteOutcome::AskedToWait);

    release.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), RouteOutcome::Replied);

    assert_eq!(h.assistant.calls(), 1);
    assert!(!h.processing.is_busy(USER));

    let sent: Vec<String> = h.messenger.sent().into_iter().map(|(_, body)| body).collect();
    assert_eq!(sent, vec![PLEASE_WAIT.to_string(), "eco: primero".to_string()]);

    // the rejected message is not kept
    let history = h.chats.list_messages(USER).await.unwrap();
    assert!(history.iter().all(|m| m.message != "segundo"));
}

#[tokio::test]
async fn test_handoff_while_assistant_answers_keeps_agent_ownership() {
    let h = harness(ScriptedAssistant::gated()).await;

    let router = h.router.clone();
    let first = tokio::spawn(async move { router.handle_inbound(text("hola")).await });

    let (started, release) = h.assistant.gate.as_ref().unwrap();
    started.notified().await;

    let second = h.router.handle_inbound(text("quiero ASISTENCIA PERSONAL")).await;
    assert_eq!(second.unwrap(), RouteOutcome::HandedOff);

    release.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), RouteOutcome::Superseded);

    assert_eq!(
        h.chats.conversation_status(USER).await.unwrap(),
        ChatStatus::Agent
    );
    let sent: Vec<String> = h.messenger.sent().into_iter().map(|(_, body)| body).collect();
    assert_eq!(sent, vec![HANDOFF_NOTICE.to_string()]);
    let history = h.chats.list_messages(USER).await.unwrap();
    assert!(history.iter().all(|m| m.message != "eco: hola"));
    assert!(!h.processing.is_busy(USER));

    // the next message stays with the agent
    let third = h.router.handle_inbound(text("sigo aqui")).await;
    assert_eq!(third.unwrap(), RouteOutcome::StoredForAgent);
    assert_eq!(h.assistant.calls(), 1);
}

#[tokio::test]
async fn test_failed_answer_after_handoff_sends_no_apology() {
    let assistant = ScriptedAssistant::gated();
    assistant.fail.store(true, Ordering::SeqCst);
    let h = harness(assistant).await;

    let router = h.router.clone();
    let first = tokio::spawn(async move { router.handle_inbound(text("hola")).await });

    let (started, release) = h.assistant.gate.as_ref().unwrap();
    started.notified().await;
    let second = h.router.handle_inbound(text("ASISTENCIA PERSONAL")).await;
    assert_eq!(second.unwrap(), RouteOutcome::HandedOff);

    release.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), RouteOutcome::Superseded);

    let history = h.chats.list_messages(USER).await.unwrap();
    assert!(history.iter().all(|m| m.message != APOLOGY));
    assert_eq!(
        h.chats.conversation_status(USER).await.unwrap(),
        ChatStatus::Agent
    );
}

#[tokio::test]
async fn test_missing_sender_is_rejected() {
    let h = harness(ScriptedAssistant::default()).await;

    let mut inbound = text("hola");
    inbound.from = String::new();
    let result = h.router.handle_inbound(inbound).await;

    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn test_agent_reply_is_sent_and_stored() {
    let h = harness(ScriptedAssistant::default()).await;

    let stored = h
        .router
        .send_agent_reply(USER, "  Hola Ana, soy Laura.  ".to_string())
        .await
        .unwrap();

    assert_eq!(stored.message, "Hola Ana, soy Laura.");
    assert_eq!(stored.role, ChatRole::Assistant);
    assert_eq!(stored.status, ChatStatus::Agent);
    assert_eq!(
        h.messenger.sent(),
        vec![(USER.to_string(), "Hola Ana, soy Laura.".to_string())]
    );
}

#[tokio::test]
async fn test_agent_reply_validation_and_delivery_errors() {
    let h = harness(ScriptedAssistant::default()).await;

    let empty = h.router.send_agent_reply(USER, "   ".to_string()).await;
    assert!(matches!(empty, Err(ServiceError::Validation(_))));

    h.messenger.fail.store(true, Ordering::SeqCst);
    let undelivered = h.router.send_agent_reply(USER, "hola".to_string()).await;
    assert!(matches!(undelivered, Err(ServiceError::Upstream(_))));

    // nothing is stored when delivery fails
    assert_err!(
        h.chats
            .set_conversation_status(USER, ChatStatus::Automated)
            .await
    );
}
