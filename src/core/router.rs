//! Inbound WhatsApp routing between the assistant and human agents.
//!
//! A conversation is either owned by the assistant (`IA`) or by a human agent (`AGENTE`). The
//! owner is the status of the user's latest stored message. Users move to `AGENTE` by sending an
//! image or the phrase `ASISTENCIA PERSONAL`; only an admin moves them back.

use crate::core::assistant::Assistant;
use crate::core::error::{ServiceError, ServiceResult};
use crate::core::traits::{ChatService, ConversationRouter};
use crate::infrastructure::entities::{ChatMessage, ChatStatus};
use crate::infrastructure::messaging::{Messenger, user_id_from_address};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use di::{Ref, inject, injectable};
use log::{error, info, warn};
use std::time::Instant;

pub const HANDOFF_KEYWORD: &str = "ASISTENCIA PERSONAL";

pub const HANDOFF_NOTICE: &str =
    "Gracias por escribirnos. Un agente de nuestro equipo continuará la conversación contigo en breve.";
pub const PLEASE_WAIT: &str =
    "Estamos procesando tu mensaje anterior, por favor espera un momento.";
pub const APOLOGY: &str =
    "Lo sentimos, ocurrió un error al procesar tu mensaje. Por favor, inténtalo de nuevo más tarde.";

/// A message as delivered by the messaging provider's webhook.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub from: String,
    pub body: String,
    pub num_media: u32,
    pub media_url: Option<String>,
    pub media_content_type: Option<String>,
    pub profile_name: Option<String>,
}

impl InboundMessage {
    pub fn user_id(&self) -> &str {
        user_id_from_address(&self.from)
    }

    /// Attachments count as images unless the provider says otherwise.
    pub fn has_image(&self) -> bool {
        self.num_media > 0
            && self
                .media_content_type
                .as_deref()
                .is_none_or(|content_type| content_type.starts_with("image/"))
    }

    pub fn asks_for_agent(&self) -> bool {
        self.body.to_uppercase().contains(HANDOFF_KEYWORD)
    }

    pub fn triggers_handoff(&self) -> bool {
        self.has_image() || self.asks_for_agent()
    }

    /// Text kept in history: the body, plus the first attachment's URL when there is one.
    pub fn stored_text(&self) -> String {
        match (&self.media_url, self.num_media > 0) {
            (Some(url), true) if self.body.trim().is_empty() => url.clone(),
            (Some(url), true) => format!("{}\n{}", self.body, url),
            _ => self.body.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The conversation belongs to an agent; the message was only stored.
    StoredForAgent,
    /// The message moved the conversation to an agent.
    HandedOff,
    /// The assistant answered.
    Replied,
    /// Another message from the same user was still being answered.
    AskedToWait,
    /// Answering failed and the user received an apology.
    Failed,
    /// An agent took over while the assistant was answering; its answer was discarded.
    Superseded,
}

/// Users whose message is currently with the assistant. Process-local.
#[derive(Debug, Default)]
pub struct ProcessingRegistry {
    busy: DashMap<String, Instant>,
}

#[injectable]
impl ProcessingRegistry {
    #[inject]
    pub fn create() -> ProcessingRegistry {
        ProcessingRegistry::default()
    }
}

impl ProcessingRegistry {
    /// Marks the user busy. Returns `None` if they already are.
    pub fn try_acquire(&self, user_id: &str) -> Option<ProcessingGuard<'_>> {
        match self.busy.entry(user_id.to_owned()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Some(ProcessingGuard {
                    registry: self,
                    user_id: user_id.to_owned(),
                })
            }
        }
    }

    pub fn is_busy(&self, user_id: &str) -> bool {
        self.busy.contains_key(user_id)
    }
}

/// Clears the user's busy mark when dropped.
pub struct ProcessingGuard<'a> {
    registry: &'a ProcessingRegistry,
    user_id: String,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if let Some((user_id, since)) = self.registry.busy.remove(&self.user_id) {
            info!("{user_id} processed in {:?}", since.elapsed());
        }
    }
}

#[injectable(ConversationRouter)]
pub struct WhatsAppRouter {
    chats: Ref<dyn ChatService>,
    messenger: Ref<dyn Messenger>,
    assistant: Ref<dyn Assistant>,
    processing: Ref<ProcessingRegistry>,
}

impl WhatsAppRouter {
    pub fn new(
        chats: Ref<dyn ChatService>,
        messenger: Ref<dyn Messenger>,
        assistant: Ref<dyn Assistant>,
        processing: Ref<ProcessingRegistry>,
    ) -> Self {
        Self {
            chats,
            messenger,
            assistant,
            processing,
        }
    }

    /// Best-effort delivery; failures are only logged.
    async fn notify(&self, user_id: &str, text: &str) -> bool {
        match self.messenger.send_text(user_id, text).await {
            Ok(_) => true,
            Err(e) => {
                error!("failed to send message to {user_id}: {e}");
                false
            }
        }
    }

    async fn hand_off(&self, inbound: &InboundMessage) -> ServiceResult<()> {
        let user_id = inbound.user_id();
        info!("handing {user_id} over to a human agent");

        self.chats
            .record_user_message(
                user_id,
                inbound.stored_text(),
                ChatStatus::Agent,
                inbound.profile_name.clone(),
                None,
            )
            .await?;

        self.notify(user_id, HANDOFF_NOTICE).await;
        self.chats
            .record_assistant_message(user_id, HANDOFF_NOTICE.to_owned(), ChatStatus::Agent, None)
            .await?;

        Ok(())
    }

    async fn answer_with_assistant(&self, inbound: &InboundMessage) -> ServiceResult<RouteOutcome> {
        let user_id = inbound.user_id();
        let text = inbound.stored_text();

        self.chats
            .record_user_message(
                user_id,
                text.clone(),
                ChatStatus::Automated,
                inbound.profile_name.clone(),
                self.assistant.thread_for(user_id),
            )
            .await?;

        let answer = self.assistant.reply(user_id, &text).await;

        // A handoff may have landed while the assistant was busy.
        if self.chats.conversation_status(user_id).await? == ChatStatus::Agent {
            info!("{user_id} was handed off mid-answer, discarding the assistant outcome");
            return Ok(RouteOutcome::Superseded);
        }

        let failure = match answer {
            Ok(reply) => match self.messenger.send_text(user_id, &reply.text).await {
                Ok(_) => {
                    self.chats
                        .record_assistant_message(
                            user_id,
                            reply.text,
                            ChatStatus::Automated,
                            Some(reply.thread_id),
                        )
                        .await?;
                    return Ok(RouteOutcome::Replied);
                }
                Err(e) => format!("delivering the assistant reply failed: {e}"),
            },
            Err(e) => format!("assistant failed: {e}"),
        };

        error!("{user_id}: {failure}");
        self.notify(user_id, APOLOGY).await;
        self.chats
            .record_assistant_message(
                user_id,
                APOLOGY.to_owned(),
                ChatStatus::Automated,
                self.assistant.thread_for(user_id),
            )
            .await?;

        Ok(RouteOutcome::Failed)
    }
}

#[async_trait]
impl ConversationRouter for WhatsAppRouter {
    async fn handle_inbound(&self, inbound: InboundMessage) -> ServiceResult<RouteOutcome> {
        let user_id = inbound.user_id().to_owned();
        if user_id.is_empty() {
            return Err(ServiceError::Validation("missing sender".into()));
        }

        if self.chats.conversation_status(&user_id).await? == ChatStatus::Agent {
            self.chats
                .record_user_message(
                    &user_id,
                    inbound.stored_text(),
                    ChatStatus::Agent,
                    inbound.profile_name.clone(),
                    None,
                )
                .await?;
            return Ok(RouteOutcome::StoredForAgent);
        }

        if inbound.triggers_handoff() {
            self.hand_off(&inbound).await?;
            return Ok(RouteOutcome::HandedOff);
        }

        let Some(_guard) = self.processing.try_acquire(&user_id) else {
            warn!("{user_id} wrote again while the previous message is being answered");
            self.notify(&user_id, PLEASE_WAIT).await;
            return Ok(RouteOutcome::AskedToWait);
        };

        self.answer_with_assistant(&inbound).await
    }

    async fn send_agent_reply(&self, user_id: &str, text: String) -> ServiceResult<ChatMessage> {
        let text = text.trim().to_owned();
        if text.is_empty() {
            return Err(ServiceError::Validation("message must not be empty".into()));
        }

        self.messenger
            .send_text(user_id, &text)
            .await
            .map_err(|e| ServiceError::Upstream(e.to_string()))?;

        self.chats
            .record_assistant_message(user_id, text, ChatStatus::Agent, None)
            .await
    }
}
