//! Agent console endpoints for WhatsApp conversations

use crate::api::chats::schemas::{
    AgentReply, ChatMessage, ConversationList, ConversationSummary, MessageList, StatusUpdate,
};
use crate::api::{ApiResult, ExtractAdmin};
use crate::core::traits::{ChatService, ConversationRouter};
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use di_axum::Inject;
use log::info;
use validator::Validate;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_conversations))
        .route(
            "/:user_id/messages",
            get(list_messages).post(send_agent_reply),
        )
        .route("/:user_id/status", put(set_status))
}

async fn list_conversations(
    Inject(chats): Inject<dyn ChatService>,
    ExtractAdmin(_admin): ExtractAdmin,
) -> ApiResult<Json<ConversationList>> {
    let latest = chats.list_conversations().await?;

    Ok(Json(ConversationList {
        conversations: latest.into_iter().map(ConversationSummary::from).collect(),
    }))
}

async fn list_messages(
    Inject(chats): Inject<dyn ChatService>,
    ExtractAdmin(_admin): ExtractAdmin,
    Path(user_id): Path<String>,
) -> ApiResult<Json<MessageList>> {
    let messages = chats.list_messages(&user_id).await?;

    Ok(Json(MessageList {
        user_id,
        messages: messages.into_iter().map(ChatMessage::from).collect(),
    }))
}

async fn send_agent_reply(
    Inject(router): Inject<dyn ConversationRouter>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(user_id): Path<String>,
    Json(reply): Json<AgentReply>,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
    reply.validate()?;
    let stored = router.send_agent_reply(&user_id, reply.message).await?;
    info!("{admin} replied to {user_id}");

    Ok((StatusCode::CREATED, Json(stored.into())))
}

async fn set_status(
    Inject(chats): Inject<dyn ChatService>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(user_id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<Json<ConversationSummary>> {
    let latest = chats.set_conversation_status(&user_id, update.status).await?;
    info!("{admin} set conversation {user_id} to {}", update.status);

    Ok(Json(latest.into()))
}

pub mod schemas {
    use crate::infrastructure::entities;
    use crate::infrastructure::entities::{ChatRole, ChatStatus};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;
    use validator::Validate;

    #[derive(Serialize, Debug)]
    pub struct ChatMessage {
        pub id: Uuid,
        pub user_id: String,
        pub message: String,
        pub role: ChatRole,
        pub status: ChatStatus,
        pub conversation_id: Option<String>,
        pub profile_name: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::ChatMessage> for ChatMessage {
        fn from(message: entities::ChatMessage) -> Self {
            ChatMessage {
                id: message.id,
                user_id: message.user_id,
                message: message.message,
                role: message.role,
                status: message.status,
                conversation_id: message.conversation_id,
                profile_name: message.profile_name,
                created_at: message.created_at,
            }
        }
    }

    /// One row of the console's conversation list, built from the user's latest message.
    #[derive(Serialize, Debug)]
    pub struct ConversationSummary {
        pub user_id: String,
        pub profile_name: Option<String>,
        pub status: ChatStatus,
        pub last_message: String,
        pub last_role: ChatRole,
        pub updated_at: DateTime<Utc>,
    }

    impl From<entities::ChatMessage> for ConversationSummary {
        fn from(latest: entities::ChatMessage) -> Self {
            ConversationSummary {
                user_id: latest.user_id,
                profile_name: latest.profile_name,
                status: latest.status,
                last_message: latest.message,
                last_role: latest.role,
                updated_at: latest.created_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct ConversationList {
        pub conversations: Vec<ConversationSummary>,
    }

    #[derive(Serialize, Debug)]
    pub struct MessageList {
        pub user_id: String,
        pub messages: Vec<ChatMessage>,
    }

    #[derive(Deserialize, Debug, Validate)]
    pub struct AgentReply {
        #[validate(length(min = 1, max = 1600))]
        pub message: String,
    }

    #[derive(Deserialize, Debug)]
    pub struct StatusUpdate {
        pub status: ChatStatus,
    }
}
