//! Implementations for the service the app needs.
//!

use crate::core::error::{ServiceError, ServiceResult};
use crate::core::traits::{ChatService, NewChatMessage, WorkshopInput, WorkshopService};
use crate::infrastructure::entities::{ChatMessage, ChatStatus, Workshop};
use crate::infrastructure::traits::{AppointmentRepository, ChatRepository, WorkshopRepository};
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use log::info;
use sqlx::types::Json;
use uuid::Uuid;

#[injectable(ChatService)]
pub struct ChatHistoryService {
    repo: Ref<dyn ChatRepository>,
}

impl ChatHistoryService {
    pub fn new(repo: Ref<dyn ChatRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ChatService for ChatHistoryService {
    async fn record_message(&self, message: NewChatMessage) -> ServiceResult<ChatMessage> {
        let stored = self
            .repo
            .insert_message(ChatMessage {
                id: Uuid::new_v4(),
                user_id: message.user_id,
                message: message.message,
                role: message.role,
                status: message.status,
                conversation_id: message.conversation_id,
                profile_name: message.profile_name,
                created_at: Utc::now(),
            })
            .await?;

        Ok(stored)
    }

    async fn conversation_status(&self, user_id: &str) -> ServiceResult<ChatStatus> {
        Ok(self
            .repo
            .latest_message(user_id)
            .await?
            .map(|m| m.status)
            .unwrap_or_default())
    }

    async fn list_conversations(&self) -> ServiceResult<Vec<ChatMessage>> {
        Ok(self.repo.list_latest_per_user().await?)
    }

    async fn list_messages(&self, user_id: &str) -> ServiceResult<Vec<ChatMessage>> {
        Ok(self.repo.list_user_messages(user_id).await?)
    }

    async fn set_conversation_status(
        &self,
        user_id: &str,
        status: ChatStatus,
    ) -> ServiceResult<ChatMessage> {
        let mut latest = self
            .repo
            .latest_message(user_id)
            .await?
            .ok_or(ServiceError::NotFound("conversation"))?;

        if latest.status != status {
            self.repo.set_message_status(latest.id, status).await?;
            info!("conversation {user_id} moved from {} to {status}", latest.status);
            latest.status = status;
        }

        Ok(latest)
    }
}

#[injectable(WorkshopService)]
pub struct WorkshopCatalog {
    workshops: Ref<dyn WorkshopRepository>,
    appointments: Ref<dyn AppointmentRepository>,
}

impl WorkshopCatalog {
    pub fn new(
        workshops: Ref<dyn WorkshopRepository>,
        appointments: Ref<dyn AppointmentRepository>,
    ) -> Self {
        Self {
            workshops,
            appointments,
        }
    }
}

fn validate_workshop(input: &WorkshopInput) -> ServiceResult<()> {
    if input.name.trim().is_empty() {
        return Err(ServiceError::Validation("workshop name must not be empty".into()));
    }
    input
        .opening_hours
        .validate()
        .map_err(ServiceError::Validation)
}

#[async_trait]
impl WorkshopService for WorkshopCatalog {
    async fn list_workshops(&self) -> ServiceResult<Vec<Workshop>> {
        Ok(self.workshops.list_workshops().await?)
    }

    async fn get_workshop(&self, id: Uuid) -> ServiceResult<Workshop> {
        self.workshops
            .get_workshop(id)
            .await?
            .ok_or(ServiceError::NotFound("workshop"))
    }

    async fn create_workshop(&self, input: WorkshopInput) -> ServiceResult<Workshop> {
        validate_workshop(&input)?;
        let now = Utc::now();

        let workshop = self
            .workshops
            .create_workshop(Workshop {
                id: Uuid::new_v4(),
                name: input.name.trim().to_owned(),
                address: input.address,
                phone: input.phone,
                opening_hours: Json(input.opening_hours),
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("workshop {} created", workshop.id);
        Ok(workshop)
    }

    async fn update_workshop(&self, id: Uuid, input: WorkshopInput) -> ServiceResult<Workshop> {
        validate_workshop(&input)?;
        let existing = self.get_workshop(id).await?;

        self.workshops
            .update_workshop(Workshop {
                id,
                name: input.name.trim().to_owned(),
                address: input.address,
                phone: input.phone,
                opening_hours: Json(input.opening_hours),
                created_at: existing.created_at,
                updated_at: Utc::now(),
            })
            .await?
            .ok_or(ServiceError::NotFound("workshop"))
    }

    async fn delete_workshop(&self, id: Uuid) -> ServiceResult<()> {
        let booked = self.appointments.list_appointments(Some(id), None).await?;
        if !booked.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "workshop still has {} appointment(s)",
                booked.len()
            )));
        }

        if self.workshops.delete_workshop(id).await? {
            info!("workshop {id} deleted");
            Ok(())
        } else {
            Err(ServiceError::NotFound("workshop"))
        }
    }
}
