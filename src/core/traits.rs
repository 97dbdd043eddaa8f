//! DI "Interfaces"

use crate::core::error::ServiceResult;
use crate::core::router::{InboundMessage, RouteOutcome};
use crate::infrastructure::entities;
use crate::infrastructure::entities::{
    AppointmentState, ChatRole, ChatStatus, MovementType, OpeningHours,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub user_id: String,
    pub message: String,
    pub role: ChatRole,
    pub status: ChatStatus,
    pub conversation_id: Option<String>,
    pub profile_name: Option<String>,
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Appends a message to a user's WhatsApp history.
    async fn record_message(&self, message: NewChatMessage) -> ServiceResult<entities::ChatMessage>;

    /// Current owner of the conversation: the status of the user's latest message, `IA` when
    /// the user has no history.
    async fn conversation_status(&self, user_id: &str) -> ServiceResult<ChatStatus>;

    /// Latest message of every user, newest conversation first.
    async fn list_conversations(&self) -> ServiceResult<Vec<entities::ChatMessage>>;

    /// Full history of a user, oldest first.
    async fn list_messages(&self, user_id: &str) -> ServiceResult<Vec<entities::ChatMessage>>;

    /// Manually hands a conversation to the assistant or to a human agent.
    ///
    /// Returns `NotFound` if the user never wrote.
    async fn set_conversation_status(
        &self,
        user_id: &str,
        status: ChatStatus,
    ) -> ServiceResult<entities::ChatMessage>;

    async fn record_user_message(
        &self,
        user_id: &str,
        text: String,
        status: ChatStatus,
        profile_name: Option<String>,
        conversation_id: Option<String>,
    ) -> ServiceResult<entities::ChatMessage> {
        self.record_message(NewChatMessage {
            user_id: user_id.to_owned(),
            message: text,
            role: ChatRole::User,
            status,
            conversation_id,
            profile_name,
        })
        .await
    }

    async fn record_assistant_message(
        &self,
        user_id: &str,
        text: String,
        status: ChatStatus,
        conversation_id: Option<String>,
    ) -> ServiceResult<entities::ChatMessage> {
        self.record_message(NewChatMessage {
            user_id: user_id.to_owned(),
            message: text,
            role: ChatRole::Assistant,
            status,
            conversation_id,
            profile_name: None,
        })
        .await
    }
}

#[async_trait]
pub trait ConversationRouter: Send + Sync {
    /// Decides who answers an inbound WhatsApp message and carries the answer out.
    async fn handle_inbound(&self, inbound: InboundMessage) -> ServiceResult<RouteOutcome>;

    /// Sends a human agent's reply and stores it in the user's history.
    async fn send_agent_reply(
        &self,
        user_id: &str,
        text: String,
    ) -> ServiceResult<entities::ChatMessage>;
}

#[derive(Debug, Clone)]
pub struct WorkshopInput {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub opening_hours: OpeningHours,
}

#[async_trait]
pub trait WorkshopService: Send + Sync {
    async fn list_workshops(&self) -> ServiceResult<Vec<entities::Workshop>>;
    async fn get_workshop(&self, id: Uuid) -> ServiceResult<entities::Workshop>;
    async fn create_workshop(&self, input: WorkshopInput) -> ServiceResult<entities::Workshop>;
    async fn update_workshop(
        &self,
        id: Uuid,
        input: WorkshopInput,
    ) -> ServiceResult<entities::Workshop>;

    /// Returns `Conflict` while appointments still reference the workshop.
    async fn delete_workshop(&self, id: Uuid) -> ServiceResult<()>;
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub customer_name: String,
    pub customer_phone: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub workshop_id: Uuid,
}

#[async_trait]
pub trait AppointmentService: Send + Sync {
    async fn list_appointments(
        &self,
        workshop_id: Option<Uuid>,
        state: Option<AppointmentState>,
    ) -> ServiceResult<Vec<entities::Appointment>>;

    async fn get_appointment(&self, id: Uuid) -> ServiceResult<entities::Appointment>;

    /// Books a new `pending` appointment inside the workshop's opening hours.
    ///
    /// Returns `Conflict` if the slot overlaps another pending or confirmed appointment.
    async fn book_appointment(&self, new: NewAppointment) -> ServiceResult<entities::Appointment>;

    /// Moves an appointment to `next`, rejecting transitions the lifecycle does not allow.
    async fn transition(
        &self,
        id: Uuid,
        next: AppointmentState,
    ) -> ServiceResult<entities::Appointment>;

    async fn delete_appointment(&self, id: Uuid) -> ServiceResult<()>;

    /// Cancels `pending` appointments created more than the configured TTL before `now`.
    ///
    /// Returns the ids that were canceled.
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> ServiceResult<Vec<Uuid>>;

    async fn confirm(&self, id: Uuid) -> ServiceResult<entities::Appointment> {
        self.transition(id, AppointmentState::Confirmed).await
    }

    async fn cancel(&self, id: Uuid) -> ServiceResult<entities::Appointment> {
        self.transition(id, AppointmentState::Canceled).await
    }

    async fn complete(&self, id: Uuid) -> ServiceResult<entities::Appointment> {
        self.transition(id, AppointmentState::Completed).await
    }
}

#[derive(Debug, Clone)]
pub struct SupplierInput {
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProductSupplier {
    pub product_id: String,
    pub cost_price: i64,
    pub currency: String,
    pub lead_time_days: Option<i64>,
}

#[async_trait]
pub trait SupplierService: Send + Sync {
    async fn list_suppliers(&self) -> ServiceResult<Vec<entities::Supplier>>;
    async fn get_supplier(&self, id: Uuid) -> ServiceResult<entities::Supplier>;
    async fn create_supplier(&self, input: SupplierInput) -> ServiceResult<entities::Supplier>;
    async fn update_supplier(
        &self,
        id: Uuid,
        input: SupplierInput,
    ) -> ServiceResult<entities::Supplier>;
    async fn delete_supplier(&self, id: Uuid) -> ServiceResult<()>;

    async fn list_supplier_products(
        &self,
        supplier_id: Uuid,
    ) -> ServiceResult<Vec<entities::ProductSupplier>>;

    /// Links a product to a supplier. Returns `Conflict` if the link already exists.
    async fn link_product(
        &self,
        supplier_id: Uuid,
        link: NewProductSupplier,
    ) -> ServiceResult<entities::ProductSupplier>;

    async fn unlink_product(&self, link_id: Uuid) -> ServiceResult<()>;
}

#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: String,
    pub supplier_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub unit_cost: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: String,
    pub on_hand: i64,
    pub movements: usize,
}

#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn list_movements(
        &self,
        product_id: Option<&str>,
    ) -> ServiceResult<Vec<entities::InventoryMovement>>;

    async fn record_movement(&self, new: NewMovement)
    -> ServiceResult<entities::InventoryMovement>;

    /// On-hand stock computed from the movement ledger.
    async fn stock_level(&self, product_id: &str) -> ServiceResult<StockLevel>;
}
