//! Infrastructure traits, used for DI on higher levels

use crate::infrastructure::entities;
use crate::infrastructure::entities::{AppointmentState, ChatStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record violates a uniqueness or reference constraint")]
    Constraint,
}

impl RepositoryError {
    /// Maps constraint violations to [`RepositoryError::Constraint`], keeps anything else as-is.
    pub fn from_sqlx(error: sqlx::Error) -> RepositoryError {
        match &error {
            sqlx::Error::Database(db)
                if db.is_unique_violation() || db.is_foreign_key_violation() =>
            {
                RepositoryError::Constraint
            }
            _ => RepositoryError::Database(error),
        }
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait WorkshopRepository: Send + Sync {
    async fn list_workshops(&self) -> RepoResult<Vec<entities::Workshop>>;
    async fn get_workshop(&self, id: Uuid) -> RepoResult<Option<entities::Workshop>>;
    async fn create_workshop(&self, workshop: entities::Workshop)
    -> RepoResult<entities::Workshop>;

    /// Returns `None` when no workshop has the given id.
    async fn update_workshop(
        &self,
        workshop: entities::Workshop,
    ) -> RepoResult<Option<entities::Workshop>>;

    /// Returns `false` when nothing was deleted.
    async fn delete_workshop(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn list_appointments(
        &self,
        workshop_id: Option<Uuid>,
        state: Option<AppointmentState>,
    ) -> RepoResult<Vec<entities::Appointment>>;

    async fn get_appointment(&self, id: Uuid) -> RepoResult<Option<entities::Appointment>>;

    async fn create_appointment(
        &self,
        appointment: entities::Appointment,
    ) -> RepoResult<entities::Appointment>;

    /// Inserts the appointment unless a pending or confirmed one at the same workshop overlaps
    /// it. The check and the insert are one statement, so concurrent bookings cannot both win.
    ///
    /// Returns `None` when the slot is taken.
    async fn create_appointment_if_free(
        &self,
        appointment: entities::Appointment,
    ) -> RepoResult<Option<entities::Appointment>>;

    /// Moves the appointment to `state` only if it is still in `expected`.
    ///
    /// Returns `None` when the appointment does not exist or its state changed meanwhile.
    async fn set_appointment_state(
        &self,
        id: Uuid,
        expected: AppointmentState,
        state: AppointmentState,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<Option<entities::Appointment>>;

    async fn delete_appointment(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn insert_message(&self, message: entities::ChatMessage)
    -> RepoResult<entities::ChatMessage>;

    async fn latest_message(&self, user_id: &str) -> RepoResult<Option<entities::ChatMessage>>;

    /// All messages of a user, oldest first.
    async fn list_user_messages(&self, user_id: &str) -> RepoResult<Vec<entities::ChatMessage>>;

    /// The newest message of every user, newest first.
    async fn list_latest_per_user(&self) -> RepoResult<Vec<entities::ChatMessage>>;

    async fn set_message_status(&self, message_id: Uuid, status: ChatStatus) -> RepoResult<bool>;
}

#[async_trait]
pub trait SupplierRepository: Send + Sync {
    async fn list_suppliers(&self) -> RepoResult<Vec<entities::Supplier>>;
    async fn get_supplier(&self, id: Uuid) -> RepoResult<Option<entities::Supplier>>;
    async fn create_supplier(&self, supplier: entities::Supplier)
    -> RepoResult<entities::Supplier>;
    async fn update_supplier(
        &self,
        supplier: entities::Supplier,
    ) -> RepoResult<Option<entities::Supplier>>;
    async fn delete_supplier(&self, id: Uuid) -> RepoResult<bool>;

    async fn list_product_suppliers(
        &self,
        supplier_id: Uuid,
    ) -> RepoResult<Vec<entities::ProductSupplier>>;
    async fn create_product_supplier(
        &self,
        link: entities::ProductSupplier,
    ) -> RepoResult<entities::ProductSupplier>;
    async fn delete_product_supplier(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn list_movements(
        &self,
        product_id: Option<&str>,
    ) -> RepoResult<Vec<entities::InventoryMovement>>;

    async fn insert_movement(
        &self,
        movement: entities::InventoryMovement,
    ) -> RepoResult<entities::InventoryMovement>;
}
