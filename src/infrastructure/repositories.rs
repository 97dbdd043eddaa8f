//! DB Repository abstractions

use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::entities::{
    Appointment, AppointmentState, ChatMessage, ChatStatus, InventoryMovement, ProductSupplier,
    Supplier, Workshop,
};
use crate::infrastructure::traits::{
    AppointmentRepository, ChatRepository, InventoryRepository, RepoResult, RepositoryError,
    SupplierRepository, WorkshopRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use di::{Ref, injectable};
use log::error;
use uuid::Uuid;

fn log_error(e: sqlx::Error) -> RepositoryError {
    error!("{e}");
    RepositoryError::from_sqlx(e)
}

#[injectable(WorkshopRepository)]
pub struct DbWorkshopRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbWorkshopRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl WorkshopRepository for DbWorkshopRepository {
    async fn list_workshops(&self) -> RepoResult<Vec<Workshop>> {
        sqlx::query_as("SELECT * FROM workshops ORDER BY name ASC")
            .fetch_all(&**self.connection)
            .await
            .map_err(log_error)
    }

    async fn get_workshop(&self, id: Uuid) -> RepoResult<Option<Workshop>> {
        sqlx::query_as("SELECT * FROM workshops WHERE id = ?")
            .bind(id)
            .fetch_optional(&**self.connection)
            .await
            .map_err(log_error)
    }

    async fn create_workshop(&self, workshop: Workshop) -> RepoResult<Workshop> {
        sqlx::query_as(
            "INSERT INTO workshops (id, name, address, phone, opening_hours, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(workshop.id)
        .bind(workshop.name)
        .bind(workshop.address)
        .bind(workshop.phone)
        .bind(workshop.opening_hours)
        .bind(workshop.created_at)
        .bind(workshop.updated_at)
        .fetch_one(&**self.connection)
        .await
        .map_err(log_error)
    }

    async fn update_workshop(&self, workshop: Workshop) -> RepoResult<Option<Workshop>> {
        sqlx::query_as(
            "UPDATE workshops SET name = ?, address = ?, phone = ?, opening_hours = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(workshop.name)
        .bind(workshop.address)
        .bind(workshop.phone)
        .bind(workshop.opening_hours)
        .bind(workshop.updated_at)
        .bind(workshop.id)
        .fetch_optional(&**self.connection)
        .await
        .map_err(log_error)
    }

    async fn delete_workshop(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM workshops WHERE id = ?")
            .bind(id)
            .execute(&**self.connection)
            .await
            .map_err(log_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[injectable(AppointmentRepository)]
pub struct DbAppointmentRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbAppointmentRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl AppointmentRepository for DbAppointmentRepository {
    async fn list_appointments(
        &self,
        workshop_id: Option<Uuid>,
        state: Option<AppointmentState>,
    ) -> RepoResult<Vec<Appointment>> {
        sqlx::query_as(
            "SELECT * FROM appointments WHERE (?1 IS NULL OR workshop_id = ?1) AND (?2 IS NULL OR state = ?2) ORDER BY start_time ASC",
        )
        .bind(workshop_id)
        .bind(state)
        .fetch_all(&**self.connection)
        .await
        .map_err(log_error)
    }

    async fn get_appointment(&self, id: Uuid) -> RepoResult<Option<Appointment>> {
        sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
            .bind(id)
            .fetch_optional(&**self.connection)
            .await
            .map_err(log_error)
    }

    async fn create_appointment(&self, appointment: Appointment) -> RepoResult<Appointment> {
        sqlx::query_as(
            "INSERT INTO appointments (id, customer_name, customer_phone, description, start_time, end_time, workshop_id, state, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
            .bind(appointment.id)
            .bind(appointment.customer_name)
            .bind(appointment.customer_phone)
            .bind(appointment.description)
            .bind(appointment.start_time)
            .bind(appointment.end_time)
            .bind(appointment.workshop_id)
            .bind(appointment.state)
            .bind(appointment.created_at)
            .bind(appointment.updated_at)
            .fetch_one(&**self.connection)
            .await
            .map_err(log_error)
    }

    async fn create_appointment_if_free(
        &self,
        appointment: Appointment,
    ) -> RepoResult<Option<Appointment>> {
        sqlx::query_as(
            "INSERT INTO appointments (id, customer_name, customer_phone, description, start_time, end_time, workshop_id, state, created_at, updated_at) \
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10 \
             WHERE NOT EXISTS (SELECT 1 FROM appointments taken \
                 WHERE taken.workshop_id = ?7 AND taken.state IN (?11, ?12) \
                 AND julianday(taken.start_time) < julianday(?6) AND julianday(taken.end_time) > julianday(?5)) \
             RETURNING *",
        )
            .bind(appointment.id)
            .bind(appointment.customer_name)
            .bind(appointment.customer_phone)
            .bind(appointment.description)
            .bind(appointment.start_time)
            .bind(appointment.end_time)
            .bind(appointment.workshop_id)
            .bind(appointment.state)
            .bind(appointment.created_at)
            .bind(appointment.updated_at)
            .bind(AppointmentState::Pending)
            .bind(AppointmentState::Confirmed)
            .fetch_optional(&**self.connection)
            .await
            .map_err(log_error)
    }

    async fn set_appointment_state(
        &self,
        id: Uuid,
        expected: AppointmentState,
        state: AppointmentState,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<Option<Appointment>> {
        sqlx::query_as(
            "UPDATE appointments SET state = ?, updated_at = ? WHERE id = ? AND state = ? RETURNING *",
        )
            .bind(state)
            .bind(updated_at)
            .bind(id)
            .bind(expected)
            .fetch_optional(&**self.connection)
            .await
            .map_err(log_error)
    }

    async fn delete_appointment(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
            .bind(id)
            .execute(&**self.connection)
            .await
            .map_err(log_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[injectable(ChatRepository)]
pub struct DbChatRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbChatRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ChatRepository for DbChatRepository {
    async fn insert_message(&self, message: ChatMessage) -> RepoResult<ChatMessage> {
        sqlx::query_as(
            "INSERT INTO chat_messages (id, user_id, message, role, status, conversation_id, profile_name, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
            .bind(message.id)
            .bind(message.user_id)
            .bind(message.message)
            .bind(message.role)
            .bind(message.status)
            .bind(message.conversation_id)
            .bind(message.profile_name)
            .bind(message.created_at)
            .fetch_one(&**self.connection)
            .await
            .map_err(log_error)
    }

    async fn latest_message(&self, user_id: &str) -> RepoResult<Option<ChatMessage>> {
        sqlx::query_as(
            "SELECT * FROM chat_messages WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&**self.connection)
        .await
        .map_err(log_error)
    }

    async fn list_user_messages(&self, user_id: &str) -> RepoResult<Vec<ChatMessage>> {
        sqlx::query_as(
            "SELECT * FROM chat_messages WHERE user_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(user_id)
        .fetch_all(&**self.connection)
        .await
        .map_err(log_error)
    }

    async fn list_latest_per_user(&self) -> RepoResult<Vec<ChatMessage>> {
        sqlx::query_as(
            "SELECT m.id, m.user_id, m.message, m.role, m.status, m.conversation_id, \
             COALESCE(m.profile_name, (SELECT named.profile_name FROM chat_messages named \
                 WHERE named.user_id = m.user_id AND named.profile_name IS NOT NULL \
                 ORDER BY named.created_at DESC, named.rowid DESC LIMIT 1)) AS profile_name, \
             m.created_at \
             FROM chat_messages m \
             WHERE m.rowid = (SELECT latest.rowid FROM chat_messages latest WHERE latest.user_id = m.user_id \
                 ORDER BY latest.created_at DESC, latest.rowid DESC LIMIT 1) \
             ORDER BY m.created_at DESC, m.rowid DESC",
        )
            .fetch_all(&**self.connection)
            .await
            .map_err(log_error)
    }

    async fn set_message_status(&self, message_id: Uuid, status: ChatStatus) -> RepoResult<bool> {
        let result = sqlx::query("UPDATE chat_messages SET status = ? WHERE id = ?")
            .bind(status)
            .bind(message_id)
            .execute(&**self.connection)
            .await
            .map_err(log_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[injectable(SupplierRepository)]
pub struct DbSupplierRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbSupplierRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl SupplierRepository for DbSupplierRepository {
    async fn list_suppliers(&self) -> RepoResult<Vec<Supplier>> {
        sqlx::query_as("SELECT * FROM suppliers ORDER BY name ASC")
            .fetch_all(&**self.connection)
            .await
            .map_err(log_error)
    }

    async fn get_supplier(&self, id: Uuid) -> RepoResult<Option<Supplier>> {
        sqlx::query_as("SELECT * FROM suppliers WHERE id = ?")
            .bind(id)
            .fetch_optional(&**self.connection)
            .await
            .map_err(log_error)
    }

    async fn create_supplier(&self, supplier: Supplier) -> RepoResult<Supplier> {
        sqlx::query_as(
            "INSERT INTO suppliers (id, name, contact_name, email, phone, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(supplier.id)
        .bind(supplier.name)
        .bind(supplier.contact_name)
        .bind(supplier.email)
        .bind(supplier.phone)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .fetch_one(&**self.connection)
        .await
        .map_err(log_error)
    }

    async fn update_supplier(&self, supplier: Supplier) -> RepoResult<Option<Supplier>> {
        sqlx::query_as(
            "UPDATE suppliers SET name = ?, contact_name = ?, email = ?, phone = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(supplier.name)
        .bind(supplier.contact_name)
        .bind(supplier.email)
        .bind(supplier.phone)
        .bind(supplier.updated_at)
        .bind(supplier.id)
        .fetch_optional(&**self.connection)
        .await
        .map_err(log_error)
    }

    async fn delete_supplier(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = ?")
            .bind(id)
            .execute(&**self.connection)
            .await
            .map_err(log_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_product_suppliers(&self, supplier_id: Uuid) -> RepoResult<Vec<ProductSupplier>> {
        sqlx::query_as(
            "SELECT * FROM product_suppliers WHERE supplier_id = ? ORDER BY product_id ASC",
        )
        .bind(supplier_id)
        .fetch_all(&**self.connection)
        .await
        .map_err(log_error)
    }

    async fn create_product_supplier(&self, link: ProductSupplier) -> RepoResult<ProductSupplier> {
        sqlx::query_as(
            "INSERT INTO product_suppliers (id, product_id, supplier_id, cost_price, currency, lead_time_days, created_at) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
            .bind(link.id)
            .bind(link.product_id)
            .bind(link.supplier_id)
            .bind(link.cost_price)
            .bind(link.currency)
            .bind(link.lead_time_days)
            .bind(link.created_at)
            .fetch_one(&**self.connection)
            .await
            .map_err(log_error)
    }

    async fn delete_product_supplier(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM product_suppliers WHERE id = ?")
            .bind(id)
            .execute(&**self.connection)
            .await
            .map_err(log_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[injectable(InventoryRepository)]
pub struct DbInventoryRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbInventoryRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl InventoryRepository for DbInventoryRepository {
    async fn list_movements(&self, product_id: Option<&str>) -> RepoResult<Vec<InventoryMovement>> {
        sqlx::query_as(
            "SELECT * FROM inventory_movements WHERE (?1 IS NULL OR product_id = ?1) ORDER BY created_at DESC, rowid DESC",
        )
        .bind(product_id)
        .fetch_all(&**self.connection)
        .await
        .map_err(log_error)
    }

    async fn insert_movement(&self, movement: InventoryMovement) -> RepoResult<InventoryMovement> {
        sqlx::query_as(
            "INSERT INTO inventory_movements (id, product_id, supplier_id, movement_type, quantity, unit_cost, note, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
            .bind(movement.id)
            .bind(movement.product_id)
            .bind(movement.supplier_id)
            .bind(movement.movement_type)
            .bind(movement.quantity)
            .bind(movement.unit_cost)
            .bind(movement.note)
            .bind(movement.created_at)
            .fetch_one(&**self.connection)
            .await
            .map_err(log_error)
    }
}
