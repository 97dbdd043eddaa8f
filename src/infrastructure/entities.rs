//! Database entities

use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

pub const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub fn weekday_key(day: Weekday) -> &'static str {
    WEEKDAYS[day.num_days_from_monday() as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

/// Weekly schedule of a workshop, keyed by lowercase English day name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpeningHours(pub BTreeMap<String, Vec<TimeRange>>);

impl OpeningHours {
    pub fn ranges_for(&self, day: Weekday) -> &[TimeRange] {
        self.0
            .get(weekday_key(day))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Checks day names and that every range opens before it closes.
    pub fn validate(&self) -> Result<(), String> {
        for (day, ranges) in &self.0 {
            if !WEEKDAYS.contains(&day.as_str()) {
                return Err(format!("unknown weekday `{day}`"));
            }
            if let Some(range) = ranges.iter().find(|r| r.open >= r.close) {
                return Err(format!(
                    "{day}: opening time {} is not before closing time {}",
                    range.open, range.close
                ));
            }
        }
        Ok(())
    }

    /// Whether `[start, end]` (local wall-clock time) fits inside a single opening range.
    pub fn covers(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        use chrono::Datelike;

        if start.date() != end.date() || start >= end {
            return false;
        }
        self.ranges_for(start.weekday())
            .iter()
            .any(|r| r.open <= start.time() && end.time() <= r.close)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Workshop {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub opening_hours: Json<OpeningHours>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AppointmentState {
    Pending,
    Confirmed,
    Completed,
    Canceled,
}

impl AppointmentState {
    pub fn can_transition_to(self, next: AppointmentState) -> bool {
        use AppointmentState::*;

        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Canceled) | (Confirmed, Completed) | (Confirmed, Canceled)
        )
    }

    /// States that still hold a slot in the workshop calendar.
    pub fn is_active(self) -> bool {
        matches!(self, AppointmentState::Pending | AppointmentState::Confirmed)
    }
}

impl fmt::Display for AppointmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppointmentState::Pending => "pending",
            AppointmentState::Confirmed => "confirmed",
            AppointmentState::Completed => "completed",
            AppointmentState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub workshop_id: Uuid,
    pub state: AppointmentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Who owns a WhatsApp conversation: the automated assistant (`IA`) or a human agent (`AGENTE`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ChatStatus {
    #[default]
    #[serde(rename = "IA")]
    #[sqlx(rename = "IA")]
    Automated,
    #[serde(rename = "AGENTE")]
    #[sqlx(rename = "AGENTE")]
    Agent,
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatStatus::Automated => f.write_str("IA"),
            ChatStatus::Agent => f.write_str("AGENTE"),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
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

#[derive(Debug, Clone, FromRow)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProductSupplier {
    pub id: Uuid,
    pub product_id: String,
    pub supplier_id: Uuid,
    pub cost_price: i64,
    pub currency: String,
    pub lead_time_days: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
}

#[derive(Debug, Clone, FromRow)]
pub struct InventoryMovement {
    pub id: Uuid,
    pub product_id: String,
    pub supplier_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub unit_cost: Option<i64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InventoryMovement {
    /// Effect of this movement on the on-hand stock, `None` if it cannot be represented.
    pub fn signed_quantity(&self) -> Option<i64> {
        match self.movement_type {
            MovementType::In | MovementType::Adjustment => Some(self.quantity),
            MovementType::Out => self.quantity.checked_neg(),
        }
    }
}
