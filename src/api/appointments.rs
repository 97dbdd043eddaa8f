//! Appointment endpoints (admin)

use crate::api::appointments::schemas::{
    Appointment, AppointmentFilter, AppointmentList, BookAppointment, CleanupResult,
};
use crate::api::{ApiResult, ExtractAdmin};
use crate::core::traits::AppointmentService;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use di_axum::Inject;
use log::info;
use uuid::Uuid;
use validator::Validate;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/cleanup", post(cleanup_expired))
        .route("/:id", get(get_appointment).delete(delete_appointment))
        .route("/:id/confirm", post(confirm_appointment))
        .route("/:id/cancel", post(cancel_appointment))
        .route("/:id/complete", post(complete_appointment))
}

pub(crate) async fn book(
    appointments: &dyn AppointmentService,
    request: BookAppointment,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    request.validate()?;
    let appointment = appointments.book_appointment(request.into()).await?;

    Ok((StatusCode::CREATED, Json(appointment.into())))
}

async fn list_appointments(
    Inject(appointments): Inject<dyn AppointmentService>,
    ExtractAdmin(_admin): ExtractAdmin,
    Query(filter): Query<AppointmentFilter>,
) -> ApiResult<Json<AppointmentList>> {
    let appointments = appointments
        .list_appointments(filter.workshop_id, filter.state)
        .await?;

    Ok(Json(AppointmentList {
        appointments: appointments.into_iter().map(Appointment::from).collect(),
    }))
}

async fn create_appointment(
    Inject(appointments): Inject<dyn AppointmentService>,
    ExtractAdmin(admin): ExtractAdmin,
    Json(request): Json<BookAppointment>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    let created = book(&*appointments, request).await?;
    info!("{admin} created appointment {}", created.1.id);
    Ok(created)
}

async fn get_appointment(
    Inject(appointments): Inject<dyn AppointmentService>,
    ExtractAdmin(_admin): ExtractAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    Ok(Json(appointments.get_appointment(id).await?.into()))
}

async fn delete_appointment(
    Inject(appointments): Inject<dyn AppointmentService>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    appointments.delete_appointment(id).await?;
    info!("{admin} deleted appointment {id}");
    Ok(StatusCode::NO_CONTENT)
}

async fn confirm_appointment(
    Inject(appointments): Inject<dyn AppointmentService>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    let appointment = appointments.confirm(id).await?;
    info!("{admin} confirmed appointment {id}");
    Ok(Json(appointment.into()))
}

async fn cancel_appointment(
    Inject(appointments): Inject<dyn AppointmentService>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    let appointment = appointments.cancel(id).await?;
    info!("{admin} canceled appointment {id}");
    Ok(Json(appointment.into()))
}

async fn complete_appointment(
    Inject(appointments): Inject<dyn AppointmentService>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    let appointment = appointments.complete(id).await?;
    info!("{admin} completed appointment {id}");
    Ok(Json(appointment.into()))
}

/// Called by the dashboard when it loads and from its manual cleanup button.
async fn cleanup_expired(
    Inject(appointments): Inject<dyn AppointmentService>,
    ExtractAdmin(admin): ExtractAdmin,
) -> ApiResult<Json<CleanupResult>> {
    let expired = appointments.cleanup_expired(Utc::now()).await?;
    info!("{admin} ran the pending appointment cleanup");

    Ok(Json(CleanupResult {
        count: expired.len(),
        expired,
    }))
}

pub mod schemas {
    use crate::core::traits::NewAppointment;
    use crate::infrastructure::entities;
    use crate::infrastructure::entities::AppointmentState;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;
    use validator::Validate;

    #[derive(Deserialize, Debug, Default)]
    pub struct AppointmentFilter {
        pub workshop_id: Option<Uuid>,
        pub state: Option<AppointmentState>,
    }

    #[derive(Deserialize, Debug, Validate)]
    pub struct BookAppointment {
        #[validate(length(min = 1, max = 200))]
        pub customer_name: String,
        #[validate(length(min = 6, max = 32))]
        pub customer_phone: String,
        #[serde(default)]
        #[validate(length(max = 2000))]
        pub description: String,
        pub start_time: DateTime<Utc>,
        pub end_time: DateTime<Utc>,
        pub workshop_id: Uuid,
    }

    impl From<BookAppointment> for NewAppointment {
        fn from(request: BookAppointment) -> Self {
            NewAppointment {
                customer_name: request.customer_name,
                customer_phone: request.customer_phone,
                description: request.description,
                start_time: request.start_time,
                end_time: request.end_time,
                workshop_id: request.workshop_id,
            }
        }
    }

    #[derive(Serialize, Debug)]
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

    impl From<entities::Appointment> for Appointment {
        fn from(appointment: entities::Appointment) -> Self {
            Appointment {
                id: appointment.id,
                customer_name: appointment.customer_name,
                customer_phone: appointment.customer_phone,
                description: appointment.description,
                start_time: appointment.start_time,
                end_time: appointment.end_time,
                workshop_id: appointment.workshop_id,
                state: appointment.state,
                created_at: appointment.created_at,
                updated_at: appointment.updated_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct AppointmentList {
        pub appointments: Vec<Appointment>,
    }

    #[derive(Serialize, Debug)]
    pub struct CleanupResult {
        pub count: usize,
        pub expired: Vec<Uuid>,
    }
}
