//! Public storefront endpoints: workshop directory and appointment booking.

use crate::api::ApiResult;
use crate::api::appointments::schemas::{Appointment, BookAppointment};
use crate::api::workshops::schemas::WorkshopList;
use crate::core::traits::{AppointmentService, WorkshopService};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/workshops", get(list_workshops))
        .route("/appointments", post(book_appointment))
}

async fn list_workshops(
    Inject(workshops): Inject<dyn WorkshopService>,
) -> ApiResult<Json<WorkshopList>> {
    crate::api::workshops::list_all(&*workshops).await
}

async fn book_appointment(
    Inject(appointments): Inject<dyn AppointmentService>,
    Json(request): Json<BookAppointment>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    crate::api::appointments::book(&*appointments, request).await
}
