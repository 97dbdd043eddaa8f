//! Workshop endpoints (admin)

use crate::api::workshops::schemas::{Workshop, WorkshopList, WorkshopRequest};
use crate::api::{ApiResult, ExtractAdmin};
use crate::core::traits::WorkshopService;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;
use log::info;
use uuid::Uuid;
use validator::Validate;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_workshops).post(create_workshop))
        .route(
            "/:id",
            get(get_workshop).put(update_workshop).delete(delete_workshop),
        )
}

pub(crate) async fn list_all(workshops: &dyn WorkshopService) -> ApiResult<Json<WorkshopList>> {
    let workshops = workshops.list_workshops().await?;

    Ok(Json(WorkshopList {
        workshops: workshops.into_iter().map(Workshop::from).collect(),
    }))
}

async fn list_workshops(
    Inject(workshops): Inject<dyn WorkshopService>,
    ExtractAdmin(_admin): ExtractAdmin,
) -> ApiResult<Json<WorkshopList>> {
    list_all(&*workshops).await
}

async fn get_workshop(
    Inject(workshops): Inject<dyn WorkshopService>,
    ExtractAdmin(_admin): ExtractAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Workshop>> {
    Ok(Json(workshops.get_workshop(id).await?.into()))
}

async fn create_workshop(
    Inject(workshops): Inject<dyn WorkshopService>,
    ExtractAdmin(admin): ExtractAdmin,
    Json(request): Json<WorkshopRequest>,
) -> ApiResult<(StatusCode, Json<Workshop>)> {
    request.validate()?;
    let workshop = workshops.create_workshop(request.into()).await?;
    info!("{admin} created workshop {}", workshop.id);

    Ok((StatusCode::CREATED, Json(workshop.into())))
}

async fn update_workshop(
    Inject(workshops): Inject<dyn WorkshopService>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(id): Path<Uuid>,
    Json(request): Json<WorkshopRequest>,
) -> ApiResult<Json<Workshop>> {
    request.validate()?;
    let workshop = workshops.update_workshop(id, request.into()).await?;
    info!("{admin} updated workshop {id}");

    Ok(Json(workshop.into()))
}

async fn delete_workshop(
    Inject(workshops): Inject<dyn WorkshopService>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    workshops.delete_workshop(id).await?;
    info!("{admin} deleted workshop {id}");

    Ok(StatusCode::NO_CONTENT)
}

pub mod schemas {
    use crate::core::traits::WorkshopInput;
    use crate::infrastructure::entities;
    use crate::infrastructure::entities::OpeningHours;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;
    use validator::Validate;

    #[derive(Deserialize, Debug, Validate)]
    pub struct WorkshopRequest {
        #[validate(length(min = 1, max = 200))]
        pub name: String,
        #[validate(length(min = 1, max = 500))]
        pub address: String,
        #[validate(length(min = 3, max = 32))]
        pub phone: String,
        #[serde(default)]
        pub opening_hours: OpeningHours,
    }

    impl From<WorkshopRequest> for WorkshopInput {
        fn from(request: WorkshopRequest) -> Self {
            WorkshopInput {
                name: request.name,
                address: request.address,
                phone: request.phone,
                opening_hours: request.opening_hours,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct Workshop {
        pub id: Uuid,
        pub name: String,
        pub address: String,
        pub phone: String,
        pub opening_hours: OpeningHours,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl From<entities::Workshop> for Workshop {
        fn from(workshop: entities::Workshop) -> Self {
            Workshop {
                id: workshop.id,
                name: workshop.name,
                address: workshop.address,
                phone: workshop.phone,
                opening_hours: workshop.opening_hours.0,
                created_at: workshop.created_at,
                updated_at: workshop.updated_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct WorkshopList {
        pub workshops: Vec<Workshop>,
    }
}
