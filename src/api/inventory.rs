//! Stock movement ledger endpoints (admin)

use crate::api::inventory::schemas::{Movement, MovementFilter, MovementList, MovementRequest, Stock};
use crate::api::{ApiResult, ExtractAdmin};
use crate::core::traits::InventoryService;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;
use log::info;
use validator::Validate;

pub fn router() -> Router {
    Router::new()
        .route("/movements", get(list_movements).post(record_movement))
        .route("/stock/:product_id", get(stock_level))
}

async fn list_movements(
    Inject(inventory): Inject<dyn InventoryService>,
    ExtractAdmin(_admin): ExtractAdmin,
    Query(filter): Query<MovementFilter>,
) -> ApiResult<Json<MovementList>> {
    let movements = inventory
        .list_movements(filter.product_id.as_deref())
        .await?;

    Ok(Json(MovementList {
        movements: movements.into_iter().map(Movement::from).collect(),
    }))
}

async fn record_movement(
    Inject(inventory): Inject<dyn InventoryService>,
    ExtractAdmin(admin): ExtractAdmin,
    Json(request): Json<MovementRequest>,
) -> ApiResult<(StatusCode, Json<Movement>)> {
    request.validate()?;
    let movement = inventory.record_movement(request.into()).await?;
    info!(
        "{admin} recorded {:?} of {} for {}",
        movement.movement_type, movement.quantity, movement.product_id
    );

    Ok((StatusCode::CREATED, Json(movement.into())))
}

async fn stock_level(
    Inject(inventory): Inject<dyn InventoryService>,
    ExtractAdmin(_admin): ExtractAdmin,
    Path(product_id): Path<String>,
) -> ApiResult<Json<Stock>> {
    Ok(Json(inventory.stock_level(&product_id).await?.into()))
}

pub mod schemas {
    use crate::core::traits::{NewMovement, StockLevel};
    use crate::infrastructure::entities;
    use crate::infrastructure::entities::MovementType;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;
    use validator::Validate;

    #[derive(Deserialize, Debug, Default)]
    pub struct MovementFilter {
        pub product_id: Option<String>,
    }

    #[derive(Deserialize, Debug, Validate)]
    pub struct MovementRequest {
        #[validate(length(min = 1, max = 100))]
        pub product_id: String,
        pub supplier_id: Option<Uuid>,
        pub movement_type: MovementType,
        #[validate(range(min = -1000000000, max = 1000000000))]
        pub quantity: i64,
        #[validate(range(min = 0))]
        pub unit_cost: Option<i64>,
        #[validate(length(max = 500))]
        pub note: Option<String>,
    }

    impl From<MovementRequest> for NewMovement {
        fn from(request: MovementRequest) -> Self {
            NewMovement {
                product_id: request.product_id,
                supplier_id: request.supplier_id,
                movement_type: request.movement_type,
                quantity: request.quantity,
                unit_cost: request.unit_cost,
                note: request.note,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct Movement {
        pub id: Uuid,
        pub product_id: String,
        pub supplier_id: Option<Uuid>,
        pub movement_type: MovementType,
        pub quantity: i64,
        pub unit_cost: Option<i64>,
        pub note: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::InventoryMovement> for Movement {
        fn from(movement: entities::InventoryMovement) -> Self {
            Movement {
                id: movement.id,
                product_id: movement.product_id,
                supplier_id: movement.supplier_id,
                movement_type: movement.movement_type,
                quantity: movement.quantity,
                unit_cost: movement.unit_cost,
                note: movement.note,
                created_at: movement.created_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct MovementList {
        pub movements: Vec<Movement>,
    }

    #[derive(Serialize, Debug)]
    pub struct Stock {
        pub product_id: String,
        pub on_hand: i64,
        pub movements: usize,
    }

    impl From<StockLevel> for Stock {
        fn from(level: StockLevel) -> Self {
            Stock {
                product_id: level.product_id,
                on_hand: level.on_hand,
                movements: level.movements,
            }
        }
    }
}
