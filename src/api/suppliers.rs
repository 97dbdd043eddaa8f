//! Supplier directory and product sourcing endpoints (admin)

use crate::api::suppliers::schemas::{
    ProductLinkRequest, ProductSupplier, ProductSupplierList, Supplier, SupplierList,
    SupplierRequest,
};
use crate::api::{ApiResult, ExtractAdmin};
use crate::core::traits::SupplierService;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use di_axum::Inject;
use log::info;
use uuid::Uuid;
use validator::Validate;

pub fn router() -> Router {
    Router::new()
        .route("/suppliers", get(list_suppliers).post(create_supplier))
        .route(
            "/suppliers/:id",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
        .route(
            "/suppliers/:id/products",
            get(list_products).post(link_product),
        )
        .route("/product-suppliers/:id", delete(unlink_product))
}

async fn list_suppliers(
    Inject(suppliers): Inject<dyn SupplierService>,
    ExtractAdmin(_admin): ExtractAdmin,
) -> ApiResult<Json<SupplierList>> {
    let suppliers = suppliers.list_suppliers().await?;

    Ok(Json(SupplierList {
        suppliers: suppliers.into_iter().map(Supplier::from).collect(),
    }))
}

async fn get_supplier(
    Inject(suppliers): Inject<dyn SupplierService>,
    ExtractAdmin(_admin): ExtractAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Supplier>> {
    Ok(Json(suppliers.get_supplier(id).await?.into()))
}

async fn create_supplier(
    Inject(suppliers): Inject<dyn SupplierService>,
    ExtractAdmin(admin): ExtractAdmin,
    Json(request): Json<SupplierRequest>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    request.validate()?;
    let supplier = suppliers.create_supplier(request.into()).await?;
    info!("{admin} created supplier {}", supplier.id);

    Ok((StatusCode::CREATED, Json(supplier.into())))
}

async fn update_supplier(
    Inject(suppliers): Inject<dyn SupplierService>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(id): Path<Uuid>,
    Json(request): Json<SupplierRequest>,
) -> ApiResult<Json<Supplier>> {
    request.validate()?;
    let supplier = suppliers.update_supplier(id, request.into()).await?;
    info!("{admin} updated supplier {id}");

    Ok(Json(supplier.into()))
}

async fn delete_supplier(
    Inject(suppliers): Inject<dyn SupplierService>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    suppliers.delete_supplier(id).await?;
    info!("{admin} deleted supplier {id}");

    Ok(StatusCode::NO_CONTENT)
}

async fn list_products(
    Inject(suppliers): Inject<dyn SupplierService>,
    ExtractAdmin(_admin): ExtractAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProductSupplierList>> {
    let links = suppliers.list_supplier_products(id).await?;

    Ok(Json(ProductSupplierList {
        products: links.into_iter().map(ProductSupplier::from).collect(),
    }))
}

async fn link_product(
    Inject(suppliers): Inject<dyn SupplierService>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(id): Path<Uuid>,
    Json(request): Json<ProductLinkRequest>,
) -> ApiResult<(StatusCode, Json<ProductSupplier>)> {
    request.validate()?;
    let link = suppliers.link_product(id, request.into()).await?;
    info!("{admin} linked product {} to supplier {id}", link.product_id);

    Ok((StatusCode::CREATED, Json(link.into())))
}

async fn unlink_product(
    Inject(suppliers): Inject<dyn SupplierService>,
    ExtractAdmin(admin): ExtractAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    suppliers.unlink_product(id).await?;
    info!("{admin} removed product supplier link {id}");

    Ok(StatusCode::NO_CONTENT)
}

pub mod schemas {
    use crate::core::traits::{NewProductSupplier, SupplierInput};
    use crate::infrastructure::entities;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;
    use validator::Validate;

    fn default_currency() -> String {
        "EUR".to_string()
    }

    #[derive(Deserialize, Debug, Validate)]
    pub struct SupplierRequest {
        #[validate(length(min = 1, max = 200))]
        pub name: String,
        pub contact_name: Option<String>,
        #[validate(email)]
        pub email: Option<String>,
        pub phone: Option<String>,
    }

    impl From<SupplierRequest> for SupplierInput {
        fn from(request: SupplierRequest) -> Self {
            SupplierInput {
                name: request.name,
                contact_name: request.contact_name,
                email: request.email,
                phone: request.phone,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct Supplier {
        pub id: Uuid,
        pub name: String,
        pub contact_name: Option<String>,
        pub email: Option<String>,
        pub phone: Option<String>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl From<entities::Supplier> for Supplier {
        fn from(supplier: entities::Supplier) -> Self {
            Supplier {
                id: supplier.id,
                name: supplier.name,
                contact_name: supplier.contact_name,
                email: supplier.email,
                phone: supplier.phone,
                created_at: supplier.created_at,
                updated_at: supplier.updated_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct SupplierList {
        pub suppliers: Vec<Supplier>,
    }

    /// `cost_price` is in minor currency units.
    #[derive(Deserialize, Debug, Validate)]
    pub struct ProductLinkRequest {
        #[validate(length(min = 1, max = 100))]
        pub product_id: String,
        #[validate(range(min = 0))]
        pub cost_price: i64,
        #[serde(default = "default_currency")]
        #[validate(length(equal = 3))]
        pub currency: String,
        #[validate(range(min = 0))]
        pub lead_time_days: Option<i64>,
    }

    impl From<ProductLinkRequest> for NewProductSupplier {
        fn from(request: ProductLinkRequest) -> Self {
            NewProductSupplier {
                product_id: request.product_id,
                cost_price: request.cost_price,
                currency: request.currency,
                lead_time_days: request.lead_time_days,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct ProductSupplier {
        pub id: Uuid,
        pub product_id: String,
        pub supplier_id: Uuid,
        pub cost_price: i64,
        pub currency: String,
        pub lead_time_days: Option<i64>,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::ProductSupplier> for ProductSupplier {
        fn from(link: entities::ProductSupplier) -> Self {
            ProductSupplier {
                id: link.id,
                product_id: link.product_id,
                supplier_id: link.supplier_id,
                cost_price: link.cost_price,
                currency: link.currency,
                lead_time_days: link.lead_time_days,
                created_at: link.created_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct ProductSupplierList {
        pub products: Vec<ProductSupplier>,
    }
}
