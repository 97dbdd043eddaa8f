//! Suppliers, product sourcing and the stock movement ledger.

use crate::core::error::{ServiceError, ServiceResult};
use crate::core::traits::{
    InventoryService, NewMovement, NewProductSupplier, StockLevel, SupplierInput, SupplierService,
};
use crate::infrastructure::entities::{InventoryMovement, MovementType, ProductSupplier, Supplier};
use crate::infrastructure::traits::{InventoryRepository, RepositoryError, SupplierRepository};
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use log::info;
use uuid::Uuid;

/// Largest quantity a single movement may carry, in either direction.
pub const MAX_MOVEMENT_QUANTITY: i64 = 1_000_000_000;

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[injectable(SupplierService)]
pub struct SupplierDirectory {
    suppliers: Ref<dyn SupplierRepository>,
}

impl SupplierDirectory {
    pub fn new(suppliers: Ref<dyn SupplierRepository>) -> Self {
        Self { suppliers }
    }
}

#[async_trait]
impl SupplierService for SupplierDirectory {
    async fn list_suppliers(&self) -> ServiceResult<Vec<Supplier>> {
        Ok(self.suppliers.list_suppliers().await?)
    }

    async fn get_supplier(&self, id: Uuid) -> ServiceResult<Supplier> {
        self.suppliers
            .get_supplier(id)
            .await?
            .ok_or(ServiceError::NotFound("supplier"))
    }

    async fn create_supplier(&self, input: SupplierInput) -> ServiceResult<Supplier> {
        let name = input.name.trim().to_owned();
        if name.is_empty() {
            return Err(ServiceError::Validation("supplier name must not be empty".into()));
        }
        let now = Utc::now();

        Ok(self
            .suppliers
            .create_supplier(Supplier {
                id: Uuid::new_v4(),
                name,
                contact_name: non_empty(input.contact_name),
                email: non_empty(input.email),
                phone: non_empty(input.phone),
                created_at: now,
                updated_at: now,
            })
            .await?)
    }

    async fn update_supplier(&self, id: Uuid, input: SupplierInput) -> ServiceResult<Supplier> {
        let name = input.name.trim().to_owned();
        if name.is_empty() {
            return Err(ServiceError::Validation("supplier name must not be empty".into()));
        }
        let existing = self.get_supplier(id).await?;

        self.suppliers
            .update_supplier(Supplier {
                id,
                name,
                contact_name: non_empty(input.contact_name),
                email: non_empty(input.email),
                phone: non_empty(input.phone),
                created_at: existing.created_at,
                updated_at: Utc::now(),
            })
            .await?
            .ok_or(ServiceError::NotFound("supplier"))
    }

    async fn delete_supplier(&self, id: Uuid) -> ServiceResult<()> {
        if self.suppliers.delete_supplier(id).await? {
            info!("supplier {id} deleted");
            Ok(())
        } else {
            Err(ServiceError::NotFound("supplier"))
        }
    }

    async fn list_supplier_products(&self, supplier_id: Uuid) -> ServiceResult<Vec<ProductSupplier>> {
        self.get_supplier(supplier_id).await?;
        Ok(self.suppliers.list_product_suppliers(supplier_id).await?)
    }

    async fn link_product(
        &self,
        supplier_id: Uuid,
        link: NewProductSupplier,
    ) -> ServiceResult<ProductSupplier> {
        let product_id = link.product_id.trim().to_owned();
        if product_id.is_empty() {
            return Err(ServiceError::Validation("product id must not be empty".into()));
        }
        if link.cost_price < 0 {
            return Err(ServiceError::Validation("cost price must not be negative".into()));
        }
        if link.lead_time_days.is_some_and(|days| days < 0) {
            return Err(ServiceError::Validation("lead time must not be negative".into()));
        }
        self.get_supplier(supplier_id).await?;

        self.suppliers
            .create_product_supplier(ProductSupplier {
                id: Uuid::new_v4(),
                product_id,
                supplier_id,
                cost_price: link.cost_price,
                currency: link.currency.trim().to_uppercase(),
                lead_time_days: link.lead_time_days,
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Constraint => ServiceError::Conflict(
                    "product is already linked to this supplier".into(),
                ),
                other => other.into(),
            })
    }

    async fn unlink_product(&self, link_id: Uuid) -> ServiceResult<()> {
        if self.suppliers.delete_product_supplier(link_id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound("product supplier"))
        }
    }
}

#[injectable(InventoryService)]
pub struct StockLedger {
    movements: Ref<dyn InventoryRepository>,
    suppliers: Ref<dyn SupplierRepository>,
}

impl StockLedger {
    pub fn new(
        movements: Ref<dyn InventoryRepository>,
        suppliers: Ref<dyn SupplierRepository>,
    ) -> Self {
        Self {
            movements,
            suppliers,
        }
    }
}

fn validate_movement(new: &NewMovement) -> ServiceResult<()> {
    if new.product_id.trim().is_empty() {
        return Err(ServiceError::Validation("product id must not be empty".into()));
    }
    match new.movement_type {
        MovementType::In | MovementType::Out if new.quantity <= 0 => Err(ServiceError::Validation(
            "quantity must be positive for incoming and outgoing stock".into(),
        )),
        MovementType::Adjustment if new.quantity == 0 => Err(ServiceError::Validation(
            "an adjustment must change the stock".into(),
        )),
        _ if new.quantity.unsigned_abs() > MAX_MOVEMENT_QUANTITY.unsigned_abs() => {
            Err(ServiceError::Validation(format!(
                "quantity must not exceed {MAX_MOVEMENT_QUANTITY} units"
            )))
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl InventoryService for StockLedger {
    async fn list_movements(&self, product_id: Option<&str>) -> ServiceResult<Vec<InventoryMovement>> {
        Ok(self.movements.list_movements(product_id).await?)
    }

    async fn record_movement(&self, new: NewMovement) -> ServiceResult<InventoryMovement> {
        validate_movement(&new)?;
        if let Some(supplier_id) = new.supplier_id {
            self.suppliers
                .get_supplier(supplier_id)
                .await?
                .ok_or(ServiceError::NotFound("supplier"))?;
        }

        let movement = self
            .movements
            .insert_movement(InventoryMovement {
                id: Uuid::new_v4(),
                product_id: new.product_id.trim().to_owned(),
                supplier_id: new.supplier_id,
                movement_type: new.movement_type,
                quantity: new.quantity,
                unit_cost: new.unit_cost,
                note: non_empty(new.note),
                created_at: Utc::now(),
            })
            .await?;

        info!(
            "{:?} movement of {} for product {}",
            movement.movement_type, movement.quantity, movement.product_id
        );
        Ok(movement)
    }

    async fn stock_level(&self, product_id: &str) -> ServiceResult<StockLevel> {
        let movements = self.movements.list_movements(Some(product_id)).await?;

        let on_hand = movements
            .iter()
            .try_fold(0i64, |total, movement| {
                movement
                    .signed_quantity()
                    .and_then(|delta| total.checked_add(delta))
            })
            .ok_or_else(|| {
                ServiceError::Internal(format!("stock of {product_id} is out of range"))
            })?;

        Ok(StockLevel {
            product_id: product_id.to_owned(),
            on_hand,
            movements: movements.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(movement_type: MovementType, quantity: i64) -> NewMovement {
        NewMovement {
            product_id: "prod_01".into(),
            supplier_id: None,
            movement_type,
            quantity,
            unit_cost: None,
            note: None,
        }
    }

    #[test]
    fn test_validate_movement_quantities() {
        assert!(validate_movement(&movement(MovementType::In, 5)).is_ok());
        assert!(validate_movement(&movement(MovementType::Out, 1)).is_ok());
        assert!(validate_movement(&movement(MovementType::Adjustment, -3)).is_ok());

        assert!(validate_movement(&movement(MovementType::In, 0)).is_err());
        assert!(validate_movement(&movement(MovementType::Out, -2)).is_err());
        assert!(validate_movement(&movement(MovementType::Adjustment, 0)).is_err());
    }

    #[test]
    fn test_validate_movement_bounds_quantity() {
        let max = MAX_MOVEMENT_QUANTITY;
        assert!(validate_movement(&movement(MovementType::In, max)).is_ok());
        assert!(validate_movement(&movement(MovementType::Adjustment, -max)).is_ok());

        for (movement_type, quantity) in [
            (MovementType::In, max + 1),
            (MovementType::Out, i64::MAX),
            (MovementType::Adjustment, i64::MIN),
            (MovementType::Adjustment, -max - 1),
        ] {
            assert!(matches!(
                validate_movement(&movement(movement_type, quantity)),
                Err(ServiceError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_validate_movement_requires_product() {
        let mut new = movement(MovementType::In, 1);
        new.product_id = "  ".into();
        assert!(matches!(
            validate_movement(&new),
            Err(ServiceError::Validation(_))
        ));
    }
}
