//! # Stock Repository
//!
//! The inventory ledger: warehouses, per-product counters, and the
//! append-only movement trail.
//!
//! ## Counter Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Inventory Counter Rules                              │
//! │                                                                         │
//! │  inventories.available / inventories.reserved change ONLY through      │
//! │  this module, and every change lands a stock_movements row:            │
//! │                                                                         │
//! │  record_movement()      available += delta        reason: manual, ...  │
//! │  reserve_items_tx()     available -= n            reason: reservation  │
//! │                         reserved  += n            reference: ORD-...   │
//! │  release_items_tx()     available += reserved                          │
//! │                         reserved   = 0                                 │
//! │                                                                         │
//! │  Conservation: reservation moves stock between the two counters,       │
//! │  available + reserved never changes from a reserve call.               │
//! │                                                                         │
//! │  Movements are never updated or deleted: they are the audit trail      │
//! │  of truth behind the counters.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reservation and release run inside the CALLER's transaction (the order
//! repository owns the atomicity boundary), so a failure on the last item
//! of an order rolls back the counter updates and movement rows already
//! applied for the earlier items.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use marquee_core::{
    CoreError, Inventory, OrderItem, StockMovement, StockMovementReason, ValidationError,
    Warehouse,
};

/// Parameters for creating an inventory row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventory {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub warehouse_id: String,
    pub available: i64,
}

/// Repository for stock database operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Creates a warehouse.
    pub async fn create_warehouse(&self, name: &str, address: Option<&str>) -> DbResult<Warehouse> {
        let warehouse = Warehouse {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            address: address.map(str::to_string),
        };

        debug!(id = %warehouse.id, name = %warehouse.name, "Creating warehouse");

        sqlx::query("INSERT INTO warehouses (id, name, address) VALUES (?1, ?2, ?3)")
            .bind(&warehouse.id)
            .bind(&warehouse.name)
            .bind(&warehouse.address)
            .execute(&self.pool)
            .await?;

        Ok(warehouse)
    }

    /// Lists all warehouses.
    pub async fn list_warehouses(&self) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>("SELECT * FROM warehouses ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(warehouses)
    }

    /// Creates an inventory row for a (product, variant?, warehouse).
    pub async fn create_inventory(&self, new: NewInventory) -> ServiceResult<Inventory> {
        if new.available < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "available".to_string(),
            }
            .into());
        }

        let inventory = Inventory {
            id: Uuid::new_v4().to_string(),
            product_id: new.product_id,
            variant_id: new.variant_id,
            warehouse_id: new.warehouse_id,
            available: new.available,
            reserved: 0,
        };

        debug!(
            id = %inventory.id,
            product_id = %inventory.product_id,
            available = inventory.available,
            "Creating inventory"
        );

        sqlx::query(
            r#"
            INSERT INTO inventories (id, product_id, variant_id, warehouse_id, available, reserved)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&inventory.id)
        .bind(&inventory.product_id)
        .bind(&inventory.variant_id)
        .bind(&inventory.warehouse_id)
        .bind(inventory.available)
        .bind(inventory.reserved)
        .execute(&self.pool)
        .await?;

        Ok(inventory)
    }

    /// Gets an inventory row by ID.
    pub async fn get_inventory(&self, id: &str) -> DbResult<Option<Inventory>> {
        let inventory = sqlx::query_as::<_, Inventory>("SELECT * FROM inventories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(inventory)
    }

    /// Lists all inventory rows.
    pub async fn list_inventory(&self) -> DbResult<Vec<Inventory>> {
        let inventories = sqlx::query_as::<_, Inventory>("SELECT * FROM inventories ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        Ok(inventories)
    }

    /// Lists inventory rows for a product in the ledger's stable iteration
    /// order (insertion order, the same order reservations drain them).
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<Inventory>> {
        let mut conn = self.pool.acquire().await?;
        fetch_for_product(&mut conn, product_id).await
    }

    /// Records a manual/adjustment movement against one inventory row.
    ///
    /// Applies the signed delta to `available` and appends the movement in
    /// one transaction. Used for non-order corrections: restocking, damage
    /// write-off, stocktake adjustments.
    ///
    /// ## Errors
    /// - `ValidationError` if the delta would take `available` below zero
    ///   (the schema CHECK is the backstop behind this guard)
    pub async fn record_movement(
        &self,
        inventory_id: &str,
        quantity_change: i64,
        reason: StockMovementReason,
        reference: Option<String>,
        amount_cents: Option<i64>,
    ) -> ServiceResult<StockMovement> {
        let mut tx = self.pool.begin().await?;

        let inventory = sqlx::query_as::<_, Inventory>("SELECT * FROM inventories WHERE id = ?1")
            .bind(inventory_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Inventory", inventory_id))?;

        if inventory.available + quantity_change < 0 {
            return Err(CoreError::Validation(ValidationError::MustNotBeNegative {
                field: "available".to_string(),
            })
            .into());
        }

        sqlx::query("UPDATE inventories SET available = available + ?2 WHERE id = ?1")
            .bind(inventory_id)
            .bind(quantity_change)
            .execute(&mut *tx)
            .await?;

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            inventory_id: inventory_id.to_string(),
            quantity_change,
            reason,
            reference,
            amount_cents,
            created_at: Utc::now(),
        };
        insert_movement(&mut tx, &movement).await?;

        tx.commit().await?;

        info!(
            inventory_id = %inventory_id,
            quantity_change = quantity_change,
            reason = ?reason,
            "Stock movement recorded"
        );

        Ok(movement)
    }

    /// Lists all movements, newest first.
    pub async fn movements(&self) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Lists movements for one inventory row, newest first.
    pub async fn movements_for_inventory(
        &self,
        inventory_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE inventory_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(inventory_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

// =============================================================================
// Transaction-Level Primitives
// =============================================================================
// Called by the order repository inside its own transaction so that the
// whole multi-item reservation commits or rolls back as one unit.

/// Reserves stock for every order line, draining matching inventory rows.
///
/// ## Algorithm (per item)
/// 1. Load inventory rows for the product (any warehouse, insertion order;
///    variant affinity is NOT enforced in matching)
/// 2. From each row take `min(row.available, remaining)`:
///    available -= take, reserved += take, movement row with reason
///    `reservation` and the order code as reference
/// 3. Stop once remaining hits zero; if rows run out first, fail with
///    `InsufficientStock` naming the product
///
/// A failure anywhere aborts the caller's transaction, so partial
/// reservations are never visible as committed state.
pub(crate) async fn reserve_items_tx(
    conn: &mut SqliteConnection,
    order_code: &str,
    items: &[OrderItem],
) -> ServiceResult<()> {
    for item in items {
        let mut remaining = item.quantity;
        let inventories = fetch_for_product(conn, &item.product_id).await?;

        for inventory in &inventories {
            let take = inventory.available.min(remaining);
            if take == 0 {
                continue;
            }

            sqlx::query(
                r#"
                UPDATE inventories
                SET available = available - ?2, reserved = reserved + ?2
                WHERE id = ?1
                "#,
            )
            .bind(&inventory.id)
            .bind(take)
            .execute(&mut *conn)
            .await?;

            let movement = StockMovement {
                id: Uuid::new_v4().to_string(),
                inventory_id: inventory.id.clone(),
                quantity_change: -take,
                reason: StockMovementReason::Reservation,
                reference: Some(order_code.to_string()),
                amount_cents: None,
                created_at: Utc::now(),
            };
            insert_movement(conn, &movement).await?;

            remaining -= take;
            if remaining == 0 {
                break;
            }
        }

        if remaining > 0 {
            return Err(CoreError::InsufficientStock {
                product_id: item.product_id.clone(),
                requested: item.quantity,
                available: item.quantity - remaining,
            }
            .into());
        }

        debug!(
            order_code = %order_code,
            product_id = %item.product_id,
            quantity = item.quantity,
            "Stock reserved"
        );
    }

    Ok(())
}

/// Releases reserved stock for every product on the order.
///
/// Coarse-grained: zeroes `reserved` on ALL rows for each product, not
/// just the quantity this order reserved. When two orders hold the same
/// product, releasing one frees both holds: a known imprecision carried
/// over from the observed behavior (per-order reservation tracking would
/// need a reservation ledger keyed by order).
pub(crate) async fn release_items_tx(
    conn: &mut SqliteConnection,
    items: &[OrderItem],
) -> DbResult<()> {
    for item in items {
        sqlx::query(
            r#"
            UPDATE inventories
            SET available = available + reserved, reserved = 0
            WHERE product_id = ?1
            "#,
        )
        .bind(&item.product_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Connection-Level Helpers
// =============================================================================

pub(crate) async fn fetch_for_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Vec<Inventory>> {
    let inventories = sqlx::query_as::<_, Inventory>(
        "SELECT * FROM inventories WHERE product_id = ?1 ORDER BY rowid",
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(inventories)
}

async fn insert_movement(conn: &mut SqliteConnection, movement: &StockMovement) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, inventory_id, quantity_change, reason, reference, amount_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.inventory_id)
    .bind(movement.quantity_change)
    .bind(movement.reason)
    .bind(&movement.reference)
    .bind(movement.amount_cents)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::catalog::NewProduct;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database) -> String {
        db.catalog()
            .insert_product(NewProduct {
                name: "Folding chair".to_string(),
                description: None,
                base_price_cents: 5000,
                requires_guarantee: false,
                units_per_box: 10,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_manual_movement_updates_counter_and_ledger() {
        let db = test_db().await;
        let product_id = seed_product(&db).await;
        let warehouse = db.stock().create_warehouse("Central", None).await.unwrap();
        let inventory = db
            .stock()
            .create_inventory(NewInventory {
                product_id,
                variant_id: None,
                warehouse_id: warehouse.id,
                available: 10,
            })
            .await
            .unwrap();

        let movement = db
            .stock()
            .record_movement(
                &inventory.id,
                -3,
                StockMovementReason::Adjustment,
                Some("stocktake".to_string()),
                None,
            )
            .await
            .unwrap();

        assert_eq!(movement.quantity_change, -3);

        let refreshed = db.stock().get_inventory(&inventory.id).await.unwrap().unwrap();
        assert_eq!(refreshed.available, 7);
        assert_eq!(refreshed.reserved, 0);

        let movements = db.stock().movements_for_inventory(&inventory.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].reason, StockMovementReason::Adjustment);
        assert_eq!(movements[0].reference.as_deref(), Some("stocktake"));
    }

    #[tokio::test]
    async fn test_manual_movement_rejects_underflow() {
        let db = test_db().await;
        let product_id = seed_product(&db).await;
        let warehouse = db.stock().create_warehouse("Central", None).await.unwrap();
        let inventory = db
            .stock()
            .create_inventory(NewInventory {
                product_id,
                variant_id: None,
                warehouse_id: warehouse.id,
                available: 2,
            })
            .await
            .unwrap();

        let err = db
            .stock()
            .record_movement(&inventory.id, -5, StockMovementReason::Manual, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ServiceError::Core(CoreError::Validation(_))
        ));

        // Counter untouched, no ledger row
        let refreshed = db.stock().get_inventory(&inventory.id).await.unwrap().unwrap();
        assert_eq!(refreshed.available, 2);
        assert!(db
            .stock()
            .movements_for_inventory(&inventory.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_negative_initial_inventory_is_rejected() {
        let db = test_db().await;
        let product_id = seed_product(&db).await;
        let warehouse = db.stock().create_warehouse("Central", None).await.unwrap();

        let err = db
            .stock()
            .create_inventory(NewInventory {
                product_id,
                variant_id: None,
                warehouse_id: warehouse.id,
                available: -1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::ServiceError::Core(_)));
    }
}
