//! # Order Repository
//!
//! Checkout orchestration and the order lifecycle.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CHECKOUT                                                           │
//! │     └── create_from_cart() → Order { status: PendingReservation }      │
//! │         One transaction: idempotency check → config load → pricing     │
//! │         → order + frozen items. UNIQUE(cart_id) settles races.         │
//! │                                                                         │
//! │  2. CONFIRM RESERVATION                                                │
//! │     └── confirm_reservation() → reserve stock for every line, then     │
//! │         flip to ReservationConfirmed in the same transaction: a short  │
//! │         product rolls back every counter update and movement row       │
//! │                                                                         │
//! │  3. OPERATE                                                            │
//! │     └── update_status() walks the allow-list:                          │
//! │         ReadyForDelivery → Delivered → Returned (or Cancelled)         │
//! │                                                                         │
//! │  4. SETTLE                                                             │
//! │     └── register_return() → append OrderReturn audit row, burn the     │
//! │         guarantee, overflow into outstanding balance                   │
//! │     └── release_stock() → hand reserved stock back                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceError, ServiceResult};
use crate::repository::{cart, config, stock};
use marquee_core::validation::validate_return_cost;
use marquee_core::{
    calculate_totals, ensure_transition, Order, OrderItem, OrderReturn, OrderStatus,
};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    /// Gets an order by its business code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!("{SELECT_ORDER} WHERE code = ?1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Gets the order created from a cart, if any.
    pub async fn get_by_cart(&self, cart_id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order_by_cart(&mut conn, cart_id).await
    }

    /// Gets all line items of an order in insertion order.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order_items(&mut conn, order_id).await
    }

    /// Lists orders, newest first.
    pub async fn list(&self) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "{SELECT_ORDER} ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Lists the return reports filed against an order, oldest first.
    pub async fn returns(&self, order_id: &str) -> DbResult<Vec<OrderReturn>> {
        let returns = sqlx::query_as::<_, OrderReturn>(
            "SELECT * FROM order_returns WHERE order_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(returns)
    }

    /// Creates an order from a cart: the checkout orchestrator.
    ///
    /// ## Idempotence
    /// If an order already references this cart it is returned unchanged:
    /// no duplicate orders, no re-pricing, however often checkout fires.
    ///
    /// ## Atomicity
    /// Existence check, config load (lazily creating defaults), pricing and
    /// order+items insertion run in ONE transaction. A concurrent checkout
    /// on the same cart serializes on `UNIQUE(orders.cart_id)`; the loser
    /// converts the violation into a re-read of the winner's order.
    ///
    /// Inventory is NOT touched here; reservation is a separate explicit
    /// step ([`Self::confirm_reservation`]).
    pub async fn create_from_cart(&self, cart_id: &str) -> ServiceResult<Order> {
        let mut tx = self.pool.begin().await?;

        // Idempotence: reuse the existing order for this cart
        if let Some(existing) = fetch_order_by_cart(&mut tx, cart_id).await? {
            debug!(cart_id = %cart_id, order_id = %existing.id, "Checkout reuses existing order");
            return Ok(existing);
        }

        let cart = cart::fetch_cart(&mut tx, cart_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", cart_id))?;
        let items = cart::fetch_items(&mut tx, cart_id).await?;

        let logistics = config::load_or_create_logistics(&mut tx).await?;
        let guarantee = config::load_or_create_guarantee(&mut tx).await?;
        let seasons = config::list_seasons(&mut tx).await?;

        let totals = calculate_totals(&cart, &items, &logistics, &guarantee, &seasons);

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            code: generate_order_code(),
            cart_id: Some(cart.id.clone()),
            status: OrderStatus::PendingReservation,
            delivery_method: cart.delivery_method,
            delivery_address: cart.delivery_address.clone(),
            event_start: cart.event_start,
            event_end: cart.event_end,
            days: totals.days,
            logistics_hours: cart.logistics_hours,
            tolls_cents: cart.tolls_cents,
            subtotal_cents: totals.subtotal.cents(),
            logistics_cost_cents: totals.logistics_cost.cents(),
            guarantee_amount_cents: totals.guarantee_amount.cents(),
            total_cents: totals.total.cents(),
            reservation_required_cents: totals.reservation_required.cents(),
            outstanding_balance_cents: totals.outstanding_balance.cents(),
            requires_guarantee: totals.requires_guarantee,
            high_season: totals.high_season,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = insert_order(&mut tx, &order).await {
            if err.is_unique_violation_on("cart_id") {
                // Lost the race: another checkout landed first. Roll back
                // and return the winner's order (the idempotent path).
                let _ = tx.rollback().await;
                debug!(cart_id = %cart_id, "Checkout race lost, reusing winner's order");
                return self
                    .get_by_cart(cart_id)
                    .await?
                    .ok_or(ServiceError::Db(err));
            }
            return Err(err.into());
        }

        for item in &items {
            let order_item = OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                product_id: item.product_id.clone(),
                variant_id: item.variant_id.clone(),
                quantity: item.quantity,
                days: item.days,
                unit_price_cents: item.price_per_day_cents,
                total_price_cents: item.line_subtotal().cents(),
                requires_guarantee: item.requires_guarantee,
                units_per_box: item.units_per_box,
            };
            insert_order_item(&mut tx, &order_item).await?;
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            code = %order.code,
            cart_id = %cart_id,
            total = %order.total(),
            items = items.len(),
            "Order created from cart"
        );

        Ok(order)
    }

    /// Transitions an order to a new status.
    ///
    /// ## Errors
    /// `CoreError::InvalidTransition` for anything outside the strict
    /// allow-list. This is the only way statuses move, with the single
    /// documented exception of [`Self::register_return`].
    pub async fn update_status(
        &self,
        order_id: &str,
        new_status: OrderStatus,
    ) -> ServiceResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        ensure_transition(order.status, new_status)?;

        let now = Utc::now();
        sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(&order.id)
            .bind(new_status)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            code = %order.code,
            from = ?order.status,
            to = ?new_status,
            "Order status updated"
        );

        Ok(Order {
            status: new_status,
            updated_at: now,
            ..order
        })
    }

    /// Reserves stock for every line, then confirms the reservation.
    ///
    /// ## Atomicity
    /// The whole multi-item reservation and the status flip run in one
    /// transaction: if any product comes up short, every counter update
    /// and movement row already applied is rolled back and the order stays
    /// exactly as it was. No partial reservation is ever visible.
    ///
    /// ## Errors
    /// - `CoreError::InvalidTransition` if the order is not in
    ///   `PendingReservation`
    /// - `CoreError::InsufficientStock` naming the product that fell short
    pub async fn confirm_reservation(&self, order_id: &str) -> ServiceResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        ensure_transition(order.status, OrderStatus::ReservationConfirmed)?;

        let items = fetch_order_items(&mut tx, &order.id).await?;
        stock::reserve_items_tx(&mut tx, &order.code, &items).await?;

        let now = Utc::now();
        sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(&order.id)
            .bind(OrderStatus::ReservationConfirmed)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            code = %order.code,
            items = items.len(),
            "Reservation confirmed"
        );

        Ok(Order {
            status: OrderStatus::ReservationConfirmed,
            updated_at: now,
            ..order
        })
    }

    /// Registers a return report and settles the guarantee.
    ///
    /// Appends an immutable OrderReturn row, burns the guarantee down by
    /// `breakage + missing` (never below zero) and pushes any excess into
    /// the outstanding balance.
    ///
    /// ## Status Override
    /// The order is force-set to `Returned` regardless of its current
    /// status: an administrative override deliberately NOT gated by the
    /// transition table, so operators can close out orders that bypassed
    /// the normal flow. Given non-negative costs this operation always
    /// succeeds.
    pub async fn register_return(
        &self,
        order_id: &str,
        breakage_cost_cents: i64,
        missing_cost_cents: i64,
        notes: Option<String>,
    ) -> ServiceResult<Order> {
        validate_return_cost(breakage_cost_cents, "breakage_cost")?;
        validate_return_cost(missing_cost_cents, "missing_cost")?;

        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        let now = Utc::now();
        let report = OrderReturn {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            breakage_cost_cents,
            missing_cost_cents,
            notes,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO order_returns (
                id, order_id, breakage_cost_cents, missing_cost_cents, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&report.id)
        .bind(&report.order_id)
        .bind(report.breakage_cost_cents)
        .bind(report.missing_cost_cents)
        .bind(&report.notes)
        .bind(report.created_at)
        .execute(&mut *tx)
        .await?;

        let adjustment = report.adjustment();
        let mut guarantee_amount = order.guarantee_amount();
        let mut outstanding_balance = order.outstanding_balance();

        if adjustment.is_positive() {
            let original_guarantee = guarantee_amount;
            guarantee_amount = original_guarantee.saturating_sub_zero(adjustment);
            if adjustment > original_guarantee {
                outstanding_balance += adjustment - original_guarantee;
            }
        }

        sqlx::query(
            r#"
            UPDATE orders SET
                guarantee_amount_cents = ?2,
                outstanding_balance_cents = ?3,
                status = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&order.id)
        .bind(guarantee_amount.cents())
        .bind(outstanding_balance.cents())
        .bind(OrderStatus::Returned)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            code = %order.code,
            adjustment = %adjustment,
            remaining_guarantee = %guarantee_amount,
            "Return registered"
        );

        Ok(Order {
            status: OrderStatus::Returned,
            guarantee_amount_cents: guarantee_amount.cents(),
            outstanding_balance_cents: outstanding_balance.cents(),
            updated_at: now,
            ..order
        })
    }

    /// Releases reserved stock for the order's products.
    ///
    /// Coarse-grained by design: see
    /// [`stock::release_items_tx`] for the granularity caveat.
    pub async fn release_stock(&self, order_id: &str) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;
        let items = fetch_order_items(&mut tx, &order.id).await?;

        stock::release_items_tx(&mut tx, &items).await?;

        tx.commit().await?;

        info!(order_id = %order.id, code = %order.code, "Reserved stock released");

        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

const SELECT_ORDER: &str = r#"
    SELECT id, code, cart_id, status, delivery_method, delivery_address,
           event_start, event_end, days, logistics_hours, tolls_cents,
           subtotal_cents, logistics_cost_cents, guarantee_amount_cents,
           total_cents, reservation_required_cents, outstanding_balance_cents,
           requires_guarantee, high_season, notes, created_at, updated_at
    FROM orders
"#;

/// Generates an order code: `ORD-<epoch-millis>-<seq>`.
///
/// The sub-millisecond suffix keeps codes unique when several checkouts
/// land within the same millisecond.
fn generate_order_code() -> String {
    let now = Utc::now();
    let seq = (now.timestamp_subsec_nanos() % 10_000) as u32;
    format!("ORD-{}-{:04}", now.timestamp_millis(), seq)
}

pub(crate) async fn fetch_order(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("{SELECT_ORDER} WHERE id = ?1"))
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(order)
}

async fn fetch_order_by_cart(
    conn: &mut SqliteConnection,
    cart_id: &str,
) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("{SELECT_ORDER} WHERE cart_id = ?1"))
        .bind(cart_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(order)
}

pub(crate) async fn fetch_order_items(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = ?1 ORDER BY rowid",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, code, cart_id, status, delivery_method, delivery_address,
            event_start, event_end, days, logistics_hours, tolls_cents,
            subtotal_cents, logistics_cost_cents, guarantee_amount_cents,
            total_cents, reservation_required_cents, outstanding_balance_cents,
            requires_guarantee, high_season, notes, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10, ?11,
            ?12, ?13, ?14,
            ?15, ?16, ?17,
            ?18, ?19, ?20, ?21, ?22
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.code)
    .bind(&order.cart_id)
    .bind(order.status)
    .bind(order.delivery_method)
    .bind(&order.delivery_address)
    .bind(order.event_start)
    .bind(order.event_end)
    .bind(order.days)
    .bind(order.logistics_hours)
    .bind(order.tolls_cents)
    .bind(order.subtotal_cents)
    .bind(order.logistics_cost_cents)
    .bind(order.guarantee_amount_cents)
    .bind(order.total_cents)
    .bind(order.reservation_required_cents)
    .bind(order.outstanding_balance_cents)
    .bind(order.requires_guarantee)
    .bind(order.high_season)
    .bind(&order.notes)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_order_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, variant_id,
            quantity, days, unit_price_cents, total_price_cents,
            requires_guarantee, units_per_box
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(&item.variant_id)
    .bind(item.quantity)
    .bind(item.days)
    .bind(item.unit_price_cents)
    .bind(item.total_price_cents)
    .bind(item.requires_guarantee)
    .bind(item.units_per_box)
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
    use crate::error::ServiceError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::cart::{CartDetailsUpdate, NewCartItem};
    use crate::repository::catalog::NewProduct;
    use crate::repository::config::NewSeason;
    use crate::repository::stock::NewInventory;
    use chrono::NaiveDate;
    use marquee_core::CoreError;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed_product(db: &Database, price_cents: i64, guarantee: bool) -> String {
        db.catalog()
            .insert_product(NewProduct {
                name: "Banquet table".to_string(),
                description: None,
                base_price_cents: price_cents,
                requires_guarantee: guarantee,
                units_per_box: 12,
            })
            .await
            .unwrap()
            .id
    }

    /// Cart with one line (qty 2, 3 days, 100.00/day, guarantee) and the
    /// reference config: logistics 100 + 50/h × 2h + 20 tolls, guarantee
    /// 15% taxed at 21%, high season over the event window at ratio 0.5.
    async fn seed_reference_cart(db: &Database) -> (String, String) {
        let product_id = seed_product(db, 10000, true).await;

        db.config()
            .set_logistics(10000, 5000, 2000, None)
            .await
            .unwrap();
        db.config().set_guarantee(1500, true, 2100).await.unwrap();
        db.config()
            .create_season(NewSeason {
                name: "Alta".to_string(),
                start_date: date(2023, 12, 15),
                end_date: date(2024, 1, 15),
                high_season: true,
                deposit_ratio_bps: 5000,
            })
            .await
            .unwrap();

        let cart = db.carts().create("session-1").await.unwrap();
        db.carts()
            .update_details(
                &cart.id,
                CartDetailsUpdate {
                    event_start: Some(date(2024, 1, 1)),
                    event_end: Some(date(2024, 1, 3)),
                    logistics_hours: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        db.carts()
            .add_item(
                &cart.id,
                NewCartItem {
                    product_id: product_id.clone(),
                    variant_id: None,
                    quantity: 2,
                    days: 3,
                },
            )
            .await
            .unwrap();

        (cart.id, product_id)
    }

    #[tokio::test]
    async fn test_checkout_prices_the_cart() {
        let db = test_db().await;
        let (cart_id, _) = seed_reference_cart(&db).await;

        let order = db.orders().create_from_cart(&cart_id).await.unwrap();

        assert_eq!(order.status, OrderStatus::PendingReservation);
        assert_eq!(order.days, 3);
        assert_eq!(order.subtotal_cents, 60000);
        assert_eq!(order.logistics_cost_cents, 22000);
        assert_eq!(order.guarantee_amount_cents, 10890);
        assert_eq!(order.total_cents, 92890);
        assert_eq!(order.reservation_required_cents, 46445);
        assert_eq!(order.outstanding_balance_cents, 46445);
        assert!(order.requires_guarantee);
        assert!(order.high_season);
        assert!(order.code.starts_with("ORD-"));

        // Line items are frozen copies of the cart lines
        let items = db.orders().items(&order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].days, 3);
        assert_eq!(items[0].unit_price_cents, 10000);
        assert_eq!(items[0].total_price_cents, 60000);
        assert!(items[0].requires_guarantee);
    }

    #[tokio::test]
    async fn test_checkout_is_idempotent_per_cart() {
        let db = test_db().await;
        let (cart_id, _) = seed_reference_cart(&db).await;

        let first = db.orders().create_from_cart(&cart_id).await.unwrap();
        let second = db.orders().create_from_cart(&cart_id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.code, second.code);
        assert_eq!(first.total_cents, second.total_cents);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE cart_id = ?1")
            .bind(&cart_id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_checkout_unknown_cart_fails() {
        let db = test_db().await;

        let err = db.orders().create_from_cart("no-such-cart").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Db(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_checkout_lazily_creates_default_configs() {
        let db = test_db().await;
        // No config rows seeded at all
        let product_id = seed_product(&db, 10000, true).await;
        let cart = db.carts().create("session-2").await.unwrap();
        db.carts()
            .add_item(
                &cart.id,
                NewCartItem {
                    product_id,
                    variant_id: None,
                    quantity: 1,
                    days: 1,
                },
            )
            .await
            .unwrap();

        let order = db.orders().create_from_cart(&cart.id).await.unwrap();

        // Logistics defaults to zero fees; guarantee defaults to 15% + 21% tax
        assert_eq!(order.subtotal_cents, 10000);
        assert_eq!(order.logistics_cost_cents, 0);
        assert_eq!(order.guarantee_amount_cents, 1815); // 100 × 0.15 × 1.21
        assert_eq!(order.total_cents, 11815);
        assert!(!order.high_season);
        assert_eq!(order.reservation_required_cents, 0);

        // The singleton rows now exist with the documented defaults
        let guarantee = db.config().guarantee().await.unwrap();
        assert_eq!(guarantee.percentage_bps, 1500);
        assert!(guarantee.apply_tax);
        assert_eq!(guarantee.tax_rate_bps, 2100);
    }

    #[tokio::test]
    async fn test_confirm_reservation_conserves_stock() {
        let db = test_db().await;
        let (cart_id, product_id) = seed_reference_cart(&db).await;
        let warehouse = db.stock().create_warehouse("Central", None).await.unwrap();
        let inventory = db
            .stock()
            .create_inventory(NewInventory {
                product_id: product_id.clone(),
                variant_id: None,
                warehouse_id: warehouse.id,
                available: 10,
            })
            .await
            .unwrap();

        let order = db.orders().create_from_cart(&cart_id).await.unwrap();
        let confirmed = db.orders().confirm_reservation(&order.id).await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::ReservationConfirmed);

        // available + reserved unchanged; 2 units moved between counters
        let refreshed = db.stock().get_inventory(&inventory.id).await.unwrap().unwrap();
        assert_eq!(refreshed.available, 8);
        assert_eq!(refreshed.reserved, 2);
        assert_eq!(refreshed.on_hand(), 10);

        // Ledger row with reason reservation and the order code as reference
        let movements = db.stock().movements_for_inventory(&inventory.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].quantity_change, -2);
        assert_eq!(
            movements[0].reason,
            marquee_core::StockMovementReason::Reservation
        );
        assert_eq!(movements[0].reference.as_deref(), Some(order.code.as_str()));
    }

    #[tokio::test]
    async fn test_confirm_reservation_drains_warehouses_in_order() {
        let db = test_db().await;
        let (cart_id, product_id) = seed_reference_cart(&db).await;
        let first = db.stock().create_warehouse("North", None).await.unwrap();
        let second = db.stock().create_warehouse("South", None).await.unwrap();
        let short_row = db
            .stock()
            .create_inventory(NewInventory {
                product_id: product_id.clone(),
                variant_id: None,
                warehouse_id: first.id,
                available: 1,
            })
            .await
            .unwrap();
        let deep_row = db
            .stock()
            .create_inventory(NewInventory {
                product_id: product_id.clone(),
                variant_id: None,
                warehouse_id: second.id,
                available: 5,
            })
            .await
            .unwrap();

        let order = db.orders().create_from_cart(&cart_id).await.unwrap();
        db.orders().confirm_reservation(&order.id).await.unwrap();

        // qty 2: first row drained to 0, remainder taken from the second
        let short_row = db.stock().get_inventory(&short_row.id).await.unwrap().unwrap();
        assert_eq!(short_row.available, 0);
        assert_eq!(short_row.reserved, 1);
        let deep_row = db.stock().get_inventory(&deep_row.id).await.unwrap().unwrap();
        assert_eq!(deep_row.available, 4);
        assert_eq!(deep_row.reserved, 1);
    }

    #[tokio::test]
    async fn test_confirm_reservation_without_inventory_leaves_order_untouched() {
        let db = test_db().await;
        let (cart_id, product_id) = seed_reference_cart(&db).await;
        // No inventory rows at all for the product

        let order = db.orders().create_from_cart(&cart_id).await.unwrap();
        let err = db.orders().confirm_reservation(&order.id).await.unwrap_err();

        match err {
            ServiceError::Core(CoreError::InsufficientStock {
                product_id: failed,
                requested,
                available,
            }) => {
                assert_eq!(failed, product_id);
                assert_eq!(requested, 2);
                assert_eq!(available, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let order = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::PendingReservation);
    }

    #[tokio::test]
    async fn test_failed_reservation_rolls_back_earlier_lines() {
        let db = test_db().await;
        // Two products: the first has plenty of stock, the second none.
        let stocked = seed_product(&db, 10000, false).await;
        let missing = seed_product(&db, 2000, false).await;

        let cart = db.carts().create("session-3").await.unwrap();
        for (product_id, quantity) in [(&stocked, 2), (&missing, 1)] {
            db.carts()
                .add_item(
                    &cart.id,
                    NewCartItem {
                        product_id: product_id.clone(),
                        variant_id: None,
                        quantity,
                        days: 1,
                    },
                )
                .await
                .unwrap();
        }

        let warehouse = db.stock().create_warehouse("Central", None).await.unwrap();
        let inventory = db
            .stock()
            .create_inventory(NewInventory {
                product_id: stocked.clone(),
                variant_id: None,
                warehouse_id: warehouse.id,
                available: 10,
            })
            .await
            .unwrap();

        let order = db.orders().create_from_cart(&cart.id).await.unwrap();
        let err = db.orders().confirm_reservation(&order.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InsufficientStock { .. })
        ));

        // The stocked product's counter updates and movement rows from the
        // same attempt were rolled back with the transaction
        let refreshed = db.stock().get_inventory(&inventory.id).await.unwrap().unwrap();
        assert_eq!(refreshed.available, 10);
        assert_eq!(refreshed.reserved, 0);
        assert!(db
            .stock()
            .movements_for_inventory(&inventory.id)
            .await
            .unwrap()
            .is_empty());

        let order = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::PendingReservation);
    }

    #[tokio::test]
    async fn test_update_status_walks_the_allow_list() {
        let db = test_db().await;
        let (cart_id, _) = seed_reference_cart(&db).await;
        let order = db.orders().create_from_cart(&cart_id).await.unwrap();

        // Jumping straight to returned is rejected
        let err = db
            .orders()
            .update_status(&order.id, OrderStatus::Returned)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InvalidTransition {
                from: OrderStatus::PendingReservation,
                to: OrderStatus::Returned,
            })
        ));

        // The listed path works step by step
        for status in [
            OrderStatus::ReservationConfirmed,
            OrderStatus::ReadyForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Returned,
        ] {
            let updated = db.orders().update_status(&order.id, status).await.unwrap();
            assert_eq!(updated.status, status);
        }

        // Returned is terminal
        let err = db
            .orders()
            .update_status(&order.id, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_return_burns_guarantee_first() {
        let db = test_db().await;
        let (cart_id, _) = seed_reference_cart(&db).await;
        let order = db.orders().create_from_cart(&cart_id).await.unwrap();
        assert_eq!(order.guarantee_amount_cents, 10890);

        let updated = db
            .orders()
            .register_return(&order.id, 890, 0, Some("two broken glasses".to_string()))
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Returned);
        assert_eq!(updated.guarantee_amount_cents, 10000);
        // Within the guarantee: outstanding balance untouched
        assert_eq!(updated.outstanding_balance_cents, order.outstanding_balance_cents);

        let reports = db.orders().returns(&order.id).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].breakage_cost_cents, 890);
        assert_eq!(reports[0].notes.as_deref(), Some("two broken glasses"));
    }

    #[tokio::test]
    async fn test_register_return_overflow_hits_outstanding_balance() {
        let db = test_db().await;
        let (cart_id, _) = seed_reference_cart(&db).await;
        let order = db.orders().create_from_cart(&cart_id).await.unwrap();

        // 150.00 of damage against a 108.90 guarantee
        let updated = db
            .orders()
            .register_return(&order.id, 10000, 5000, None)
            .await
            .unwrap();

        assert_eq!(updated.guarantee_amount_cents, 0);
        // Excess 150.00 - 108.90 = 41.10 lands on the outstanding balance
        assert_eq!(
            updated.outstanding_balance_cents,
            order.outstanding_balance_cents + 4110
        );
    }

    #[tokio::test]
    async fn test_register_return_overrides_status_from_any_state() {
        let db = test_db().await;
        let (cart_id, _) = seed_reference_cart(&db).await;
        let order = db.orders().create_from_cart(&cart_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::PendingReservation);

        // The transition table forbids pending_reservation → returned, but
        // return registration is the documented administrative override
        let updated = db.orders().register_return(&order.id, 0, 0, None).await.unwrap();
        assert_eq!(updated.status, OrderStatus::Returned);
        // Zero adjustment leaves the money untouched
        assert_eq!(updated.guarantee_amount_cents, order.guarantee_amount_cents);
        assert_eq!(
            updated.outstanding_balance_cents,
            order.outstanding_balance_cents
        );
    }

    #[tokio::test]
    async fn test_register_return_rejects_negative_costs() {
        let db = test_db().await;
        let (cart_id, _) = seed_reference_cart(&db).await;
        let order = db.orders().create_from_cart(&cart_id).await.unwrap();

        let err = db
            .orders()
            .register_return(&order.id, -100, 0, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_release_stock_returns_reserved_units() {
        let db = test_db().await;
        let (cart_id, product_id) = seed_reference_cart(&db).await;
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

        let order = db.orders().create_from_cart(&cart_id).await.unwrap();
        db.orders().confirm_reservation(&order.id).await.unwrap();
        db.orders().release_stock(&order.id).await.unwrap();

        let refreshed = db.stock().get_inventory(&inventory.id).await.unwrap().unwrap();
        assert_eq!(refreshed.available, 10);
        assert_eq!(refreshed.reserved, 0);
    }
}
