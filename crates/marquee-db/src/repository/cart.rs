//! # Cart Repository
//!
//! The mutable pre-order aggregate: items, delivery details, merging.
//!
//! ## Snapshot Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       add_item()                                        │
//! │                                                                         │
//! │  Product (catalog)          CartItem (frozen at add time)              │
//! │  ──────────────────         ─────────────────────────────              │
//! │  base_price_cents   ──────► price_per_day_cents                        │
//! │  requires_guarantee ──────► requires_guarantee                         │
//! │  units_per_box      ──────► units_per_box                              │
//! │                                                                         │
//! │  Variant price_override_cents beats the product base price.            │
//! │  Later catalog edits never reprice lines already in a cart.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Field Patching
//! `update_item` and `update_details` are explicit allow-listed merges:
//! each patchable field is named in the parameter struct and applied by
//! hand. No reflection-style field copying: fields not listed here cannot
//! be patched from the outside.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use marquee_core::validation::{validate_cart_size, validate_days, validate_quantity};
use marquee_core::{Cart, CartItem, CoreError, DeliveryMethod, ValidationError};

/// Parameters for adding a line to a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCartItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub days: i64,
}

/// Allow-listed partial update of cart delivery/event details.
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartDetailsUpdate {
    pub delivery_method: Option<DeliveryMethod>,
    pub delivery_address: Option<String>,
    pub event_start: Option<NaiveDate>,
    pub event_end: Option<NaiveDate>,
    pub logistics_hours: Option<i64>,
    pub tolls_cents: Option<i64>,
    pub notes: Option<String>,
}

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Creates an empty cart for a session.
    pub async fn create(&self, session_token: &str) -> DbResult<Cart> {
        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            session_token: session_token.to_string(),
            delivery_method: DeliveryMethod::default(),
            delivery_address: None,
            event_start: None,
            event_end: None,
            logistics_hours: 1,
            tolls_cents: 0,
            notes: None,
            created_at: Utc::now(),
        };

        debug!(id = %cart.id, "Creating cart");

        sqlx::query(
            r#"
            INSERT INTO carts (
                id, session_token, delivery_method, delivery_address,
                event_start, event_end, logistics_hours, tolls_cents,
                notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&cart.id)
        .bind(&cart.session_token)
        .bind(cart.delivery_method)
        .bind(&cart.delivery_address)
        .bind(cart.event_start)
        .bind(cart.event_end)
        .bind(cart.logistics_hours)
        .bind(cart.tolls_cents)
        .bind(&cart.notes)
        .bind(cart.created_at)
        .execute(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Gets a cart by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            SELECT id, session_token, delivery_method, delivery_address,
                   event_start, event_end, logistics_hours, tolls_cents,
                   notes, created_at
            FROM carts
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Gets the newest cart for a session token.
    pub async fn get_by_session(&self, session_token: &str) -> DbResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            SELECT id, session_token, delivery_method, delivery_address,
                   event_start, event_end, logistics_hours, tolls_cents,
                   notes, created_at
            FROM carts
            WHERE session_token = ?1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Gets all lines of a cart in insertion order.
    pub async fn items(&self, cart_id: &str) -> DbResult<Vec<CartItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_items(&mut conn, cart_id).await
    }

    /// Adds a line to a cart, snapshotting pricing from the catalog.
    ///
    /// ## Errors
    /// - `CoreError::ProductNotFound` / `VariantNotFound`
    /// - `ValidationError` for non-positive quantity/days or a full cart
    pub async fn add_item(&self, cart_id: &str, new: NewCartItem) -> ServiceResult<CartItem> {
        validate_quantity(new.quantity).map_err(CoreError::from)?;
        validate_days(new.days).map_err(CoreError::from)?;

        let cart = self
            .get_by_id(cart_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", cart_id))?;

        let product = sqlx::query_as::<_, marquee_core::Product>(
            r#"
            SELECT id, name, description, base_price_cents,
                   requires_guarantee, units_per_box, is_active, created_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(&new.product_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(new.product_id.clone()))?;

        let mut price_per_day_cents = product.base_price_cents;
        if let Some(variant_id) = &new.variant_id {
            let variant = sqlx::query_as::<_, marquee_core::ProductVariant>(
                "SELECT * FROM product_variants WHERE id = ?1",
            )
            .bind(variant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::VariantNotFound(variant_id.clone()))?;

            if let Some(override_cents) = variant.price_override_cents {
                price_per_day_cents = override_cents;
            }
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE cart_id = ?1")
            .bind(&cart.id)
            .fetch_one(&self.pool)
            .await?;
        validate_cart_size(existing as usize).map_err(CoreError::from)?;

        let item = CartItem {
            id: Uuid::new_v4().to_string(),
            cart_id: cart.id.clone(),
            product_id: product.id.clone(),
            variant_id: new.variant_id,
            quantity: new.quantity,
            days: new.days,
            price_per_day_cents,
            requires_guarantee: product.requires_guarantee,
            units_per_box: product.units_per_box,
        };

        debug!(
            cart_id = %cart.id,
            product_id = %item.product_id,
            quantity = item.quantity,
            "Adding cart item"
        );

        let mut conn = self.pool.acquire().await?;
        insert_item(&mut conn, &item).await?;

        Ok(item)
    }

    /// Patches a cart line. Only quantity and days are patchable; the
    /// frozen pricing snapshot is not.
    pub async fn update_item(
        &self,
        item_id: &str,
        quantity: Option<i64>,
        days: Option<i64>,
    ) -> ServiceResult<CartItem> {
        let mut item = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE id = ?1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("CartItem", item_id))?;

        if let Some(quantity) = quantity {
            validate_quantity(quantity).map_err(CoreError::from)?;
            item.quantity = quantity;
        }
        if let Some(days) = days {
            validate_days(days).map_err(CoreError::from)?;
            item.days = days;
        }

        sqlx::query("UPDATE cart_items SET quantity = ?2, days = ?3 WHERE id = ?1")
            .bind(&item.id)
            .bind(item.quantity)
            .bind(item.days)
            .execute(&self.pool)
            .await?;

        Ok(item)
    }

    /// Removes a line from a cart.
    pub async fn remove_item(&self, item_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ?1")
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartItem", item_id));
        }

        Ok(())
    }

    /// Patches cart delivery/event details (allow-listed fields only).
    pub async fn update_details(
        &self,
        cart_id: &str,
        update: CartDetailsUpdate,
    ) -> ServiceResult<Cart> {
        let mut cart = self
            .get_by_id(cart_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", cart_id))?;

        if let Some(method) = update.delivery_method {
            cart.delivery_method = method;
        }
        if let Some(address) = update.delivery_address {
            cart.delivery_address = Some(address);
        }
        if let Some(start) = update.event_start {
            cart.event_start = Some(start);
        }
        if let Some(end) = update.event_end {
            cart.event_end = Some(end);
        }
        if let Some(hours) = update.logistics_hours {
            if hours < 0 {
                return Err(ValidationError::MustNotBeNegative {
                    field: "logistics_hours".to_string(),
                }
                .into());
            }
            cart.logistics_hours = hours;
        }
        if let Some(tolls) = update.tolls_cents {
            if tolls < 0 {
                return Err(ValidationError::MustNotBeNegative {
                    field: "tolls".to_string(),
                }
                .into());
            }
            cart.tolls_cents = tolls;
        }
        if let Some(notes) = update.notes {
            cart.notes = Some(notes);
        }

        sqlx::query(
            r#"
            UPDATE carts SET
                delivery_method = ?2,
                delivery_address = ?3,
                event_start = ?4,
                event_end = ?5,
                logistics_hours = ?6,
                tolls_cents = ?7,
                notes = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&cart.id)
        .bind(cart.delivery_method)
        .bind(&cart.delivery_address)
        .bind(cart.event_start)
        .bind(cart.event_end)
        .bind(cart.logistics_hours)
        .bind(cart.tolls_cents)
        .bind(&cart.notes)
        .execute(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Merges a guest cart into a target cart (login flow).
    ///
    /// Lines with the same product + variant combine: quantities add, days
    /// keep the maximum. Everything else is copied over. The source cart
    /// and its lines are deleted. One transaction: either the whole merge
    /// lands or none of it.
    pub async fn merge(&self, target_id: &str, source_id: &str) -> ServiceResult<Cart> {
        let mut tx = self.pool.begin().await?;

        let target = fetch_cart(&mut tx, target_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", target_id))?;
        fetch_cart(&mut tx, source_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", source_id))?;

        let target_items = fetch_items(&mut tx, target_id).await?;
        let source_items = fetch_items(&mut tx, source_id).await?;

        for source_item in &source_items {
            let existing = target_items.iter().find(|item| {
                item.product_id == source_item.product_id
                    && item.variant_id == source_item.variant_id
            });

            match existing {
                Some(item) => {
                    sqlx::query("UPDATE cart_items SET quantity = ?2, days = ?3 WHERE id = ?1")
                        .bind(&item.id)
                        .bind(item.quantity + source_item.quantity)
                        .bind(item.days.max(source_item.days))
                        .execute(&mut *tx)
                        .await?;
                }
                None => {
                    let clone = CartItem {
                        id: Uuid::new_v4().to_string(),
                        cart_id: target.id.clone(),
                        ..source_item.clone()
                    };
                    insert_item(&mut tx, &clone).await?;
                }
            }
        }

        // Cascade removes the source items
        sqlx::query("DELETE FROM carts WHERE id = ?1")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            target = %target_id,
            source = %source_id,
            merged_lines = source_items.len(),
            "Carts merged"
        );

        Ok(target)
    }
}

// =============================================================================
// Connection-Level Helpers
// =============================================================================

pub(crate) async fn fetch_cart(
    conn: &mut SqliteConnection,
    cart_id: &str,
) -> DbResult<Option<Cart>> {
    let cart = sqlx::query_as::<_, Cart>(
        r#"
        SELECT id, session_token, delivery_method, delivery_address,
               event_start, event_end, logistics_hours, tolls_cents,
               notes, created_at
        FROM carts
        WHERE id = ?1
        "#,
    )
    .bind(cart_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(cart)
}

pub(crate) async fn fetch_items(
    conn: &mut SqliteConnection,
    cart_id: &str,
) -> DbResult<Vec<CartItem>> {
    let items =
        sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE cart_id = ?1 ORDER BY rowid")
            .bind(cart_id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(items)
}

async fn insert_item(conn: &mut SqliteConnection, item: &CartItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cart_items (
            id, cart_id, product_id, variant_id,
            quantity, days, price_per_day_cents,
            requires_guarantee, units_per_box
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&item.id)
    .bind(&item.cart_id)
    .bind(&item.product_id)
    .bind(&item.variant_id)
    .bind(item.quantity)
    .bind(item.days)
    .bind(item.price_per_day_cents)
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
    use crate::repository::catalog::{NewProduct, NewProductVariant};
    use chrono::NaiveDate;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, price_cents: i64) -> String {
        db.catalog()
            .insert_product(NewProduct {
                name: "Wine glass".to_string(),
                description: Some("Stemmed, 25cl".to_string()),
                base_price_cents: price_cents,
                requires_guarantee: true,
                units_per_box: 24,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_add_item_snapshots_product_pricing() {
        let db = test_db().await;
        let product_id = seed_product(&db, 150).await;
        let cart = db.carts().create("session-a").await.unwrap();

        let item = db
            .carts()
            .add_item(
                &cart.id,
                NewCartItem {
                    product_id: product_id.clone(),
                    variant_id: None,
                    quantity: 48,
                    days: 2,
                },
            )
            .await
            .unwrap();

        assert_eq!(item.price_per_day_cents, 150);
        assert!(item.requires_guarantee);
        assert_eq!(item.units_per_box, 24);
        assert_eq!(item.line_subtotal().cents(), 150 * 48 * 2);
    }

    #[tokio::test]
    async fn test_add_item_variant_price_override_wins() {
        let db = test_db().await;
        let product_id = seed_product(&db, 150).await;
        let variant = db
            .catalog()
            .insert_variant(NewProductVariant {
                product_id: product_id.clone(),
                color: Some("smoke grey".to_string()),
                material: None,
                price_override_cents: Some(220),
            })
            .await
            .unwrap();
        let cart = db.carts().create("session-b").await.unwrap();

        let item = db
            .carts()
            .add_item(
                &cart.id,
                NewCartItem {
                    product_id,
                    variant_id: Some(variant.id.clone()),
                    quantity: 1,
                    days: 1,
                },
            )
            .await
            .unwrap();

        assert_eq!(item.price_per_day_cents, 220);
        assert_eq!(item.variant_id.as_deref(), Some(variant.id.as_str()));
    }

    #[tokio::test]
    async fn test_add_item_unknown_product_fails() {
        let db = test_db().await;
        let cart = db.carts().create("session-c").await.unwrap();

        let err = db
            .carts()
            .add_item(
                &cart.id,
                NewCartItem {
                    product_id: "ghost".to_string(),
                    variant_id: None,
                    quantity: 1,
                    days: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_item_rejects_bad_quantities() {
        let db = test_db().await;
        let product_id = seed_product(&db, 150).await;
        let cart = db.carts().create("session-d").await.unwrap();

        for (quantity, days) in [(0, 1), (-2, 1), (1, 0)] {
            let err = db
                .carts()
                .add_item(
                    &cart.id,
                    NewCartItem {
                        product_id: product_id.clone(),
                        variant_id: None,
                        quantity,
                        days,
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ServiceError::Core(CoreError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_update_item_patches_quantity_and_days_only() {
        let db = test_db().await;
        let product_id = seed_product(&db, 150).await;
        let cart = db.carts().create("session-e").await.unwrap();
        let item = db
            .carts()
            .add_item(
                &cart.id,
                NewCartItem {
                    product_id,
                    variant_id: None,
                    quantity: 10,
                    days: 1,
                },
            )
            .await
            .unwrap();

        let updated = db
            .carts()
            .update_item(&item.id, Some(12), None)
            .await
            .unwrap();
        assert_eq!(updated.quantity, 12);
        assert_eq!(updated.days, 1);
        // The frozen snapshot is untouched
        assert_eq!(updated.price_per_day_cents, 150);

        let updated = db.carts().update_item(&item.id, None, Some(4)).await.unwrap();
        assert_eq!(updated.quantity, 12);
        assert_eq!(updated.days, 4);
    }

    #[tokio::test]
    async fn test_update_details_applies_allow_listed_fields() {
        let db = test_db().await;
        let cart = db.carts().create("session-f").await.unwrap();

        let updated = db
            .carts()
            .update_details(
                &cart.id,
                CartDetailsUpdate {
                    delivery_method: Some(DeliveryMethod::Delivery),
                    delivery_address: Some("Calle Mayor 12".to_string()),
                    event_start: NaiveDate::from_ymd_opt(2024, 6, 1),
                    event_end: NaiveDate::from_ymd_opt(2024, 6, 3),
                    logistics_hours: Some(3),
                    tolls_cents: Some(750),
                    notes: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.delivery_method, DeliveryMethod::Delivery);
        assert_eq!(updated.delivery_address.as_deref(), Some("Calle Mayor 12"));
        assert_eq!(updated.logistics_hours, 3);
        assert_eq!(updated.tolls_cents, 750);
        // Untouched field kept its value
        assert_eq!(updated.session_token, "session-f");

        // And the row agrees with what was returned
        let reloaded = db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        assert_eq!(reloaded.tolls_cents, 750);
        assert_eq!(
            reloaded.event_start,
            NaiveDate::from_ymd_opt(2024, 6, 1)
        );
    }

    #[tokio::test]
    async fn test_update_details_rejects_negative_hours() {
        let db = test_db().await;
        let cart = db.carts().create("session-g").await.unwrap();

        let err = db
            .carts()
            .update_details(
                &cart.id,
                CartDetailsUpdate {
                    logistics_hours: Some(-1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(_)));
    }

    #[tokio::test]
    async fn test_merge_combines_matching_lines_and_deletes_source() {
        let db = test_db().await;
        let shared = seed_product(&db, 150).await;
        let extra = seed_product(&db, 9000).await;

        let user_cart = db.carts().create("user-session").await.unwrap();
        let guest_cart = db.carts().create("guest-session").await.unwrap();

        db.carts()
            .add_item(
                &user_cart.id,
                NewCartItem {
                    product_id: shared.clone(),
                    variant_id: None,
                    quantity: 10,
                    days: 3,
                },
            )
            .await
            .unwrap();
        db.carts()
            .add_item(
                &guest_cart.id,
                NewCartItem {
                    product_id: shared.clone(),
                    variant_id: None,
                    quantity: 5,
                    days: 1,
                },
            )
            .await
            .unwrap();
        db.carts()
            .add_item(
                &guest_cart.id,
                NewCartItem {
                    product_id: extra.clone(),
                    variant_id: None,
                    quantity: 2,
                    days: 2,
                },
            )
            .await
            .unwrap();

        db.carts().merge(&user_cart.id, &guest_cart.id).await.unwrap();

        let items = db.carts().items(&user_cart.id).await.unwrap();
        assert_eq!(items.len(), 2);

        let shared_line = items.iter().find(|i| i.product_id == shared).unwrap();
        // Quantities add, days keep the maximum
        assert_eq!(shared_line.quantity, 15);
        assert_eq!(shared_line.days, 3);

        let extra_line = items.iter().find(|i| i.product_id == extra).unwrap();
        assert_eq!(extra_line.quantity, 2);

        // Source cart and its lines are gone
        assert!(db.carts().get_by_id(&guest_cart.id).await.unwrap().is_none());
        assert!(db.carts().items(&guest_cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_item() {
        let db = test_db().await;
        let product_id = seed_product(&db, 150).await;
        let cart = db.carts().create("session-h").await.unwrap();
        let item = db
            .carts()
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

        db.carts().remove_item(&item.id).await.unwrap();
        assert!(db.carts().items(&cart.id).await.unwrap().is_empty());

        let err = db.carts().remove_item(&item.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
