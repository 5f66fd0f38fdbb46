//! # Domain Types
//!
//! Core domain types used throughout the Marquee rental platform.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Cart       │   │      Order      │   │    Inventory    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  session_token  │   │  code (business)│   │  product_id     │       │
//! │  │  event window   │   │  status         │   │  warehouse_id   │       │
//! │  │  CartItems[]    │   │  totals (cents) │   │  available      │       │
//! │  └─────────────────┘   │  OrderItems[]   │   │  reserved       │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   OrderStatus   │   │ DeliveryMethod  │   │ StockMovement   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │     Reason      │       │
//! │  │  Draft          │   │  Delivery       │   │  ─────────────  │       │
//! │  │  PendingReserv. │   │  Pickup         │   │  Reservation    │       │
//! │  │  ... Returned   │   └─────────────────┘   │  Manual, ...    │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Orders have:
//! - `id`: UUID v4 - immutable, used for database relations
//! - `code`: human-readable business ID (`ORD-<epoch-millis>-<seq>`) printed on
//!   paperwork and stamped into stock-movement references
//!
//! ## Snapshot Pattern
//! CartItem freezes product pricing at add time; OrderItem freezes the
//! CartItem at checkout. Catalog edits never rewrite history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Rate};

// =============================================================================
// Delivery Method
// =============================================================================

/// How the rented equipment reaches the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// We truck it to the venue (logistics fees apply).
    Delivery,
    /// Customer collects from the warehouse.
    Pickup,
}

impl Default for DeliveryMethod {
    fn default() -> Self {
        DeliveryMethod::Pickup
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle status of a rental order.
///
/// Transitions between statuses are governed by the strict allow-list in
/// [`crate::lifecycle`]; anything not listed there is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Never persisted by checkout; exists for manually staged orders.
    Draft,
    /// Created from a cart, waiting for stock to be reserved.
    PendingReservation,
    /// Inventory is reserved against this order.
    ReservationConfirmed,
    /// Picked and staged for the delivery window.
    ReadyForDelivery,
    /// Equipment is at the event.
    Delivered,
    /// Equipment came back; terminal.
    Returned,
    /// Abandoned or voided; terminal.
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Draft
    }
}

// =============================================================================
// Stock Movement Reason
// =============================================================================

/// Why an inventory counter changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockMovementReason {
    /// Operator-entered correction or restock.
    Manual,
    /// Outright sale of stock (not a rental).
    Sale,
    /// Moved from available to reserved against an order.
    Reservation,
    /// Returned to the warehouse after an event.
    ReturnIn,
    /// Audit/stocktake adjustment.
    Adjustment,
}

impl Default for StockMovementReason {
    fn default() -> Self {
        StockMovementReason::Manual
    }
}

// =============================================================================
// Catalog (read model)
// =============================================================================

/// A rentable product.
///
/// The catalog is managed elsewhere; the order core only reads it to
/// snapshot pricing into carts.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Optional long description.
    pub description: Option<String>,

    /// Rental price per day in cents.
    pub base_price_cents: i64,

    /// Whether lines of this product accrue a guarantee surcharge.
    pub requires_guarantee: bool,

    /// Packaging unit (glasses per crate, chairs per stack, ...).
    pub units_per_box: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Returns the per-day price as a Money type.
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }
}

/// A variant of a product (color/material), optionally with its own price.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    pub color: Option<String>,
    pub material: Option<String>,
    /// Overrides the product base price when set.
    pub price_override_cents: Option<i64>,
}

impl ProductVariant {
    /// Returns the override price as Money, if any.
    #[inline]
    pub fn price_override(&self) -> Option<Money> {
        self.price_override_cents.map(Money::from_cents)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A mutable pre-order: what the customer is assembling before checkout.
///
/// ## Invariant
/// At most one non-cancelled Order may reference a given Cart. The
/// `UNIQUE(cart_id)` constraint on orders is the backstop; checkout's
/// idempotency check is the fast path.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Cart {
    pub id: String,

    /// Guest identity handle issued by the caller (HTTP session layer).
    pub session_token: String,

    pub delivery_method: DeliveryMethod,
    pub delivery_address: Option<String>,

    /// First day of the event (inclusive).
    #[ts(as = "Option<String>")]
    pub event_start: Option<NaiveDate>,

    /// Last day of the event (inclusive).
    #[ts(as = "Option<String>")]
    pub event_end: Option<NaiveDate>,

    /// Billable vehicle hours for the delivery run.
    pub logistics_hours: i64,

    /// Extra toll charges in cents, on top of the configured default.
    pub tolls_cents: i64,

    pub notes: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Returns the extra toll charges as Money.
    #[inline]
    pub fn tolls(&self) -> Money {
        Money::from_cents(self.tolls_cents)
    }
}

/// A line in a cart.
///
/// Uses the snapshot pattern: `price_per_day_cents`, `requires_guarantee`
/// and `units_per_box` are frozen from the product/variant at add time so
/// later catalog edits don't retroactively change cart pricing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    /// Units rented (> 0).
    pub quantity: i64,
    /// Rental days for this line (> 0).
    pub days: i64,
    /// Per-day price in cents at add time (frozen).
    pub price_per_day_cents: i64,
    /// Guarantee flag at add time (frozen).
    pub requires_guarantee: bool,
    /// Packaging unit at add time (frozen).
    pub units_per_box: i64,
}

impl CartItem {
    /// Returns the frozen per-day price as Money.
    #[inline]
    pub fn price_per_day(&self) -> Money {
        Money::from_cents(self.price_per_day_cents)
    }

    /// Line subtotal: price_per_day × quantity × days.
    #[inline]
    pub fn line_subtotal(&self) -> Money {
        self.price_per_day()
            .multiply_quantity(self.quantity)
            .multiply_quantity(self.days)
    }
}

// =============================================================================
// Order
// =============================================================================

/// An immutable-pricing, mutable-status rental order.
///
/// ## Pricing Invariants (held at creation)
/// ```text
/// total               == subtotal + logistics_cost + guarantee_amount
/// outstanding_balance == total - reservation_required
/// ```
/// Only `register_return` may adjust `guarantee_amount` and
/// `outstanding_balance` afterwards; everything else is frozen.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,

    /// Human-readable business code, `ORD-<epoch-millis>-<seq>`.
    pub code: String,

    /// Originating cart; unique across orders (one order per cart).
    pub cart_id: Option<String>,

    pub status: OrderStatus,

    pub delivery_method: DeliveryMethod,
    pub delivery_address: Option<String>,

    #[ts(as = "Option<String>")]
    pub event_start: Option<NaiveDate>,

    #[ts(as = "Option<String>")]
    pub event_end: Option<NaiveDate>,

    /// Billable rental days: max over item days, at least 1.
    pub days: i64,

    pub logistics_hours: i64,
    pub tolls_cents: i64,

    pub subtotal_cents: i64,
    pub logistics_cost_cents: i64,
    pub guarantee_amount_cents: i64,
    pub total_cents: i64,
    /// Deposit due up front when the event falls in a high season.
    pub reservation_required_cents: i64,
    /// Remainder due on delivery: total - reservation_required.
    pub outstanding_balance_cents: i64,

    pub requires_guarantee: bool,
    pub high_season: bool,

    pub notes: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn logistics_cost(&self) -> Money {
        Money::from_cents(self.logistics_cost_cents)
    }

    #[inline]
    pub fn guarantee_amount(&self) -> Money {
        Money::from_cents(self.guarantee_amount_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn reservation_required(&self) -> Money {
        Money::from_cents(self.reservation_required_cents)
    }

    #[inline]
    pub fn outstanding_balance(&self) -> Money {
        Money::from_cents(self.outstanding_balance_cents)
    }
}

/// A line item frozen into an order at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub days: i64,
    /// Per-day price in cents at checkout (frozen).
    pub unit_price_cents: i64,
    /// unit_price × quantity × days (frozen).
    pub total_price_cents: i64,
    pub requires_guarantee: bool,
    pub units_per_box: i64,
}

impl OrderItem {
    /// Returns the frozen per-day price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the frozen line total as Money.
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

/// Append-only audit record of breakage/missing costs on a returned order.
///
/// Never updated or deleted: together with the order's adjusted
/// guarantee/outstanding figures it forms the settlement trail.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderReturn {
    pub id: String,
    pub order_id: String,
    pub breakage_cost_cents: i64,
    pub missing_cost_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderReturn {
    /// Total adjustment charged against the order.
    #[inline]
    pub fn adjustment(&self) -> Money {
        Money::from_cents(self.breakage_cost_cents + self.missing_cost_cents)
    }
}

// =============================================================================
// Stock
// =============================================================================

/// A physical storage location.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
}

/// Stock counters for one (product, variant?, warehouse) combination.
///
/// ## Ownership
/// Owned exclusively by the stock ledger: counters change only through
/// movement-recording operations, never by direct writes. Both counters
/// stay >= 0 (CHECK-constrained in the schema as the backstop).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Inventory {
    pub id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub warehouse_id: String,
    /// Units free to rent.
    pub available: i64,
    /// Units held against confirmed orders.
    pub reserved: i64,
}

impl Inventory {
    /// Total units physically in the warehouse.
    #[inline]
    pub fn on_hand(&self) -> i64 {
        self.available + self.reserved
    }
}

/// Append-only ledger entry recording one inventory counter change.
///
/// The movement trail is the audit source of truth for the counters:
/// rows are never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub inventory_id: String,
    /// Signed change to `available` (reservations log the decrement).
    pub quantity_change: i64,
    pub reason: StockMovementReason,
    /// Free-form cross-reference, e.g. the order code for reservations.
    pub reference: Option<String>,
    /// Optional monetary value attached to the movement (write-offs).
    pub amount_cents: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Configuration
// =============================================================================

/// Logistics fee schedule. One logically-current row; newest wins.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LogisticsConfig {
    pub id: String,
    /// Flat fee per delivery run, in cents.
    pub base_fee_cents: i64,
    /// Vehicle fee per logistics hour, in cents.
    pub hourly_vehicle_fee_cents: i64,
    /// Toll charges assumed for every run, in cents.
    pub default_tolls_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl LogisticsConfig {
    #[inline]
    pub fn base_fee(&self) -> Money {
        Money::from_cents(self.base_fee_cents)
    }

    #[inline]
    pub fn hourly_vehicle_fee(&self) -> Money {
        Money::from_cents(self.hourly_vehicle_fee_cents)
    }

    #[inline]
    pub fn default_tolls(&self) -> Money {
        Money::from_cents(self.default_tolls_cents)
    }
}

/// Guarantee (deposit surcharge) schedule. One logically-current row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct GuaranteeConfig {
    pub id: String,
    /// Guarantee percentage in basis points (1500 = 15%).
    pub percentage_bps: u32,
    /// Whether the guarantee is grossed up by the tax rate.
    pub apply_tax: bool,
    /// Tax rate in basis points (2100 = 21%).
    pub tax_rate_bps: u32,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl GuaranteeConfig {
    #[inline]
    pub fn percentage(&self) -> Rate {
        Rate::from_bps(self.percentage_bps)
    }

    #[inline]
    pub fn tax_rate(&self) -> Rate {
        Rate::from_bps(self.tax_rate_bps)
    }
}

/// A calendar period with a high-season flag and deposit ratio.
///
/// Seasons are evaluated in `start_date` order; the first high-season row
/// overlapping the event window decides the deposit requirement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Season {
    pub id: String,
    pub name: String,
    #[ts(as = "String")]
    pub start_date: NaiveDate,
    #[ts(as = "String")]
    pub end_date: NaiveDate,
    pub high_season: bool,
    /// Deposit ratio in basis points (5000 = half the total up front).
    pub deposit_ratio_bps: u32,
}

impl Season {
    #[inline]
    pub fn deposit_ratio(&self) -> Rate {
        Rate::from_bps(self.deposit_ratio_bps)
    }

    /// Inclusive-bounds interval intersection with an event window.
    #[inline]
    pub fn overlaps(&self, event_start: NaiveDate, event_end: NaiveDate) -> bool {
        self.start_date <= event_end && event_start <= self.end_date
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_item_line_subtotal() {
        let item = CartItem {
            id: "i1".to_string(),
            cart_id: "c1".to_string(),
            product_id: "p1".to_string(),
            variant_id: None,
            quantity: 2,
            days: 3,
            price_per_day_cents: 10000,
            requires_guarantee: true,
            units_per_box: 12,
        };
        assert_eq!(item.line_subtotal().cents(), 60000);
    }

    #[test]
    fn test_season_overlap_inclusive_bounds() {
        let season = Season {
            id: "s1".to_string(),
            name: "Alta".to_string(),
            start_date: NaiveDate::from_ymd_opt(2023, 12, 15).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            high_season: true,
            deposit_ratio_bps: 5000,
        };

        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let jan15 = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let jan16 = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let feb1 = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

        // Window touching the season's last day counts
        assert!(season.overlaps(jan1, jan15));
        assert!(season.overlaps(jan15, feb1));
        // Fully past the season does not
        assert!(!season.overlaps(jan16, feb1));
    }

    #[test]
    fn test_inventory_on_hand() {
        let inv = Inventory {
            id: "inv1".to_string(),
            product_id: "p1".to_string(),
            variant_id: None,
            warehouse_id: "w1".to_string(),
            available: 7,
            reserved: 3,
        };
        assert_eq!(inv.on_hand(), 10);
    }

    #[test]
    fn test_status_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::Draft);
        assert_eq!(DeliveryMethod::default(), DeliveryMethod::Pickup);
        assert_eq!(StockMovementReason::default(), StockMovementReason::Manual);
    }

    #[test]
    fn test_status_serde_wire_form() {
        let json = serde_json::to_string(&OrderStatus::PendingReservation).unwrap();
        assert_eq!(json, "\"pending_reservation\"");
        let back: OrderStatus = serde_json::from_str("\"reservation_confirmed\"").unwrap();
        assert_eq!(back, OrderStatus::ReservationConfirmed);

        let json = serde_json::to_string(&StockMovementReason::ReturnIn).unwrap();
        assert_eq!(json, "\"return_in\"");
    }
}
