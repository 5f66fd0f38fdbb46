//! # marquee-core: Pure Business Logic for the Marquee Rental Platform
//!
//! This crate is the **heart** of the platform. It contains all business
//! logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Marquee Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                HTTP caller (storefront / back office)           │   │
//! │  │    browse ──► cart ──► checkout ──► operate order lifecycle    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ marquee-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ lifecycle │  │   │
//! │  │   │ Cart/Order│  │ Money,Rate│  │  totals   │  │ statuses  │  │   │
//! │  │   │ Inventory │  │ bps math  │  │  seasons  │  │ allowlist │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 marquee-db (Database Layer)                     │   │
//! │  │    SQLite repositories, checkout transaction, stock ledger      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Cart, Order, Inventory, Season, ...)
//! - [`money`] - Money/Rate types with integer arithmetic (no floating point!)
//! - [`pricing`] - The pricing engine: cart + config → totals breakdown
//! - [`lifecycle`] - Order status state machine (strict allow-list)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64), rates in
//!    basis points (u32), to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use marquee_core::money::{Money, Rate};
//!
//! // Create money from cents (never from floats!)
//! let line = Money::from_cents(60000); // 600.00 of guarantee-flagged lines
//!
//! // Guarantee at 15%, taxed at 21%, single rounding step
//! let guarantee = line.apply_taxed_rate(Rate::from_bps(1500), Rate::from_bps(2100));
//! assert_eq!(guarantee.cents(), 10890); // 108.90
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod lifecycle;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use marquee_core::Money` instead of
// `use marquee_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use lifecycle::ensure_transition;
pub use money::{Money, Rate};
pub use pricing::{calculate_totals, overlapping_high_season, rental_days, TotalsBreakdown};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default guarantee percentage in basis points (15%).
///
/// ## Why a constant?
/// The guarantee config row is created lazily on first use; the defaults
/// live here as documented values, never as implicit zero-state scattered
/// through the persistence layer.
pub const DEFAULT_GUARANTEE_PERCENTAGE_BPS: u32 = 1_500;

/// Default guarantee tax rate in basis points (21% VAT).
pub const DEFAULT_GUARANTEE_TAX_RATE_BPS: u32 = 2_100;

/// Whether the default guarantee config grosses the surcharge up by tax.
pub const DEFAULT_GUARANTEE_APPLY_TAX: bool = true;

/// Default season deposit ratio in basis points (half the total up front).
pub const DEFAULT_SEASON_DEPOSIT_RATIO_BPS: u32 = 5_000;

/// Lazily-created logistics config starts with every fee at zero; real
/// fees are operator-entered. Kept as named constants so the zero-state
/// is deliberate rather than accidental.
pub const DEFAULT_LOGISTICS_BASE_FEE_CENTS: i64 = 0;
pub const DEFAULT_LOGISTICS_HOURLY_VEHICLE_FEE_CENTS: i64 = 0;
pub const DEFAULT_LOGISTICS_DEFAULT_TOLLS_CENTS: i64 = 0;

/// Maximum lines allowed in a single cart.
///
/// ## Business Reason
/// Prevents runaway carts and ensures reasonable order sizes.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum rental days of a single line.
pub const MAX_RENTAL_DAYS: i64 = 365;
