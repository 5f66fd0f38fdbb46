//! # Pricing Engine
//!
//! Pure computation that turns a cart snapshot + configuration into a
//! totals breakdown. No side effects, no I/O; the checkout orchestrator
//! in `marquee-db` feeds it and persists the result.
//!
//! ## The Quote Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    calculate_totals()                                   │
//! │                                                                         │
//! │  CartItems ────► subtotal = Σ price_per_day × qty × days               │
//! │      │                                                                  │
//! │      └─────────► guarantee_base = Σ over guarantee-flagged lines       │
//! │                                                                         │
//! │  LogisticsConfig + cart ──► logistics = base + default_tolls           │
//! │                                        + hourly × hours + cart tolls  │
//! │                                                                         │
//! │  GuaranteeConfig ──► guarantee = base × pct × (1 + tax), ONE rounding  │
//! │                                                                         │
//! │  Seasons + event window ──► first overlapping high season              │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  total = subtotal + logistics + guarantee                              │
//! │  reservation_required = total × deposit_ratio   (high season only)     │
//! │  outstanding_balance  = total - reservation_required                   │
//! │                                                                         │
//! │  All cents; identities hold exactly by construction.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Cart, CartItem, GuaranteeConfig, LogisticsConfig, Season};

// =============================================================================
// Totals Breakdown
// =============================================================================

/// The full pricing result for a cart.
///
/// ## Invariants
/// ```text
/// total               == subtotal + logistics_cost + guarantee_amount
/// outstanding_balance == total - reservation_required
/// ```
/// Both hold exactly: every component is rounded to cents before the sums
/// are formed, so the identities can never be broken by rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TotalsBreakdown {
    /// Billable rental days: max over item days, at least 1.
    pub days: i64,
    pub subtotal: Money,
    pub logistics_cost: Money,
    pub guarantee_amount: Money,
    pub total: Money,
    /// Deposit due up front; zero outside high season.
    pub reservation_required: Money,
    /// Remainder due on delivery.
    pub outstanding_balance: Money,
    /// True when any line carries the guarantee flag.
    pub requires_guarantee: bool,
    /// True when the event window overlaps a high season.
    pub high_season: bool,
}

// =============================================================================
// Pricing Functions
// =============================================================================

/// Finds the high season (if any) overlapping an event window.
///
/// ## Rules
/// - Both window bounds must be present; otherwise no season applies.
/// - Interval intersection is inclusive on both ends.
/// - The FIRST overlapping season flagged high-season wins. Callers must
///   present seasons in a stable, meaningful order (the config repository
///   sorts by start date) so overlapping ranges resolve deterministically.
/// - Overlapping low-season rows are skipped, not treated as a miss.
pub fn overlapping_high_season<'a>(
    event_start: Option<NaiveDate>,
    event_end: Option<NaiveDate>,
    seasons: &'a [Season],
) -> Option<&'a Season> {
    let (start, end) = match (event_start, event_end) {
        (Some(start), Some(end)) => (start, end),
        _ => return None,
    };
    seasons
        .iter()
        .find(|season| season.high_season && season.overlaps(start, end))
}

/// Derives the rental day count from an event window.
///
/// Inclusive span: Jan 1 → Jan 3 is 3 days. Falls back when either bound
/// is missing or the window is inverted. Used by the cart layer to default
/// line days from the cart's event dates.
pub fn rental_days(
    event_start: Option<NaiveDate>,
    event_end: Option<NaiveDate>,
    fallback: i64,
) -> i64 {
    match (event_start, event_end) {
        (Some(start), Some(end)) if end >= start => (end - start).num_days() + 1,
        _ => fallback,
    }
}

/// Computes the full totals breakdown for a cart.
///
/// Pure function: same inputs, same breakdown, no side effects.
///
/// ## Algorithm
/// 1. `days = max(1, max over items of item.days)`
/// 2. `subtotal = Σ line subtotals`; guarantee base restricted to flagged lines
/// 3. `logistics = base_fee + default_tolls + hourly × cart.logistics_hours
///    + cart.tolls`
/// 4. `guarantee = base × percentage`, grossed up by `(1 + tax_rate)` when
///    `apply_tax`, in a single half-up rounding step
/// 5. First overlapping high season decides `deposit_ratio` (else 0)
/// 6. `total`, `reservation_required`, `outstanding_balance` as documented
///    on [`TotalsBreakdown`]
pub fn calculate_totals(
    cart: &Cart,
    items: &[CartItem],
    logistics_config: &LogisticsConfig,
    guarantee_config: &GuaranteeConfig,
    seasons: &[Season],
) -> TotalsBreakdown {
    let mut days: i64 = 1;
    let mut subtotal = Money::zero();
    let mut guarantee_base = Money::zero();

    for item in items {
        days = days.max(item.days);
        let line_subtotal = item.line_subtotal();
        subtotal += line_subtotal;
        if item.requires_guarantee {
            guarantee_base += line_subtotal;
        }
    }

    let logistics_cost = logistics_config.base_fee()
        + logistics_config.default_tolls()
        + logistics_config.hourly_vehicle_fee() * cart.logistics_hours
        + cart.tolls();

    let guarantee_amount = if guarantee_config.apply_tax {
        guarantee_base.apply_taxed_rate(guarantee_config.percentage(), guarantee_config.tax_rate())
    } else {
        guarantee_base.apply_rate(guarantee_config.percentage())
    };

    let season = overlapping_high_season(cart.event_start, cart.event_end, seasons);

    let total = subtotal + logistics_cost + guarantee_amount;
    let reservation_required = match season {
        Some(season) => total.apply_rate(season.deposit_ratio()),
        None => Money::zero(),
    };
    let outstanding_balance = total - reservation_required;

    TotalsBreakdown {
        days,
        subtotal,
        logistics_cost,
        guarantee_amount,
        total,
        reservation_required,
        outstanding_balance,
        requires_guarantee: guarantee_base.is_positive(),
        high_season: season.is_some(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
