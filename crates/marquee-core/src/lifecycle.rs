//! # Order Lifecycle
//!
//! The status state machine for rental orders.
//!
//! ## Transition Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Order Status Flow                                  │
//! │                                                                         │
//! │  draft ──► pending_reservation ──► reservation_confirmed               │
//! │                                           │                             │
//! │                                           ▼                             │
//! │                                    ready_for_delivery                   │
//! │                                           │                             │
//! │                                           ▼                             │
//! │                                       delivered ──► returned (terminal) │
//! │                                                                         │
//! │  Every non-terminal status ──────────► cancelled (terminal)             │
//! │                                                                         │
//! │  STRICT ALLOW-LIST: anything not drawn above is rejected with           │
//! │  InvalidTransition. Terminal statuses have no outgoing edges.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One deliberate exception lives outside this table: return registration
//! force-sets `Returned` as an administrative override (see the order
//! repository). `update_status` always goes through the table.

use crate::error::CoreError;
use crate::types::OrderStatus;

impl OrderStatus {
    /// The statuses this one may legally move to.
    ///
    /// Empty slice = terminal.
    pub fn allowed_transitions(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Draft => &[OrderStatus::PendingReservation, OrderStatus::Cancelled],
            OrderStatus::PendingReservation => {
                &[OrderStatus::ReservationConfirmed, OrderStatus::Cancelled]
            }
            OrderStatus::ReservationConfirmed => {
                &[OrderStatus::ReadyForDelivery, OrderStatus::Cancelled]
            }
            OrderStatus::ReadyForDelivery => &[OrderStatus::Delivered, OrderStatus::Cancelled],
            OrderStatus::Delivered => &[OrderStatus::Returned, OrderStatus::Cancelled],
            OrderStatus::Returned => &[],
            OrderStatus::Cancelled => &[],
        }
    }

    /// Checks whether a transition to `next` is allowed.
    #[inline]
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Terminal statuses have no outgoing transitions.
    #[inline]
    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Validates a status transition against the allow-list.
///
/// ## Errors
/// `CoreError::InvalidTransition` naming both ends, so callers can surface
/// exactly which move was rejected.
pub fn ensure_transition(current: OrderStatus, next: OrderStatus) -> Result<(), CoreError> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: current,
            to: next,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
