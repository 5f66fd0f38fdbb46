//! # Repository Module
//!
//! Database repository implementations for the Marquee rental platform.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.orders().create_from_cart(&cart_id)                        │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── create_from_cart(&self, cart_id)     ← checkout orchestrator      │
//! │  ├── update_status(&self, id, status)     ← lifecycle allow-list       │
//! │  ├── confirm_reservation(&self, id)       ← reserve + flip status      │
//! │  └── register_return(&self, id, ...)      ← settlement adjustments     │
//! │       │                                                                 │
//! │       │  SQL inside one transaction per composite operation            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`cart::CartRepository`] - Cart aggregate (items, details, merge)
//! - [`catalog::CatalogRepository`] - Product read model for cart snapshots
//! - [`config::ConfigRepository`] - Fee schedules and the season calendar
//! - [`order::OrderRepository`] - Checkout, lifecycle, reservations, returns
//! - [`stock::StockRepository`] - Inventory ledger and movements

pub mod cart;
pub mod catalog;
pub mod config;
pub mod order;
pub mod stock;
