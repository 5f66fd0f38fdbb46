//! # marquee-db: Database Layer for the Marquee Rental Platform
//!
//! This crate provides database access for the rental order core.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Marquee Data Flow                                 │
//! │                                                                         │
//! │  HTTP handler (checkout, confirm-reservation, return, ...)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     marquee-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (cart, order │    │  (embedded)  │  │   │
//! │  │   │               │    │   stock, ...) │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ transactions  │    │ 001_init.sql │  │   │
//! │  │   │ WAL, FKs      │    │ per operation │    │ ...          │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   Business rules come from marquee-core; this crate owns the   │   │
//! │  │   transaction boundaries that make each composite operation    │   │
//! │  │   (checkout, reservation, return) atomic.                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL mode)                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and service error types
//! - [`repository`] - Repository implementations (cart, catalog, config,
//!   order, stock)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use marquee_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/marquee.db")).await?;
//!
//! let cart = db.carts().create("session-token").await?;
//! let order = db.orders().create_from_cart(&cart.id).await?;
//! let order = db.orders().confirm_reservation(&order.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, ServiceError, ServiceResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::config::ConfigRepository;
pub use repository::order::OrderRepository;
pub use repository::stock::StockRepository;
