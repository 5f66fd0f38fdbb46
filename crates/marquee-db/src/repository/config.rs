//! # Configuration Repository
//!
//! Fee schedules and the season calendar.
//!
//! ## Singleton Config Rows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Get-Or-Create-With-Default Pattern                         │
//! │                                                                         │
//! │  logistics() / guarantee()                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT ... ORDER BY updated_at DESC LIMIT 1                           │
//! │       │                                                                 │
//! │       ├── row exists ──► return it (newest wins)                       │
//! │       │                                                                 │
//! │       └── no row ──► INSERT the documented defaults from               │
//! │                      marquee-core and return that                      │
//! │                                                                         │
//! │  Defaults are named constants, never implicit zero-state.              │
//! │  The pattern is an explicit repository method, never global state.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbResult, ServiceResult};
use marquee_core::validation::{validate_price_cents, validate_rate_bps};
use marquee_core::ValidationError;
use marquee_core::{
    GuaranteeConfig, LogisticsConfig, Season, DEFAULT_GUARANTEE_APPLY_TAX,
    DEFAULT_GUARANTEE_PERCENTAGE_BPS, DEFAULT_GUARANTEE_TAX_RATE_BPS,
    DEFAULT_LOGISTICS_BASE_FEE_CENTS, DEFAULT_LOGISTICS_DEFAULT_TOLLS_CENTS,
    DEFAULT_LOGISTICS_HOURLY_VEHICLE_FEE_CENTS,
};

/// Parameters for creating a season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSeason {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub high_season: bool,
    pub deposit_ratio_bps: u32,
}

/// Repository for configuration rows and seasons.
#[derive(Debug, Clone)]
pub struct ConfigRepository {
    pool: SqlitePool,
}

impl ConfigRepository {
    /// Creates a new ConfigRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ConfigRepository { pool }
    }

    /// Gets the current logistics config, creating the default row if none
    /// exists yet.
    pub async fn logistics(&self) -> DbResult<LogisticsConfig> {
        let mut conn = self.pool.acquire().await?;
        load_or_create_logistics(&mut conn).await
    }

    /// Replaces the current logistics fee schedule.
    pub async fn set_logistics(
        &self,
        base_fee_cents: i64,
        hourly_vehicle_fee_cents: i64,
        default_tolls_cents: i64,
        notes: Option<String>,
    ) -> ServiceResult<LogisticsConfig> {
        validate_price_cents(base_fee_cents)?;
        validate_price_cents(hourly_vehicle_fee_cents)?;
        validate_price_cents(default_tolls_cents)?;

        let mut conn = self.pool.acquire().await?;
        let mut config = load_or_create_logistics(&mut conn).await?;

        config.base_fee_cents = base_fee_cents;
        config.hourly_vehicle_fee_cents = hourly_vehicle_fee_cents;
        config.default_tolls_cents = default_tolls_cents;
        config.notes = notes;
        config.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE logistics_config SET
                base_fee_cents = ?2,
                hourly_vehicle_fee_cents = ?3,
                default_tolls_cents = ?4,
                notes = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&config.id)
        .bind(config.base_fee_cents)
        .bind(config.hourly_vehicle_fee_cents)
        .bind(config.default_tolls_cents)
        .bind(&config.notes)
        .bind(config.updated_at)
        .execute(&mut *conn)
        .await?;

        info!(
            base_fee = config.base_fee_cents,
            hourly = config.hourly_vehicle_fee_cents,
            "Logistics config updated"
        );
        Ok(config)
    }

    /// Gets the current guarantee config, creating the default row if none
    /// exists yet.
    pub async fn guarantee(&self) -> DbResult<GuaranteeConfig> {
        let mut conn = self.pool.acquire().await?;
        load_or_create_guarantee(&mut conn).await
    }

    /// Replaces the current guarantee schedule.
    pub async fn set_guarantee(
        &self,
        percentage_bps: u32,
        apply_tax: bool,
        tax_rate_bps: u32,
    ) -> ServiceResult<GuaranteeConfig> {
        validate_rate_bps(percentage_bps)?;
        validate_rate_bps(tax_rate_bps)?;

        let mut conn = self.pool.acquire().await?;
        let mut config = load_or_create_guarantee(&mut conn).await?;

        config.percentage_bps = percentage_bps;
        config.apply_tax = apply_tax;
        config.tax_rate_bps = tax_rate_bps;
        config.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE guarantee_config SET
                percentage_bps = ?2,
                apply_tax = ?3,
                tax_rate_bps = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&config.id)
        .bind(config.percentage_bps)
        .bind(config.apply_tax)
        .bind(config.tax_rate_bps)
        .bind(config.updated_at)
        .execute(&mut *conn)
        .await?;

        info!(
            percentage_bps = config.percentage_bps,
            apply_tax = config.apply_tax,
            "Guarantee config updated"
        );
        Ok(config)
    }

    /// Lists all seasons ordered by start date.
    ///
    /// The ordering is load-bearing: the pricing engine takes the FIRST
    /// overlapping high season, so the calendar must be presented in a
    /// stable, meaningful order.
    pub async fn seasons(&self) -> DbResult<Vec<Season>> {
        let mut conn = self.pool.acquire().await?;
        list_seasons(&mut conn).await
    }

    /// Creates a season.
    pub async fn create_season(&self, new: NewSeason) -> ServiceResult<Season> {
        validate_rate_bps(new.deposit_ratio_bps)?;
        if new.end_date < new.start_date {
            return Err(ValidationError::InvalidFormat {
                field: "season".to_string(),
                reason: "end_date must not precede start_date".to_string(),
            }
            .into());
        }

        let season = Season {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            start_date: new.start_date,
            end_date: new.end_date,
            high_season: new.high_season,
            deposit_ratio_bps: new.deposit_ratio_bps,
        };

        debug!(name = %season.name, high = season.high_season, "Creating season");

        sqlx::query(
            r#"
            INSERT INTO seasons (id, name, start_date, end_date, high_season, deposit_ratio_bps)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&season.id)
        .bind(&season.name)
        .bind(season.start_date)
        .bind(season.end_date)
        .bind(season.high_season)
        .bind(season.deposit_ratio_bps)
        .execute(&self.pool)
        .await?;

        Ok(season)
    }
}

// =============================================================================
// Connection-Level Helpers
// =============================================================================
// The checkout transaction loads configs through these so that the lazy
// default insertion happens inside the caller's transaction, not on a
// second pooled connection.

/// Loads the newest logistics config row, inserting the documented
/// defaults (all fees zero) when the table is empty.
pub(crate) async fn load_or_create_logistics(
    conn: &mut SqliteConnection,
) -> DbResult<LogisticsConfig> {
    let existing = sqlx::query_as::<_, LogisticsConfig>(
        "SELECT * FROM logistics_config ORDER BY updated_at DESC LIMIT 1",
    )
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(config) = existing {
        return Ok(config);
    }

    let config = LogisticsConfig {
        id: Uuid::new_v4().to_string(),
        base_fee_cents: DEFAULT_LOGISTICS_BASE_FEE_CENTS,
        hourly_vehicle_fee_cents: DEFAULT_LOGISTICS_HOURLY_VEHICLE_FEE_CENTS,
        default_tolls_cents: DEFAULT_LOGISTICS_DEFAULT_TOLLS_CENTS,
        notes: None,
        updated_at: Utc::now(),
    };

    debug!("No logistics config found, creating defaults");

    sqlx::query(
        r#"
        INSERT INTO logistics_config (
            id, base_fee_cents, hourly_vehicle_fee_cents, default_tolls_cents, notes, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&config.id)
    .bind(config.base_fee_cents)
    .bind(config.hourly_vehicle_fee_cents)
    .bind(config.default_tolls_cents)
    .bind(&config.notes)
    .bind(config.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(config)
}

/// Loads the newest guarantee config row, inserting the documented
/// defaults (15%, taxed at 21%) when the table is empty.
pub(crate) async fn load_or_create_guarantee(
    conn: &mut SqliteConnection,
) -> DbResult<GuaranteeConfig> {
    let existing = sqlx::query_as::<_, GuaranteeConfig>(
        "SELECT * FROM guarantee_config ORDER BY updated_at DESC LIMIT 1",
    )
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(config) = existing {
        return Ok(config);
    }

    let config = GuaranteeConfig {
        id: Uuid::new_v4().to_string(),
        percentage_bps: DEFAULT_GUARANTEE_PERCENTAGE_BPS,
        apply_tax: DEFAULT_GUARANTEE_APPLY_TAX,
        tax_rate_bps: DEFAULT_GUARANTEE_TAX_RATE_BPS,
        updated_at: Utc::now(),
    };

    debug!("No guarantee config found, creating defaults");

    sqlx::query(
        r#"
        INSERT INTO guarantee_config (id, percentage_bps, apply_tax, tax_rate_bps, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&config.id)
    .bind(config.percentage_bps)
    .bind(config.apply_tax)
    .bind(config.tax_rate_bps)
    .bind(config.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(config)
}

/// Lists seasons ordered by start date (see [`ConfigRepository::seasons`]).
pub(crate) async fn list_seasons(conn: &mut SqliteConnection) -> DbResult<Vec<Season>> {
    let seasons = sqlx::query_as::<_, Season>("SELECT * FROM seasons ORDER BY start_date")
        .fetch_all(&mut *conn)
        .await?;

    Ok(seasons)
}
