//! # Catalog Repository
//!
//! The product read model consumed by the cart aggregate.
//!
//! Catalog management (CRUD, search, imagery) lives in a separate back
//! office; the order core only needs enough of the catalog to snapshot
//! pricing and guarantee flags into cart lines, plus insertion for
//! fixtures and tests.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbResult, ServiceResult};
use marquee_core::validation::validate_price_cents;
use marquee_core::{Product, ProductVariant};

/// Parameters for inserting a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub base_price_cents: i64,
    pub requires_guarantee: bool,
    pub units_per_box: i64,
}

/// Parameters for inserting a product variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProductVariant {
    pub product_id: String,
    pub color: Option<String>,
    pub material: Option<String>,
    pub price_override_cents: Option<i64>,
}

/// Repository for catalog lookups.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, base_price_cents,
                   requires_guarantee, units_per_box, is_active, created_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a variant by its ID.
    pub async fn get_variant(&self, id: &str) -> DbResult<Option<ProductVariant>> {
        let variant = sqlx::query_as::<_, ProductVariant>(
            "SELECT * FROM product_variants WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Inserts a new product.
    pub async fn insert_product(&self, new: NewProduct) -> ServiceResult<Product> {
        validate_price_cents(new.base_price_cents)?;

        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            base_price_cents: new.base_price_cents,
            requires_guarantee: new.requires_guarantee,
            units_per_box: new.units_per_box,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, base_price_cents,
                requires_guarantee, units_per_box, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.base_price_cents)
        .bind(product.requires_guarantee)
        .bind(product.units_per_box)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product variant.
    pub async fn insert_variant(&self, new: NewProductVariant) -> ServiceResult<ProductVariant> {
        if let Some(cents) = new.price_override_cents {
            validate_price_cents(cents)?;
        }

        let variant = ProductVariant {
            id: Uuid::new_v4().to_string(),
            product_id: new.product_id,
            color: new.color,
            material: new.material,
            price_override_cents: new.price_override_cents,
        };

        debug!(id = %variant.id, product_id = %variant.product_id, "Inserting variant");

        sqlx::query(
            r#"
            INSERT INTO product_variants (id, product_id, color, material, price_override_cents)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.color)
        .bind(&variant.material)
        .bind(variant.price_override_cents)
        .execute(&self.pool)
        .await?;

        Ok(variant)
    }
}
