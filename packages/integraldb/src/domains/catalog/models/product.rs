use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use crate::common::{ProductId, Result, SupplierId};

/// A product offered by a supplier. Unique per (supplier, product name).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub supplier_id: SupplierId,
    pub product_name: String,
    pub price: Option<Decimal>,
    pub sku: Option<String>,
    pub specifications: Option<String>,
    pub source_document: String,
    pub source_email_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a product write.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub supplier_id: SupplierId,
    pub product_name: String,
    pub price: Option<Decimal>,
    pub sku: Option<String>,
    pub specifications: Option<String>,
    pub source_document: String,
    pub source_email_id: Option<String>,
}

/// A product joined with its supplier, as the query stage reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductFact {
    pub product_name: String,
    pub price: Option<Decimal>,
    pub sku: Option<String>,
    pub specifications: Option<String>,
    pub source_document: String,
    pub supplier_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

impl Product {
    /// Insert or update by (supplier, product name).
    ///
    /// A `supplier_id` with no matching supplier fails with
    /// `PipelineError::ForeignKeyViolation`.
    pub async fn upsert<'e>(product: &NewProduct, executor: impl PgExecutor<'e>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO products
                (id, supplier_id, product_name, price, sku, specifications, source_document, source_email_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (supplier_id, product_name) DO UPDATE SET
                price = COALESCE(EXCLUDED.price, products.price),
                sku = COALESCE(EXCLUDED.sku, products.sku),
                specifications = COALESCE(EXCLUDED.specifications, products.specifications),
                source_document = EXCLUDED.source_document,
                source_email_id = COALESCE(EXCLUDED.source_email_id, products.source_email_id),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(ProductId::new())
        .bind(product.supplier_id)
        .bind(product.product_name.trim())
        .bind(product.price)
        .bind(product.sku.as_deref())
        .bind(product.specifications.as_deref())
        .bind(&product.source_document)
        .bind(product.source_email_id.as_deref())
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_supplier(supplier_id: SupplierId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM products WHERE supplier_id = $1 ORDER BY product_name",
        )
        .bind(supplier_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Every product name and SKU, for entity recognition in queries.
    pub async fn known_identifiers(pool: &PgPool) -> Result<(Vec<String>, Vec<String>)> {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT product_name, sku FROM products")
                .fetch_all(pool)
                .await?;

        let mut names = Vec::with_capacity(rows.len());
        let mut skus = Vec::new();
        for (name, sku) in rows {
            names.push(name);
            if let Some(sku) = sku.filter(|s| !s.trim().is_empty()) {
                skus.push(sku);
            }
        }
        Ok((names, skus))
    }
}

/// Filters for a structured catalog lookup. Empty lists mean "no filter".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    /// Exact SKUs, compared case-insensitively
    pub skus: Vec<String>,
    /// `ILIKE` patterns matched against product names
    pub name_patterns: Vec<String>,
    /// `ILIKE` patterns matched against supplier names
    pub supplier_patterns: Vec<String>,
}

impl CatalogFilter {
    pub fn is_empty(&self) -> bool {
        self.skus.is_empty() && self.name_patterns.is_empty() && self.supplier_patterns.is_empty()
    }
}

impl ProductFact {
    /// Products matching any SKU or name pattern, restricted to matching
    /// suppliers when supplier patterns are given.
    pub async fn search(filter: &CatalogFilter, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }

        let skus: Option<Vec<String>> = non_empty(
            filter.skus.iter().map(|s| s.trim().to_uppercase()).collect(),
        );
        let names = non_empty(filter.name_patterns.clone());
        let suppliers = non_empty(filter.supplier_patterns.clone());

        sqlx::query_as::<_, Self>(
            r#"
            SELECT
                p.product_name, p.price, p.sku, p.specifications, p.source_document,
                s.name AS supplier_name, s.contact_email, s.contact_phone
            FROM products p
            JOIN suppliers s ON s.id = p.supplier_id
            WHERE (
                    ($1::text[] IS NULL AND $2::text[] IS NULL)
                    OR upper(p.sku) = ANY($1::text[])
                    OR p.product_name ILIKE ANY($2::text[])
                  )
              AND ($3::text[] IS NULL OR s.name ILIKE ANY($3::text[]))
            ORDER BY p.updated_at DESC
            LIMIT $4
            "#,
        )
        .bind(skus)
        .bind(names)
        .bind(suppliers)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}
