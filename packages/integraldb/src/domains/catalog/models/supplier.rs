use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use crate::common::{Result, SupplierId};

/// A company that sells products.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Supplier {
    /// Insert a supplier, or update the existing one with the same name
    /// (case-insensitive). Contact fields only overwrite when provided.
    pub async fn upsert<'e>(
        name: &str,
        contact_email: Option<&str>,
        contact_phone: Option<&str>,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO suppliers (id, name, contact_email, contact_phone)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (lower(name)) DO UPDATE SET
                contact_email = COALESCE(EXCLUDED.contact_email, suppliers.contact_email),
                contact_phone = COALESCE(EXCLUDED.contact_phone, suppliers.contact_phone),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(SupplierId::new())
        .bind(name.trim())
        .bind(contact_email)
        .bind(contact_phone)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: SupplierId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM suppliers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_name(name: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM suppliers WHERE lower(name) = lower($1)")
            .bind(name.trim())
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Every supplier name, for entity recognition in queries.
    pub async fn all_names(pool: &PgPool) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT name FROM suppliers ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }
}
