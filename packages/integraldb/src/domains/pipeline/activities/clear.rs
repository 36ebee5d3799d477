use sqlx::PgPool;
use tracing::info;

use crate::common::{PipelineError, Result};
use crate::domains::pipeline::{ProcessedDocument, Stage};

/// Tables `clear` may empty, children before parents.
pub const CLEARABLE_TABLES: &[&str] = &[
    "document_chunks",
    "products",
    "suppliers",
    "processed_documents",
    "pipeline_skips",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearedTable {
    pub table: &'static str,
    pub rows: u64,
}

/// Map operator-supplied names onto [`CLEARABLE_TABLES`], deduplicated and in
/// foreign-key order.
pub fn resolve_tables<S: AsRef<str>>(names: &[S]) -> Result<Vec<&'static str>> {
    let mut selected: Vec<&'static str> = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        let Some(known) = CLEARABLE_TABLES.iter().find(|t| **t == name) else {
            return Err(PipelineError::Config(format!(
                "unknown table '{}', expected one of: {}",
                name,
                CLEARABLE_TABLES.join(", ")
            )));
        };
        if !selected.contains(known) {
            selected.push(*known);
        }
    }
    selected.sort_by_key(|t| CLEARABLE_TABLES.iter().position(|c| c == t));
    Ok(selected)
}

/// Stage whose markers describe rows held in `table`.
///
/// Once those rows are gone the markers would make the next run skip the
/// documents that produced them.
fn stage_for(table: &str) -> Option<Stage> {
    match table {
        "document_chunks" => Some(Stage::Embed),
        "products" | "suppliers" => Some(Stage::Extract),
        _ => None,
    }
}

/// Delete every row from `tables` in one transaction, dropping the
/// processed-document markers of the stages that produced them.
pub async fn clear_tables(tables: &[&'static str], pool: &PgPool) -> Result<Vec<ClearedTable>> {
    let mut tx = pool.begin().await?;
    let mut cleared = Vec::with_capacity(tables.len());
    let mut reset: Vec<Stage> = Vec::new();

    for &table in tables {
        if !CLEARABLE_TABLES.contains(&table) {
            return Err(PipelineError::Config(format!("table '{}' cannot be cleared", table)));
        }
        // Names come from CLEARABLE_TABLES, never from user input directly.
        let result = sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *tx)
            .await?;
        cleared.push(ClearedTable {
            table,
            rows: result.rows_affected(),
        });

        if let Some(stage) = stage_for(table) {
            if !reset.contains(&stage) {
                let markers = ProcessedDocument::reset(stage, &mut *tx).await?;
                info!(table, %stage, markers, "Reset processed-document markers");
                reset.push(stage);
            }
        }
    }

    tx.commit().await?;
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_orders_children_first() {
        let tables = resolve_tables(&["suppliers", " document_chunks", "suppliers"]).unwrap();
        assert_eq!(tables, vec!["document_chunks", "suppliers"]);
    }

    #[test]
    fn test_resolve_rejects_unknown_table() {
        let err = resolve_tables(&["users"]).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_stage_for_tables() {
        assert_eq!(stage_for("document_chunks"), Some(Stage::Embed));
        assert_eq!(stage_for("products"), Some(Stage::Extract));
        assert_eq!(stage_for("suppliers"), Some(Stage::Extract));
        assert_eq!(stage_for("pipeline_skips"), None);
    }
}
