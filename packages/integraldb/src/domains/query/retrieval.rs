//! The two retrieval paths: catalog lookup and chunk similarity search.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::router::{KnownEntities, SearchPlan};
use crate::common::Result;
use crate::domains::catalog::models::{CatalogFilter, ProductFact};
use crate::domains::documents::models::{ChunkMatch, DocumentChunk};
use crate::kernel::BaseEmbeddingService;

/// Upper bound on catalog rows per question.
const MAX_FACTS: i64 = 25;

#[async_trait]
pub trait StructuredRetriever: Send + Sync {
    /// Names and SKUs currently in the catalog, for routing.
    async fn known_entities(&self) -> Result<KnownEntities>;

    async fn lookup(&self, plan: &SearchPlan) -> Result<Vec<ProductFact>>;
}

#[async_trait]
pub trait VectorRetriever: Send + Sync {
    /// Chunks most similar to `query`, best first.
    async fn search(&self, query: &str) -> Result<Vec<ChunkMatch>>;
}

// =============================================================================
// Catalog lookup
// =============================================================================

pub struct PgStructuredRetriever {
    pool: PgPool,
}

impl PgStructuredRetriever {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StructuredRetriever for PgStructuredRetriever {
    async fn known_entities(&self) -> Result<KnownEntities> {
        KnownEntities::load(&self.pool).await
    }

    #[instrument(
        skip(self, plan),
        fields(skus = plan.skus.len(), products = plan.product_terms.len())
    )]
    async fn lookup(&self, plan: &SearchPlan) -> Result<Vec<ProductFact>> {
        let filter = catalog_filter(plan);
        if filter.is_empty() {
            return Ok(Vec::new());
        }
        let facts = ProductFact::search(&filter, MAX_FACTS, &self.pool).await?;
        debug!(facts = facts.len(), "Catalog lookup finished");
        Ok(facts)
    }
}

/// Turn plan terms into lookup filters. Product names are matched through
/// their spelling variants; supplier names by substring.
pub fn catalog_filter(plan: &SearchPlan) -> CatalogFilter {
    let mut name_patterns = Vec::new();
    for term in &plan.product_terms {
        for variant in product_name_variants(term) {
            let pattern = ilike_contains(&variant);
            if !name_patterns.contains(&pattern) {
                name_patterns.push(pattern);
            }
        }
    }

    CatalogFilter {
        skus: plan.skus.clone(),
        name_patterns,
        supplier_patterns: plan.supplier_terms.iter().map(|s| ilike_contains(s)).collect(),
    }
}

/// Spellings a product name is commonly written in: as given, lowercased,
/// without spaces, and hyphenated.
pub fn product_name_variants(name: &str) -> Vec<String> {
    let name = name.trim();
    if name.is_empty() {
        return Vec::new();
    }
    let words: Vec<&str> = name.split_whitespace().collect();
    let candidates = [
        name.to_string(),
        name.to_lowercase(),
        words.concat(),
        words.join("-"),
    ];

    let mut variants: Vec<String> = Vec::new();
    for candidate in candidates {
        if !variants.iter().any(|v| v.eq_ignore_ascii_case(&candidate)) {
            variants.push(candidate);
        }
    }
    variants
}

/// `%term%` with `LIKE` wildcards in the term escaped.
pub fn ilike_contains(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

// =============================================================================
// Similarity search
// =============================================================================

pub struct PgVectorRetriever {
    pool: PgPool,
    embeddings: Arc<dyn BaseEmbeddingService>,
    threshold: f64,
    count: i32,
}

impl PgVectorRetriever {
    pub fn new(
        pool: PgPool,
        embeddings: Arc<dyn BaseEmbeddingService>,
        threshold: f64,
        count: i32,
    ) -> Self {
        Self {
            pool,
            embeddings,
            threshold,
            count,
        }
    }
}

#[async_trait]
impl VectorRetriever for PgVectorRetriever {
    #[instrument(skip(self, query))]
    async fn search(&self, query: &str) -> Result<Vec<ChunkMatch>> {
        let embedding = self.embeddings.generate(query).await?;
        let matches =
            DocumentChunk::match_chunks(&embedding, self.threshold, self.count, &self.pool).await?;
        debug!(
            matches = matches.len(),
            threshold = self.threshold,
            "Similarity search finished"
        );
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::query::router::Route;

    #[test]
    fn test_product_name_variants() {
        assert_eq!(
            product_name_variants("Hex Bolt M8"),
            vec!["Hex Bolt M8", "HexBoltM8", "Hex-Bolt-M8"]
        );
        assert_eq!(product_name_variants("washer"), vec!["washer"]);
        assert!(product_name_variants("  ").is_empty());
    }

    #[test]
    fn test_ilike_pattern_escapes_wildcards() {
        assert_eq!(ilike_contains("Hex Bolt"), "%Hex Bolt%");
        assert_eq!(ilike_contains("100%_cotton"), "%100\\%\\_cotton%");
    }

    #[test]
    fn test_catalog_filter_from_plan() {
        let plan = SearchPlan {
            route: Route::Structured,
            skus: vec!["HB-200".into()],
            product_terms: vec!["Torque Wrench".into()],
            supplier_terms: vec!["Acme".into()],
            vector_query: String::new(),
        };
        let filter = catalog_filter(&plan);

        assert_eq!(filter.skus, vec!["HB-200".to_string()]);
        assert_eq!(
            filter.name_patterns,
            vec!["%Torque Wrench%", "%TorqueWrench%", "%Torque-Wrench%"]
        );
        assert_eq!(filter.supplier_patterns, vec!["%Acme%".to_string()]);
    }

    #[test]
    fn test_empty_plan_gives_empty_filter() {
        assert!(catalog_filter(&SearchPlan::vector_only("why")).is_empty());
    }
}
