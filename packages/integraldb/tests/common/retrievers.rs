//! In-memory retrievers for exercising the query engine without Postgres.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use integraldb_core::common::{PipelineError, Result};
use integraldb_core::domains::catalog::models::ProductFact;
use integraldb_core::domains::documents::models::ChunkMatch;
use integraldb_core::domains::query::{KnownEntities, SearchPlan, StructuredRetriever, VectorRetriever};

#[derive(Default)]
pub struct StubCatalog {
    pub known: KnownEntities,
    pub facts: Vec<ProductFact>,
    failure: Mutex<Option<PipelineError>>,
    plans: Mutex<Vec<SearchPlan>>,
}

impl StubCatalog {
    pub fn with_known(mut self, known: KnownEntities) -> Self {
        self.known = known;
        self
    }

    pub fn with_fact(mut self, fact: ProductFact) -> Self {
        self.known.supplier_names.push(fact.supplier_name.clone());
        self.known.product_names.push(fact.product_name.clone());
        if let Some(sku) = &fact.sku {
            self.known.skus.push(sku.clone());
        }
        self.facts.push(fact);
        self
    }

    pub fn failing(self, error: PipelineError) -> Self {
        *self.failure.lock().unwrap() = Some(error);
        self
    }

    pub fn lookups(&self) -> usize {
        self.plans.lock().unwrap().len()
    }
}

#[async_trait]
impl StructuredRetriever for StubCatalog {
    async fn known_entities(&self) -> Result<KnownEntities> {
        Ok(self.known.clone())
    }

    async fn lookup(&self, plan: &SearchPlan) -> Result<Vec<ProductFact>> {
        self.plans.lock().unwrap().push(plan.clone());
        if let Some(error) = self.failure.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self
            .facts
            .iter()
            .filter(|f| {
                plan.skus
                    .iter()
                    .any(|s| f.sku.as_deref().is_some_and(|sku| sku.eq_ignore_ascii_case(s)))
                    || plan.product_terms.iter().any(|p| p == &f.product_name)
                    || plan.supplier_terms.iter().any(|s| s == &f.supplier_name)
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct StubDocuments {
    chunks: Vec<ChunkMatch>,
    failure: Mutex<Option<PipelineError>>,
    queries: Mutex<Vec<String>>,
}

impl StubDocuments {
    pub fn with_chunk(mut self, chunk: ChunkMatch) -> Self {
        self.chunks.push(chunk);
        self
    }

    pub fn failing(self, error: PipelineError) -> Self {
        *self.failure.lock().unwrap() = Some(error);
        self
    }

    pub fn searches(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl VectorRetriever for StubDocuments {
    async fn search(&self, query: &str) -> Result<Vec<ChunkMatch>> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(error) = self.failure.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.chunks.clone())
    }
}
