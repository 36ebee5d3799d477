//! Question answering: route, retrieve, assemble, generate.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::context::{assemble_context, Source};
use super::retrieval::{
    PgStructuredRetriever, PgVectorRetriever, StructuredRetriever, VectorRetriever,
};
use super::router::{ModelRouter, QueryRouter, Route, RuleBasedRouter};
use crate::common::{PipelineError, Result};
use crate::config::RouterKind;
use crate::kernel::{BaseAI, PipelineDeps};

const ANSWER_PROMPT: &str = r#"You answer questions about suppliers and their products.

Use ONLY the context provided. Catalog entries are authoritative for prices, SKUs and contact details; document excerpts add descriptions and specifications.
If the context does not contain the answer, say that you don't have that information. Do not guess.
Mention the supplier and source document for the facts you use."#;

pub const INSUFFICIENT_INFORMATION: &str =
    "I don't have enough information in the catalog or documents to answer that.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Answered {
        answer: String,
        sources: Vec<Source>,
        route: Route,
    },
    /// Nothing was retrieved, so no answer was generated
    InsufficientInformation { route: Route },
}

impl QueryOutcome {
    pub fn answer_text(&self) -> &str {
        match self {
            QueryOutcome::Answered { answer, .. } => answer,
            QueryOutcome::InsufficientInformation { .. } => INSUFFICIENT_INFORMATION,
        }
    }
}

pub struct QueryEngine {
    ai: Arc<dyn BaseAI>,
    router: Arc<dyn QueryRouter>,
    structured: Arc<dyn StructuredRetriever>,
    vector: Arc<dyn VectorRetriever>,
    context_char_budget: usize,
}

impl QueryEngine {
    pub fn new(
        ai: Arc<dyn BaseAI>,
        router: Arc<dyn QueryRouter>,
        structured: Arc<dyn StructuredRetriever>,
        vector: Arc<dyn VectorRetriever>,
        context_char_budget: usize,
    ) -> Self {
        Self {
            ai,
            router,
            structured,
            vector,
            context_char_budget,
        }
    }

    /// Postgres-backed retrievers and the configured router.
    pub fn from_deps(deps: &PipelineDeps) -> Self {
        let config = &deps.config;
        let router: Arc<dyn QueryRouter> = match config.query_router {
            RouterKind::Rules => Arc::new(RuleBasedRouter::new()),
            RouterKind::Model => Arc::new(ModelRouter::new(deps.ai.clone())),
        };
        Self::new(
            deps.ai.clone(),
            router,
            Arc::new(PgStructuredRetriever::new(deps.db_pool.clone())),
            Arc::new(PgVectorRetriever::new(
                deps.db_pool.clone(),
                deps.embeddings.clone(),
                config.match_threshold,
                config.match_count,
            )),
            config.context_char_budget,
        )
    }

    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str) -> Result<QueryOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::SchemaValidation("question is empty".into()));
        }

        let known = self.structured.known_entities().await?;
        let plan = self.router.plan(question, &known).await;
        let mut failures: Vec<PipelineError> = Vec::new();

        let mut facts = Vec::new();
        if plan.route.uses_structured() {
            match self.structured.lookup(&plan).await {
                Ok(found) => facts = found,
                Err(e) if e.is_skippable() => failures.push(e),
                Err(e) => return Err(e),
            }
        }

        // A catalog miss still deserves a look through the documents.
        let search_documents = plan.route.uses_vector() || facts.is_empty();
        let mut chunks = Vec::new();
        if search_documents {
            match self.vector.search(&plan.vector_query).await {
                Ok(found) => chunks = found,
                Err(e) if e.is_skippable() => failures.push(e),
                Err(e) => return Err(e),
            }
        }

        let context = assemble_context(&facts, &chunks, self.context_char_budget);
        info!(
            route = ?plan.route,
            facts = facts.len(),
            chunks = chunks.len(),
            dropped_chunks = context.dropped_chunks,
            "Context assembled"
        );

        if context.is_empty() {
            // Retrieval errors are only worth surfacing when they left us with nothing.
            if let Some(error) = failures.into_iter().next() {
                return Err(error);
            }
            return Ok(QueryOutcome::InsufficientInformation { route: plan.route });
        }
        for failure in &failures {
            warn!(error = %failure, "Retrieval path failed, answering from the other");
        }

        let user = format!("Context:\n{}\nQuestion: {}", context.text, question);
        let answer = self.ai.complete(ANSWER_PROMPT, &user).await?;

        Ok(QueryOutcome::Answered {
            answer: answer.trim().to_string(),
            sources: context.sources,
            route: plan.route,
        })
    }
}
