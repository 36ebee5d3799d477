//! Hybrid question answering over the catalog and document chunks.

pub mod context;
pub mod engine;
pub mod retrieval;
pub mod router;

pub use context::{assemble_context, AssembledContext, Source};
pub use engine::{QueryEngine, QueryOutcome, INSUFFICIENT_INFORMATION};
pub use retrieval::{
    PgStructuredRetriever, PgVectorRetriever, StructuredRetriever, VectorRetriever,
};
pub use router::{
    KnownEntities, ModelRouter, QueryRouter, Route, RuleBasedRouter, SearchPlan,
};
