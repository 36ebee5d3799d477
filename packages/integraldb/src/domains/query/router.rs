//! Query classification: which retrieval paths a question needs.
//!
//! Routers are strategies behind [`QueryRouter`]. Both produce a
//! [`SearchPlan`] naming the route and the terms each path searches with.

use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::common::Result;
use crate::domains::catalog::models::{Product, Supplier};
use crate::kernel::{extract_structured, BaseAI};

/// Which retrieval paths to run: the catalog lookup, the similarity
/// search over document chunks, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Structured,
    Vector,
    Both,
}

impl Route {
    pub fn uses_structured(&self) -> bool {
        matches!(self, Route::Structured | Route::Both)
    }

    pub fn uses_vector(&self) -> bool {
        matches!(self, Route::Vector | Route::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPlan {
    pub route: Route,
    pub skus: Vec<String>,
    pub product_terms: Vec<String>,
    pub supplier_terms: Vec<String>,
    /// Text embedded for the similarity search
    pub vector_query: String,
}

impl SearchPlan {
    pub fn vector_only(question: &str) -> Self {
        Self {
            route: Route::Vector,
            skus: Vec::new(),
            product_terms: Vec::new(),
            supplier_terms: Vec::new(),
            vector_query: question.trim().to_string(),
        }
    }

    pub fn has_catalog_terms(&self) -> bool {
        !self.skus.is_empty() || !self.product_terms.is_empty() || !self.supplier_terms.is_empty()
    }

    /// A structured route with nothing to filter on can only come back
    /// empty, so it degrades to the vector path.
    fn normalized(mut self) -> Self {
        if self.route.uses_structured() && !self.has_catalog_terms() {
            self.route = Route::Vector;
        }
        if self.vector_query.trim().is_empty() && self.route.uses_vector() {
            self.route = Route::Structured;
        }
        self
    }
}

/// Catalog names a router can recognise in a question.
#[derive(Debug, Clone, Default)]
pub struct KnownEntities {
    pub supplier_names: Vec<String>,
    pub product_names: Vec<String>,
    pub skus: Vec<String>,
}

impl KnownEntities {
    pub async fn load(pool: &PgPool) -> Result<Self> {
        let supplier_names = Supplier::all_names(pool).await?;
        let (product_names, skus) = Product::known_identifiers(pool).await?;
        Ok(Self {
            supplier_names,
            product_names,
            skus,
        })
    }
}

#[async_trait]
pub trait QueryRouter: Send + Sync {
    async fn plan(&self, question: &str, known: &KnownEntities) -> SearchPlan;
}

// =============================================================================
// Rule-based router
// =============================================================================

lazy_static! {
    // Explicitly labelled codes: "SKU HB-200", "part no. 7731", "item #A12"
    static ref LABELED_SKU_REGEX: Regex = Regex::new(
        r"(?i)\b(?:sku|part\s*(?:no\.?|number|#)?|item\s*(?:no\.?|#)|model)\s*[:#]?\s*([A-Z0-9][A-Z0-9\-_/.]*\d[A-Z0-9\-_/]*)"
    ).unwrap();

    // Letters followed by two or more digits: "HB-200", "XJ9000", "ab123-c"
    static ref SHAPED_SKU_REGEX: Regex = Regex::new(
        r"\b[A-Za-z]{1,6}-?\d{2,}(?:-?[A-Za-z0-9]+)*\b"
    ).unwrap();
}

/// Phrases that ask for catalog facts.
const STRUCTURED_CUES: &[&str] = &[
    "price", "cost", "how much", "sku", "part number", "supplier", "vendor", "contact",
    "email", "phone", "who sells", "sold by",
];

/// Phrases that ask for explanation, which lives in document text.
const DESCRIPTIVE_CUES: &[&str] = &[
    "explain", "describe", "why", "how does", "how do", "how to", "compare", "difference",
    "recommend", "suitable", "feature", "specification", "material", "warranty",
    "certif", "tell me about", "used for",
];

/// Keyword and catalog-name heuristics.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedRouter;

impl RuleBasedRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, question: &str, known: &KnownEntities) -> SearchPlan {
        let lower = question.to_lowercase();
        let squashed = squash(question);

        let mut skus = Vec::new();
        for caps in LABELED_SKU_REGEX.captures_iter(question) {
            push_unique(&mut skus, caps[1].trim_end_matches(|c| c == '.' || c == '/'));
        }
        for m in SHAPED_SKU_REGEX.find_iter(question) {
            push_unique(&mut skus, m.as_str());
        }
        for sku in &known.skus {
            if contains_term(&lower, &squashed, sku) {
                push_unique(&mut skus, sku);
            }
        }

        // A catalog cue lets shortened names count: "hex bolts from Acme"
        // names "Hex Bolt M8" sold by "Acme Fasteners".
        let structured = STRUCTURED_CUES.iter().any(|cue| lower.contains(cue));
        let words = if structured { name_words(&lower) } else { Vec::new() };

        let mut product_terms = Vec::new();
        for name in &known.product_names {
            if contains_term(&lower, &squashed, name)
                || (structured && names_all_words(&words, name))
            {
                push_unique(&mut product_terms, name);
            }
        }

        let mut supplier_terms = Vec::new();
        for name in &known.supplier_names {
            if contains_term(&lower, &squashed, name)
                || (structured && names_lead_word(&words, name))
            {
                push_unique(&mut supplier_terms, name);
            }
        }

        let has_entity =
            !skus.is_empty() || !product_terms.is_empty() || !supplier_terms.is_empty();
        let descriptive = DESCRIPTIVE_CUES.iter().any(|cue| lower.contains(cue));

        let route = match (has_entity, descriptive) {
            (true, true) => Route::Both,
            (true, false) => Route::Structured,
            (false, _) => Route::Vector,
        };
        debug!(?route, has_entity, descriptive, structured, "Rule-based route");

        SearchPlan {
            route,
            skus,
            product_terms,
            supplier_terms,
            vector_query: question.trim().to_string(),
        }
        .normalized()
    }
}

#[async_trait]
impl QueryRouter for RuleBasedRouter {
    async fn plan(&self, question: &str, known: &KnownEntities) -> SearchPlan {
        self.classify(question, known)
    }
}

/// Lowercased alphanumerics only, so "HB 200", "hb-200" and "HB200" compare equal.
fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn contains_term(lower_question: &str, squashed_question: &str, term: &str) -> bool {
    let term_lower = term.trim().to_lowercase();
    if term_lower.chars().count() < 3 {
        return false;
    }
    if lower_question.contains(&term_lower) {
        return true;
    }
    let term_squashed = squash(term);
    term_squashed.chars().count() >= 4 && squashed_question.contains(&term_squashed)
}

/// Words that never identify a catalog entry on their own.
const FILLER_WORDS: &[&str] = &["the", "and", "for", "with", "inc", "ltd", "llc", "company"];

/// Alphabetic words of three or more letters, singular.
fn name_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3 && w.chars().all(char::is_alphabetic))
        .map(|w| singular(&w.to_lowercase()))
        .filter(|w| !FILLER_WORDS.contains(&w.as_str()))
        .collect()
}

fn singular(word: &str) -> String {
    match word.strip_suffix('s') {
        Some(stem) if stem.len() >= 3 && !stem.ends_with('s') => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Every word of the name appears in the question ("Hex Bolt M8" in
/// "hex bolts"). Codes such as "M8" are left to the SKU matchers.
fn names_all_words(question_words: &[String], name: &str) -> bool {
    let words = name_words(name);
    !words.is_empty() && words.iter().all(|w| question_words.contains(w))
}

/// The name's first word appears in the question ("Acme" for "Acme Fasteners").
fn names_lead_word(question_words: &[String], name: &str) -> bool {
    name_words(name)
        .first()
        .is_some_and(|lead| lead.chars().count() >= 4 && question_words.contains(lead))
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        values.push(value.to_string());
    }
}

// =============================================================================
// Model router
// =============================================================================

/// Search plan as the generation service returns it.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RoutingDecision {
    /// structured for catalog facts (prices, SKUs, suppliers), vector for
    /// explanations found in documents, both when the question needs both
    pub route: Route,
    /// Part numbers / SKUs mentioned in the question
    pub skus: Vec<String>,
    /// Product names mentioned in the question
    pub product_names: Vec<String>,
    /// Supplier / company names mentioned in the question
    pub supplier_names: Vec<String>,
    /// Question rewritten as a document search phrase
    pub search_text: Option<String>,
}

const ROUTING_PROMPT: &str = r#"You plan searches over a supplier catalog database and a library of supplier documents.

Choose the route:
- structured: the question asks for catalog facts such as price, SKU, or supplier contact details
- vector: the question asks for explanations, comparisons, or details only found in document text
- both: the question needs catalog facts and document text

Copy SKUs, product names and supplier names exactly as they appear in the question.
Never invent names that are not in the question."#;

/// Maximum catalog names listed in the routing prompt.
const MAX_PROMPT_NAMES: usize = 50;

/// Asks the generation service for a plan; any failure falls back to the
/// rule-based plan.
pub struct ModelRouter {
    ai: Arc<dyn BaseAI>,
    fallback: RuleBasedRouter,
}

impl ModelRouter {
    pub fn new(ai: Arc<dyn BaseAI>) -> Self {
        Self {
            ai,
            fallback: RuleBasedRouter::new(),
        }
    }
}

#[async_trait]
impl QueryRouter for ModelRouter {
    async fn plan(&self, question: &str, known: &KnownEntities) -> SearchPlan {
        let user = routing_user_prompt(question, known);
        match extract_structured::<RoutingDecision>(self.ai.as_ref(), ROUTING_PROMPT, &user).await
        {
            Ok(decision) => {
                let mut plan = SearchPlan {
                    route: decision.route,
                    skus: Vec::new(),
                    product_terms: Vec::new(),
                    supplier_terms: Vec::new(),
                    vector_query: decision
                        .search_text
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| question.trim().to_string()),
                };
                for sku in &decision.skus {
                    push_unique(&mut plan.skus, sku);
                }
                for name in &decision.product_names {
                    push_unique(&mut plan.product_terms, name);
                }
                for name in &decision.supplier_names {
                    push_unique(&mut plan.supplier_terms, name);
                }
                debug!(route = ?plan.route, "Model route");
                plan.normalized()
            }
            Err(e) => {
                warn!(error = %e, "Model routing failed, using rule-based plan");
                self.fallback.classify(question, known)
            }
        }
    }
}

fn routing_user_prompt(question: &str, known: &KnownEntities) -> String {
    let mut prompt = format!("Question: {}", question.trim());
    if !known.supplier_names.is_empty() {
        let names: Vec<&str> = known
            .supplier_names
            .iter()
            .take(MAX_PROMPT_NAMES)
            .map(String::as_str)
            .collect();
        prompt.push_str("\n\nKnown suppliers: ");
        prompt.push_str(&names.join(", "));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PipelineError;
    use crate::kernel::MockAI;

    fn known() -> KnownEntities {
        KnownEntities {
            supplier_names: vec!["Acme Fasteners".into(), "Northwind Tools".into()],
            product_names: vec!["Hex Bolt M8".into(), "Torque Wrench".into()],
            skus: vec!["HB-200".into(), "TW1150".into()],
        }
    }

    #[test]
    fn test_sku_question_routes_structured() {
        let plan = RuleBasedRouter::new().classify("What is the price of HB-200?", &known());
        assert_eq!(plan.route, Route::Structured);
        assert_eq!(plan.skus, vec!["HB-200".to_string()]);
    }

    #[test]
    fn test_unknown_sku_shape_still_routes_structured() {
        let plan = RuleBasedRouter::new()
            .classify("price for part no. ZX-9931", &KnownEntities::default());
        assert_eq!(plan.route, Route::Structured);
        assert_eq!(plan.skus, vec!["ZX-9931".to_string()]);
    }

    #[test]
    fn test_descriptive_question_without_entity_routes_vector() {
        let plan = RuleBasedRouter::new().classify(
            "Which coatings protect steel fasteners against corrosion outdoors?",
            &known(),
        );
        assert_eq!(plan.route, Route::Vector);
        assert!(!plan.has_catalog_terms());
    }

    #[test]
    fn test_entity_with_explanation_routes_both() {
        let plan = RuleBasedRouter::new()
            .classify("Explain the warranty on the Northwind Tools torque wrench", &known());
        assert_eq!(plan.route, Route::Both);
        assert_eq!(plan.supplier_terms, vec!["Northwind Tools".to_string()]);
        assert_eq!(plan.product_terms, vec!["Torque Wrench".to_string()]);
    }

    #[test]
    fn test_known_sku_matches_without_punctuation() {
        let plan = RuleBasedRouter::new().classify("do you stock tw 1150", &known());
        assert_eq!(plan.skus, vec!["TW1150".to_string()]);
        assert_eq!(plan.route, Route::Structured);
    }

    #[test]
    fn test_catalog_cue_matches_shortened_names() {
        let plan = RuleBasedRouter::new()
            .classify("What is the price of the hex bolts from Acme?", &known());
        assert_eq!(plan.route, Route::Structured);
        assert_eq!(plan.supplier_terms, vec!["Acme Fasteners".to_string()]);
        assert_eq!(plan.product_terms, vec!["Hex Bolt M8".to_string()]);
    }

    #[test]
    fn test_shortened_names_need_catalog_cue() {
        let plan = RuleBasedRouter::new()
            .classify("Are hex bolts from Acme galvanised or plated?", &known());
        assert_eq!(plan.route, Route::Vector);
        assert!(!plan.has_catalog_terms());
    }

    #[test]
    fn test_single_shared_word_does_not_name_product() {
        let plan = RuleBasedRouter::new().classify("How much is a bolt cutter?", &known());
        assert!(plan.product_terms.is_empty());
    }

    #[test]
    fn test_structured_route_without_terms_degrades_to_vector() {
        let plan = SearchPlan {
            route: Route::Structured,
            ..SearchPlan::vector_only("cheapest bolts")
        }
        .normalized();
        assert_eq!(plan.route, Route::Vector);
    }

    #[tokio::test]
    async fn test_model_router_uses_decision() {
        let ai = Arc::new(MockAI::new().with_structured_response(
            r#"{"route": "both", "skus": [], "product_names": ["Hex Bolt M8"],
                "supplier_names": [], "search_text": "hex bolt corrosion rating"}"#,
        ));
        let router = ModelRouter::new(ai.clone());
        let plan = router.plan("Is the M8 hex bolt rust proof?", &known()).await;

        assert_eq!(plan.route, Route::Both);
        assert_eq!(plan.product_terms, vec!["Hex Bolt M8".to_string()]);
        assert_eq!(plan.vector_query, "hex bolt corrosion rating");
        assert_eq!(ai.structured_calls()[0].schema_name, "RoutingDecision");
        assert!(ai.structured_calls()[0].user.contains("Acme Fasteners"));
    }

    #[tokio::test]
    async fn test_model_router_falls_back_to_rules() {
        let ai = Arc::new(
            MockAI::new().with_structured_error(PipelineError::Transient("timeout".into())),
        );
        let plan = ModelRouter::new(ai).plan("What is the price of HB-200?", &known()).await;
        assert_eq!(plan.route, Route::Structured);
        assert_eq!(plan.skus, vec!["HB-200".to_string()]);
    }
}
