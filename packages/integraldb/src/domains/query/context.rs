//! Assembles retrieved facts and chunks into a bounded prompt context.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domains::catalog::models::ProductFact;
use crate::domains::documents::models::ChunkMatch;

/// Where a piece of included context came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    Catalog {
        supplier: String,
        product: String,
        source_document: String,
    },
    Document {
        source_document: String,
        chunk_index: i32,
        similarity: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        supplier: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    pub sources: Vec<Source>,
    /// Chunks left out because the budget ran out
    pub dropped_chunks: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Build the context within `char_budget` characters.
///
/// Catalog facts go first, then chunks in rank order. Once a chunk does not
/// fit, it and every lower-ranked chunk are dropped. A fact that does not
/// fit is dropped the same way. The first block is cut down to the budget
/// instead of dropped, so one oversized fact or chunk never leaves the
/// context empty.
pub fn assemble_context(
    facts: &[ProductFact],
    chunks: &[ChunkMatch],
    char_budget: usize,
) -> AssembledContext {
    let mut text = String::new();
    let mut used = 0;
    let mut sources = Vec::new();

    for (i, fact) in facts.iter().enumerate() {
        let Some(block) = fit(format_fact(fact), used, char_budget) else {
            debug!(
                dropped_facts = facts.len() - i,
                char_budget, "Context budget exhausted by catalog facts"
            );
            break;
        };
        used += block.chars().count();
        text.push_str(&block);
        sources.push(Source::Catalog {
            supplier: fact.supplier_name.clone(),
            product: fact.product_name.clone(),
            source_document: fact.source_document.clone(),
        });
    }

    let mut ranked: Vec<&ChunkMatch> = chunks.iter().collect();
    ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    let mut included = 0;
    for chunk in &ranked {
        let Some(block) = fit(format_chunk(chunk), used, char_budget) else {
            break;
        };
        used += block.chars().count();
        text.push_str(&block);
        included += 1;
        sources.push(Source::Document {
            source_document: chunk.source_document.clone(),
            chunk_index: chunk.chunk_index,
            similarity: chunk.similarity,
            supplier: chunk.supplier_name.clone(),
        });
    }

    let dropped_chunks = ranked.len() - included;
    if dropped_chunks > 0 {
        debug!(dropped_chunks, char_budget, "Context budget exhausted by chunks");
    }

    AssembledContext {
        text,
        sources,
        dropped_chunks,
    }
}

/// The block as it fits after `used` characters, if it fits at all.
fn fit(block: String, used: usize, char_budget: usize) -> Option<String> {
    let len = block.chars().count();
    if used + len <= char_budget {
        return Some(block);
    }
    if used > 0 || char_budget == 0 {
        return None;
    }
    warn!(
        block_chars = len,
        char_budget, "First context block exceeds the budget, truncating"
    );
    Some(block.chars().take(char_budget).collect())
}

fn format_fact(fact: &ProductFact) -> String {
    let mut block = String::from("[catalog]\n");
    push_field(&mut block, "supplier", Some(&fact.supplier_name));
    push_field(&mut block, "product", Some(&fact.product_name));
    push_field(&mut block, "sku", fact.sku.as_deref());
    push_field(&mut block, "price", fact.price.map(format_price).as_deref());
    push_field(&mut block, "specifications", fact.specifications.as_deref());
    push_field(&mut block, "contact_email", fact.contact_email.as_deref());
    push_field(&mut block, "contact_phone", fact.contact_phone.as_deref());
    push_field(&mut block, "source", Some(&fact.source_document));
    block.push('\n');
    block
}

fn format_chunk(chunk: &ChunkMatch) -> String {
    let supplier = chunk
        .supplier_name
        .as_deref()
        .map(|name| format!(" supplier {}", name))
        .unwrap_or_default();
    format!(
        "[document: {} #{}{} similarity {:.2}]\n{}\n\n",
        chunk.source_document,
        chunk.chunk_index,
        supplier,
        chunk.similarity,
        chunk.content.trim()
    )
}

fn push_field(block: &mut String, key: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        block.push_str(key);
        block.push_str(": ");
        block.push_str(value);
        block.push('\n');
    }
}

fn format_price(price: Decimal) -> String {
    price.round_dp(2).to_string()
}
