//! Extraction stage: staged email bodies and PDF attachments → suppliers and products.
//!
//! Pipeline per document: Read text → Ask for `ExtractedSupplierData` →
//! Validate → Upsert supplier and products in one transaction.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{error, info, instrument};

use crate::common::{PipelineError, Result};
use crate::domains::catalog::models::{NewProduct, Product, Supplier};
use crate::domains::documents::pdf::{content_hash, sanitize_text, source_name, PdfFile};
use crate::domains::ingestion::models::EmailRecord;
use crate::domains::pipeline::{ProcessedDocument, SkippedRecord, Stage};
use crate::kernel::{extract_structured, PipelineDeps};

/// Longest text sent for extraction; the rest is dropped.
const MAX_EXTRACTION_CHARS: usize = 48_000;

// =============================================================================
// LLM Response Types
// =============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractedSupplierData {
    /// Name of the company selling the products
    pub supplier_name: Option<String>,
    /// Supplier contact email address, if stated
    pub contact_email: Option<String>,
    /// Supplier contact phone number, if stated
    pub contact_phone: Option<String>,
    /// Every product offered in the document
    pub products: Vec<ExtractedProduct>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractedProduct {
    pub product_name: String,
    /// Unit price as a plain number, without currency symbol
    pub price: Option<f64>,
    /// Stock keeping unit / part number exactly as written
    pub sku: Option<String>,
    /// Dimensions, materials, ratings and other technical details
    pub specifications: Option<String>,
}

const EXTRACTION_PROMPT: &str = r#"You extract supplier and product data from business emails and supplier documents (price lists, quotes, catalogs, spec sheets).

## Rules
- supplier_name is the company SELLING the products, not the recipient
- List every distinct product mentioned with a name
- price is the unit price as a number; null when not stated
- sku is the part number / item code exactly as written; null when not stated
- specifications collects technical details (size, material, capacity, certifications) as one short text; null when none
- Never invent values that are not in the text
- If the document contains no supplier or no products, return supplier_name null and an empty products list"#;

/// Extraction output after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSupplier {
    pub supplier_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub products: Vec<ValidatedProduct>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedProduct {
    pub product_name: String,
    pub price: Option<Decimal>,
    pub sku: Option<String>,
    pub specifications: Option<String>,
}

impl ExtractedSupplierData {
    /// Reject output with no supplier, no products, or impossible prices.
    pub fn validate(self) -> Result<ValidatedSupplier> {
        let supplier_name = clean(self.supplier_name).ok_or_else(|| {
            PipelineError::SchemaValidation("extraction returned no supplier name".into())
        })?;

        let mut products: Vec<ValidatedProduct> = Vec::with_capacity(self.products.len());
        for product in self.products {
            let Some(product_name) = clean(Some(product.product_name)) else {
                continue;
            };
            let price = match product.price {
                None => None,
                Some(p) if p.is_finite() && p >= 0.0 => {
                    Decimal::from_f64(p).map(|d| d.round_dp(2))
                }
                Some(p) => {
                    return Err(PipelineError::SchemaValidation(format!(
                        "invalid price {} for '{}'",
                        p, product_name
                    )))
                }
            };
            // Later mentions of the same product refine earlier ones.
            products.retain(|p| !p.product_name.eq_ignore_ascii_case(&product_name));
            products.push(ValidatedProduct {
                product_name,
                price,
                sku: clean(product.sku),
                specifications: clean(product.specifications),
            });
        }

        if products.is_empty() {
            return Err(PipelineError::SchemaValidation(format!(
                "extraction for '{}' returned no products",
                supplier_name
            )));
        }

        Ok(ValidatedSupplier {
            supplier_name,
            contact_email: clean(self.contact_email),
            contact_phone: clean(self.contact_phone),
            products,
        })
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

// =============================================================================
// Stage
// =============================================================================

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub records: usize,
    pub documents: usize,
    pub extracted: usize,
    pub already_processed: usize,
    pub empty: usize,
    pub skipped: usize,
    pub products_written: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    Extracted { products: usize },
    AlreadyProcessed,
    Empty,
}

/// Run extraction over every staged record.
#[instrument(skip(deps))]
pub async fn extract_staged_records(deps: &PipelineDeps) -> Result<ExtractReport> {
    let staged = EmailRecord::read_staged(&deps.config.staging_path()).await?;
    let mut report = ExtractReport {
        records: staged.records.len(),
        ..Default::default()
    };

    for bad in &staged.malformed {
        let record_id = format!("emails.jsonl:{}", bad.line);
        SkippedRecord::record(Stage::Extract, &record_id, &bad.error, &deps.db_pool).await?;
        report.skipped += 1;
    }

    for record in &staged.records {
        let body = record.body_document();
        tally(deps, &mut report, &body, extract_body(deps, record).await).await?;

        for path in &record.attachment_paths {
            let name = source_name(path);
            let outcome = match PdfFile::open(path).await {
                Ok(pdf) => extract_pdf(deps, record, pdf).await,
                Err(e) => Err(e),
            };
            tally(deps, &mut report, &name, outcome).await?;
        }
    }

    info!(
        records = report.records,
        documents = report.documents,
        extracted = report.extracted,
        skipped = report.skipped,
        products = report.products_written,
        "Extraction stage finished"
    );
    Ok(report)
}

async fn tally(
    deps: &PipelineDeps,
    report: &mut ExtractReport,
    document: &str,
    outcome: Result<ExtractOutcome>,
) -> Result<()> {
    report.documents += 1;
    match outcome {
        Ok(ExtractOutcome::Extracted { products }) => {
            report.extracted += 1;
            report.products_written += products;
        }
        Ok(ExtractOutcome::AlreadyProcessed) => report.already_processed += 1,
        Ok(ExtractOutcome::Empty) => report.empty += 1,
        Err(e) if e.is_skippable() => {
            if matches!(e, PipelineError::ForeignKeyViolation { .. }) {
                error!(document, error = %e, "Product write rejected: supplier missing");
            }
            SkippedRecord::record(Stage::Extract, document, &e, &deps.db_pool).await?;
            report.skipped += 1;
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

async fn extract_body(deps: &PipelineDeps, record: &EmailRecord) -> Result<ExtractOutcome> {
    let text = sanitize_text(&record.body);
    let hash = content_hash(text.as_bytes());
    extract_document(deps, record, &record.body_document(), &hash, move || async move {
        Ok(text)
    })
    .await
}

async fn extract_pdf(
    deps: &PipelineDeps,
    record: &EmailRecord,
    pdf: PdfFile,
) -> Result<ExtractOutcome> {
    let name = pdf.name.clone();
    let hash = pdf.content_hash.clone();
    extract_document(deps, record, &name, &hash, || pdf.extract_text()).await
}

/// Extract one document unless this exact content was handled before.
///
/// `load_text` runs only when extraction is actually needed.
#[instrument(skip(deps, record, content_hash, load_text), fields(record_id = %record.id))]
async fn extract_document<F, Fut>(
    deps: &PipelineDeps,
    record: &EmailRecord,
    document: &str,
    content_hash: &str,
    load_text: F,
) -> Result<ExtractOutcome>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<String>>,
{
    let pool = &deps.db_pool;
    if ProcessedDocument::is_current(Stage::Extract, document, content_hash, pool).await? {
        return Ok(ExtractOutcome::AlreadyProcessed);
    }

    let text = load_text().await?;
    if text.is_empty() {
        ProcessedDocument::mark(Stage::Extract, document, content_hash, pool).await?;
        return Ok(ExtractOutcome::Empty);
    }

    let prompt = user_prompt(record, document, &text);
    let extracted: ExtractedSupplierData =
        extract_structured(deps.ai.as_ref(), EXTRACTION_PROMPT, &prompt).await?;
    let supplier = extracted.validate()?;

    let written = store_supplier(deps, &supplier, document, Some(&record.id)).await?;
    ProcessedDocument::mark(Stage::Extract, document, content_hash, pool).await?;

    info!(
        document,
        supplier = %supplier.supplier_name,
        products = written,
        "Extracted supplier data"
    );
    Ok(ExtractOutcome::Extracted { products: written })
}

/// Upsert a supplier and its products atomically.
pub async fn store_supplier(
    deps: &PipelineDeps,
    supplier: &ValidatedSupplier,
    source_document: &str,
    source_email_id: Option<&str>,
) -> Result<usize> {
    let mut tx = deps.db_pool.begin().await?;

    let stored = Supplier::upsert(
        &supplier.supplier_name,
        supplier.contact_email.as_deref(),
        supplier.contact_phone.as_deref(),
        &mut *tx,
    )
    .await?;

    for product in &supplier.products {
        let new_product = NewProduct {
            supplier_id: stored.id,
            product_name: product.product_name.clone(),
            price: product.price,
            sku: product.sku.clone(),
            specifications: product.specifications.clone(),
            source_document: source_document.to_string(),
            source_email_id: source_email_id.map(str::to_string),
        };
        Product::upsert(&new_product, &mut *tx).await?;
    }

    tx.commit().await?;
    Ok(supplier.products.len())
}

fn user_prompt(record: &EmailRecord, document: &str, text: &str) -> String {
    let text: String = text.chars().take(MAX_EXTRACTION_CHARS).collect();
    format!(
        "Email from: {}\nSubject: {}\nDocument: {}\n\n---\n\n{}",
        record.sender, record.subject, document, text
    )
}
