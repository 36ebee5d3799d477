pub mod extract;

pub use extract::{
    extract_staged_records, store_supplier, ExtractOutcome, ExtractReport, ExtractedProduct,
    ExtractedSupplierData, ValidatedProduct, ValidatedSupplier,
};
