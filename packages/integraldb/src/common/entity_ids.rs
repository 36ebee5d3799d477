//! Typed ids for the stored entities.

pub use super::id::Id;

pub struct Supplier;
pub struct Product;
pub struct DocumentChunk;
pub struct SkippedRecord;

pub type SupplierId = Id<Supplier>;
pub type ProductId = Id<Product>;
pub type ChunkId = Id<DocumentChunk>;
pub type SkipId = Id<SkippedRecord>;
