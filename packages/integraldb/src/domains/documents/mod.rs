pub mod activities;
pub mod chunking;
pub mod models;
pub mod pdf;

pub use chunking::{chunk_text, reassemble, ChunkingConfig, TextChunk};
pub use models::{ChunkMatch, DocumentChunk};
