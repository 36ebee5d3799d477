pub mod embed;

pub use embed::{embed_document, embed_documents, embed_text, EmbedOutcome, EmbedReport};
