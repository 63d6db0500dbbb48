// src/search/mod.rs
// Semantic search surface: RRF-combined service updates, nearest document
// lookup, and "document to update" selection.

pub mod nearest;
pub mod rrf;

pub use nearest::{get_document_to_update, nearest_documents};
pub use rrf::get_latest_service_updates;
