// src/search/nearest.rs
//
// The two remaining search surfaces are pure nearest-neighbor queries with
// no fusion step, so they live directly on the data layer
// (`data::docs::get_closest_docs`, `get_document_to_update`); this module
// re-exports them so callers can reach every search surface from one place.

pub use crate::data::docs::{get_closest_docs as nearest_documents, get_document_to_update};
