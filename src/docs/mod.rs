// src/docs/mod.rs
// The documentation refresh + embedding pipeline.

pub mod chunker;
pub mod pipeline;
pub mod source;

pub use source::{build as build_source, ChangesSince, DocumentationSource, Update};
