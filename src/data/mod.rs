// src/data/mod.rs
// Named operations over the relational store (component A). Each function is
// generic over its executor (see `db::Db`) so callers can bind several
// operations and a job completion into one transaction.

pub mod channels;
pub mod docs;
pub mod llm_usage;
pub mod messages;
pub mod reports;
pub mod runbooks;

pub use channels::Channel;
pub use docs::{ClosestDoc, DocumentRow, DocumentationSource};
pub use messages::Message;
pub use reports::Report;
pub use runbooks::Runbook;
