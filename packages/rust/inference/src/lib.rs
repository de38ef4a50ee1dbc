//! Processors backed by a model server: summarization and named entity
//! recognition, plus the BIO decoder that turns NER output into entity names.

pub mod bio;
pub mod ner;
pub mod summary;
pub mod transport;

pub use bio::{Entities, EntityKind, PredictionToken};
pub use ner::Ner;
pub use summary::Summary;
