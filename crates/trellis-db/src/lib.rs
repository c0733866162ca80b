pub mod migrations;
pub mod vector_index;

pub use vector_index::{Document, ScoredDocument, VectorIndex};
